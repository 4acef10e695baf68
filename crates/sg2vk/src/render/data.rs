//! Typed data arrays of the produced graph
//!
//! Converted vertex and index data lives in strongly typed arrays whose
//! layout matches what the GPU consumes directly.

use ash::vk;

/// A typed array carried by produced geometry
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum DataArray {
    UByte(Vec<u8>),
    UShort(Vec<u16>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    UbVec2(Vec<[u8; 2]>),
    UbVec3(Vec<[u8; 3]>),
    UbVec4(Vec<[u8; 4]>),
    UsVec2(Vec<[u16; 2]>),
    UsVec3(Vec<[u16; 3]>),
    UsVec4(Vec<[u16; 4]>),
    UiVec2(Vec<[u32; 2]>),
    UiVec3(Vec<[u32; 3]>),
    UiVec4(Vec<[u32; 4]>),
    Vec2(Vec<[f32; 2]>),
    Vec3(Vec<[f32; 3]>),
    Vec4(Vec<[f32; 4]>),
    DVec2(Vec<[f64; 2]>),
    DVec3(Vec<[f64; 3]>),
    DVec4(Vec<[f64; 4]>),
    Mat4(Vec<[[f32; 4]; 4]>),
    DMat4(Vec<[[f64; 4]; 4]>),
}

impl DataArray {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Self::UByte(v) => v.len(),
            Self::UShort(v) => v.len(),
            Self::UInt(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::UbVec2(v) => v.len(),
            Self::UbVec3(v) => v.len(),
            Self::UbVec4(v) => v.len(),
            Self::UsVec2(v) => v.len(),
            Self::UsVec3(v) => v.len(),
            Self::UsVec4(v) => v.len(),
            Self::UiVec2(v) => v.len(),
            Self::UiVec3(v) => v.len(),
            Self::UiVec4(v) => v.len(),
            Self::Vec2(v) => v.len(),
            Self::Vec3(v) => v.len(),
            Self::Vec4(v) => v.len(),
            Self::DVec2(v) => v.len(),
            Self::DVec3(v) => v.len(),
            Self::DVec4(v) => v.len(),
            Self::Mat4(v) => v.len(),
            Self::DMat4(v) => v.len(),
        }
    }

    /// Whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw element bytes
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::UByte(v) => v.as_slice(),
            Self::UShort(v) => bytemuck::cast_slice(v),
            Self::UInt(v) => bytemuck::cast_slice(v),
            Self::Float(v) => bytemuck::cast_slice(v),
            Self::Double(v) => bytemuck::cast_slice(v),
            Self::UbVec2(v) => bytemuck::cast_slice(v),
            Self::UbVec3(v) => bytemuck::cast_slice(v),
            Self::UbVec4(v) => bytemuck::cast_slice(v),
            Self::UsVec2(v) => bytemuck::cast_slice(v),
            Self::UsVec3(v) => bytemuck::cast_slice(v),
            Self::UsVec4(v) => bytemuck::cast_slice(v),
            Self::UiVec2(v) => bytemuck::cast_slice(v),
            Self::UiVec3(v) => bytemuck::cast_slice(v),
            Self::UiVec4(v) => bytemuck::cast_slice(v),
            Self::Vec2(v) => bytemuck::cast_slice(v),
            Self::Vec3(v) => bytemuck::cast_slice(v),
            Self::Vec4(v) => bytemuck::cast_slice(v),
            Self::DVec2(v) => bytemuck::cast_slice(v),
            Self::DVec3(v) => bytemuck::cast_slice(v),
            Self::DVec4(v) => bytemuck::cast_slice(v),
            Self::Mat4(v) => bytemuck::cast_slice(v),
            Self::DMat4(v) => bytemuck::cast_slice(v),
        }
    }

    /// Vertex-input format of one element, for arrays usable as vertex
    /// attributes
    pub fn format(&self) -> Option<vk::Format> {
        let format = match self {
            Self::UByte(_) => vk::Format::R8_UINT,
            Self::UShort(_) => vk::Format::R16_UINT,
            Self::UInt(_) => vk::Format::R32_UINT,
            Self::Float(_) => vk::Format::R32_SFLOAT,
            Self::Double(_) => vk::Format::R64_SFLOAT,
            Self::UbVec2(_) => vk::Format::R8G8_UINT,
            Self::UbVec3(_) => vk::Format::R8G8B8_UINT,
            Self::UbVec4(_) => vk::Format::R8G8B8A8_UINT,
            Self::UsVec2(_) => vk::Format::R16G16_UINT,
            Self::UsVec3(_) => vk::Format::R16G16B16_UINT,
            Self::UsVec4(_) => vk::Format::R16G16B16A16_UINT,
            Self::UiVec2(_) => vk::Format::R32G32_UINT,
            Self::UiVec3(_) => vk::Format::R32G32B32_UINT,
            Self::UiVec4(_) => vk::Format::R32G32B32A32_UINT,
            Self::Vec2(_) => vk::Format::R32G32_SFLOAT,
            Self::Vec3(_) => vk::Format::R32G32B32_SFLOAT,
            Self::Vec4(_) => vk::Format::R32G32B32A32_SFLOAT,
            Self::DVec2(_) => vk::Format::R64G64_SFLOAT,
            Self::DVec3(_) => vk::Format::R64G64B64_SFLOAT,
            Self::DVec4(_) => vk::Format::R64G64B64A64_SFLOAT,
            Self::Mat4(_) | Self::DMat4(_) => return None,
        };
        Some(format)
    }

    /// Index type, for arrays usable as index buffers
    pub fn index_type(&self) -> Option<vk::IndexType> {
        match self {
            Self::UShort(_) => Some(vk::IndexType::UINT16),
            Self::UInt(_) => Some(vk::IndexType::UINT32),
            _ => None,
        }
    }
}
