//! Typed numeric arrays of the source scene graph
//!
//! Source geometry stores its vertex data as raw bytes plus an element-type
//! tag, mirroring the classic library's array taxonomy. Only a subset of
//! element types can be carried over to the produced graph; the rest exist
//! so the converter can recognize and skip them.

use crate::foundation::math::Vec3;

/// Element-type tag of a [`SourceArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ElementType {
    Byte,
    Short,
    Int,
    UByte,
    UShort,
    UInt,
    Float,
    Double,
    Vec2b,
    Vec3b,
    Vec4b,
    Vec2s,
    Vec3s,
    Vec4s,
    Vec2i,
    Vec3i,
    Vec4i,
    Vec2ub,
    Vec3ub,
    Vec4ub,
    Vec2us,
    Vec3us,
    Vec4us,
    Vec2ui,
    Vec3ui,
    Vec4ui,
    Vec2f,
    Vec3f,
    Vec4f,
    Vec2d,
    Vec3d,
    Vec4d,
    Mat4f,
    Mat4d,
    Quat,
    UInt64,
    Int64,
}

impl ElementType {
    /// Size of one element in bytes
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::Byte | Self::UByte => 1,
            Self::Short | Self::UShort | Self::Vec2b | Self::Vec2ub => 2,
            Self::Vec3b | Self::Vec3ub => 3,
            Self::Int
            | Self::UInt
            | Self::Float
            | Self::Vec4b
            | Self::Vec4ub
            | Self::Vec2s
            | Self::Vec2us => 4,
            Self::Vec3s | Self::Vec3us => 6,
            Self::Double
            | Self::Vec2i
            | Self::Vec2ui
            | Self::Vec2f
            | Self::Vec4s
            | Self::Vec4us
            | Self::UInt64
            | Self::Int64 => 8,
            Self::Vec3i | Self::Vec3ui | Self::Vec3f => 12,
            Self::Vec4i | Self::Vec4ui | Self::Vec4f | Self::Vec2d | Self::Quat => 16,
            Self::Vec3d => 24,
            Self::Vec4d => 32,
            Self::Mat4f => 64,
            Self::Mat4d => 128,
        }
    }
}

/// A typed array owned by source geometry
///
/// Stored as raw element bytes so the converter can copy supported types
/// bit-for-bit without per-type plumbing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceArray {
    element: ElementType,
    bytes: Vec<u8>,
}

impl SourceArray {
    /// Create an array from raw element bytes
    ///
    /// The byte length must be a multiple of the element size.
    pub fn from_raw(element: ElementType, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len() % element.size_in_bytes(), 0);
        Self { element, bytes }
    }

    /// Create a float array
    pub fn from_floats(values: &[f32]) -> Self {
        Self::from_raw(ElementType::Float, bytemuck::cast_slice(values).to_vec())
    }

    /// Create a 2-component float vector array
    pub fn from_vec2s(values: &[[f32; 2]]) -> Self {
        Self::from_raw(ElementType::Vec2f, bytemuck::cast_slice(values).to_vec())
    }

    /// Create a 3-component float vector array
    pub fn from_vec3s(values: &[[f32; 3]]) -> Self {
        Self::from_raw(ElementType::Vec3f, bytemuck::cast_slice(values).to_vec())
    }

    /// Create a 4-component float vector array
    pub fn from_vec4s(values: &[[f32; 4]]) -> Self {
        Self::from_raw(ElementType::Vec4f, bytemuck::cast_slice(values).to_vec())
    }

    /// Create a 3-component float vector array from points
    pub fn from_points(values: &[Vec3]) -> Self {
        let flat: Vec<[f32; 3]> = values.iter().map(|v| [v.x, v.y, v.z]).collect();
        Self::from_vec3s(&flat)
    }

    /// Create an unsigned short array (typically indices)
    pub fn from_ushorts(values: &[u16]) -> Self {
        Self::from_raw(ElementType::UShort, bytemuck::cast_slice(values).to_vec())
    }

    /// Create an unsigned int array (typically indices)
    pub fn from_uints(values: &[u32]) -> Self {
        Self::from_raw(ElementType::UInt, bytemuck::cast_slice(values).to_vec())
    }

    /// Element-type tag
    pub fn element_type(&self) -> ElementType {
        self.element
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.bytes.len() / self.element.size_in_bytes()
    }

    /// Whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw element bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read the elements as 3-component float vectors, if that is the
    /// element type
    pub fn to_vec3s(&self) -> Option<Vec<[f32; 3]>> {
        (self.element == ElementType::Vec3f).then(|| {
            self.bytes
                .chunks_exact(ElementType::Vec3f.size_in_bytes())
                .map(bytemuck::pod_read_unaligned)
                .collect()
        })
    }
}
