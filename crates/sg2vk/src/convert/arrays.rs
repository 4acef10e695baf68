//! Source-to-target array conversion
//!
//! A single dispatch table maps each source element-type tag to a copy
//! function. Supported types are copied bit-for-bit; everything else is a
//! deliberate "unsupported type, skip" and yields no array rather than an
//! error.

use bytemuck::Pod;

use crate::render::DataArray;
use crate::scene::{ElementType, SourceArray};

type CopyFn = fn(&SourceArray) -> DataArray;

// Element-wise unaligned reads: source bytes carry no alignment guarantee.
fn cast_vec<T: Pod>(array: &SourceArray) -> Vec<T> {
    array
        .bytes()
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Look up the copy function for an element type; `None` marks the type
/// unsupported
fn copy_fn(element: ElementType) -> Option<CopyFn> {
    match element {
        ElementType::UByte => Some(|a| DataArray::UByte(a.bytes().to_vec())),
        ElementType::UShort => Some(|a| DataArray::UShort(cast_vec(a))),
        ElementType::UInt => Some(|a| DataArray::UInt(cast_vec(a))),
        ElementType::Float => Some(|a| DataArray::Float(cast_vec(a))),
        ElementType::Double => Some(|a| DataArray::Double(cast_vec(a))),
        ElementType::Vec2ub => Some(|a| DataArray::UbVec2(cast_vec(a))),
        ElementType::Vec3ub => Some(|a| DataArray::UbVec3(cast_vec(a))),
        ElementType::Vec4ub => Some(|a| DataArray::UbVec4(cast_vec(a))),
        ElementType::Vec2us => Some(|a| DataArray::UsVec2(cast_vec(a))),
        ElementType::Vec3us => Some(|a| DataArray::UsVec3(cast_vec(a))),
        ElementType::Vec4us => Some(|a| DataArray::UsVec4(cast_vec(a))),
        ElementType::Vec2ui => Some(|a| DataArray::UiVec2(cast_vec(a))),
        ElementType::Vec3ui => Some(|a| DataArray::UiVec3(cast_vec(a))),
        ElementType::Vec4ui => Some(|a| DataArray::UiVec4(cast_vec(a))),
        ElementType::Vec2f => Some(|a| DataArray::Vec2(cast_vec(a))),
        ElementType::Vec3f => Some(|a| DataArray::Vec3(cast_vec(a))),
        ElementType::Vec4f => Some(|a| DataArray::Vec4(cast_vec(a))),
        ElementType::Vec2d => Some(|a| DataArray::DVec2(cast_vec(a))),
        ElementType::Vec3d => Some(|a| DataArray::DVec3(cast_vec(a))),
        ElementType::Vec4d => Some(|a| DataArray::DVec4(cast_vec(a))),
        ElementType::Mat4f => Some(|a| DataArray::Mat4(cast_vec(a))),
        ElementType::Mat4d => Some(|a| DataArray::DMat4(cast_vec(a))),
        ElementType::Byte
        | ElementType::Short
        | ElementType::Int
        | ElementType::Vec2b
        | ElementType::Vec3b
        | ElementType::Vec4b
        | ElementType::Vec2s
        | ElementType::Vec3s
        | ElementType::Vec4s
        | ElementType::Vec2i
        | ElementType::Vec3i
        | ElementType::Vec4i
        | ElementType::Quat
        | ElementType::UInt64
        | ElementType::Int64 => None,
    }
}

/// Copy a source array into its target representation
///
/// Absent input or an unsupported element type yields `None`.
pub fn copy_array(source: Option<&SourceArray>) -> Option<DataArray> {
    let source = source?;
    match copy_fn(source.element_type()) {
        Some(copy) => Some(copy(source)),
        None => {
            log::debug!(
                "skipping array with unsupported element type {:?}",
                source.element_type()
            );
            None
        }
    }
}
