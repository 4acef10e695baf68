//! Graphics pipeline descriptions and the device capability seam
//!
//! Produced graphs are retained: pipelines are carried as complete
//! descriptions (shader stages, vertex input, fixed-function state,
//! layout) and instantiated against a device in a later compile pass.
//! The only device interaction conversion itself needs is turning
//! generated shader source into modules, expressed by [`GpuContext`].

use std::sync::Arc;

use ash::vk;
use thiserror::Error;

use crate::shader::{AttributeLocation, GeometryAttributes, ShaderModeMask};

use super::descriptor::DescriptorBinding;
use crate::scene::TextureUnit;

/// Push-constant budget of the generated shaders: projection plus
/// modelview matrix
pub const PUSH_CONSTANT_SIZE: u32 = 128;

/// Error produced when a [`GpuContext`] rejects generated shader source
#[derive(Debug, Error)]
pub enum ShaderCompileError {
    /// The source failed to compile
    #[error("shader compilation failed: {0}")]
    Compile(String),
    /// The context does not handle this shader stage
    #[error("unsupported shader stage {0:?}")]
    UnsupportedStage(vk::ShaderStageFlags),
}

/// A compiled (or retained-for-later-compilation) shader stage
#[derive(Debug, Clone)]
pub struct ShaderModule {
    /// Stage this module serves
    pub stage: vk::ShaderStageFlags,
    /// Entry point name
    pub entry_point: String,
    /// Retained source text
    pub source: String,
    /// SPIR-V words; empty while compilation is deferred
    pub spirv: Vec<u32>,
}

/// Opaque device capability threaded through pipeline construction
///
/// Validating that a context exists is the caller's job before a session
/// starts; within a session a compile failure is non-fatal and degrades
/// the affected subgraph to an unpipelined state group.
pub trait GpuContext {
    /// Turn generated source into a shader module
    fn compile_shader(
        &self,
        stage: vk::ShaderStageFlags,
        source: &str,
    ) -> Result<Arc<ShaderModule>, ShaderCompileError>;
}

/// Context that retains shader source for a later device-side compile
/// pass, the default for offline conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGpuContext;

impl GpuContext for OfflineGpuContext {
    fn compile_shader(
        &self,
        stage: vk::ShaderStageFlags,
        source: &str,
    ) -> Result<Arc<ShaderModule>, ShaderCompileError> {
        Ok(Arc::new(ShaderModule {
            stage,
            entry_point: "main".to_string(),
            source: source.to_string(),
            spirv: Vec::new(),
        }))
    }
}

/// Layout of one descriptor set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescriptorSetLayout {
    /// Bindings in ascending binding order
    pub bindings: Vec<DescriptorBinding>,
}

/// Pipeline layout: descriptor set layouts plus push-constant budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineLayout {
    /// Descriptor set layouts, indexed by set number
    pub descriptor_set_layouts: Vec<DescriptorSetLayout>,
    /// Bytes of push constants the shaders consume
    pub push_constant_size: u32,
}

/// A complete graphics pipeline description
#[derive(Debug, Clone)]
pub struct GraphicsPipeline {
    /// Shader stages, vertex then fragment
    pub shader_stages: Vec<Arc<ShaderModule>>,
    /// Vertex buffer bindings
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attribute descriptions
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Whether alpha blending is enabled
    pub blending: bool,
    /// Whether depth writes are enabled
    pub depth_write: bool,
    /// Layout shared with the descriptor sets bound alongside
    pub layout: Arc<PipelineLayout>,
}

/// State command binding a graphics pipeline
#[derive(Debug, Clone)]
pub struct BindGraphicsPipeline {
    /// The pipeline to bind
    pub pipeline: Arc<GraphicsPipeline>,
}

impl BindGraphicsPipeline {
    /// State slot pipeline bindings occupy
    pub const SLOT: u32 = 0;
}

/// Derive the vertex input state for a geometry-attribute mask
///
/// One buffer binding per attribute, locations fixed by
/// [`AttributeLocation`]; the per-instance translation advances at
/// instance rate.
pub fn vertex_input_for(
    attributes: GeometryAttributes,
) -> (
    Vec<vk::VertexInputBindingDescription>,
    Vec<vk::VertexInputAttributeDescription>,
) {
    struct Entry {
        bit: GeometryAttributes,
        location: u32,
        format: vk::Format,
        stride: u32,
        rate: vk::VertexInputRate,
    }

    let entries = [
        Entry {
            bit: GeometryAttributes::VERTEX,
            location: AttributeLocation::VERTEX,
            format: vk::Format::R32G32B32_SFLOAT,
            stride: 12,
            rate: vk::VertexInputRate::VERTEX,
        },
        Entry {
            bit: GeometryAttributes::NORMAL.union(GeometryAttributes::NORMAL_OVERALL),
            location: AttributeLocation::NORMAL,
            format: vk::Format::R32G32B32_SFLOAT,
            stride: 12,
            rate: vk::VertexInputRate::VERTEX,
        },
        Entry {
            bit: GeometryAttributes::COLOR.union(GeometryAttributes::COLOR_OVERALL),
            location: AttributeLocation::COLOR,
            format: vk::Format::R32G32B32A32_SFLOAT,
            stride: 16,
            rate: vk::VertexInputRate::VERTEX,
        },
        Entry {
            bit: GeometryAttributes::TEXCOORD,
            location: AttributeLocation::TEXCOORD,
            format: vk::Format::R32G32_SFLOAT,
            stride: 8,
            rate: vk::VertexInputRate::VERTEX,
        },
        Entry {
            bit: GeometryAttributes::TRANSLATE,
            location: AttributeLocation::TRANSLATE,
            format: vk::Format::R32G32B32_SFLOAT,
            stride: 12,
            rate: vk::VertexInputRate::INSTANCE,
        },
    ];

    let mut bindings = Vec::new();
    let mut attribute_descriptions = Vec::new();
    for entry in entries {
        if !attributes.intersects(entry.bit) {
            continue;
        }
        let binding = bindings.len() as u32;
        bindings.push(vk::VertexInputBindingDescription {
            binding,
            stride: entry.stride,
            input_rate: entry.rate,
        });
        attribute_descriptions.push(vk::VertexInputAttributeDescription {
            location: entry.location,
            binding,
            format: entry.format,
            offset: 0,
        });
    }
    (bindings, attribute_descriptions)
}

/// Derive the descriptor-set layout implied by a shader-mode mask
///
/// Each texture-map bit contributes a combined image sampler at its
/// texture-unit binding; a material contributes a uniform buffer. Returns
/// `None` when the mask implies no descriptors at all.
pub fn descriptor_set_layout_for(modes: ShaderModeMask) -> Option<DescriptorSetLayout> {
    let map_bindings = [
        (ShaderModeMask::DIFFUSE_MAP, TextureUnit::DIFFUSE),
        (ShaderModeMask::OPACITY_MAP, TextureUnit::OPACITY),
        (ShaderModeMask::AMBIENT_MAP, TextureUnit::AMBIENT),
        (ShaderModeMask::NORMAL_MAP, TextureUnit::NORMAL),
        (ShaderModeMask::SPECULAR_MAP, TextureUnit::SPECULAR),
    ];

    let mut bindings = Vec::new();
    for (bit, unit) in map_bindings {
        if modes.contains(bit) {
            bindings.push(DescriptorBinding {
                binding: unit,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
            });
        }
    }
    if modes.contains(ShaderModeMask::MATERIAL) {
        bindings.push(DescriptorBinding {
            binding: TextureUnit::MATERIAL_BINDING,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
        });
    }

    if bindings.is_empty() {
        None
    } else {
        Some(DescriptorSetLayout { bindings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_input_locations() {
        let (bindings, attributes) = vertex_input_for(
            GeometryAttributes::VERTEX
                | GeometryAttributes::TEXCOORD
                | GeometryAttributes::TRANSLATE,
        );
        assert_eq!(bindings.len(), 3);
        assert_eq!(attributes.len(), 3);

        assert_eq!(attributes[0].location, AttributeLocation::VERTEX);
        assert_eq!(attributes[1].location, AttributeLocation::TEXCOORD);
        assert_eq!(attributes[2].location, AttributeLocation::TRANSLATE);
        assert_eq!(
            bindings[2].input_rate,
            vk::VertexInputRate::INSTANCE
        );
    }

    #[test]
    fn test_descriptor_layout_bindings() {
        let layout = descriptor_set_layout_for(
            ShaderModeMask::DIFFUSE_MAP | ShaderModeMask::NORMAL_MAP | ShaderModeMask::MATERIAL,
        )
        .unwrap();

        let bindings: Vec<u32> = layout.bindings.iter().map(|b| b.binding).collect();
        assert_eq!(
            bindings,
            vec![
                TextureUnit::DIFFUSE,
                TextureUnit::NORMAL,
                TextureUnit::MATERIAL_BINDING
            ]
        );
        assert_eq!(
            layout.bindings[2].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
    }

    #[test]
    fn test_empty_mask_has_no_layout() {
        assert!(descriptor_set_layout_for(ShaderModeMask::BLEND).is_none());
    }

    #[test]
    fn test_offline_context_retains_source() {
        let module = OfflineGpuContext
            .compile_shader(vk::ShaderStageFlags::VERTEX, "void main() {}")
            .unwrap();
        assert_eq!(module.stage, vk::ShaderStageFlags::VERTEX);
        assert_eq!(module.source, "void main() {}");
        assert!(module.spirv.is_empty());
    }
}
