//! The produced, Vulkan-ready scene graph
//!
//! Retained node types, pipeline and descriptor descriptions, and the
//! device capability seam used while constructing them.

pub mod data;
pub mod descriptor;
pub mod graph;
pub mod pipeline;

pub use data::DataArray;
pub use descriptor::{
    BindDescriptorSet, Descriptor, DescriptorBinding, DescriptorSet, DescriptorStats,
};
pub use graph::{
    AttributeArray, Command, Commands, CullGroup, CullNode, DrawCommand, Geometry, Group, Lod,
    LodChild, MatrixTransform, PagedLod, PagedLodChild, RenderNode, StateCommand, StateGroup,
};
pub use pipeline::{
    descriptor_set_layout_for, vertex_input_for, BindGraphicsPipeline, DescriptorSetLayout,
    GpuContext, GraphicsPipeline, OfflineGpuContext, PipelineLayout, ShaderCompileError,
    ShaderModule, PUSH_CONSTANT_SIZE,
};
