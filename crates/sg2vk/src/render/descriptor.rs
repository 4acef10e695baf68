//! Descriptor sets and descriptor usage statistics
//!
//! A descriptor set maps the textures and material of a source state set
//! into the binding layout its pipeline expects. [`DescriptorStats`]
//! censuses descriptor usage across a converted subtree so paged nodes can
//! size descriptor pools ahead of runtime paging.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ash::vk;

use crate::scene::{ImageData, Material, SamplerSettings};

use super::graph::{RenderNode, StateCommand};
use super::pipeline::PipelineLayout;

/// One binding slot of a descriptor-set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding index within the set
    pub binding: u32,
    /// Kind of resource bound here
    pub descriptor_type: vk::DescriptorType,
    /// Number of descriptors in this binding
    pub descriptor_count: u32,
    /// Shader stages that read the binding
    pub stage_flags: vk::ShaderStageFlags,
}

/// One resource reference within a descriptor set
#[derive(Debug, Clone)]
pub enum Descriptor {
    /// A sampled texture
    CombinedImageSampler {
        /// Binding index
        binding: u32,
        /// Image backing the texture
        image: Arc<ImageData>,
        /// Sampler state
        sampler: SamplerSettings,
    },
    /// Material colors as a uniform buffer
    MaterialUniform {
        /// Binding index
        binding: u32,
        /// Material payload
        material: Material,
    },
}

impl Descriptor {
    /// Binding index this descriptor fills
    pub fn binding(&self) -> u32 {
        match self {
            Self::CombinedImageSampler { binding, .. } | Self::MaterialUniform { binding, .. } => {
                *binding
            }
        }
    }

    /// Descriptor type this descriptor fills
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            Self::CombinedImageSampler { .. } => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::MaterialUniform { .. } => vk::DescriptorType::UNIFORM_BUFFER,
        }
    }
}

/// A bound set of resource references matching a pipeline's layout
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    /// Resources in layout-binding order
    pub descriptors: Vec<Descriptor>,
}

/// State command binding a descriptor set
#[derive(Debug, Clone)]
pub struct BindDescriptorSet {
    /// Layout the set was built against
    pub layout: Arc<PipelineLayout>,
    /// Set number within the layout
    pub set_index: u32,
    /// The set to bind
    pub descriptor_set: Arc<DescriptorSet>,
}

impl BindDescriptorSet {
    /// State slot this binding occupies; descriptor sets bind after the
    /// pipeline
    pub fn slot(&self) -> u32 {
        1 + self.set_index
    }
}

/// Census of descriptor usage over a converted subtree
#[derive(Debug, Default)]
pub struct DescriptorStats {
    seen_sets: HashSet<usize>,
    counts: HashMap<vk::DescriptorType, u32>,
    max_slot: u32,
}

impl DescriptorStats {
    /// Collect statistics over one subtree
    pub fn collect(node: &RenderNode) -> Self {
        let mut stats = Self::default();
        stats.add_node(node);
        stats
    }

    /// Accumulate one subtree into the census
    ///
    /// Shared descriptor sets are counted once no matter how many state
    /// groups bind them.
    pub fn add_node(&mut self, node: &RenderNode) {
        if let RenderNode::StateGroup(state_group) = node {
            for command in &state_group.state_commands {
                match command {
                    StateCommand::BindGraphicsPipeline(_) => {}
                    StateCommand::BindDescriptorSet(bind) => {
                        self.max_slot = self.max_slot.max(bind.slot());
                        let identity = Arc::as_ptr(&bind.descriptor_set) as usize;
                        if self.seen_sets.insert(identity) {
                            for descriptor in &bind.descriptor_set.descriptors {
                                *self.counts.entry(descriptor.descriptor_type()).or_insert(0) += 1;
                            }
                        }
                    }
                }
            }
        }

        let mut children = Vec::new();
        node.for_each_child(&mut |child| children.push(child));
        for child in children {
            self.add_node(child);
        }
    }

    /// Number of distinct descriptor sets found
    pub fn num_descriptor_sets(&self) -> u32 {
        self.seen_sets.len() as u32
    }

    /// Highest state slot in use
    pub fn max_slot(&self) -> u32 {
        self.max_slot
    }

    /// Aggregate pool sizes per descriptor type, in stable type order
    pub fn pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = self
            .counts
            .iter()
            .map(|(ty, count)| vk::DescriptorPoolSize {
                ty: *ty,
                descriptor_count: *count,
            })
            .collect();
        sizes.sort_by_key(|size| size.ty.as_raw());
        sizes
    }
}
