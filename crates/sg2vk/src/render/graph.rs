//! Node types of the produced graph
//!
//! The output of a conversion is a retained graph of [`RenderNode`]s.
//! Children are reference-counted, so a node converted once can be shared
//! by several parents exactly as in the source. State groups carry the
//! binding commands that put pipeline and descriptor state in effect
//! before their children draw.

use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;

use crate::foundation::math::{BoundingSphere, DMat4};

use super::data::DataArray;
use super::descriptor::BindDescriptorSet;
use super::pipeline::BindGraphicsPipeline;

/// A state-changing command carried by a [`StateGroup`]
///
/// Order is significant: the pipeline binds before any descriptor set,
/// and both before the children draw.
#[derive(Debug, Clone)]
pub enum StateCommand {
    /// Bind a graphics pipeline
    BindGraphicsPipeline(Arc<BindGraphicsPipeline>),
    /// Bind a descriptor set
    BindDescriptorSet(Arc<BindDescriptorSet>),
}

/// Plain grouping node
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// Ordered children
    pub children: Vec<Arc<RenderNode>>,
    /// Informational class tag, e.g. for coordinate-system anchors
    pub class: Option<&'static str>,
}

/// Grouping node that puts binding state in effect for its children
#[derive(Debug, Clone, Default)]
pub struct StateGroup {
    /// Binding commands applied in order before the children
    pub state_commands: Vec<StateCommand>,
    /// Ordered children
    pub children: Vec<Arc<RenderNode>>,
}

/// Transform node in the produced graph's column-vector convention
#[derive(Debug, Clone)]
pub struct MatrixTransform {
    /// Column-convention affine matrix
    pub matrix: DMat4,
    /// Ordered children
    pub children: Vec<Arc<RenderNode>>,
    /// Whether the subtree contains culling-relevant nodes, so the view
    /// frustum must be transformed into local coordinates when traversing
    pub subgraph_requires_local_frustum: bool,
}

/// Group culled as a whole against a bounding sphere
#[derive(Debug, Clone)]
pub struct CullGroup {
    /// Culling bound
    pub bound: BoundingSphere,
    /// Ordered children
    pub children: Vec<Arc<RenderNode>>,
}

/// Single child culled against a bounding sphere
#[derive(Debug, Clone)]
pub struct CullNode {
    /// Culling bound
    pub bound: BoundingSphere,
    /// The culled child
    pub child: Arc<RenderNode>,
}

/// One child of a level-of-detail node
#[derive(Debug, Clone)]
pub struct LodChild {
    /// Minimum projected screen-height ratio at which this child is shown
    pub minimum_screen_height_ratio: f64,
    /// The child
    pub node: Arc<RenderNode>,
}

/// Level-of-detail node; children ordered highest detail first
#[derive(Debug, Clone)]
pub struct Lod {
    /// Bounding sphere the ratios are evaluated against
    pub bound: BoundingSphere,
    /// Children, highest ratio (highest detail) first
    pub children: Vec<LodChild>,
}

/// One of the two fixed child slots of a paged node
#[derive(Debug, Clone)]
pub struct PagedLodChild {
    /// Minimum projected screen-height ratio at which this slot is shown
    pub minimum_screen_height_ratio: f64,
    /// Inline child, when one was converted for this slot
    pub node: Option<Arc<RenderNode>>,
}

/// Level-of-detail node whose high-detail child pages in from external
/// storage
#[derive(Debug, Clone)]
pub struct PagedLod {
    /// Bounding sphere the ratios are evaluated against
    pub bound: BoundingSphere,
    /// External reference loaded on demand for the high-detail slot
    pub filename: Option<PathBuf>,
    /// The two fixed child slots, highest detail first
    pub children: [Option<PagedLodChild>; 2],
    /// Highest state slot used below this node
    pub max_slot: u32,
    /// Descriptor sets to reserve, already scaled for anticipated paging
    pub num_descriptor_sets: u32,
    /// Descriptor pool sizes, already scaled for anticipated paging
    pub descriptor_pool_sizes: Vec<vk::DescriptorPoolSize>,
}

/// Converted geometry as a retained node
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Vertex attribute arrays
    pub arrays: Vec<AttributeArray>,
    /// Index data, when the source was indexed
    pub indices: Option<DataArray>,
    /// Draw call covering the arrays
    pub draw: DrawCommand,
}

/// Converted geometry as a flat command list
#[derive(Debug, Clone)]
pub struct Commands {
    /// Commands in submission order
    pub commands: Vec<Command>,
}

/// A vertex attribute array with its binding location
#[derive(Debug, Clone)]
pub struct AttributeArray {
    /// Shader attribute location
    pub location: u32,
    /// Rate at which the attribute advances
    pub rate: vk::VertexInputRate,
    /// Element data
    pub data: DataArray,
}

/// A draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    /// Non-indexed draw
    Draw {
        /// Vertices to draw
        vertex_count: u32,
        /// Instances to draw
        instance_count: u32,
    },
    /// Indexed draw
    DrawIndexed {
        /// Indices to draw
        index_count: u32,
        /// Instances to draw
        instance_count: u32,
    },
}

/// One command of a [`Commands`] node
#[derive(Debug, Clone)]
pub enum Command {
    /// Bind vertex attribute arrays
    BindVertexBuffers {
        /// First binding index
        first_binding: u32,
        /// Arrays bound in binding order
        arrays: Vec<AttributeArray>,
    },
    /// Bind an index buffer
    BindIndexBuffer {
        /// Index data
        indices: DataArray,
        /// Index element type
        index_type: vk::IndexType,
    },
    /// Issue a draw call
    Draw(DrawCommand),
}

/// A node of the produced graph
#[derive(Debug, Clone)]
pub enum RenderNode {
    /// Plain group
    Group(Group),
    /// Group carrying binding state
    StateGroup(StateGroup),
    /// Matrix transform
    Transform(MatrixTransform),
    /// Sphere-culled group
    CullGroup(CullGroup),
    /// Sphere-culled single child
    CullNode(CullNode),
    /// Level-of-detail selector
    Lod(Lod),
    /// Paging level-of-detail selector
    PagedLod(PagedLod),
    /// Retained geometry
    Geometry(Geometry),
    /// Geometry as a flat command list
    Commands(Commands),
}

impl RenderNode {
    /// Invoke `f` on each direct child
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Arc<RenderNode>)) {
        match self {
            Self::Group(group) => group.children.iter().for_each(f),
            Self::StateGroup(group) => group.children.iter().for_each(f),
            Self::Transform(transform) => transform.children.iter().for_each(f),
            Self::CullGroup(group) => group.children.iter().for_each(f),
            Self::CullNode(node) => f(&node.child),
            Self::Lod(lod) => lod.children.iter().for_each(|child| f(&child.node)),
            Self::PagedLod(plod) => {
                for slot in plod.children.iter().flatten() {
                    if let Some(node) = &slot.node {
                        f(node);
                    }
                }
            }
            Self::Geometry(_) | Self::Commands(_) => {}
        }
    }

    /// Post-order scan for culling-relevant nodes
    ///
    /// True when this node or any descendant is a cull group, cull node,
    /// or (paged) level-of-detail node.
    pub fn contains_cull_nodes(&self) -> bool {
        match self {
            Self::CullGroup(_) | Self::CullNode(_) | Self::Lod(_) | Self::PagedLod(_) => true,
            _ => {
                let mut found = false;
                self.for_each_child(&mut |child| {
                    found = found || child.contains_cull_nodes();
                });
                found
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_cull_nodes_finds_nested_lod() {
        let lod = Arc::new(RenderNode::Lod(Lod {
            bound: BoundingSphere::empty(),
            children: Vec::new(),
        }));
        let tree = RenderNode::Group(Group {
            children: vec![Arc::new(RenderNode::Group(Group {
                children: vec![lod],
                class: None,
            }))],
            class: None,
        });

        assert!(tree.contains_cull_nodes());
    }

    #[test]
    fn test_plain_groups_contain_no_cull_nodes() {
        let tree = RenderNode::Group(Group {
            children: vec![Arc::new(RenderNode::Group(Group::default()))],
            class: None,
        });

        assert!(!tree.contains_cull_nodes());
    }
}
