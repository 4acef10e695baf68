//! Source scene-graph model
//!
//! The input to a conversion is an arena-backed graph: nodes and state sets
//! live in slot maps, and identity is the arena key. Children are ordered
//! key sequences, so a node referenced by several parents is genuinely
//! shared, which the converter preserves in the output. The graph is
//! read-only during conversion.

pub mod array;
pub mod optimize;
pub mod state;

use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::{BoundingBox, BoundingSphere, DMat4, DVec3, Vec3};

pub use array::{ElementType, SourceArray};
pub use state::{ImageData, Material, SamplerSettings, StateSet, TextureAttachment, TextureUnit};

new_key_type! {
    /// Stable identity of a node within a [`SceneGraph`]
    pub struct NodeKey;

    /// Stable identity of a [`StateSet`] within a [`SceneGraph`]
    pub struct StateSetKey;
}

/// A geometry leaf: vertex attribute arrays plus optional indices
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    /// Vertex positions, normally 3-component float vectors
    pub vertices: Option<SourceArray>,
    /// Per-vertex or overall normals
    pub normals: Option<SourceArray>,
    /// Binding of the normal array
    pub normal_binding: ArrayBinding,
    /// Per-vertex or overall colors
    pub colors: Option<SourceArray>,
    /// Binding of the color array
    pub color_binding: ArrayBinding,
    /// Texture coordinates for unit 0
    pub tex_coords: Option<SourceArray>,
    /// Per-instance translations; normally absent, populated when instanced
    /// drawing has been prepared upstream
    pub translations: Option<SourceArray>,
    /// Primitive indices; absent for non-indexed geometry
    pub indices: Option<SourceArray>,
}

/// How an attribute array maps onto primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayBinding {
    /// One element per vertex
    #[default]
    PerVertex,
    /// A single element covering the whole primitive set
    Overall,
}

/// An interior node holding an ordered child list
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// Ordered children
    pub children: Vec<NodeKey>,
}

/// A transform node applying a matrix to its children
///
/// The matrix follows the source library's row-vector convention.
#[derive(Debug, Clone)]
pub struct Transform {
    /// Row-convention affine matrix
    pub matrix: DMat4,
    /// Ordered children
    pub children: Vec<NodeKey>,
}

/// One positioned drawable of a billboard
#[derive(Debug, Clone, Copy)]
pub struct BillboardInstance {
    /// Geometry node drawn at this position
    pub geometry: NodeKey,
    /// Position of this instance in the billboard's local frame
    pub position: Vec3,
}

/// A screen-facing node: drawables positioned independently, each always
/// facing the viewer
#[derive(Debug, Clone, Default)]
pub struct Billboard {
    /// Positioned drawables
    pub drawables: Vec<BillboardInstance>,
}

/// How a level-of-detail node resolves its center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenterMode {
    /// Use the computed bounding sphere of the children
    #[default]
    UseBoundingSphere,
    /// Use the explicitly provided center
    UserDefined,
}

/// How level-of-detail ranges are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeMode {
    /// Ranges are distances from the eye point
    #[default]
    DistanceFromEyePoint,
    /// Ranges are projected pixel sizes
    PixelSizeOnScreen,
}

/// A level-of-detail node choosing between alternative child
/// representations
#[derive(Debug, Clone)]
pub struct Lod {
    /// Alternative representations, ordered as declared
    pub children: Vec<NodeKey>,
    /// `(min, max)` range per child, same order as `children`
    pub ranges: Vec<(f32, f32)>,
    /// How the center is resolved
    pub center_mode: CenterMode,
    /// Explicit center, honored under [`CenterMode::UserDefined`]
    pub center: DVec3,
    /// Explicit radius, honored when positive
    pub radius: f64,
    /// Interpretation of `ranges`
    pub range_mode: RangeMode,
}

impl Default for Lod {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            ranges: Vec::new(),
            center_mode: CenterMode::default(),
            center: DVec3::zeros(),
            radius: 0.0,
            range_mode: RangeMode::default(),
        }
    }
}

/// A level-of-detail node whose children may be paged in from external
/// storage on demand
#[derive(Debug, Clone)]
pub struct PagedLod {
    /// Inline children; may be shorter than `ranges`
    pub children: Vec<NodeKey>,
    /// `(min, max)` range per declared child slot
    pub ranges: Vec<(f32, f32)>,
    /// External-reference filename per slot; empty when the slot is
    /// inline-only
    pub file_names: Vec<String>,
    /// How the center is resolved
    pub center_mode: CenterMode,
    /// Explicit center, honored under [`CenterMode::UserDefined`]
    pub center: DVec3,
    /// Explicit radius, honored when positive
    pub radius: f64,
    /// Interpretation of `ranges`
    pub range_mode: RangeMode,
}

impl Default for PagedLod {
    fn default() -> Self {
        Self {
            children: Vec::new(),
            ranges: Vec::new(),
            file_names: Vec::new(),
            center_mode: CenterMode::default(),
            center: DVec3::zeros(),
            radius: 0.0,
            range_mode: RangeMode::default(),
        }
    }
}

/// The kind and payload of a source node
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Geometry leaf
    Geometry(Geometry),
    /// Plain grouping node
    Group(Group),
    /// Matrix transform
    Transform(Transform),
    /// Grouping node tagged as a coordinate-system anchor
    CoordinateSystem(Group),
    /// Screen-facing drawables
    Billboard(Billboard),
    /// Level-of-detail selector
    Lod(Lod),
    /// Level-of-detail selector with external paging
    PagedLod(PagedLod),
    /// Terrain tile; structurally a group, converted transparently
    TerrainTile(Group),
}

/// A node of the source graph: a kind plus optional attached state
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Node kind and payload
    pub kind: NodeKind,
    /// State set in effect for this node and its subtree
    pub state_set: Option<StateSetKey>,
}

impl SceneNode {
    /// Create a node without attached state
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            state_set: None,
        }
    }

    /// Create a node with attached state
    pub fn with_state(kind: NodeKind, state_set: StateSetKey) -> Self {
        Self {
            kind,
            state_set: Some(state_set),
        }
    }
}

/// Arena-backed source scene graph
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    state_sets: SlotMap<StateSetKey, StateSet>,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning its identity
    pub fn add_node(&mut self, node: SceneNode) -> NodeKey {
        self.nodes.insert(node)
    }

    /// Insert a geometry leaf without attached state
    pub fn add_geometry(&mut self, geometry: Geometry) -> NodeKey {
        self.add_node(SceneNode::new(NodeKind::Geometry(geometry)))
    }

    /// Insert a group over the given children
    pub fn add_group(&mut self, children: Vec<NodeKey>) -> NodeKey {
        self.add_node(SceneNode::new(NodeKind::Group(Group { children })))
    }

    /// Insert a state set, returning its identity
    pub fn add_state_set(&mut self, state_set: StateSet) -> StateSetKey {
        self.state_sets.insert(state_set)
    }

    /// Look up a node
    pub fn node(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    /// Look up a node mutably
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    /// Look up a state set
    pub fn state_set(&self, key: StateSetKey) -> Option<&StateSet> {
        self.state_sets.get(key)
    }

    /// Number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Compute the bounding sphere of a subtree
    ///
    /// Level-of-detail nodes honor user-set centers and radii; billboards
    /// expand their drawables' local bounds by every instance position.
    pub fn bound(&self, key: NodeKey) -> BoundingSphere {
        let Some(node) = self.node(key) else {
            return BoundingSphere::empty();
        };

        match &node.kind {
            NodeKind::Geometry(geometry) => {
                BoundingSphere::from_box(&Self::geometry_box(geometry))
            }
            NodeKind::Group(group)
            | NodeKind::CoordinateSystem(group)
            | NodeKind::TerrainTile(group) => self.children_bound(&group.children),
            NodeKind::Transform(transform) => {
                // Children bounds are in local coordinates; the matrix is
                // row-convention and applies transposed.
                let local = self.children_bound(&transform.children);
                local.transformed(&transform.matrix.transpose())
            }
            NodeKind::Billboard(billboard) => {
                let mut world = BoundingBox::empty();
                for instance in &billboard.drawables {
                    let Some(drawable) = self.node(instance.geometry) else {
                        continue;
                    };
                    let NodeKind::Geometry(geometry) = &drawable.kind else {
                        continue;
                    };
                    let local = Self::geometry_box(geometry);
                    if local.is_valid() {
                        world.expand_by(local.min + instance.position);
                        world.expand_by(local.max + instance.position);
                    }
                }
                BoundingSphere::from_box(&world)
            }
            NodeKind::Lod(lod) => self.lod_bound(
                &lod.children,
                lod.center_mode,
                lod.center,
                lod.radius,
            ),
            NodeKind::PagedLod(plod) => self.lod_bound(
                &plod.children,
                plod.center_mode,
                plod.center,
                plod.radius,
            ),
        }
    }

    fn geometry_box(geometry: &Geometry) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        if let Some(vertices) = geometry.vertices.as_ref().and_then(SourceArray::to_vec3s) {
            for v in vertices {
                bb.expand_by(Vec3::new(v[0], v[1], v[2]));
            }
        }
        bb
    }

    fn children_bound(&self, children: &[NodeKey]) -> BoundingSphere {
        let mut sphere = BoundingSphere::empty();
        for &child in children {
            sphere.expand_by(&self.bound(child));
        }
        sphere
    }

    fn lod_bound(
        &self,
        children: &[NodeKey],
        center_mode: CenterMode,
        center: DVec3,
        radius: f64,
    ) -> BoundingSphere {
        let geometric = self.children_bound(children);
        let center = match center_mode {
            CenterMode::UserDefined => center,
            CenterMode::UseBoundingSphere => geometric.center,
        };
        let radius = if radius > 0.0 {
            radius
        } else {
            geometric.radius
        };
        BoundingSphere::new(center, radius)
    }
}
