//! Mesh-optimization pre-pass contract
//!
//! Conversion assumes its input has already been through a geometry
//! optimization pass: reindexing, vertex-cache optimization,
//! vertex-access-order optimization, generic topology cleanups (excluding
//! static-transform flattening, which would defeat the transform
//! conversion), and collapsing of redundant billboard drawables. The
//! algorithms themselves live outside this crate; implementors plug in
//! through this trait and are invoked once on the whole graph before a
//! conversion session starts.

use super::{NodeKey, SceneGraph};

/// A whole-graph geometry optimization pass run before conversion
pub trait SceneOptimizer {
    /// Optimize the subtree rooted at `root` in place
    fn optimize(&self, graph: &mut SceneGraph, root: NodeKey);
}

/// Identity optimizer for inputs that are already optimized
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOptimizer;

impl SceneOptimizer for NullOptimizer {
    fn optimize(&self, _graph: &mut SceneGraph, _root: NodeKey) {}
}
