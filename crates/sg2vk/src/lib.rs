//! # sg2vk
//!
//! Converts scene graphs built for a classic fixed-function,
//! CPU-rasterization-oriented library into equivalent scene graphs ready
//! for an explicit, Vulkan-style API.
//!
//! ## Features
//!
//! - **Traversal-driven transcoding**: one memoized pass over groups,
//!   transforms, geometry, billboards, level-of-detail and terrain nodes
//! - **Resource deduplication**: pipelines and descriptor sets are
//!   content-addressed by render-state fingerprints and reused across the
//!   whole graph
//! - **Sharing preserved**: a source node referenced by several parents
//!   converts once and stays shared in the output
//! - **Graceful degradation**: unsupported data and failed GPU resource
//!   construction skip locally instead of failing the conversion
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sg2vk::convert::{convert_scene, ConvertSettings};
//! use sg2vk::render::OfflineGpuContext;
//! use sg2vk::scene::{Geometry, SceneGraph, SourceArray};
//! use sg2vk::shader::GlslShaderGenerator;
//!
//! let mut graph = SceneGraph::new();
//! let root = graph.add_geometry(Geometry {
//!     vertices: Some(SourceArray::from_vec3s(&[
//!         [0.0, 0.0, 0.0],
//!         [1.0, 0.0, 0.0],
//!         [0.0, 1.0, 0.0],
//!     ])),
//!     ..Geometry::default()
//! });
//!
//! let converted = convert_scene(
//!     &graph,
//!     root,
//!     &ConvertSettings::default(),
//!     &GlslShaderGenerator,
//!     &OfflineGpuContext,
//! );
//! assert!(converted.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod convert;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod shader;

/// Common imports for crate users
pub mod prelude {
    pub use crate::convert::{
        convert_scene, ConvertSettings, GeometryTarget, SceneConverter, SettingsError,
    };
    pub use crate::foundation::math::{BoundingBox, BoundingSphere, DMat4, DVec3, Mat4, Vec3};
    pub use crate::render::{
        GpuContext, OfflineGpuContext, RenderNode, ShaderCompileError, StateCommand,
    };
    pub use crate::scene::{
        Geometry, Material, NodeKey, NodeKind, SceneGraph, SceneNode, SourceArray, StateSet,
        StateSetKey,
    };
    pub use crate::shader::{
        GeometryAttributes, GlslShaderGenerator, ShaderGenerator, ShaderModeMask,
    };
}
