//! The graph transcoder
//!
//! [`SceneConverter`] walks a source graph depth-first and produces the
//! equivalent Vulkan-ready graph. All traversal state — the state-set
//! stack, the node memo, the pipeline and descriptor caches, and the
//! filename map — lives on the converter and is scoped to one session:
//! one converter converts one root and is then discarded.

pub mod arrays;
pub mod caches;
mod geometry;

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::foundation::math::{swap_matrix_convention, DMat4, Vec3};
use crate::render::{
    self, DescriptorStats, GpuContext, LodChild, MatrixTransform, PagedLodChild, RenderNode,
    StateCommand, StateGroup,
};
use crate::scene::{
    self, NodeKey, NodeKind, RangeMode, SceneGraph, SourceArray, StateSetKey,
};
use crate::shader::{
    calculate_attributes_mask, calculate_state_set_mask, GeometryAttributes, ShaderGenerator,
    ShaderModeMask,
};

pub use arrays::copy_array;
pub use caches::{DescriptorSetCache, PipelineCache};

/// Normalization factor for pixel-size ranges, referenced to a 1080-pixel
/// viewport height
const PIXEL_RATIO: f64 = 1.0 / 1080.0;

/// How converted geometry is represented in the produced graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryTarget {
    /// A retained geometry node holding arrays, indices and a draw call
    #[default]
    Geometry,
    /// A flat list of bind and draw commands
    Commands,
}

/// Error raised when settings fail to parse
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The TOML text was malformed or mistyped
    #[error("failed to parse conversion settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session-scoped conversion settings, read-only during conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertSettings {
    /// Extension given to remapped external-reference filenames
    pub extension: String,
    /// Shader-mode bits forced on for every geometry
    #[serde(with = "mask_bits")]
    pub override_shader_mode_mask: ShaderModeMask,
    /// Shader-mode bits the target environment supports
    #[serde(with = "mask_bits")]
    pub supported_shader_mode_mask: ShaderModeMask,
    /// Geometry attributes forced on for every geometry
    #[serde(with = "mask_bits")]
    pub override_geometry_attributes: GeometryAttributes,
    /// Geometry attributes the target environment supports
    #[serde(with = "mask_bits")]
    pub supported_geometry_attributes: GeometryAttributes,
    /// Convert billboards to per-instance transforms instead of
    /// shader-side translation
    pub billboard_transform: bool,
    /// Representation of converted geometry
    pub geometry_target: GeometryTarget,
    /// Quad-tree level of the tile being converted
    pub tile_level: u32,
    /// Deepest quad-tree level of the tiled data set
    pub max_tile_level: u32,
    /// Externally supplied cap on tiles expected to page in below the
    /// current tile
    pub num_tiles_below: u32,
}

impl Default for ConvertSettings {
    fn default() -> Self {
        Self {
            extension: "vkb".to_string(),
            override_shader_mode_mask: ShaderModeMask::empty(),
            supported_shader_mode_mask: ShaderModeMask::all(),
            override_geometry_attributes: GeometryAttributes::empty(),
            supported_geometry_attributes: GeometryAttributes::all(),
            billboard_transform: false,
            geometry_target: GeometryTarget::default(),
            tile_level: 0,
            max_tile_level: 0,
            num_tiles_below: 0,
        }
    }
}

impl ConvertSettings {
    /// Parse settings from TOML text; absent fields keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }
}

/// Bitmask fields serialize as their raw bits
mod mask_bits {
    use bitflags::Flags;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<F, S>(mask: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        F: Flags,
        F::Bits: Serialize,
        S: Serializer,
    {
        mask.bits().serialize(serializer)
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> Result<F, D::Error>
    where
        F: Flags,
        F::Bits: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(F::from_bits_truncate(F::Bits::deserialize(deserializer)?))
    }
}

/// Total order over finite ratios, so equal ratios collapse to the last
/// writer
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ratio(f64);

impl Eq for Ratio {}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Derive the minimum screen-height ratio for one level-of-detail range
fn screen_height_ratio(mode: RangeMode, radius: f64, range: (f32, f32)) -> f64 {
    // Reference 60 degree vertical field of view, so a 30 degree half-angle.
    let angle_ratio = 1.0 / 30f64.to_radians();
    match mode {
        RangeMode::DistanceFromEyePoint => radius.atan2(f64::from(range.1)) * angle_ratio,
        RangeMode::PixelSizeOnScreen => f64::from(range.0) * PIXEL_RATIO,
    }
}

/// One conversion session over one source graph
///
/// Create a converter, call [`SceneConverter::convert`] on the root, and
/// drop it; caches and memos do not survive the session.
pub struct SceneConverter<'a> {
    graph: &'a SceneGraph,
    settings: &'a ConvertSettings,
    shader_generator: &'a dyn ShaderGenerator,
    gpu: &'a dyn GpuContext,
    state_stack: Vec<StateSetKey>,
    node_mask: ShaderModeMask,
    node_map: HashMap<NodeKey, Option<Arc<RenderNode>>>,
    pipeline_cache: PipelineCache,
    descriptor_set_cache: DescriptorSetCache,
    filename_map: HashMap<String, PathBuf>,
}

impl<'a> SceneConverter<'a> {
    /// Create a converter for one session
    pub fn new(
        graph: &'a SceneGraph,
        settings: &'a ConvertSettings,
        shader_generator: &'a dyn ShaderGenerator,
        gpu: &'a dyn GpuContext,
    ) -> Self {
        Self {
            graph,
            settings,
            shader_generator,
            gpu,
            state_stack: Vec::new(),
            node_mask: ShaderModeMask::empty(),
            node_map: HashMap::new(),
            pipeline_cache: PipelineCache::new(),
            descriptor_set_cache: DescriptorSetCache::new(),
            filename_map: HashMap::new(),
        }
    }

    /// Convert a node, memoized on node identity
    ///
    /// A node referenced by several parents converts once; later requests
    /// return the shared result, including the "produced nothing" case.
    pub fn convert(&mut self, key: NodeKey) -> Option<Arc<RenderNode>> {
        if let Some(memo) = self.node_map.get(&key) {
            return memo.clone();
        }

        let graph = self.graph;
        let result = match graph.node(key) {
            Some(node) => {
                let state_set = node.state_set;
                match &node.kind {
                    NodeKind::Geometry(geometry) => {
                        self.convert_geometry(state_set, geometry, None)
                    }
                    NodeKind::Group(group) => self.convert_group(state_set, group, None),
                    NodeKind::CoordinateSystem(group) => {
                        self.convert_group(state_set, group, Some("CoordinateSystemNode"))
                    }
                    NodeKind::Transform(transform) => {
                        self.convert_transform(state_set, transform)
                    }
                    NodeKind::Billboard(billboard) => {
                        self.convert_billboard(state_set, billboard)
                    }
                    NodeKind::Lod(lod) => self.convert_lod(key, lod),
                    NodeKind::PagedLod(plod) => self.convert_paged_lod(key, plod),
                    NodeKind::TerrainTile(group) => self.convert_terrain_tile(group),
                }
            }
            None => None,
        };

        self.node_map.insert(key, result.clone());
        result
    }

    /// Remap an external-reference filename, memoized per session
    pub fn map_file_name(&mut self, filename: &str) -> PathBuf {
        if let Some(mapped) = self.filename_map.get(filename) {
            return mapped.clone();
        }
        let mapped = Path::new(filename).with_extension(&self.settings.extension);
        self.filename_map
            .insert(filename.to_string(), mapped.clone());
        mapped
    }

    fn push_state(&mut self, state_set: Option<StateSetKey>) -> bool {
        match state_set {
            Some(key) => {
                self.state_stack.push(key);
                true
            }
            None => false,
        }
    }

    fn pop_state(&mut self, pushed: bool) {
        if pushed {
            self.state_stack.pop();
        }
    }

    /// The state sets currently in effect: nearest enclosing plus local
    /// override, both optional
    fn state_pair(&self) -> (Option<StateSetKey>, Option<StateSetKey>) {
        let len = self.state_stack.len();
        let local = self.state_stack.last().copied();
        let enclosing = (len >= 2).then(|| self.state_stack[len - 2]);
        (enclosing, local)
    }

    /// Combined shader-mode mask of the state pair in effect
    fn calculate_shader_mode_mask(&self) -> ShaderModeMask {
        if self.state_stack.is_empty() {
            return ShaderModeMask::empty();
        }
        let (enclosing, local) = self.state_pair();
        let mask_of = |key: Option<StateSetKey>| {
            key.and_then(|k| self.graph.state_set(k))
                .map(calculate_state_set_mask)
                .unwrap_or_else(ShaderModeMask::empty)
        };
        mask_of(enclosing) | mask_of(local)
    }

    fn convert_geometry(
        &mut self,
        state_set: Option<StateSetKey>,
        geometry: &scene::Geometry,
        translations: Option<&SourceArray>,
    ) -> Option<Arc<RenderNode>> {
        let pushed = self.push_state(state_set);
        let result = self.convert_geometry_inner(geometry, translations);
        self.pop_state(pushed);
        result
    }

    fn convert_geometry_inner(
        &mut self,
        geometry: &scene::Geometry,
        translations: Option<&SourceArray>,
    ) -> Option<Arc<RenderNode>> {
        let graph = self.graph;
        let settings = self.settings;

        let mut attributes = calculate_attributes_mask(geometry);
        if translations.is_some() {
            attributes |= GeometryAttributes::TRANSLATE;
        }
        let attributes = (attributes | settings.override_geometry_attributes)
            & settings.supported_geometry_attributes;
        let modes = (self.calculate_shader_mode_mask()
            | settings.override_shader_mode_mask
            | self.node_mask)
            & settings.supported_shader_mode_mask;

        let mut state_commands = Vec::new();
        if let Some(bind) = self.pipeline_cache.get_or_create(
            modes,
            attributes,
            self.shader_generator,
            self.gpu,
        ) {
            state_commands.push(StateCommand::BindGraphicsPipeline(bind));
        }

        let payload = geometry::convert_geometry_payload(
            geometry,
            attributes,
            translations,
            settings.geometry_target,
        )?;

        if !self.state_stack.is_empty() {
            let (_, local) = self.state_pair();
            if let Some(key) = local {
                if let Some(state_set) = graph.state_set(key) {
                    if let Some(bind) = self.descriptor_set_cache.get_or_create(
                        modes,
                        attributes,
                        key,
                        state_set,
                        &mut self.pipeline_cache,
                        self.shader_generator,
                        self.gpu,
                    ) {
                        state_commands.push(StateCommand::BindDescriptorSet(bind));
                    }
                }
            }
        }

        Some(Arc::new(RenderNode::StateGroup(StateGroup {
            state_commands,
            children: vec![Arc::new(payload)],
        })))
    }

    fn convert_group(
        &mut self,
        state_set: Option<StateSetKey>,
        group: &scene::Group,
        class: Option<&'static str>,
    ) -> Option<Arc<RenderNode>> {
        let pushed = self.push_state(state_set);
        let mut children = Vec::new();
        for &child in &group.children {
            if let Some(converted) = self.convert(child) {
                children.push(converted);
            }
        }
        self.pop_state(pushed);

        Some(Arc::new(RenderNode::Group(render::Group {
            children,
            class,
        })))
    }

    fn convert_transform(
        &mut self,
        state_set: Option<StateSetKey>,
        transform: &scene::Transform,
    ) -> Option<Arc<RenderNode>> {
        let pushed = self.push_state(state_set);
        let matrix = swap_matrix_convention(&transform.matrix);
        let mut children = Vec::new();
        for &child in &transform.children {
            if let Some(converted) = self.convert(child) {
                children.push(converted);
            }
        }
        self.pop_state(pushed);

        // Scan the converted subtree, not the source: only what actually
        // survived conversion decides whether culling needs a local-space
        // frustum here.
        let subgraph_requires_local_frustum =
            children.iter().any(|child| child.contains_cull_nodes());

        Some(Arc::new(RenderNode::Transform(MatrixTransform {
            matrix,
            children,
            subgraph_requires_local_frustum,
        })))
    }

    fn convert_billboard(
        &mut self,
        state_set: Option<StateSetKey>,
        billboard: &scene::Billboard,
    ) -> Option<Arc<RenderNode>> {
        let graph = self.graph;
        let pushed = self.push_state(state_set);
        self.node_mask = if self.settings.billboard_transform {
            ShaderModeMask::BILLBOARD
        } else {
            ShaderModeMask::BILLBOARD | ShaderModeMask::SHADER_TRANSLATE
        };

        let mut children: Vec<Arc<RenderNode>> = Vec::new();

        if self.node_mask.contains(ShaderModeMask::SHADER_TRANSLATE) {
            // Merge drawables sharing a geometry: all their positions
            // become one per-instance translation array.
            let mut instanced: Vec<(NodeKey, Vec<Vec3>)> = Vec::new();
            for instance in &billboard.drawables {
                match instanced
                    .iter_mut()
                    .find(|(key, _)| *key == instance.geometry)
                {
                    Some((_, positions)) => positions.push(instance.position),
                    None => instanced.push((instance.geometry, vec![instance.position])),
                }
            }

            for (key, positions) in instanced {
                let Some(node) = graph.node(key) else {
                    continue;
                };
                let NodeKind::Geometry(geometry) = &node.kind else {
                    continue;
                };
                let translations = SourceArray::from_points(&positions);
                // Converted directly rather than through the memo: with
                // injected positions the result is specific to this
                // billboard.
                if let Some(child) =
                    self.convert_geometry(node.state_set, geometry, Some(&translations))
                {
                    children.push(child);
                }
            }
        } else {
            for instance in &billboard.drawables {
                let matrix = DMat4::new_translation(&instance.position.cast::<f64>());
                if let Some(child) = self.convert(instance.geometry) {
                    children.push(Arc::new(RenderNode::Transform(MatrixTransform {
                        matrix,
                        children: vec![child],
                        subgraph_requires_local_frustum: false,
                    })));
                }
            }
        }

        let result = match children.len() {
            // Nine surviving children discard the whole billboard; see
            // DESIGN.md.
            9 => None,
            1 => children.pop(),
            _ => Some(Arc::new(RenderNode::Group(render::Group {
                children,
                class: None,
            }))),
        };

        self.node_mask = ShaderModeMask::empty();
        self.pop_state(pushed);
        result
    }

    fn convert_lod(&mut self, key: NodeKey, lod: &scene::Lod) -> Option<Arc<RenderNode>> {
        let bound = self.graph.bound(key);
        let num_children = lod.children.len().min(lod.ranges.len());

        // Keyed by ratio so equal ratios collapse, last writer wins.
        let mut ratio_children: BTreeMap<Ratio, Arc<RenderNode>> = BTreeMap::new();
        for i in 0..num_children {
            if let Some(child) = self.convert(lod.children[i]) {
                let ratio = screen_height_ratio(lod.range_mode, bound.radius, lod.ranges[i]);
                ratio_children.insert(Ratio(ratio), child);
            }
        }

        // Emit highest ratio (highest detail) first.
        let children = ratio_children
            .into_iter()
            .rev()
            .map(|(Ratio(ratio), node)| LodChild {
                minimum_screen_height_ratio: ratio,
                node,
            })
            .collect();

        Some(Arc::new(RenderNode::Lod(render::Lod { bound, children })))
    }

    fn convert_paged_lod(
        &mut self,
        key: NodeKey,
        plod: &scene::PagedLod,
    ) -> Option<Arc<RenderNode>> {
        if plod.ranges.is_empty() {
            log::debug!("paged node with no declared ranges produces nothing");
            return None;
        }

        let bound = self.graph.bound(key);

        struct Entry {
            ratio: f64,
            filename: Option<PathBuf>,
            node: Option<Arc<RenderNode>>,
        }

        let mut entries = Vec::with_capacity(plod.ranges.len());
        for (i, &range) in plod.ranges.iter().enumerate() {
            let node = plod.children.get(i).and_then(|&child| self.convert(child));
            let ratio = screen_height_ratio(plod.range_mode, bound.radius, range);
            let filename = plod
                .file_names
                .get(i)
                .filter(|name| !name.is_empty())
                .map(|name| self.map_file_name(name));
            entries.push(Entry {
                ratio,
                filename,
                node,
            });
        }
        entries.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));

        let mut node = render::PagedLod {
            bound,
            filename: None,
            children: [None, None],
            max_slot: 0,
            num_descriptor_sets: 0,
            descriptor_pool_sizes: Vec::new(),
        };

        if let [first, second] = &mut entries[..] {
            node.filename = first.filename.take();
            node.children = [
                Some(PagedLodChild {
                    minimum_screen_height_ratio: first.ratio,
                    node: first.node.take(),
                }),
                Some(PagedLodChild {
                    minimum_screen_height_ratio: second.ratio,
                    node: second.node.take(),
                }),
            ];
        }

        // Size descriptor pools for the tiles expected to page in below
        // this one: a quad-tree expansion over the remaining levels,
        // capped by the externally supplied bound.
        let settings = self.settings;
        let mut max_tiles_below: u32 = 0;
        for level in settings.tile_level..settings.max_tile_level {
            max_tiles_below += 4u32.pow(level - settings.tile_level);
        }
        let tile_multiplier = max_tiles_below.min(settings.num_tiles_below) + 1;

        let mut stats = DescriptorStats::default();
        for slot in node.children.iter().flatten() {
            if let Some(child) = &slot.node {
                stats.add_node(child);
            }
        }
        node.max_slot = stats.max_slot();
        node.num_descriptor_sets = stats.num_descriptor_sets() * tile_multiplier;
        node.descriptor_pool_sizes = stats.pool_sizes();
        for pool_size in &mut node.descriptor_pool_sizes {
            pool_size.descriptor_count *= tile_multiplier;
        }

        Some(Arc::new(RenderNode::PagedLod(node)))
    }

    fn convert_terrain_tile(&mut self, group: &scene::Group) -> Option<Arc<RenderNode>> {
        // The tile contributes no node of its own; traversal falls through
        // to the children and the last conversion result stands.
        let mut result = None;
        for &child in &group.children {
            result = self.convert(child);
        }
        result
    }
}

/// Convert one source root into a Vulkan-ready graph
///
/// Creates a fresh session around `settings` and the two collaborator
/// capabilities, converts, and returns the produced root. `None` means the
/// root converted to nothing, which is a valid outcome rather than an
/// error.
pub fn convert_scene(
    graph: &SceneGraph,
    root: NodeKey,
    settings: &ConvertSettings,
    shader_generator: &dyn ShaderGenerator,
    gpu: &dyn GpuContext,
) -> Option<Arc<RenderNode>> {
    log::debug!("converting scene graph with {} nodes", graph.node_count());
    SceneConverter::new(graph, settings, shader_generator, gpu).convert(root)
}
