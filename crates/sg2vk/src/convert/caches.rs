//! Session-scoped GPU resource caches
//!
//! Pipelines are keyed by the (shader-mode, geometry-attribute) mask pair;
//! descriptor sets additionally key on the source state set's identity.
//! Identity, not content: two state sets with equal fields but distinct
//! arena keys get distinct descriptor sets. Construction failures are
//! non-fatal and are not cached, so a later request may retry.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use crate::render::{
    descriptor_set_layout_for, vertex_input_for, BindDescriptorSet, BindGraphicsPipeline,
    Descriptor, DescriptorSet, GpuContext, GraphicsPipeline, PipelineLayout, ShaderModule,
    PUSH_CONSTANT_SIZE,
};
use crate::scene::{StateSet, StateSetKey, TextureUnit};
use crate::shader::{GeometryAttributes, ShaderGenerator, ShaderModeMask};

/// Memoizes graphics pipelines per mask pair within one session
#[derive(Default)]
pub struct PipelineCache {
    pipelines: HashMap<(ShaderModeMask, GeometryAttributes), Arc<BindGraphicsPipeline>>,
}

impl PipelineCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached pipelines
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Get the pipeline binding for a mask pair, constructing it on first
    /// use
    ///
    /// Returns `None` when shader generation or compilation fails; the
    /// caller proceeds without a pipeline binding.
    pub fn get_or_create(
        &mut self,
        modes: ShaderModeMask,
        attributes: GeometryAttributes,
        generator: &dyn ShaderGenerator,
        gpu: &dyn GpuContext,
    ) -> Option<Arc<BindGraphicsPipeline>> {
        if let Some(bind) = self.pipelines.get(&(modes, attributes)) {
            return Some(Arc::clone(bind));
        }

        let bind = Self::create(modes, attributes, generator, gpu)?;
        self.pipelines.insert((modes, attributes), Arc::clone(&bind));
        Some(bind)
    }

    fn create(
        modes: ShaderModeMask,
        attributes: GeometryAttributes,
        generator: &dyn ShaderGenerator,
        gpu: &dyn GpuContext,
    ) -> Option<Arc<BindGraphicsPipeline>> {
        let vertex_source = generator.vertex_source(modes, attributes)?;
        let fragment_source = generator.fragment_source(modes, attributes)?;

        let vertex = Self::compile(gpu, vk::ShaderStageFlags::VERTEX, &vertex_source)?;
        let fragment = Self::compile(gpu, vk::ShaderStageFlags::FRAGMENT, &fragment_source)?;

        let layout = Arc::new(PipelineLayout {
            descriptor_set_layouts: descriptor_set_layout_for(modes).into_iter().collect(),
            push_constant_size: PUSH_CONSTANT_SIZE,
        });

        let (vertex_bindings, vertex_attributes) = vertex_input_for(attributes);
        let blending = modes.contains(ShaderModeMask::BLEND);

        let pipeline = Arc::new(GraphicsPipeline {
            shader_stages: vec![vertex, fragment],
            vertex_bindings,
            vertex_attributes,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            blending,
            // Blended geometry leaves the depth buffer untouched.
            depth_write: !blending,
            layout,
        });

        Some(Arc::new(BindGraphicsPipeline { pipeline }))
    }

    fn compile(
        gpu: &dyn GpuContext,
        stage: vk::ShaderStageFlags,
        source: &str,
    ) -> Option<Arc<ShaderModule>> {
        match gpu.compile_shader(stage, source) {
            Ok(module) => Some(module),
            Err(err) => {
                log::warn!("shader stage {stage:?} failed to compile: {err}");
                None
            }
        }
    }
}

/// Memoizes descriptor-set bindings per (mask pair, state-set identity)
/// within one session
#[derive(Default)]
pub struct DescriptorSetCache {
    sets: HashMap<(ShaderModeMask, GeometryAttributes, StateSetKey), Arc<BindDescriptorSet>>,
}

impl DescriptorSetCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached descriptor-set bindings
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Get the descriptor-set binding for a key, constructing it on first
    /// use
    ///
    /// Resolves the pipeline for the mask pair first; without a pipeline,
    /// a descriptor layout, or the image data a sampler binding needs,
    /// returns `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create(
        &mut self,
        modes: ShaderModeMask,
        attributes: GeometryAttributes,
        state_set_key: StateSetKey,
        state_set: &StateSet,
        pipelines: &mut PipelineCache,
        generator: &dyn ShaderGenerator,
        gpu: &dyn GpuContext,
    ) -> Option<Arc<BindDescriptorSet>> {
        let key = (modes, attributes, state_set_key);
        if let Some(bind) = self.sets.get(&key) {
            return Some(Arc::clone(bind));
        }

        let bind_pipeline = pipelines.get_or_create(modes, attributes, generator, gpu)?;
        let layout = Arc::clone(&bind_pipeline.pipeline.layout);
        let set_layout = layout.descriptor_set_layouts.first()?;

        let mut descriptors = Vec::with_capacity(set_layout.bindings.len());
        for binding in &set_layout.bindings {
            match binding.descriptor_type {
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER => {
                    let Some(texture) = state_set.texture(binding.binding) else {
                        log::debug!("no texture at unit {}", binding.binding);
                        return None;
                    };
                    let Some(image) = texture.image.as_ref() else {
                        log::debug!("texture at unit {} has no image data", binding.binding);
                        return None;
                    };
                    descriptors.push(Descriptor::CombinedImageSampler {
                        binding: binding.binding,
                        image: Arc::clone(image),
                        sampler: texture.sampler,
                    });
                }
                vk::DescriptorType::UNIFORM_BUFFER => {
                    debug_assert_eq!(binding.binding, TextureUnit::MATERIAL_BINDING);
                    descriptors.push(Descriptor::MaterialUniform {
                        binding: binding.binding,
                        material: state_set.material.unwrap_or_default(),
                    });
                }
                other => {
                    log::debug!("descriptor type {other:?} not mappable from state set");
                    return None;
                }
            }
        }

        let bind = Arc::new(BindDescriptorSet {
            layout,
            set_index: 0,
            descriptor_set: Arc::new(DescriptorSet { descriptors }),
        });
        self.sets.insert(key, Arc::clone(&bind));

        Some(bind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{OfflineGpuContext, ShaderCompileError};
    use crate::scene::{ImageData, Material, SceneGraph, TextureAttachment};
    use crate::shader::GlslShaderGenerator;

    /// Context that refuses every compile, for degradation tests
    struct FailingGpuContext;

    impl GpuContext for FailingGpuContext {
        fn compile_shader(
            &self,
            _stage: vk::ShaderStageFlags,
            _source: &str,
        ) -> Result<Arc<ShaderModule>, ShaderCompileError> {
            Err(ShaderCompileError::Compile("no device".to_string()))
        }
    }

    fn masks() -> (ShaderModeMask, GeometryAttributes) {
        (
            ShaderModeMask::LIGHTING | ShaderModeMask::MATERIAL,
            GeometryAttributes::VERTEX | GeometryAttributes::NORMAL,
        )
    }

    #[test]
    fn test_pipeline_cache_idempotent() {
        let mut cache = PipelineCache::new();
        let generator = GlslShaderGenerator;
        let gpu = OfflineGpuContext;
        let (modes, attributes) = masks();

        let first = cache
            .get_or_create(modes, attributes, &generator, &gpu)
            .unwrap();
        let second = cache
            .get_or_create(modes, attributes, &generator, &gpu)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache
            .get_or_create(modes | ShaderModeMask::BLEND, attributes, &generator, &gpu)
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_pipeline_failure_is_absent_and_uncached() {
        let mut cache = PipelineCache::new();
        let generator = GlslShaderGenerator;
        let (modes, attributes) = masks();

        assert!(cache
            .get_or_create(modes, attributes, &generator, &FailingGpuContext)
            .is_none());
        assert!(cache.is_empty());

        // A later request against a working context succeeds.
        assert!(cache
            .get_or_create(modes, attributes, &generator, &OfflineGpuContext)
            .is_some());
    }

    #[test]
    fn test_descriptor_cache_keys_on_identity() {
        let mut graph = SceneGraph::new();
        let mut state = StateSet::new();
        state.material = Some(Material::default());

        // Identical content, distinct identities.
        let key_a = graph.add_state_set(state.clone());
        let key_b = graph.add_state_set(state);

        let mut pipelines = PipelineCache::new();
        let mut cache = DescriptorSetCache::new();
        let generator = GlslShaderGenerator;
        let gpu = OfflineGpuContext;
        let modes = ShaderModeMask::MATERIAL;
        let attributes = GeometryAttributes::VERTEX;

        let bind_a = cache
            .get_or_create(
                modes,
                attributes,
                key_a,
                graph.state_set(key_a).unwrap(),
                &mut pipelines,
                &generator,
                &gpu,
            )
            .unwrap();
        let bind_a_again = cache
            .get_or_create(
                modes,
                attributes,
                key_a,
                graph.state_set(key_a).unwrap(),
                &mut pipelines,
                &generator,
                &gpu,
            )
            .unwrap();
        let bind_b = cache
            .get_or_create(
                modes,
                attributes,
                key_b,
                graph.state_set(key_b).unwrap(),
                &mut pipelines,
                &generator,
                &gpu,
            )
            .unwrap();

        assert!(Arc::ptr_eq(&bind_a, &bind_a_again));
        assert!(!Arc::ptr_eq(&bind_a, &bind_b));
        assert_eq!(cache.len(), 2);
        // Both bindings share the one cached pipeline layout.
        assert_eq!(pipelines.len(), 1);
        assert!(Arc::ptr_eq(&bind_a.layout, &bind_b.layout));
    }

    #[test]
    fn test_descriptor_cache_requires_image_data() {
        let mut graph = SceneGraph::new();
        let mut with_image = StateSet::new();
        with_image.set_texture(
            TextureUnit::DIFFUSE,
            TextureAttachment::new(Arc::new(ImageData {
                width: 2,
                height: 2,
                pixels: vec![128; 16],
            })),
        );
        let key = graph.add_state_set(with_image);

        let mut pipelines = PipelineCache::new();
        let mut cache = DescriptorSetCache::new();
        let generator = GlslShaderGenerator;
        let gpu = OfflineGpuContext;
        let attributes = GeometryAttributes::VERTEX | GeometryAttributes::TEXCOORD;

        // Mask demands a diffuse map the state set can satisfy.
        let ok = cache.get_or_create(
            ShaderModeMask::DIFFUSE_MAP,
            attributes,
            key,
            graph.state_set(key).unwrap(),
            &mut pipelines,
            &generator,
            &gpu,
        );
        assert!(ok.is_some());

        // A mask demanding a map the state set lacks degrades to absent.
        let missing = cache.get_or_create(
            ShaderModeMask::DIFFUSE_MAP | ShaderModeMask::NORMAL_MAP,
            attributes,
            key,
            graph.state_set(key).unwrap(),
            &mut pipelines,
            &generator,
            &gpu,
        );
        assert!(missing.is_none());
    }

    #[test]
    fn test_descriptor_cache_requires_layout() {
        let mut graph = SceneGraph::new();
        let key = graph.add_state_set(StateSet::new());

        let mut pipelines = PipelineCache::new();
        let mut cache = DescriptorSetCache::new();

        // BLEND produces a pipeline but implies no descriptors.
        let result = cache.get_or_create(
            ShaderModeMask::BLEND,
            GeometryAttributes::VERTEX,
            key,
            graph.state_set(key).unwrap(),
            &mut pipelines,
            &GlslShaderGenerator,
            &OfflineGpuContext,
        );
        assert!(result.is_none());
        assert_eq!(pipelines.len(), 1);
    }
}
