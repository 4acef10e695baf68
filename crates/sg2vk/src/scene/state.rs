//! Render state attached to source nodes
//!
//! A [`StateSet`] captures the fixed-function state the classic library
//! hangs off nodes: lighting and blending switches, an optional material,
//! and textures keyed by texture unit. The converter fingerprints this
//! state into shader-mode masks and maps it into descriptor sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;

use crate::foundation::math::Vec4;

/// Texture unit assignments, following the fbx loader convention the
/// shaders are written against
pub struct TextureUnit;

impl TextureUnit {
    /// Diffuse color map
    pub const DIFFUSE: u32 = 0;
    /// Opacity map
    pub const OPACITY: u32 = 1;
    /// Reflection map
    pub const REFLECTION: u32 = 2;
    /// Emissive map
    pub const EMISSIVE: u32 = 3;
    /// Ambient occlusion map
    pub const AMBIENT: u32 = 4;
    /// Tangent-space normal map
    pub const NORMAL: u32 = 5;
    /// Specular map
    pub const SPECULAR: u32 = 6;
    /// Shininess map
    pub const SHININESS: u32 = 7;
    /// Uniform-buffer binding used for material data, same value as in the
    /// generated shaders
    pub const MATERIAL_BINDING: u32 = 10;
}

/// In-memory image referenced by a texture attachment
///
/// Pixel data is tightly packed RGBA8. Loading images from disk is the
/// caller's concern; a texture attachment without image data cannot be
/// turned into a descriptor and degrades to an unbound texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// RGBA8 pixel data, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

/// Sampler state for a texture attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSettings {
    /// Magnification filter
    pub mag_filter: vk::Filter,
    /// Minification filter
    pub min_filter: vk::Filter,
    /// Addressing mode applied to all coordinates
    pub address_mode: vk::SamplerAddressMode,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
        }
    }
}

/// A texture bound to one texture unit of a state set
#[derive(Debug, Clone, Default)]
pub struct TextureAttachment {
    /// Image data; absent when the image failed to load upstream
    pub image: Option<Arc<ImageData>>,
    /// Sampler state
    pub sampler: SamplerSettings,
}

impl TextureAttachment {
    /// Create an attachment around image data with default sampler state
    pub fn new(image: Arc<ImageData>) -> Self {
        Self {
            image: Some(image),
            sampler: SamplerSettings::default(),
        }
    }
}

/// Classic fixed-function material colors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient reflectance
    pub ambient: Vec4,
    /// Diffuse reflectance
    pub diffuse: Vec4,
    /// Specular reflectance
    pub specular: Vec4,
    /// Emissive color
    pub emissive: Vec4,
    /// Specular exponent
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
        }
    }
}

/// Fixed-function render state attached to a source node
#[derive(Debug, Clone, Default)]
pub struct StateSet {
    /// Lighting switch; `None` inherits from the enclosing state
    pub lighting: Option<bool>,
    /// Whether alpha blending is enabled
    pub blending: bool,
    /// Optional material
    pub material: Option<Material>,
    textures: BTreeMap<u32, TextureAttachment>,
}

impl StateSet {
    /// Create an empty state set
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a texture at the given unit, replacing any previous one
    pub fn set_texture(&mut self, unit: u32, texture: TextureAttachment) {
        self.textures.insert(unit, texture);
    }

    /// Get the texture attached at the given unit
    pub fn texture(&self, unit: u32) -> Option<&TextureAttachment> {
        self.textures.get(&unit)
    }

    /// Iterate attached textures in unit order
    pub fn textures(&self) -> impl Iterator<Item = (u32, &TextureAttachment)> {
        self.textures.iter().map(|(unit, texture)| (*unit, texture))
    }
}
