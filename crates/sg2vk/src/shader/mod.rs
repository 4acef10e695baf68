//! Render-state fingerprints and shader source generation
//!
//! Conversion keys every expensive GPU object off two bitmask
//! fingerprints: a shader-mode mask derived from the render state in
//! effect, and a geometry-attribute mask derived from what a geometry leaf
//! actually provides. The same masks parameterize shader source
//! generation, so state that fingerprints equal compiles equal.

use bitflags::bitflags;

use crate::scene::{ArrayBinding, Geometry, StateSet, TextureUnit};

bitflags! {
    /// Bitmask fingerprint of enabled render-state categories
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderModeMask: u32 {
        /// Lighting enabled
        const LIGHTING = 1;
        /// Material colors present
        const MATERIAL = 2;
        /// Alpha blending enabled
        const BLEND = 4;
        /// Billboard shader variant
        const BILLBOARD = 8;
        /// Diffuse map bound
        const DIFFUSE_MAP = 16;
        /// Opacity map bound
        const OPACITY_MAP = 32;
        /// Ambient map bound
        const AMBIENT_MAP = 64;
        /// Normal map bound
        const NORMAL_MAP = 128;
        /// Specular map bound
        const SPECULAR_MAP = 256;
        /// Per-instance translation applied in the vertex shader
        const SHADER_TRANSLATE = 512;
    }
}

bitflags! {
    /// Bitmask fingerprint of the vertex attributes a geometry provides
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GeometryAttributes: u32 {
        /// Vertex positions
        const VERTEX = 1;
        /// Per-vertex normals
        const NORMAL = 2;
        /// A single overall normal
        const NORMAL_OVERALL = 4;
        /// Per-vertex colors
        const COLOR = 8;
        /// A single overall color
        const COLOR_OVERALL = 16;
        /// Texture coordinates
        const TEXCOORD = 32;
        /// Per-instance translations
        const TRANSLATE = 64;
    }
}

impl GeometryAttributes {
    /// The attribute set ordinary meshes provide
    pub const STANDARD: Self = Self::VERTEX
        .union(Self::NORMAL)
        .union(Self::COLOR)
        .union(Self::TEXCOORD);
}

/// Attribute locations the generated shaders bind to
pub struct AttributeLocation;

impl AttributeLocation {
    /// Vertex position
    pub const VERTEX: u32 = 0;
    /// Normal
    pub const NORMAL: u32 = 1;
    /// Color
    pub const COLOR: u32 = 2;
    /// Texture coordinate
    pub const TEXCOORD: u32 = 3;
    /// Per-instance translation
    pub const TRANSLATE: u32 = 7;
}

/// Derive the shader-mode mask of a single state set
///
/// Pure function of the state-set content: lighting and blending switches,
/// material presence, and which texture units carry image data.
pub fn calculate_state_set_mask(state_set: &StateSet) -> ShaderModeMask {
    let mut mask = ShaderModeMask::empty();

    if state_set.lighting == Some(true) {
        mask |= ShaderModeMask::LIGHTING;
    }
    if state_set.material.is_some() {
        mask |= ShaderModeMask::MATERIAL;
    }
    if state_set.blending {
        mask |= ShaderModeMask::BLEND;
    }

    let map_units = [
        (TextureUnit::DIFFUSE, ShaderModeMask::DIFFUSE_MAP),
        (TextureUnit::OPACITY, ShaderModeMask::OPACITY_MAP),
        (TextureUnit::AMBIENT, ShaderModeMask::AMBIENT_MAP),
        (TextureUnit::NORMAL, ShaderModeMask::NORMAL_MAP),
        (TextureUnit::SPECULAR, ShaderModeMask::SPECULAR_MAP),
    ];
    for (unit, bit) in map_units {
        if state_set
            .texture(unit)
            .is_some_and(|texture| texture.image.is_some())
        {
            mask |= bit;
        }
    }

    mask
}

/// Derive the attribute mask of a geometry leaf
pub fn calculate_attributes_mask(geometry: &Geometry) -> GeometryAttributes {
    let mut mask = GeometryAttributes::empty();

    if geometry.vertices.is_some() {
        mask |= GeometryAttributes::VERTEX;
    }
    if geometry.normals.is_some() {
        mask |= match geometry.normal_binding {
            ArrayBinding::PerVertex => GeometryAttributes::NORMAL,
            ArrayBinding::Overall => GeometryAttributes::NORMAL_OVERALL,
        };
    }
    if geometry.colors.is_some() {
        mask |= match geometry.color_binding {
            ArrayBinding::PerVertex => GeometryAttributes::COLOR,
            ArrayBinding::Overall => GeometryAttributes::COLOR_OVERALL,
        };
    }
    if geometry.tex_coords.is_some() {
        mask |= GeometryAttributes::TEXCOORD;
    }
    if geometry.translations.is_some() {
        mask |= GeometryAttributes::TRANSLATE;
    }

    mask
}

/// Shader source generation, parameterized by the two mask fingerprints
///
/// The converter treats this as an external capability: a `None` from
/// either method makes pipeline construction fail softly for that mask
/// pair, and the affected subgraph is emitted without a pipeline binding.
pub trait ShaderGenerator {
    /// Generate vertex shader source for the given masks
    fn vertex_source(&self, modes: ShaderModeMask, attributes: GeometryAttributes)
        -> Option<String>;

    /// Generate fragment shader source for the given masks
    fn fragment_source(
        &self,
        modes: ShaderModeMask,
        attributes: GeometryAttributes,
    ) -> Option<String>;
}

/// Built-in GLSL generator
///
/// Emits a `#define` per mask bit followed by a fixed template, so the
/// same template specializes to every supported state combination.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlslShaderGenerator;

impl GlslShaderGenerator {
    fn defines(modes: ShaderModeMask, attributes: GeometryAttributes) -> String {
        let mode_names = [
            (ShaderModeMask::LIGHTING, "LIGHTING"),
            (ShaderModeMask::MATERIAL, "MATERIAL"),
            (ShaderModeMask::BLEND, "BLEND"),
            (ShaderModeMask::BILLBOARD, "BILLBOARD"),
            (ShaderModeMask::DIFFUSE_MAP, "DIFFUSE_MAP"),
            (ShaderModeMask::OPACITY_MAP, "OPACITY_MAP"),
            (ShaderModeMask::AMBIENT_MAP, "AMBIENT_MAP"),
            (ShaderModeMask::NORMAL_MAP, "NORMAL_MAP"),
            (ShaderModeMask::SPECULAR_MAP, "SPECULAR_MAP"),
            (ShaderModeMask::SHADER_TRANSLATE, "SHADER_TRANSLATE"),
        ];
        let attribute_names = [
            (GeometryAttributes::NORMAL, "HAS_NORMAL"),
            (GeometryAttributes::NORMAL_OVERALL, "HAS_NORMAL_OVERALL"),
            (GeometryAttributes::COLOR, "HAS_COLOR"),
            (GeometryAttributes::COLOR_OVERALL, "HAS_COLOR_OVERALL"),
            (GeometryAttributes::TEXCOORD, "HAS_TEXCOORD"),
            (GeometryAttributes::TRANSLATE, "HAS_TRANSLATE"),
        ];

        let mut out = String::new();
        for (bit, name) in mode_names {
            if modes.contains(bit) {
                out.push_str("#define ");
                out.push_str(name);
                out.push('\n');
            }
        }
        for (bit, name) in attribute_names {
            if attributes.contains(bit) {
                out.push_str("#define ");
                out.push_str(name);
                out.push('\n');
            }
        }
        out
    }
}

impl ShaderGenerator for GlslShaderGenerator {
    fn vertex_source(
        &self,
        modes: ShaderModeMask,
        attributes: GeometryAttributes,
    ) -> Option<String> {
        if !attributes.contains(GeometryAttributes::VERTEX) {
            return None;
        }

        let mut source = String::from("#version 450\n");
        source.push_str(&Self::defines(modes, attributes));
        source.push_str(concat!(
            "layout(push_constant) uniform PushConstants {\n",
            "    mat4 projection;\n",
            "    mat4 modelview;\n",
            "} pc;\n",
            "layout(location = 0) in vec3 in_position;\n",
            "#ifdef HAS_NORMAL\n",
            "layout(location = 1) in vec3 in_normal;\n",
            "#endif\n",
            "#ifdef HAS_COLOR\n",
            "layout(location = 2) in vec4 in_color;\n",
            "#endif\n",
            "#ifdef HAS_TEXCOORD\n",
            "layout(location = 3) in vec2 in_texcoord;\n",
            "#endif\n",
            "#ifdef HAS_TRANSLATE\n",
            "layout(location = 7) in vec3 in_translate;\n",
            "#endif\n",
            "layout(location = 0) out vec3 frag_normal;\n",
            "layout(location = 1) out vec4 frag_color;\n",
            "layout(location = 2) out vec2 frag_texcoord;\n",
            "layout(location = 3) out vec3 frag_eye;\n",
            "void main() {\n",
            "    vec3 position = in_position;\n",
            "#ifdef SHADER_TRANSLATE\n",
            "#ifdef HAS_TRANSLATE\n",
            "    position += in_translate;\n",
            "#endif\n",
            "#endif\n",
            "    vec4 eye = pc.modelview * vec4(position, 1.0);\n",
            "#ifdef BILLBOARD\n",
            "    eye.xy += in_position.xy - position.xy;\n",
            "#endif\n",
            "#ifdef HAS_NORMAL\n",
            "    frag_normal = mat3(pc.modelview) * in_normal;\n",
            "#else\n",
            "    frag_normal = vec3(0.0, 0.0, 1.0);\n",
            "#endif\n",
            "#ifdef HAS_COLOR\n",
            "    frag_color = in_color;\n",
            "#else\n",
            "    frag_color = vec4(1.0);\n",
            "#endif\n",
            "#ifdef HAS_TEXCOORD\n",
            "    frag_texcoord = in_texcoord;\n",
            "#else\n",
            "    frag_texcoord = vec2(0.0);\n",
            "#endif\n",
            "    frag_eye = eye.xyz;\n",
            "    gl_Position = pc.projection * eye;\n",
            "}\n",
        ));
        Some(source)
    }

    fn fragment_source(
        &self,
        modes: ShaderModeMask,
        attributes: GeometryAttributes,
    ) -> Option<String> {
        let mut source = String::from("#version 450\n");
        source.push_str(&Self::defines(modes, attributes));
        source.push_str(concat!(
            "layout(location = 0) in vec3 frag_normal;\n",
            "layout(location = 1) in vec4 frag_color;\n",
            "layout(location = 2) in vec2 frag_texcoord;\n",
            "layout(location = 3) in vec3 frag_eye;\n",
            "layout(location = 0) out vec4 out_color;\n",
            "#ifdef DIFFUSE_MAP\n",
            "layout(set = 0, binding = 0) uniform sampler2D diffuse_map;\n",
            "#endif\n",
            "#ifdef OPACITY_MAP\n",
            "layout(set = 0, binding = 1) uniform sampler2D opacity_map;\n",
            "#endif\n",
            "#ifdef AMBIENT_MAP\n",
            "layout(set = 0, binding = 4) uniform sampler2D ambient_map;\n",
            "#endif\n",
            "#ifdef NORMAL_MAP\n",
            "layout(set = 0, binding = 5) uniform sampler2D normal_map;\n",
            "#endif\n",
            "#ifdef SPECULAR_MAP\n",
            "layout(set = 0, binding = 6) uniform sampler2D specular_map;\n",
            "#endif\n",
            "#ifdef MATERIAL\n",
            "layout(set = 0, binding = 10) uniform MaterialData {\n",
            "    vec4 ambient;\n",
            "    vec4 diffuse;\n",
            "    vec4 specular;\n",
            "    vec4 emissive;\n",
            "    float shininess;\n",
            "} material;\n",
            "#endif\n",
            "void main() {\n",
            "    vec4 color = frag_color;\n",
            "#ifdef DIFFUSE_MAP\n",
            "    color *= texture(diffuse_map, frag_texcoord);\n",
            "#endif\n",
            "#ifdef MATERIAL\n",
            "    color *= material.diffuse;\n",
            "#endif\n",
            "#ifdef LIGHTING\n",
            "    vec3 normal = normalize(frag_normal);\n",
            "#ifdef NORMAL_MAP\n",
            "    normal = normalize(normal + texture(normal_map, frag_texcoord).xyz * 2.0 - 1.0);\n",
            "#endif\n",
            "    float diffuse = max(dot(normal, normalize(-frag_eye)), 0.0);\n",
            "    color.rgb *= 0.2 + 0.8 * diffuse;\n",
            "#endif\n",
            "#ifdef AMBIENT_MAP\n",
            "    color.rgb *= texture(ambient_map, frag_texcoord).rgb;\n",
            "#endif\n",
            "#ifdef OPACITY_MAP\n",
            "    color.a *= texture(opacity_map, frag_texcoord).r;\n",
            "#endif\n",
            "    out_color = color;\n",
            "}\n",
        ));
        Some(source)
    }
}
