//! What a shape looks like: which shader pipeline draws it, its textures
//! and every material parameter the shaders read.

use super::texture_manager::{Fallback, TextureProvider};
use crate::nif::shader::{AlphaProperty, LightingShaderType, ShaderProperty};
use crate::nif::TEXTURE_SLOTS;
use std::rc::Rc;

/// The material shader variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Pipeline {
    SkDefault,
    /// Model-space normal maps
    SkMsn,
    SkMultilayer,
    SkEffectShader,
    SkPbr,
    Fo4Default,
    Fo4EffectShader,
}

impl Pipeline {
    pub const ALL: [Pipeline; 7] = [
        Pipeline::SkDefault,
        Pipeline::SkMsn,
        Pipeline::SkMultilayer,
        Pipeline::SkEffectShader,
        Pipeline::SkPbr,
        Pipeline::Fo4Default,
        Pipeline::Fo4EffectShader,
    ];

    /// Vertex and fragment shader file names.
    pub fn sources(self) -> (&'static str, &'static str) {
        match self {
            Pipeline::SkDefault => ("default.vert", "sk_default.frag"),
            Pipeline::SkMsn => ("sk_msn.vert", "sk_msn.frag"),
            Pipeline::SkMultilayer => ("default.vert", "sk_multilayer.frag"),
            Pipeline::SkEffectShader => ("sk_effectshader.vert", "sk_effectshader.frag"),
            Pipeline::SkPbr => ("default.vert", "sk_pbr.frag"),
            Pipeline::Fo4Default => ("default.vert", "fo4_default.frag"),
            Pipeline::Fo4EffectShader => ("default.vert", "fo4_effectshader.frag"),
        }
    }
}

pub fn select_pipeline(shader: Option<&ShaderProperty>, is_fo4: bool) -> Option<Pipeline> {
    let shader = shader?;
    let pipeline = if is_fo4 {
        if shader.is_effect() {
            Pipeline::Fo4EffectShader
        } else {
            Pipeline::Fo4Default
        }
    } else if shader.is_effect() {
        Pipeline::SkEffectShader
    } else if shader.is_model_space() {
        Pipeline::SkMsn
    } else if shader.shader_type() == Some(LightingShaderType::MultiLayerParallax) {
        Pipeline::SkMultilayer
    } else if shader.is_pbr() {
        Pipeline::SkPbr
    } else {
        Pipeline::SkDefault
    };
    Some(pipeline)
}

/// Texture slot indices.
pub mod slot {
    pub const BASE: usize = 0;
    pub const NORMAL: usize = 1;
    pub const GLOW: usize = 2;
    pub const HEIGHT: usize = 3;
    pub const CUBE: usize = 4;
    pub const ENV_MASK: usize = 5;
    pub const TINT: usize = 6;
    pub const BACKLIGHT: usize = 7;
    pub const SPECULAR: usize = 8;
}

/// Blend factors, in the order NiAlphaProperty numbers them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlendMode {
    One,
    Zero,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

impl BlendMode {
    pub fn from_u16(x: u16) -> Option<BlendMode> {
        use self::BlendMode::*;
        Some(match x {
            0 => One,
            1 => Zero,
            2 => SrcColor,
            3 => OneMinusSrcColor,
            4 => DstColor,
            5 => OneMinusDstColor,
            6 => SrcAlpha,
            7 => OneMinusSrcAlpha,
            8 => DstAlpha,
            9 => OneMinusDstAlpha,
            10 => SrcAlphaSaturate,
            _ => return None,
        })
    }
}

/// Alpha test comparisons. The discriminant is what the shaders get.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TestMode {
    Always = 0,
    Less = 1,
    Equal = 2,
    LessOrEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterOrEqual = 6,
    Never = 7,
}

impl TestMode {
    pub fn from_u16(x: u16) -> TestMode {
        use self::TestMode::*;
        match x & 7 {
            0 => Always,
            1 => Less,
            2 => Equal,
            3 => LessOrEqual,
            4 => Greater,
            5 => NotEqual,
            6 => GreaterOrEqual,
            _ => Never,
        }
    }
}

/// Blend and alpha-test state unpacked from NiAlphaProperty flags.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AlphaState {
    pub blend_enable: bool,
    pub src_blend: BlendMode,
    pub dst_blend: BlendMode,
    pub test_enable: bool,
    pub test_mode: TestMode,
    /// In [0, 1].
    pub threshold: f32,
}

impl Default for AlphaState {
    fn default() -> AlphaState {
        AlphaState {
            blend_enable: false,
            src_blend: BlendMode::SrcAlpha,
            dst_blend: BlendMode::OneMinusSrcAlpha,
            test_enable: false,
            test_mode: TestMode::Greater,
            threshold: 0.0,
        }
    }
}

impl AlphaState {
    pub fn from_property(prop: &AlphaProperty) -> AlphaState {
        use crate::util::bits::BitField;
        let f = prop.flags;
        AlphaState {
            blend_enable: f.bit(0),
            src_blend: BlendMode::from_u16(f.bits(1, 5)).unwrap_or(BlendMode::SrcAlpha),
            dst_blend: BlendMode::from_u16(f.bits(5, 9)).unwrap_or(BlendMode::OneMinusSrcAlpha),
            test_enable: f.bit(9),
            test_mode: TestMode::from_u16(f.bits(10, 13)),
            threshold: prop.threshold as f32 / 255.0,
        }
    }
}

/// Everything a draw needs besides geometry. `T` is the texture type.
pub struct Material<T> {
    pub pipeline: Option<Pipeline>,
    pub textures: [Option<Rc<T>>; TEXTURE_SLOTS],

    pub alpha: f32,
    pub spec_color: [f32; 3],
    pub spec_strength: f32,
    pub spec_glossiness: f32,
    pub fresnel_power: f32,
    pub palette_scale: f32,
    pub glow_color: [f32; 4],
    pub glow_mult: f32,
    pub tint_color: [f32; 3],
    pub uv_scale: [f32; 2],
    pub uv_offset: [f32; 2],
    pub softlight: f32,
    pub backlight_power: f32,
    pub rim_power: f32,
    pub subsurface_rolloff: f32,
    pub env_reflection: f32,

    pub inner_scale: [f32; 2],
    pub inner_thickness: f32,
    pub outer_refraction: f32,
    pub outer_reflection: f32,

    pub has_glow_map: bool,
    pub has_emit: bool,
    pub has_softlight: bool,
    pub has_backlight: bool,
    pub has_rimlight: bool,
    pub has_tint_color: bool,
    pub has_weapon_blood: bool,
    pub double_sided: bool,

    pub alpha_state: AlphaState,
    pub z_buffer_test: bool,
    pub z_buffer_write: bool,
}

impl<T> Default for Material<T> {
    fn default() -> Material<T> {
        Material {
            pipeline: None,
            textures: Default::default(),
            alpha: 1.0,
            spec_color: [1.0, 1.0, 1.0],
            spec_strength: 1.0,
            spec_glossiness: 1.0,
            fresnel_power: 5.0,
            palette_scale: 1.0,
            glow_color: [0.0, 0.0, 0.0, 1.0],
            glow_mult: 1.0,
            tint_color: [1.0, 1.0, 1.0],
            uv_scale: [1.0, 1.0],
            uv_offset: [0.0, 0.0],
            softlight: 0.3,
            backlight_power: 0.0,
            rim_power: 2.0,
            subsurface_rolloff: 0.3,
            env_reflection: 1.0,
            inner_scale: [1.0, 1.0],
            inner_thickness: 0.0,
            outer_refraction: 0.0,
            outer_reflection: 0.0,
            has_glow_map: false,
            has_emit: false,
            has_softlight: false,
            has_backlight: false,
            has_rimlight: false,
            has_tint_color: false,
            has_weapon_blood: false,
            double_sided: false,
            alpha_state: AlphaState::default(),
            z_buffer_test: true,
            z_buffer_write: true,
        }
    }
}

impl<T> Material<T> {
    /// Copies the shader and alpha-property parameters. Textures are left
    /// empty; see `resolve_textures`.
    pub fn capture(
        shader: Option<&ShaderProperty>,
        alpha: Option<&AlphaProperty>,
        is_fo4: bool,
    ) -> Material<T> {
        let mut m = Material {
            pipeline: select_pipeline(shader, is_fo4),
            ..Material::default()
        };
        if let Some(alpha) = alpha {
            m.alpha_state = AlphaState::from_property(alpha);
        }
        let shader = match shader {
            Some(s) => s,
            None => return m,
        };

        m.alpha = shader.alpha();
        m.uv_scale = shader.uv_scale();
        m.uv_offset = shader.uv_offset();
        m.has_glow_map = shader.has_glowmap();
        m.glow_color = shader.emissive_color();
        m.glow_mult = shader.emissive_multiple();
        m.has_emit = shader.is_emissive();
        m.has_softlight = shader.has_softlight();
        m.has_backlight = shader.has_backlight();
        m.has_rimlight = shader.has_rimlight();
        m.double_sided = shader.is_double_sided();
        m.env_reflection = shader.environment_map_scale();

        if shader.is_effect() {
            m.has_weapon_blood = shader.has_weapon_blood();
        }

        if let Some(l) = shader.lighting() {
            m.spec_color = l.specular_color;
            m.spec_strength = l.specular_strength;
            m.spec_glossiness = l.glossiness.max(0.0).min(128.0);
            m.fresnel_power = l.fresnel_power;
            m.palette_scale = l.grayscale_to_palette_scale;
            m.softlight = l.softlight;
            m.backlight_power = l.backlight_power;
            m.rim_power = l.rimlight_power;
            m.subsurface_rolloff = l.subsurface_rolloff;
            m.z_buffer_test = shader.z_buffer_test();
            m.z_buffer_write = shader.z_buffer_write();

            let tint = match l.shader_type {
                LightingShaderType::SkinTint | LightingShaderType::FaceTint => l.skin_tint_color,
                LightingShaderType::HairTint => l.hair_tint_color,
                _ => None,
            };
            if let Some(tint) = tint {
                m.tint_color = tint;
                m.has_tint_color = true;
            }

            if let Some(ref p) = l.parallax {
                m.inner_scale = p.inner_texture_scale;
                m.inner_thickness = p.inner_thickness;
                m.outer_refraction = p.refraction_scale;
                m.outer_reflection = p.envmap_strength;
            }
        }
        m
    }

    /// Translucent shapes are drawn after opaque ones, blended and
    /// without depth writes.
    pub fn is_translucent(&self) -> bool {
        self.alpha < 1.0 || self.alpha_state.blend_enable
    }

    /// Looks up the texture for every slot, substituting fallbacks for
    /// the base, normal and glow maps. `paths` is `None` for a shape with
    /// no shader.
    pub fn resolve_textures<P>(&mut self, paths: Option<&[String]>, provider: &mut P)
    where
        P: TextureProvider<Texture = T>,
    {
        let paths = match paths {
            Some(paths) => paths,
            None => {
                self.textures[slot::BASE] = provider.fallback(Fallback::White);
                self.textures[slot::NORMAL] = provider.fallback(Fallback::FlatNormal);
                return;
            }
        };
        for i in 0..TEXTURE_SLOTS {
            let path = paths.get(i).map(|p| p.as_str()).unwrap_or("");
            let mut tex = if path.is_empty() { None } else { provider.texture(path) };
            if tex.is_none() {
                tex = match i {
                    slot::BASE => provider.fallback(Fallback::Error),
                    slot::NORMAL => provider.fallback(Fallback::FlatNormal),
                    slot::GLOW if self.has_glow_map => provider.fallback(Fallback::Black),
                    slot::GLOW => provider.fallback(Fallback::White),
                    _ => None,
                };
            }
            self.textures[i] = tex;
        }
    }
}
