//! Shader and alpha properties.

use super::blocks::read_object_net;
use super::stream::Stream;
use crate::errors::Result;

/// Bits of the first shader flag word.
pub mod flags1 {
    pub const SPECULAR: u32 = 1 << 0;
    pub const VERTEX_ALPHA: u32 = 1 << 3;
    pub const ENVIRONMENT_MAPPING: u32 = 1 << 7;
    pub const MODEL_SPACE_NORMALS: u32 = 1 << 12;
    pub const EYE_ENVIRONMENT_MAPPING: u32 = 1 << 17;
    pub const OWN_EMIT: u32 = 1 << 22;
    pub const Z_BUFFER_TEST: u32 = 1 << 31;
}

/// Bits of the second shader flag word.
pub mod flags2 {
    pub const Z_BUFFER_WRITE: u32 = 1 << 0;
    pub const DOUBLE_SIDED: u32 = 1 << 4;
    pub const VERTEX_COLORS: u32 = 1 << 5;
    pub const GLOW_MAP: u32 = 1 << 6;
    pub const WEAPON_BLOOD: u32 = 1 << 17;
    pub const PBR: u32 = 1 << 23;
    pub const SOFT_LIGHTING: u32 = 1 << 25;
    pub const RIM_LIGHTING: u32 = 1 << 26;
    pub const BACK_LIGHTING: u32 = 1 << 27;
    pub const TREE_ANIM: u32 = 1 << 29;
}

/// BSLightingShaderProperty shader types.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LightingShaderType {
    Default,
    EnvironmentMap,
    Glow,
    Parallax,
    FaceTint,
    SkinTint,
    HairTint,
    ParallaxOcc,
    MultitextureLandscape,
    LodLandscape,
    Snow,
    MultiLayerParallax,
    TreeAnim,
    LodObjects,
    SparkleSnow,
    LodObjectsHd,
    EyeEnvmap,
    Cloud,
    LodLandscapeNoise,
    MultitextureLandscapeLodBlend,
    Dismemberment,
    Unknown(u32),
}

impl LightingShaderType {
    pub fn from_u32(x: u32) -> LightingShaderType {
        use self::LightingShaderType::*;
        match x {
            0 => Default,
            1 => EnvironmentMap,
            2 => Glow,
            3 => Parallax,
            4 => FaceTint,
            5 => SkinTint,
            6 => HairTint,
            7 => ParallaxOcc,
            8 => MultitextureLandscape,
            9 => LodLandscape,
            10 => Snow,
            11 => MultiLayerParallax,
            12 => TreeAnim,
            13 => LodObjects,
            14 => SparkleSnow,
            15 => LodObjectsHd,
            16 => EyeEnvmap,
            17 => Cloud,
            18 => LodLandscapeNoise,
            19 => MultitextureLandscapeLodBlend,
            20 => Dismemberment,
            x => Unknown(x),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiLayerParallax {
    pub inner_thickness: f32,
    pub refraction_scale: f32,
    pub inner_texture_scale: [f32; 2],
    pub envmap_strength: f32,
}

#[derive(Debug, Clone)]
pub struct LightingShader {
    pub name: String,
    pub shader_type: LightingShaderType,
    pub flags1: u32,
    pub flags2: u32,
    pub uv_offset: [f32; 2],
    pub uv_scale: [f32; 2],
    pub texture_set: Option<usize>,
    pub emissive_color: [f32; 3],
    pub emissive_multiple: f32,
    pub wet_material: String,
    pub texture_clamp_mode: u32,
    pub alpha: f32,
    pub refraction_strength: f32,
    pub glossiness: f32,
    pub specular_color: [f32; 3],
    pub specular_strength: f32,
    pub softlight: f32,
    pub rimlight_power: f32,
    pub backlight_power: f32,
    pub subsurface_rolloff: f32,
    pub grayscale_to_palette_scale: f32,
    pub fresnel_power: f32,
    pub environment_map_scale: f32,
    pub skin_tint_color: Option<[f32; 3]>,
    pub hair_tint_color: Option<[f32; 3]>,
    pub parallax: Option<MultiLayerParallax>,
}

#[derive(Debug, Clone)]
pub struct EffectShader {
    pub name: String,
    pub flags1: u32,
    pub flags2: u32,
    pub uv_offset: [f32; 2],
    pub uv_scale: [f32; 2],
    pub source_texture: String,
    pub texture_clamp_mode: u8,
    pub lighting_influence: u8,
    pub env_map_min_lod: u8,
    /// Falloff start/stop angle, start/stop opacity.
    pub falloff: [f32; 4],
    pub base_color: [f32; 4],
    pub base_color_scale: f32,
    pub soft_falloff_depth: f32,
    pub greyscale_texture: String,
    pub env_map_texture: String,
    pub normal_texture: String,
    pub env_mask_texture: String,
    pub environment_map_scale: f32,
}

#[derive(Debug, Clone)]
pub enum ShaderProperty {
    Lighting(LightingShader),
    Effect(EffectShader),
}

impl ShaderProperty {
    pub fn block_name(&self) -> &'static str {
        match *self {
            ShaderProperty::Lighting(_) => "BSLightingShaderProperty",
            ShaderProperty::Effect(_) => "BSEffectShaderProperty",
        }
    }

    pub fn name(&self) -> &str {
        match *self {
            ShaderProperty::Lighting(ref s) => &s.name,
            ShaderProperty::Effect(ref s) => &s.name,
        }
    }

    pub fn flags1(&self) -> u32 {
        match *self {
            ShaderProperty::Lighting(ref s) => s.flags1,
            ShaderProperty::Effect(ref s) => s.flags1,
        }
    }

    pub fn flags2(&self) -> u32 {
        match *self {
            ShaderProperty::Lighting(ref s) => s.flags2,
            ShaderProperty::Effect(ref s) => s.flags2,
        }
    }

    pub fn lighting(&self) -> Option<&LightingShader> {
        match *self {
            ShaderProperty::Lighting(ref s) => Some(s),
            ShaderProperty::Effect(_) => None,
        }
    }

    pub fn is_effect(&self) -> bool {
        self.lighting().is_none()
    }

    pub fn shader_type(&self) -> Option<LightingShaderType> {
        self.lighting().map(|s| s.shader_type)
    }

    fn has1(&self, bit: u32) -> bool { self.flags1() & bit != 0 }
    fn has2(&self, bit: u32) -> bool { self.flags2() & bit != 0 }

    pub fn is_model_space(&self) -> bool { self.has1(flags1::MODEL_SPACE_NORMALS) }
    pub fn is_emissive(&self) -> bool { self.has1(flags1::OWN_EMIT) }
    pub fn has_vertex_alpha(&self) -> bool { self.has1(flags1::VERTEX_ALPHA) }
    pub fn z_buffer_test(&self) -> bool { self.has1(flags1::Z_BUFFER_TEST) }
    pub fn z_buffer_write(&self) -> bool { self.has2(flags2::Z_BUFFER_WRITE) }
    pub fn is_double_sided(&self) -> bool { self.has2(flags2::DOUBLE_SIDED) }
    pub fn has_vertex_colors(&self) -> bool { self.has2(flags2::VERTEX_COLORS) }
    pub fn has_weapon_blood(&self) -> bool { self.has2(flags2::WEAPON_BLOOD) }
    pub fn is_pbr(&self) -> bool { self.has2(flags2::PBR) }
    pub fn has_softlight(&self) -> bool { self.has2(flags2::SOFT_LIGHTING) }
    pub fn has_rimlight(&self) -> bool { self.has2(flags2::RIM_LIGHTING) }
    pub fn has_backlight(&self) -> bool { self.has2(flags2::BACK_LIGHTING) }
    pub fn has_tree_anim(&self) -> bool { self.has2(flags2::TREE_ANIM) }

    /// Glow maps only apply to the Glow shader type with the glow flag set.
    pub fn has_glowmap(&self) -> bool {
        self.shader_type() == Some(LightingShaderType::Glow) && self.has2(flags2::GLOW_MAP)
    }

    pub fn is_skin_tinted(&self) -> bool {
        self.shader_type() == Some(LightingShaderType::SkinTint)
    }

    pub fn uv_offset(&self) -> [f32; 2] {
        match *self {
            ShaderProperty::Lighting(ref s) => s.uv_offset,
            ShaderProperty::Effect(ref s) => s.uv_offset,
        }
    }

    pub fn uv_scale(&self) -> [f32; 2] {
        match *self {
            ShaderProperty::Lighting(ref s) => s.uv_scale,
            ShaderProperty::Effect(ref s) => s.uv_scale,
        }
    }

    /// Effect shaders take their alpha from the base color.
    pub fn alpha(&self) -> f32 {
        match *self {
            ShaderProperty::Lighting(ref s) => s.alpha,
            ShaderProperty::Effect(ref s) => s.base_color[3],
        }
    }

    pub fn emissive_color(&self) -> [f32; 4] {
        match *self {
            ShaderProperty::Lighting(ref s) => {
                let [r, g, b] = s.emissive_color;
                [r, g, b, 1.0]
            }
            ShaderProperty::Effect(ref s) => s.base_color,
        }
    }

    pub fn emissive_multiple(&self) -> f32 {
        match *self {
            ShaderProperty::Lighting(ref s) => s.emissive_multiple,
            ShaderProperty::Effect(ref s) => s.base_color_scale,
        }
    }

    pub fn environment_map_scale(&self) -> f32 {
        match *self {
            ShaderProperty::Lighting(ref s) => s.environment_map_scale,
            ShaderProperty::Effect(ref s) => s.environment_map_scale,
        }
    }
}

/// Alpha blending and testing state.
#[derive(Debug, Clone)]
pub struct AlphaProperty {
    pub name: String,
    pub flags: u16,
    pub threshold: u8,
}

pub fn read_alpha_property(s: &mut Stream) -> Result<AlphaProperty> {
    let name = read_object_net(s, false)?.name;
    let flags = s.u16()?;
    let threshold = s.u8()?;
    Ok(AlphaProperty { name, flags, threshold })
}

pub fn read_texture_set(s: &mut Stream) -> Result<Vec<String>> {
    let n = s.u32()? as usize;
    if n > s.remaining() / 4 {
        bail!("texture set claims {} textures", n);
    }
    (0..n).map(|_| s.sized_string()).collect()
}

pub fn read_lighting_shader(s: &mut Stream) -> Result<LightingShader> {
    let net = read_object_net(s, true)?;
    let shader_type = LightingShaderType::from_u32(net.shader_type);
    let bs = s.bs();

    let flags1 = s.u32()?;
    let flags2 = s.u32()?;
    let uv_offset = s.vec2()?;
    let uv_scale = s.vec2()?;
    let texture_set = s.block_ref()?;
    let emissive_color = s.vec3()?;
    let emissive_multiple = s.f32()?;
    let wet_material = if bs >= 130 { s.string()? } else { String::new() };
    let texture_clamp_mode = s.u32()?;
    let alpha = s.f32()?;
    let refraction_strength = s.f32()?;
    let glossiness = s.f32()?;
    let specular_color = s.vec3()?;
    let specular_strength = s.f32()?;

    let mut shader = LightingShader {
        name: net.name,
        shader_type,
        flags1,
        flags2,
        uv_offset,
        uv_scale,
        texture_set,
        emissive_color,
        emissive_multiple,
        wet_material,
        texture_clamp_mode,
        alpha,
        refraction_strength,
        glossiness,
        specular_color,
        specular_strength,
        softlight: 0.3,
        rimlight_power: 2.0,
        backlight_power: 0.0,
        subsurface_rolloff: 0.3,
        grayscale_to_palette_scale: 1.0,
        fresnel_power: 5.0,
        environment_map_scale: 1.0,
        skin_tint_color: None,
        hair_tint_color: None,
        parallax: None,
    };

    if bs < 130 {
        shader.softlight = s.f32()?;
        shader.rimlight_power = s.f32()?;
    } else {
        shader.subsurface_rolloff = s.f32()?;
        shader.rimlight_power = s.f32()?;
        if shader.rimlight_power == f32::MAX {
            shader.backlight_power = s.f32()?;
        }
        shader.grayscale_to_palette_scale = s.f32()?;
        shader.fresnel_power = s.f32()?;
        // wetness: spec scale, spec power, min var, env map scale,
        // fresnel power, metalness
        s.skip(6 * 4)?;
    }

    match shader_type {
        LightingShaderType::EnvironmentMap => {
            shader.environment_map_scale = s.f32()?;
            if bs >= 130 {
                s.skip(2)?; // use SSR, wetness use SSR
            }
        }
        LightingShaderType::SkinTint => shader.skin_tint_color = Some(s.vec3()?),
        LightingShaderType::HairTint => shader.hair_tint_color = Some(s.vec3()?),
        LightingShaderType::ParallaxOcc => s.skip(2 * 4)?,
        LightingShaderType::MultiLayerParallax => {
            shader.parallax = Some(MultiLayerParallax {
                inner_thickness: s.f32()?,
                refraction_scale: s.f32()?,
                inner_texture_scale: s.vec2()?,
                envmap_strength: s.f32()?,
            });
        }
        LightingShaderType::EyeEnvmap => {
            shader.environment_map_scale = s.f32()?;
            s.skip(2 * 12)?; // left/right eye reflection centers
        }
        _ => (),
    }

    Ok(shader)
}

pub fn read_effect_shader(s: &mut Stream) -> Result<EffectShader> {
    let net = read_object_net(s, false)?;
    let bs = s.bs();

    let flags1 = s.u32()?;
    let flags2 = s.u32()?;
    let uv_offset = s.vec2()?;
    let uv_scale = s.vec2()?;
    let source_texture = s.sized_string()?;
    let texture_clamp_mode = s.u8()?;
    let lighting_influence = s.u8()?;
    let env_map_min_lod = s.u8()?;
    s.u8()?;
    let falloff = s.vec4()?;
    let base_color = s.vec4()?;
    let base_color_scale = s.f32()?;
    let soft_falloff_depth = s.f32()?;
    let greyscale_texture = s.sized_string()?;

    let mut shader = EffectShader {
        name: net.name,
        flags1,
        flags2,
        uv_offset,
        uv_scale,
        source_texture,
        texture_clamp_mode,
        lighting_influence,
        env_map_min_lod,
        falloff,
        base_color,
        base_color_scale,
        soft_falloff_depth,
        greyscale_texture,
        env_map_texture: String::new(),
        normal_texture: String::new(),
        env_mask_texture: String::new(),
        environment_map_scale: 1.0,
    };

    if bs >= 130 {
        shader.env_map_texture = s.sized_string()?;
        shader.normal_texture = s.sized_string()?;
        shader.env_mask_texture = s.sized_string()?;
        shader.environment_map_scale = s.f32()?;
    }

    Ok(shader)
}
