//! The uniform contract between draw records and the material shaders.

use super::material::{slot, Material, Pipeline};
use super::texture_manager::GpuTexture;
use crate::dds::Target;
use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix};
use glium::uniforms::{UniformValue, Uniforms};

pub const AMBIENT_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];
pub const DIFFUSE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
pub const LIGHT_DIRECTION: [f32; 3] = [0.0, 0.0, 1.0];

/// A texture slot and the sampler names it's bound to. Some slots have
/// two names so both shader conventions work.
pub struct Sampler {
    pub slot: usize,
    pub names: &'static [&'static str],
    pub cube: bool,
}

pub const SAMPLERS: [Sampler; 9] = [
    Sampler { slot: slot::BASE, names: &["BaseMap"], cube: false },
    Sampler { slot: slot::NORMAL, names: &["NormalMap"], cube: false },
    Sampler { slot: slot::GLOW, names: &["GlowMap", "LightMask"], cube: false },
    Sampler { slot: slot::HEIGHT, names: &["HeightMap", "DetailMask"], cube: false },
    Sampler { slot: slot::CUBE, names: &["CubeMap"], cube: true },
    Sampler { slot: slot::ENV_MASK, names: &["EnvironmentMap"], cube: false },
    Sampler { slot: slot::TINT, names: &["TintMask", "InnerMap"], cube: false },
    Sampler { slot: slot::BACKLIGHT, names: &["BacklightMap"], cube: false },
    Sampler { slot: slot::SPECULAR, names: &["SpecularMap"], cube: false },
];

/// Which slots hold a texture the shader can sample. The shaders only
/// declare 2D and cube samplers, so a texture of any other target (or a
/// cube map in a 2D slot, or the reverse) counts as absent.
pub fn usable_slots<T, F>(material: &Material<T>, target: F) -> [bool; 9]
where
    F: Fn(&T) -> Target,
{
    let mut usable = [false; 9];
    for s in &SAMPLERS {
        let wanted = if s.cube { Target::Cube } else { Target::Tex2d };
        usable[s.slot] = match material.textures[s.slot] {
            Some(ref t) => target(t) == wanted,
            None => false,
        };
    }
    usable
}

/// The `has*` presence flags.
pub fn presence_flags<T>(material: &Material<T>, usable: &[bool; 9]) -> [(&'static str, bool); 8] {
    [
        ("hasGlowMap", material.has_glow_map && usable[slot::GLOW]),
        ("hasHeightMap", usable[slot::HEIGHT]),
        ("hasDetailMask", usable[slot::HEIGHT]),
        ("hasCubeMap", usable[slot::CUBE]),
        ("hasEnvMask", usable[slot::ENV_MASK]),
        ("hasTintMask", usable[slot::TINT]),
        ("hasBacklightMap", usable[slot::BACKLIGHT]),
        ("hasSpecularMap", usable[slot::SPECULAR]),
    ]
}

/// Per-draw transforms.
#[derive(Debug, Copy, Clone)]
pub struct Matrices {
    pub world: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub model_view: Matrix4<f32>,
    pub model_view_inverse: Matrix4<f32>,
    pub normal: Matrix3<f32>,
    pub mvp: Matrix4<f32>,
}

impl Matrices {
    pub fn new(model: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Matrices {
        let model_view = view * model;
        let model_view_inverse = model_view.invert().unwrap_or_else(Matrix4::identity);
        let upper = Matrix3::from_cols(
            model_view.x.truncate(),
            model_view.y.truncate(),
            model_view.z.truncate(),
        );
        let normal = upper.invert().unwrap_or_else(Matrix3::identity).transpose();
        Matrices {
            world: model,
            view,
            model_view,
            model_view_inverse,
            normal,
            mvp: projection * model_view,
        }
    }
}

pub struct DrawUniforms<'a> {
    pub matrices: Matrices,
    pub material: &'a Material<GpuTexture>,
    /// Bound to 2D slots with nothing usable in them.
    pub black: &'a GpuTexture,
    /// Bound to the cube slot when it has nothing usable.
    pub empty_cube: &'a GpuTexture,
}

impl<'a> Uniforms for DrawUniforms<'a> {
    fn visit_values<'b, F: FnMut(&str, UniformValue<'b>)>(&'b self, mut f: F) {
        use glium::uniforms::UniformValue::*;

        let m = self.material;
        let mat = &self.matrices;
        f("worldMatrix", Mat4(mat.world.into()));
        f("viewMatrix", Mat4(mat.view.into()));
        f("modelViewMatrix", Mat4(mat.model_view.into()));
        f("modelViewMatrixInverse", Mat4(mat.model_view_inverse.into()));
        f("normalMatrix", Mat3(mat.normal.into()));
        f("mvpMatrix", Mat4(mat.mvp.into()));
        f("lightDirection", Vec3(LIGHT_DIRECTION));

        let usable = usable_slots(m, |t| t.target());
        for s in &SAMPLERS {
            let tex = match m.textures[s.slot] {
                Some(ref t) if usable[s.slot] => &**t,
                _ if s.cube => self.empty_cube,
                _ => self.black,
            };
            for &name in s.names {
                f(name, tex.as_uniform());
            }
        }
        for &(name, present) in &presence_flags(m, &usable) {
            f(name, Bool(present));
        }

        f("ambientColor", Vec4(AMBIENT_COLOR));
        f("diffuseColor", Vec4(DIFFUSE_COLOR));

        f("alpha", Float(m.alpha));
        f("tintColor", Vec3(m.tint_color));
        f("uvScale", Vec2(m.uv_scale));
        f("uvOffset", Vec2(m.uv_offset));
        f("specColor", Vec3(m.spec_color));
        f("specStrength", Float(m.spec_strength));
        f("specGlossiness", Float(m.spec_glossiness));
        f("fresnelPower", Float(m.fresnel_power));
        f("paletteScale", Float(m.palette_scale));
        f("glowColor", Vec4(m.glow_color));
        f("glowMult", Float(m.glow_mult));

        f("hasEmit", Bool(m.has_emit));
        f("hasSoftlight", Bool(m.has_softlight));
        f("hasBacklight", Bool(m.has_backlight));
        f("hasRimlight", Bool(m.has_rimlight));
        f("hasTintColor", Bool(m.has_tint_color));
        f("hasWeaponBlood", Bool(m.has_weapon_blood));

        f("softlight", Float(m.softlight));
        f("backlightPower", Float(m.backlight_power));
        f("rimPower", Float(m.rim_power));
        f("subsurfaceRolloff", Float(m.subsurface_rolloff));
        f("doubleSided", Bool(m.double_sided));
        f("envReflection", Float(m.env_reflection));

        f("alphaTestEnable", Bool(m.alpha_state.test_enable));
        f("alphaTestMode", SignedInt(m.alpha_state.test_mode as i32));
        f("alphaThreshold", Float(m.alpha_state.threshold));

        if m.pipeline == Some(Pipeline::SkMultilayer) {
            f("innerScale", Vec2(m.inner_scale));
            f("innerThickness", Float(m.inner_thickness));
            f("outerRefraction", Float(m.outer_refraction));
            f("outerReflection", Float(m.outer_reflection));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{vec3, vec4, InnerSpace};
    use std::rc::Rc;

    fn tex(name: &str) -> Option<Rc<String>> {
        Some(Rc::new(name.to_string()))
    }

    fn target_of(name: &String) -> Target {
        match name.split(':').next() {
            Some("cube") => Target::Cube,
            Some("cubes") => Target::CubeArray,
            Some("array") => Target::Tex2dArray,
            Some("volume") => Target::Tex3d,
            Some("line") => Target::Tex1d,
            _ => Target::Tex2d,
        }
    }

    #[test]
    fn wrong_kind_textures_are_unusable() {
        let mut m: Material<String> = Material::default();
        m.textures[slot::BASE] = tex("base");
        m.textures[slot::CUBE] = tex("flat.dds");
        m.textures[slot::ENV_MASK] = tex("cube:sky.dds");
        let usable = usable_slots(&m, target_of);
        assert!(usable[slot::BASE]);
        assert!(!usable[slot::CUBE]);
        assert!(!usable[slot::ENV_MASK]);
        assert!(!usable[slot::NORMAL]);

        m.textures[slot::CUBE] = tex("cube:sky.dds");
        let usable = usable_slots(&m, target_of);
        assert!(usable[slot::CUBE]);
    }

    #[test]
    fn other_targets_are_unusable_everywhere() {
        let mut m: Material<String> = Material::default();
        m.textures[slot::BASE] = tex("array:base.dds");
        m.textures[slot::NORMAL] = tex("volume:noise.dds");
        m.textures[slot::GLOW] = tex("line:ramp.dds");
        m.textures[slot::CUBE] = tex("cubes:sky.dds");
        let usable = usable_slots(&m, target_of);
        assert_eq!(usable, [false; 9]);
        let flags = presence_flags(&m, &usable);
        assert!(flags.iter().all(|&(_, present)| !present));
    }

    #[test]
    fn glow_flag_needs_material_and_texture() {
        let mut m: Material<String> = Material::default();
        m.textures[slot::GLOW] = tex("glow");
        m.textures[slot::SPECULAR] = tex("spec");
        let usable = usable_slots(&m, |_| Target::Tex2d);
        let flags = presence_flags(&m, &usable);
        let get = |name: &str| flags.iter().find(|f| f.0 == name).unwrap().1;
        assert!(!get("hasGlowMap"));
        assert!(get("hasSpecularMap"));
        assert!(!get("hasHeightMap"));

        m.has_glow_map = true;
        let flags = presence_flags(&m, &usable);
        assert!(flags.iter().any(|&f| f == ("hasGlowMap", true)));
    }

    #[test]
    fn every_slot_but_the_reserved_one_has_a_sampler() {
        let mut slots: Vec<usize> = SAMPLERS.iter().map(|s| s.slot).collect();
        slots.sort();
        assert_eq!(slots, (0..9).collect::<Vec<_>>());
        assert_eq!(SAMPLERS.iter().filter(|s| s.cube).count(), 1);
    }

    #[test]
    fn matrices_compose() {
        let model = Matrix4::from_translation(vec3(1.0, 0.0, 0.0));
        let view = Matrix4::from_translation(vec3(0.0, 0.0, -10.0));
        let m = Matrices::new(model, view, Matrix4::identity());
        let p = m.mvp * vec4(0.0, 0.0, 0.0, 1.0);
        assert!((p - vec4(1.0, 0.0, -10.0, 1.0)).magnitude() < 1e-6);
        let back = m.model_view_inverse * p;
        assert!((back - vec4(0.0, 0.0, 0.0, 1.0)).magnitude() < 1e-6);
        assert_eq!(m.normal, Matrix3::identity());
    }
}
