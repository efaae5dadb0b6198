//! Draws one mesh: builds the draw records, frames the camera, and
//! submits the opaque then the translucent pass every frame.

use super::camera::{self, shared_camera, Camera, ListenerId};
use super::material::{BlendMode, Material};
use super::shader_registry::ShaderRegistry;
use super::shape::ShapeRecord;
use super::texture_manager::{Fallback, TextureManager, TextureProvider};
use super::uniforms::{DrawUniforms, Matrices};
use super::Display;
use crate::assets::Assets;
use crate::geometry::bounding_sphere;
use crate::nif::{BoundingSphere, NifFile};
use cgmath::{vec3, Matrix4, SquareMatrix, Vector3};
use glium::draw_parameters::{BackfaceCullingMode, DepthTest};
use glium::{Blend, BlendingFunction, DrawParameters, LinearBlendingFactor, Surface};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

pub const CLEAR_COLOR: (f32, f32, f32, f32) = (0.18, 0.18, 0.18, 1.0);
/// Auto-framing puts the eye this many radii from the largest shape.
pub const FRAME_RADII: f32 = 2.4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pass {
    Opaque,
    Translucent,
}

pub struct SceneViewer {
    camera: Rc<RefCell<Camera>>,
    listener: Option<ListenerId>,
    view: Rc<Cell<Matrix4<f32>>>,
    needs_redraw: Rc<Cell<bool>>,
    projection: Matrix4<f32>,
    records: Vec<ShapeRecord>,
    textures: TextureManager,
    shaders: ShaderRegistry,
}

impl SceneViewer {
    pub fn new(
        display: &Display,
        nif: &NifFile,
        assets: Rc<Assets>,
        shaders_dir: PathBuf,
        isolated_camera: bool,
    ) -> SceneViewer {
        let start = time::precise_time_ns();
        let mut textures = TextureManager::new(display, assets);
        let mut records = vec![];
        for shape in nif.shapes().iter().filter(|s| !s.is_hidden()) {
            match ShapeRecord::new(display, nif, shape, &mut textures) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping shape {:?}: {}", shape.name, e),
            }
        }
        let ms = time::precise_time_ns().wrapping_sub(start) as f64 / 1_000_000.0;
        info!(
            "built {} shapes with {} textures in {:.1}ms",
            records.len(),
            textures.num_loaded(),
            ms,
        );

        let (camera, created) = if isolated_camera {
            (Rc::new(RefCell::new(Camera::default())), true)
        } else {
            shared_camera()
        };
        if created {
            if let Some((distance, look_at)) = frame_spheres(scene_spheres(nif)) {
                let mut cam = camera.borrow_mut();
                cam.set_distance(distance);
                cam.set_look_at(look_at);
            }
        }

        let view = Rc::new(Cell::new(camera.borrow().view_matrix()));
        let needs_redraw = Rc::new(Cell::new(true));
        let listener = {
            let view = view.clone();
            let needs_redraw = needs_redraw.clone();
            camera.borrow_mut().subscribe(move |cam| {
                view.set(cam.view_matrix());
                needs_redraw.set(true);
            })
        };

        SceneViewer {
            camera,
            listener: Some(listener),
            view,
            needs_redraw,
            projection: Matrix4::identity(),
            records,
            textures,
            shaders: ShaderRegistry::new(display, shaders_dir),
        }
    }

    pub fn camera(&self) -> &Rc<RefCell<Camera>> {
        &self.camera
    }

    /// True once after the camera changed or the viewport was resized.
    pub fn take_redraw(&self) -> bool {
        self.needs_redraw.replace(false)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection = camera::projection(width, height);
        self.needs_redraw.set(true);
    }

    pub fn paint<S: Surface>(&mut self, target: &mut S) {
        target.clear_color_and_depth(CLEAR_COLOR, 1.0);

        let black = self.textures.fallback(Fallback::Black);
        let empty_cube = self.textures.empty_cube();
        let (black, empty_cube) = match (black, empty_cube) {
            (Some(b), Some(c)) => (b, c),
            _ => return,
        };

        let view = self.view.get();
        let (opaque, translucent) = partition(&self.records, |r| r.material.is_translucent());
        let passes = [(Pass::Opaque, opaque), (Pass::Translucent, translucent)];
        for &(pass, ref records) in &passes {
            for record in records {
                let pipeline = match record.material.pipeline {
                    Some(p) => p,
                    None => continue,
                };
                let program = match self.shaders.program(pipeline) {
                    Some(p) => p,
                    None => continue,
                };
                let uniforms = DrawUniforms {
                    matrices: Matrices::new(record.model, view, self.projection),
                    material: &record.material,
                    black: &black,
                    empty_cube: &empty_cube,
                };
                let indices = match record.indices.slice(0..record.elements) {
                    Some(ix) => ix,
                    None => continue,
                };
                let vertices = (
                    &record.positions,
                    &record.normals,
                    &record.tangents,
                    &record.bitangents,
                    &record.uvs,
                    &record.colors,
                );
                let params = draw_parameters(&record.material, pass);
                if let Err(e) = target.draw(vertices, indices, program, &uniforms, &params) {
                    warn!("drawing {:?} failed: {}", record.name, e);
                }
            }
        }
    }

    /// Releases every GPU resource. Call before the display goes away.
    pub fn cleanup(&mut self) {
        if let Some(id) = self.listener.take() {
            self.camera.borrow_mut().unsubscribe(id);
        }
        self.records.clear();
        self.textures.cleanup();
        self.shaders.cleanup();
    }
}

impl Drop for SceneViewer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Bounding spheres of the visible shapes, in scene space.
pub fn scene_spheres(nif: &NifFile) -> Vec<BoundingSphere> {
    nif.shapes()
        .iter()
        .filter(|s| !s.is_hidden())
        .filter_map(|s| {
            let geom = s.geometry.as_ref()?;
            Some(bounding_sphere(geom, &nif.global_transform(s)))
        })
        .collect()
}

/// Camera distance and look-at that frame the largest sphere.
pub fn frame_spheres<I>(spheres: I) -> Option<(f32, Vector3<f32>)>
where
    I: IntoIterator<Item = BoundingSphere>,
{
    let mut largest: Option<BoundingSphere> = None;
    for s in spheres {
        match largest {
            Some(ref l) if l.radius >= s.radius => (),
            _ => largest = Some(s),
        }
    }
    let s = largest?;
    let [x, y, z] = s.center;
    // Z-up to the camera's Y-up
    Some((s.radius * FRAME_RADII, vec3(-x, z, y)))
}

/// Splits into (opaque, translucent), keeping scene order in each.
pub fn partition<T, F>(items: &[T], is_translucent: F) -> (Vec<&T>, Vec<&T>)
where
    F: Fn(&T) -> bool,
{
    items.iter().partition(|&item| !is_translucent(item))
}

pub fn draw_parameters<T>(material: &Material<T>, pass: Pass) -> DrawParameters<'static> {
    let depth_test = if material.z_buffer_test {
        DepthTest::IfLessOrEqual
    } else {
        DepthTest::Overwrite
    };
    let backface_culling = if material.double_sided {
        BackfaceCullingMode::CullingDisabled
    } else {
        BackfaceCullingMode::CullClockwise
    };
    let blend = match pass {
        Pass::Opaque => Blend::default(),
        Pass::Translucent => {
            let alpha = &material.alpha_state;
            let (src, dst) = if alpha.blend_enable {
                (blend_factor(alpha.src_blend), blend_factor(alpha.dst_blend))
            } else {
                (LinearBlendingFactor::SourceAlpha, LinearBlendingFactor::OneMinusSourceAlpha)
            };
            // saturate is only valid as a source factor
            let dst = match dst {
                LinearBlendingFactor::SourceAlphaSaturate => LinearBlendingFactor::One,
                f => f,
            };
            let func = BlendingFunction::Addition { source: src, destination: dst };
            Blend { color: func, alpha: func, constant_value: (0.0, 0.0, 0.0, 0.0) }
        }
    };
    DrawParameters {
        depth: glium::Depth {
            test: depth_test,
            write: material.z_buffer_write && pass == Pass::Opaque,
            ..Default::default()
        },
        backface_culling,
        blend,
        ..Default::default()
    }
}

fn blend_factor(mode: BlendMode) -> LinearBlendingFactor {
    use self::LinearBlendingFactor as F;
    match mode {
        BlendMode::One => F::One,
        BlendMode::Zero => F::Zero,
        BlendMode::SrcColor => F::SourceColor,
        BlendMode::OneMinusSrcColor => F::OneMinusSourceColor,
        BlendMode::DstColor => F::DestinationColor,
        BlendMode::OneMinusDstColor => F::OneMinusDestinationColor,
        BlendMode::SrcAlpha => F::SourceAlpha,
        BlendMode::OneMinusSrcAlpha => F::OneMinusSourceAlpha,
        BlendMode::DstAlpha => F::DestinationAlpha,
        BlendMode::OneMinusDstAlpha => F::OneMinusDestinationAlpha,
        BlendMode::SrcAlphaSaturate => F::SourceAlphaSaturate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nif::test_util::*;
    use crate::nif::Transform;

    #[test]
    fn frames_the_largest_shape() {
        let spheres = vec![
            BoundingSphere { center: [9.0, 9.0, 9.0], radius: 5.0 },
            BoundingSphere { center: [1.0, 2.0, 3.0], radius: 50.0 },
            BoundingSphere { center: [0.0, 0.0, 0.0], radius: 20.0 },
        ];
        let (distance, look_at) = frame_spheres(spheres).unwrap();
        assert_eq!(distance, 120.0);
        assert_eq!(look_at, vec3(-1.0, 3.0, 2.0));
        assert!(frame_spheres(vec![]).is_none());
    }

    #[test]
    fn frames_a_scene_in_scene_space() {
        let mut nif = NifBuilder::new(100);
        let shader = nif.lighting_shader(&LightingShaderDesc::default());
        let small = nif.bs_tri_shape("Small", Transform::default(), &quad(), shader, -1);
        let big_xf = Transform { scale: 4.0, ..translation(500.0, 0.0, 0.0) };
        let big = nif.bs_tri_shape("Big", big_xf, &quad(), shader, -1);
        nif.node("Root", Transform::default(), &[small, big]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();

        let spheres = scene_spheres(&file);
        assert_eq!(spheres.len(), 2);
        let (distance, look_at) = frame_spheres(spheres).unwrap();
        assert!((distance - 0.75 * 4.0 * FRAME_RADII).abs() < 1e-4);
        assert!((look_at.x + 502.0).abs() < 1e-3);
        assert!(look_at.y.abs() < 1e-3);
        assert!((look_at.z - 2.0).abs() < 1e-3);
    }

    #[test]
    fn translucent_after_opaque_in_scene_order() {
        let alphas = [1.0, 0.5, 1.0, 0.25, 1.0];
        let (opaque, translucent) = partition(&alphas, |&a| a < 1.0);
        assert_eq!(opaque.len(), 3);
        assert_eq!(translucent, vec![&0.5, &0.25]);
    }

    #[test]
    fn blended_materials_are_translucent() {
        let mut m: Material<()> = Material::default();
        assert!(!m.is_translucent());
        m.alpha_state.blend_enable = true;
        assert!(m.is_translucent());
        m.alpha_state.blend_enable = false;
        m.alpha = 0.5;
        assert!(m.is_translucent());
    }

    #[test]
    fn translucent_pass_keeps_depth_read_only() {
        let m: Material<()> = Material::default();
        let opaque = draw_parameters(&m, Pass::Opaque);
        assert!(opaque.depth.write);
        assert_eq!(opaque.depth.test, DepthTest::IfLessOrEqual);
        assert_eq!(opaque.backface_culling, BackfaceCullingMode::CullClockwise);
        assert_eq!(opaque.blend.color, BlendingFunction::AlwaysReplace);

        let translucent = draw_parameters(&m, Pass::Translucent);
        assert!(!translucent.depth.write);
        let over = BlendingFunction::Addition {
            source: LinearBlendingFactor::SourceAlpha,
            destination: LinearBlendingFactor::OneMinusSourceAlpha,
        };
        assert_eq!(translucent.blend.color, over);
        assert_eq!(translucent.blend.alpha, over);
    }

    #[test]
    fn state_follows_the_material() {
        let mut m: Material<()> = Material::default();
        m.double_sided = true;
        m.z_buffer_test = false;
        m.z_buffer_write = false;
        m.alpha_state.blend_enable = true;
        m.alpha_state.src_blend = BlendMode::One;
        m.alpha_state.dst_blend = BlendMode::SrcAlphaSaturate;
        let p = draw_parameters(&m, Pass::Opaque);
        assert_eq!(p.backface_culling, BackfaceCullingMode::CullingDisabled);
        assert_eq!(p.depth.test, DepthTest::Overwrite);
        assert!(!p.depth.write);

        let p = draw_parameters(&m, Pass::Translucent);
        let add = BlendingFunction::Addition {
            source: LinearBlendingFactor::One,
            destination: LinearBlendingFactor::One,
        };
        assert_eq!(p.blend.color, add);
    }
}
