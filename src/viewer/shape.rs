//! GPU draw records for scene shapes.

use super::material::Material;
use super::texture_manager::{GpuTexture, TextureManager};
use super::Display;
use crate::errors::Result;
use crate::geometry;
use crate::nif::shader::ShaderProperty;
use crate::nif::{Geometry, NifFile, Shape};
use cgmath::Matrix4;
use glium::index::PrimitiveType;
use glium::{IndexBuffer, VertexBuffer};

#[derive(Copy, Clone)]
pub struct PositionAttr {
    pub position: [f32; 3],
}
implement_vertex!(PositionAttr, position location(0));

#[derive(Copy, Clone)]
pub struct NormalAttr {
    pub normal: [f32; 3],
}
implement_vertex!(NormalAttr, normal location(1));

#[derive(Copy, Clone)]
pub struct TangentAttr {
    pub tangent: [f32; 3],
}
implement_vertex!(TangentAttr, tangent location(2));

#[derive(Copy, Clone)]
pub struct BitangentAttr {
    pub bitangent: [f32; 3],
}
implement_vertex!(BitangentAttr, bitangent location(3));

#[allow(non_snake_case)]
#[derive(Copy, Clone)]
pub struct TexCoordAttr {
    pub texCoord: [f32; 2],
}
implement_vertex!(TexCoordAttr, texCoord location(4));

#[derive(Copy, Clone)]
pub struct ColorAttr {
    pub color: [f32; 4],
}
implement_vertex!(ColorAttr, color location(5));

/// Vertex streams ready for upload: every stream present and as long as
/// the positions, indices all in range.
pub struct Streams {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u16>,
}

impl Streams {
    pub fn build(mut geom: Geometry, shader: Option<&ShaderProperty>) -> Streams {
        geometry::complete(&mut geom);
        if ignores_vertex_alpha(shader) {
            for c in &mut geom.colors {
                c[3] = 1.0;
            }
        }
        let indices = geom.triangles.iter().flat_map(|t| t.iter().cloned()).collect();
        Streams {
            positions: geom.vertices,
            normals: geom.normals,
            tangents: geom.tangents,
            bitangents: geom.bitangents,
            uvs: geom.uvs,
            colors: geom.colors,
            indices,
        }
    }

    /// Number of indices to draw.
    pub fn elements(&self) -> usize {
        self.indices.len().min(i32::MAX as usize)
    }
}

/// Lighting shaders only use vertex alpha when they say so, and never
/// for tree animation (which keeps sway weights there).
fn ignores_vertex_alpha(shader: Option<&ShaderProperty>) -> bool {
    match shader {
        Some(s) if !s.is_effect() => !s.has_vertex_alpha() || s.has_tree_anim(),
        _ => false,
    }
}

pub struct ShapeRecord {
    pub name: String,
    pub model: Matrix4<f32>,
    pub material: Material<GpuTexture>,
    pub positions: VertexBuffer<PositionAttr>,
    pub normals: VertexBuffer<NormalAttr>,
    pub tangents: VertexBuffer<TangentAttr>,
    pub bitangents: VertexBuffer<BitangentAttr>,
    pub uvs: VertexBuffer<TexCoordAttr>,
    pub colors: VertexBuffer<ColorAttr>,
    pub indices: IndexBuffer<u16>,
    pub elements: usize,
}

impl ShapeRecord {
    pub fn new(
        display: &Display,
        nif: &NifFile,
        shape: &Shape,
        textures: &mut TextureManager,
    ) -> Result<ShapeRecord> {
        let geom = match shape.geometry {
            Some(ref g) => g.clone(),
            None => bail!("shape {:?} has no geometry", shape.name),
        };
        let shader = nif.shader(shape);
        let streams = Streams::build(geom, shader);

        let positions: Vec<PositionAttr> =
            streams.positions.iter().map(|&position| PositionAttr { position }).collect();
        let normals: Vec<NormalAttr> =
            streams.normals.iter().map(|&normal| NormalAttr { normal }).collect();
        let tangents: Vec<TangentAttr> =
            streams.tangents.iter().map(|&tangent| TangentAttr { tangent }).collect();
        let bitangents: Vec<BitangentAttr> =
            streams.bitangents.iter().map(|&bitangent| BitangentAttr { bitangent }).collect();
        let uvs: Vec<TexCoordAttr> =
            streams.uvs.iter().map(|&uv| TexCoordAttr { texCoord: uv }).collect();
        let colors: Vec<ColorAttr> =
            streams.colors.iter().map(|&color| ColorAttr { color }).collect();

        let mut material = Material::capture(shader, nif.alpha_property(shape), nif.version().is_fo4());
        let slots = match shader {
            Some(_) => Some(nif.texture_slots(shape).unwrap_or_default()),
            None => None,
        };
        material.resolve_textures(slots.as_ref().map(|s| &s[..]), textures);
        debug!("shape {:?}: {:?}", shape.name, material.pipeline);

        Ok(ShapeRecord {
            name: shape.name.clone(),
            model: nif.global_transform(shape),
            material,
            positions: VertexBuffer::new(display, &positions)?,
            normals: VertexBuffer::new(display, &normals)?,
            tangents: VertexBuffer::new(display, &tangents)?,
            bitangents: VertexBuffer::new(display, &bitangents)?,
            uvs: VertexBuffer::new(display, &uvs)?,
            colors: VertexBuffer::new(display, &colors)?,
            indices: IndexBuffer::new(display, PrimitiveType::TrianglesList, &streams.indices)?,
            elements: streams.elements(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nif::shader::{flags1, flags2};
    use crate::nif::test_util::*;
    use crate::nif::Transform;

    fn shader_with(flags1: u32, flags2: u32, effect: bool) -> ShaderProperty {
        let mut nif = NifBuilder::new(100);
        let shader = if effect {
            nif.effect_shader(&EffectShaderDesc { flags1, flags2, ..EffectShaderDesc::default() })
        } else {
            nif.lighting_shader(&LightingShaderDesc { flags1, flags2, ..LightingShaderDesc::default() })
        };
        let shape = nif.bs_tri_shape("S", Transform::default(), &quad(), shader, -1);
        nif.node("Root", Transform::default(), &[shape]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();
        file.shader(&file.shapes()[0]).unwrap().clone()
    }

    fn translucent_quad() -> Geometry {
        let q = quad();
        Geometry {
            vertices: q.vertices,
            normals: q.normals,
            uvs: q.uvs,
            colors: vec![[1.0, 0.0, 0.0, 0.25]; 4],
            triangles: q.triangles,
            ..Geometry::default()
        }
    }

    #[test]
    fn vertex_alpha_forced_opaque_without_flag() {
        let shader = shader_with(flags1::Z_BUFFER_TEST, 0, false);
        let s = Streams::build(translucent_quad(), Some(&shader));
        assert!(s.colors.iter().all(|c| c[3] == 1.0));
        assert_eq!(s.colors[0][0], 1.0);
    }

    #[test]
    fn vertex_alpha_kept_with_flag() {
        let shader = shader_with(flags1::VERTEX_ALPHA, 0, false);
        let s = Streams::build(translucent_quad(), Some(&shader));
        assert!(s.colors.iter().all(|c| c[3] == 0.25));

        let shader = shader_with(flags1::VERTEX_ALPHA, flags2::TREE_ANIM, false);
        let s = Streams::build(translucent_quad(), Some(&shader));
        assert!(s.colors.iter().all(|c| c[3] == 1.0));
    }

    #[test]
    fn effect_shaders_keep_vertex_alpha() {
        let shader = shader_with(0, 0, true);
        let s = Streams::build(translucent_quad(), Some(&shader));
        assert!(s.colors.iter().all(|c| c[3] == 0.25));
        let s = Streams::build(translucent_quad(), None);
        assert!(s.colors.iter().all(|c| c[3] == 0.25));
    }

    #[test]
    fn streams_are_complete() {
        let q = quad();
        let geom = Geometry { vertices: q.vertices, triangles: q.triangles, ..Geometry::default() };
        let s = Streams::build(geom, None);
        assert_eq!(s.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(s.elements(), 6);
        for len in &[s.normals.len(), s.tangents.len(), s.bitangents.len(), s.uvs.len(), s.colors.len()] {
            assert_eq!(*len, 4);
        }
        assert_eq!(s.colors[0], [1.0; 4]);
    }
}
