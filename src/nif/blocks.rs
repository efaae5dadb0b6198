//! Decoding of individual blocks.
//!
//! Only the block types the previewer needs are decoded; everything
//! else is kept as `Block::Other` with its type name. Subclasses are
//! read through the prefix they share with their parent (eg. every
//! `NiNode` subclass is read as a node) since block sizes let us skip
//! whatever trailing fields they add.

use super::shader::{self, AlphaProperty, ShaderProperty};
use super::stream::Stream;
use super::{BoundingSphere, Geometry, Transform};
use crate::errors::Result;
use crate::util::bits::BitField;

#[derive(Debug, Clone)]
pub enum Block {
    Node(Node),
    /// BSTriShape and subclasses; geometry is stored inline.
    TriShape(TriShape),
    /// NiTriShape/NiTriStrips; geometry lives in a separate data block.
    TriGeometry(TriGeometry),
    TriData(Geometry),
    Shader(ShaderProperty),
    Alpha(AlphaProperty),
    TextureSet(Vec<String>),
    Other(String),
}

#[derive(Debug, Clone)]
pub struct AvObject {
    pub name: String,
    pub flags: u32,
    pub transform: Transform,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub av: AvObject,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct TriShape {
    pub av: AvObject,
    pub shader: Option<usize>,
    pub alpha: Option<usize>,
    pub vertex_desc: u64,
    pub geometry: Geometry,
}

#[derive(Debug, Clone)]
pub struct TriGeometry {
    pub av: AvObject,
    pub data: Option<usize>,
    pub shader: Option<usize>,
    pub alpha: Option<usize>,
}

pub struct ObjectNet {
    pub shader_type: u32,
    pub name: String,
}

pub fn read_block(type_name: &str, s: &mut Stream) -> Result<Block> {
    Ok(match type_name {
        "NiNode" | "BSFadeNode" | "BSLeafAnimNode" | "BSTreeNode" | "BSMultiBoundNode"
        | "BSOrderedNode" | "BSValueNode" | "BSBlastNode" | "BSDamageStage"
        | "BSMasterParticleSystem" | "BSFaceGenNiNode" | "NiBillboardNode"
        | "NiSwitchNode" | "NiLODNode" | "NiSortAdjustNode" | "BSRangeNode"
        | "BSDebrisNode" | "NiBone" => Block::Node(read_node(s)?),
        "NiTriShape" | "NiTriStrips" | "BSLODTriShape" | "BSSegmentedTriShape" => {
            Block::TriGeometry(read_tri_geometry(s)?)
        }
        "NiTriShapeData" => Block::TriData(read_geometry_data(s, false)?),
        "NiTriStripsData" => Block::TriData(read_geometry_data(s, true)?),
        "BSTriShape" | "BSMeshLODTriShape" | "BSSubIndexTriShape" => {
            Block::TriShape(read_tri_shape(s, false)?)
        }
        "BSDynamicTriShape" => Block::TriShape(read_tri_shape(s, true)?),
        "BSLightingShaderProperty" => {
            Block::Shader(ShaderProperty::Lighting(shader::read_lighting_shader(s)?))
        }
        "BSEffectShaderProperty" => {
            Block::Shader(ShaderProperty::Effect(shader::read_effect_shader(s)?))
        }
        "NiAlphaProperty" => Block::Alpha(shader::read_alpha_property(s)?),
        "BSShaderTextureSet" => Block::TextureSet(shader::read_texture_set(s)?),
        _ => Block::Other(type_name.to_string()),
    })
}

pub fn read_object_net(s: &mut Stream, is_lighting_shader: bool) -> Result<ObjectNet> {
    let bs = s.bs();
    let shader_type = if is_lighting_shader && bs >= 83 && bs < 155 { s.u32()? } else { 0 };
    let name = s.string()?;
    s.ref_list()?; // extra data
    s.block_ref()?; // controller
    Ok(ObjectNet { shader_type, name })
}

fn read_av_object(s: &mut Stream) -> Result<AvObject> {
    let name = read_object_net(s, false)?.name;
    let flags = s.u32()?;
    let translation = s.vec3()?;
    let rotation = s.matrix33()?;
    let scale = s.f32()?;
    s.block_ref()?; // collision object
    Ok(AvObject {
        name,
        flags,
        transform: Transform { translation, rotation, scale },
    })
}

fn read_node(s: &mut Stream) -> Result<Node> {
    let av = read_av_object(s)?;
    let children = s.ref_list()?;
    if s.bs() < 130 {
        s.ref_list()?; // effects
    }
    Ok(Node { av, children })
}

fn read_tri_geometry(s: &mut Stream) -> Result<TriGeometry> {
    let av = read_av_object(s)?;
    let data = s.block_ref()?;
    s.block_ref()?; // skin instance

    // material data
    let num_materials = s.u32()? as usize;
    s.bytes(num_materials.saturating_mul(8))?; // names + extra data
    s.i32()?; // active material
    s.u8()?; // needs update

    let shader = s.block_ref()?;
    let alpha = s.block_ref()?;
    Ok(TriGeometry { av, data, shader, alpha })
}

fn read_geometry_data(s: &mut Stream, is_strips: bool) -> Result<Geometry> {
    s.i32()?; // group id
    let num_vertices = s.u16()? as usize;
    s.u8()?; // keep flags
    s.u8()?; // compress flags

    let mut geo = Geometry::default();
    if s.bool()? {
        geo.vertices = s.vec3_array(num_vertices)?;
    }
    let vector_flags = s.u16()?;
    if s.bool()? {
        geo.normals = s.vec3_array(num_vertices)?;
        if vector_flags.bit(12) {
            geo.tangents = s.vec3_array(num_vertices)?;
            geo.bitangents = s.vec3_array(num_vertices)?;
        }
    }
    let center = s.vec3()?;
    let radius = s.f32()?;
    geo.bounds = BoundingSphere { center, radius };
    if s.bool()? {
        geo.colors = s.color4_array(num_vertices)?;
    }
    let num_uv_sets = vector_flags.bits(0, 6) as usize;
    if num_uv_sets > 0 {
        geo.uvs = s.vec2_array(num_vertices)?;
        // Only the first UV set is used
        for _ in 1..num_uv_sets {
            s.vec2_array(num_vertices)?;
        }
    }
    s.u16()?; // consistency flags
    s.block_ref()?; // additional data

    let num_triangles = s.u16()? as usize;
    if is_strips {
        let num_strips = s.u16()? as usize;
        let lengths = s.u16_array(num_strips)?;
        if s.bool()? {
            let mut tris = Vec::with_capacity(num_triangles.min(s.remaining() / 2));
            for &len in &lengths {
                let points = s.u16_array(len as usize)?;
                strip_to_triangles(&points, &mut tris);
            }
            geo.triangles = tris;
        }
    } else {
        s.u32()?; // num triangle points
        if s.bool()? {
            geo.triangles = s.triangles(num_triangles)?;
        }
        // match groups follow; nothing we need
    }
    Ok(geo)
}

/// Unrolls a triangle strip, flipping every other triangle to keep the
/// winding consistent and dropping degenerate ones.
pub fn strip_to_triangles(points: &[u16], out: &mut Vec<[u16; 3]>) {
    for i in 2..points.len() {
        let (a, b, c) = (points[i - 2], points[i - 1], points[i]);
        if a == b || b == c || a == c {
            continue;
        }
        if i % 2 == 0 {
            out.push([a, b, c]);
        } else {
            out.push([a, c, b]);
        }
    }
}

/// Vertex attribute bits in the high part of a BSTriShape vertex
/// descriptor.
pub mod vertex_attr {
    pub const VERTEX: u64 = 0x001;
    pub const UVS: u64 = 0x002;
    pub const NORMALS: u64 = 0x008;
    pub const TANGENTS: u64 = 0x010;
    pub const COLORS: u64 = 0x020;
    pub const SKINNED: u64 = 0x040;
    pub const EYE_DATA: u64 = 0x100;
    pub const FULL_PRECISION: u64 = 0x400;
}

fn read_tri_shape(s: &mut Stream, is_dynamic: bool) -> Result<TriShape> {
    use self::vertex_attr::*;

    let av = read_av_object(s)?;
    let center = s.vec3()?;
    let radius = s.f32()?;
    s.block_ref()?; // skin instance
    let shader = s.block_ref()?;
    let alpha = s.block_ref()?;
    let vertex_desc = s.u64()?;
    let num_triangles = if s.bs() >= 130 { s.u32()? as usize } else { s.u16()? as usize };
    let num_vertices = s.u16()? as usize;
    let data_size = s.u32()?;

    let attrs = vertex_desc.bits(44, 56);
    let stride = vertex_desc.bits(0, 4) as usize * 4;

    let mut geo = Geometry::default();
    geo.bounds = BoundingSphere { center, radius };

    if data_size > 0 {
        let full_precision = attrs & FULL_PRECISION != 0 || s.bs() == 100;
        let has = |bit: u64| attrs & bit != 0;

        for _ in 0..num_vertices {
            let start = s.pos();
            let mut bitangent = [0.0; 3];
            if has(VERTEX) {
                if full_precision {
                    geo.vertices.push(s.vec3()?);
                    bitangent[0] = s.f32()?;
                } else {
                    geo.vertices.push([s.half()?, s.half()?, s.half()?]);
                    bitangent[0] = s.half()?;
                }
            }
            if has(UVS) {
                geo.uvs.push([s.half()?, s.half()?]);
            }
            if has(NORMALS) {
                geo.normals.push([unorm8(s.u8()?), unorm8(s.u8()?), unorm8(s.u8()?)]);
                bitangent[1] = unorm8(s.u8()?);
            }
            if has(TANGENTS) {
                geo.tangents.push([unorm8(s.u8()?), unorm8(s.u8()?), unorm8(s.u8()?)]);
                bitangent[2] = unorm8(s.u8()?);
                geo.bitangents.push(bitangent);
            }
            if has(COLORS) {
                let c = [s.u8()?, s.u8()?, s.u8()?, s.u8()?];
                geo.colors.push([
                    c[0] as f32 / 255.0,
                    c[1] as f32 / 255.0,
                    c[2] as f32 / 255.0,
                    c[3] as f32 / 255.0,
                ]);
            }
            // Skin weights and eye data aren't used; skip to the next
            // vertex via the stride.
            let read = s.pos() - start;
            if stride < read {
                bail!("vertex stride {} is smaller than its attributes ({})", stride, read);
            }
            s.skip(stride - read)?;
        }
        geo.triangles = s.triangles(num_triangles)?;
    }

    if s.bs() == 100 {
        let particle_data_size = s.u32()?;
        if particle_data_size > 0 {
            // half-precision positions and normals, then triangles
            s.skip(num_vertices * 6 * 2 + num_triangles * 6)?;
        }
    }

    if is_dynamic {
        let dynamic_size = s.u32()? as usize;
        let count = dynamic_size / 16;
        let mut positions = Vec::with_capacity(count.min(s.remaining() / 16));
        for _ in 0..count {
            let v = s.vec4()?;
            positions.push([v[0], v[1], v[2]]);
        }
        if positions.len() == num_vertices {
            geo.vertices = positions;
        }
    }

    Ok(TriShape { av, shader, alpha, vertex_desc, geometry: geo })
}

/// Maps a byte in [0, 255] to [-1, 1].
fn unorm8(b: u8) -> f32 {
    b as f32 / 255.0 * 2.0 - 1.0
}

#[test]
fn test_strip_to_triangles() {
    let mut tris = vec![];
    strip_to_triangles(&[0, 1, 2, 3, 4], &mut tris);
    assert_eq!(tris, vec![[0, 1, 2], [1, 3, 2], [2, 3, 4]]);

    // Degenerate triangles used to stitch strips are dropped
    let mut tris = vec![];
    strip_to_triangles(&[0, 1, 1, 2], &mut tris);
    assert!(tris.is_empty());
}
