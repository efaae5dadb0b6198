//! Reader for Bethesda NIF meshes (Skyrim, Skyrim SE and Fallout 4).
//!
//! `NifFile::from_bytes` parses the header and decodes the blocks the
//! previewer cares about: nodes, shapes and their geometry, shader and
//! alpha properties and texture sets. The parent/child relation between
//! blocks is kept in a petgraph `Graph` so global transforms can be
//! computed by walking up from a shape to the root.

pub mod blocks;
pub mod header;
pub mod shader;
pub mod stream;
#[cfg(test)]
pub mod test_util;

use self::blocks::Block;
use self::header::Header;
use self::shader::{AlphaProperty, ShaderProperty};
use self::stream::Stream;
use crate::errors::{Result, ResultExt};
use crate::util::cur::Cur;
use cgmath::{Matrix3, Matrix4, Vector3};
use petgraph::graph::{Graph, NodeIndex};
use petgraph::Direction;
use std::fs;
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Version {
    pub file: u32,
    pub user: u32,
    /// The Bethesda stream version: 83 Skyrim, 100 Skyrim SE, 130
    /// Fallout 4.
    pub stream: u32,
}

impl Version {
    pub fn is_fo4(&self) -> bool {
        self.stream >= 130
    }
}

/// Local transform of a scene-graph object. The rotation is stored
/// row-major, exactly as in the file.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: [f32; 3],
    pub rotation: [[f32; 3]; 3],
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Transform {
        Transform {
            translation: [0.0; 3],
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Translate * Rotate * Scale.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let r = self.rotation;
        // cgmath takes columns
        let rot = Matrix3::new(
            r[0][0], r[1][0], r[2][0],
            r[0][1], r[1][1], r[2][1],
            r[0][2], r[1][2], r[2][2],
        );
        Matrix4::from_translation(Vector3::from(self.translation))
            * Matrix4::from(rot)
            * Matrix4::from_scale(self.scale)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: [f32; 3],
    pub radius: f32,
}

/// Per-vertex streams and triangles of a shape. An empty stream means
/// the shape doesn't carry that attribute.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub triangles: Vec<[u16; 3]>,
    pub bounds: BoundingSphere,
}

impl Geometry {
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }
}

/// A drawable shape and the blocks it references.
#[derive(Debug, Clone)]
pub struct Shape {
    pub block: usize,
    pub name: String,
    pub flags: u32,
    pub transform: Transform,
    /// `None` if the shape's geometry is missing or unreadable.
    pub geometry: Option<Geometry>,
    shader: Option<usize>,
    alpha: Option<usize>,
}

impl Shape {
    /// The "hidden" bit of NiAVObject flags.
    pub fn is_hidden(&self) -> bool {
        self.flags & 1 != 0
    }
}

/// Number of texture slots in a BSShaderTextureSet.
pub const TEXTURE_SLOTS: usize = 10;

pub struct NifFile {
    pub header: Header,
    blocks: Vec<Block>,
    shapes: Vec<Shape>,
    graph: Graph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl NifFile {
    pub fn load(path: &Path) -> Result<NifFile> {
        let buf = fs::read(path)
            .chain_err(|| format!("couldn't read {}", path.display()))?;
        NifFile::from_bytes(&buf)
            .chain_err(|| format!("couldn't parse {}", path.display()))
    }

    pub fn from_bytes(buf: &[u8]) -> Result<NifFile> {
        let mut cur = Cur::new(buf);
        let header = header::read_header(&mut cur)?;
        let version = header.version;

        let num_blocks = header.num_blocks();
        let mut blocks = Vec::with_capacity(num_blocks);
        for i in 0..num_blocks {
            let size = header.block_sizes[i] as usize;
            let type_name = header.block_type(i);
            let data = cur.next_n_u8s(size)
                .chain_err(|| format!("block {} ({}) runs past the end of the file", i, type_name))?;
            let mut s = Stream::new(data, version, &header.strings);
            let block = match blocks::read_block(type_name, &mut s) {
                Ok(block) => block,
                Err(e) => {
                    warn!("couldn't read block {} ({}): {}", i, type_name, e);
                    Block::Other(type_name.to_string())
                }
            };
            trace!("block {}: {} ({} bytes)", i, type_name, size);
            blocks.push(block);
        }

        let mut graph = Graph::new();
        let nodes: Vec<NodeIndex> = (0..blocks.len()).map(|i| graph.add_node(i)).collect();
        for (i, block) in blocks.iter().enumerate() {
            if let Block::Node(ref node) = *block {
                for &child in &node.children {
                    if child < nodes.len() && child != i {
                        graph.add_edge(nodes[i], nodes[child], ());
                    }
                }
            }
        }

        let shapes = collect_shapes(&blocks);
        debug!("read {} blocks, {} shapes", blocks.len(), shapes.len());

        Ok(NifFile { header, blocks, shapes, graph, nodes })
    }

    pub fn version(&self) -> Version {
        self.header.version
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Name of the first node that has no parent.
    pub fn root_name(&self) -> Option<&str> {
        self.blocks.iter().enumerate().find_map(|(i, block)| match *block {
            Block::Node(ref node) if self.parent(i).is_none() => Some(node.av.name.as_str()),
            _ => None,
        })
    }

    pub fn shader(&self, shape: &Shape) -> Option<&ShaderProperty> {
        match self.blocks.get(shape.shader?) {
            Some(Block::Shader(shader)) => Some(shader),
            _ => None,
        }
    }

    pub fn alpha_property(&self, shape: &Shape) -> Option<&AlphaProperty> {
        match self.blocks.get(shape.alpha?) {
            Some(Block::Alpha(alpha)) => Some(alpha),
            _ => None,
        }
    }

    /// The texture paths for a shape, indexed by slot.
    ///
    /// Lighting shaders use their texture set (padded to
    /// `TEXTURE_SLOTS`); `None` if it has none. Effect shaders embed their
    /// textures, which are laid out in the slots the matching lighting
    /// textures would use: source as the base map, normal map, greyscale
    /// palette in the height slot, environment map and mask.
    pub fn texture_slots(&self, shape: &Shape) -> Option<Vec<String>> {
        match *self.shader(shape)? {
            ShaderProperty::Lighting(ref s) => match self.blocks.get(s.texture_set?) {
                Some(Block::TextureSet(textures)) => {
                    let mut slots = textures.clone();
                    slots.resize(slots.len().max(TEXTURE_SLOTS), String::new());
                    Some(slots)
                }
                _ => None,
            },
            ShaderProperty::Effect(ref s) => {
                let mut slots = vec![String::new(); TEXTURE_SLOTS];
                slots[0] = s.source_texture.clone();
                slots[1] = s.normal_texture.clone();
                slots[3] = s.greyscale_texture.clone();
                slots[4] = s.env_map_texture.clone();
                slots[5] = s.env_mask_texture.clone();
                Some(slots)
            }
        }
    }

    fn parent(&self, block: usize) -> Option<usize> {
        let idx = *self.nodes.get(block)?;
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
            .map(|p| self.graph[p])
    }

    /// Composes the shape's local transform with those of every
    /// ancestor node, root included.
    pub fn global_transform(&self, shape: &Shape) -> Matrix4<f32> {
        let mut mat = shape.transform.to_matrix();
        let mut cur = self.parent(shape.block);
        let mut steps = 0;
        while let Some(parent) = cur {
            if steps > self.blocks.len() {
                warn!("cycle in scene graph above block {}", shape.block);
                break;
            }
            if let Block::Node(ref node) = self.blocks[parent] {
                mat = node.av.transform.to_matrix() * mat;
            }
            cur = self.parent(parent);
            steps += 1;
        }
        mat
    }
}

fn collect_shapes(blocks: &[Block]) -> Vec<Shape> {
    let mut shapes = vec![];
    for (i, block) in blocks.iter().enumerate() {
        let shape = match *block {
            Block::TriShape(ref tri) => Shape {
                block: i,
                name: tri.av.name.clone(),
                flags: tri.av.flags,
                transform: tri.av.transform,
                geometry: Some(tri.geometry.clone()),
                shader: tri.shader,
                alpha: tri.alpha,
            },
            Block::TriGeometry(ref tri) => {
                let geometry = match tri.data.and_then(|d| blocks.get(d)) {
                    Some(Block::TriData(geo)) => Some(geo.clone()),
                    _ => None,
                };
                Shape {
                    block: i,
                    name: tri.av.name.clone(),
                    flags: tri.av.flags,
                    transform: tri.av.transform,
                    geometry,
                    shader: tri.shader,
                    alpha: tri.alpha,
                }
            }
            _ => continue,
        };
        shapes.push(shape);
    }
    shapes
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use cgmath::{Vector4, Zero};

    #[test]
    fn reads_bs_tri_shape_scene() {
        let mut nif = NifBuilder::new(100);
        let set = nif.texture_set(&["textures\\a.dds", "textures\\a_n.dds"]);
        let shader = nif.lighting_shader(&LightingShaderDesc {
            texture_set: set,
            ..LightingShaderDesc::default()
        });
        let alpha = nif.alpha_property(0x12ED, 128);
        let shape = nif.bs_tri_shape("Cube", Transform::default(), &quad(), shader, alpha);
        nif.node("Root", Transform::default(), &[shape]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();

        assert_eq!(file.version().stream, 100);
        assert!(!file.version().is_fo4());
        assert_eq!(file.root_name(), Some("Root"));
        assert_eq!(file.shapes().len(), 1);

        let shape = &file.shapes()[0];
        assert_eq!(shape.name, "Cube");
        let geo = shape.geometry.as_ref().unwrap();
        assert_eq!(geo.num_vertices(), 4);
        assert_eq!(geo.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(geo.vertices[2], [1.0, 1.0, 0.0]);
        assert_eq!(geo.uvs[2], [1.0, 1.0]);
        assert!(geo.normals.iter().all(|n| n[2] > 0.99));
        assert!(geo.colors.is_empty());

        let slots = file.texture_slots(shape).unwrap();
        assert_eq!(slots.len(), TEXTURE_SLOTS);
        assert_eq!(slots[1], "textures\\a_n.dds");
        assert_eq!(slots[2], "");

        let alpha = file.alpha_property(shape).unwrap();
        assert_eq!((alpha.flags, alpha.threshold), (0x12ED, 128));
        assert!(!file.shader(shape).unwrap().is_effect());
    }

    #[test]
    fn reads_ni_tri_shape_with_separate_data() {
        let mut nif = NifBuilder::new(83);
        let shape = nif.ni_tri_shape("Plane", &quad(), -1, -1);
        nif.node("Root", Transform::default(), &[shape]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();

        let shape = &file.shapes()[0];
        let geo = shape.geometry.as_ref().unwrap();
        assert_eq!(geo.num_vertices(), 4);
        assert_eq!(geo.num_triangles(), 2);
        assert_eq!(geo.normals.len(), 4);
        assert!(geo.tangents.is_empty());
        assert!(file.shader(shape).is_none());
        assert!(file.texture_slots(shape).is_none());
    }

    #[test]
    fn rejects_unsupported_versions() {
        assert!(NifFile::from_bytes(b"not a nif at all\n").is_err());

        let mut nif = NifBuilder::new(34);
        nif.node("Root", Transform::default(), &[]);
        assert!(NifFile::from_bytes(&nif.build()).is_err());
    }

    #[test]
    fn global_transform_includes_every_ancestor() {
        let mut nif = NifBuilder::new(100);
        let shape = nif.bs_tri_shape("Leaf", translation(0.0, 0.0, 1.0), &quad(), -1, -1);
        let mid = nif.node("Mid", translation(0.0, 2.0, 0.0), &[shape]);
        let mut root_xf = translation(3.0, 0.0, 0.0);
        root_xf.scale = 2.0;
        nif.node("Root", root_xf, &[mid]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();

        let m = file.global_transform(&file.shapes()[0]);
        let origin = m * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(origin, Vector4::new(3.0, 4.0, 2.0, 1.0));
    }

    #[test]
    fn transform_applies_rotation_rows() {
        // 90 degrees about Z: x -> y
        let xf = Transform {
            translation: [0.0; 3],
            rotation: [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            scale: 1.0,
        };
        let v = xf.to_matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((v - Vector4::new(0.0, 1.0, 0.0, 1.0)).truncate().is_zero());
    }

    #[test]
    fn unreadable_blocks_are_skipped() {
        let mut nif = NifBuilder::new(100);
        // A truncated alpha property
        let bad = nif.raw_block("NiAlphaProperty", vec![0, 0]);
        let shape = nif.bs_tri_shape("Cube", Transform::default(), &quad(), -1, bad);
        nif.node("Root", Transform::default(), &[shape]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();
        let shape = &file.shapes()[0];
        assert!(file.alpha_property(shape).is_none());
        assert!(shape.geometry.is_some());
    }

    #[test]
    fn reads_fallout4_skin_tint_shader() {
        let mut nif = NifBuilder::new(130);
        let shader = nif.lighting_shader(&LightingShaderDesc {
            shader_type: 5,
            flags2: shader::flags2::Z_BUFFER_WRITE | shader::flags2::DOUBLE_SIDED,
            ..LightingShaderDesc::default()
        });
        let shape = nif.bs_tri_shape("Body", Transform::default(), &quad(), shader, -1);
        nif.node("Root", Transform::default(), &[shape]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();
        assert!(file.version().is_fo4());

        let shader = file.shader(&file.shapes()[0]).unwrap();
        let lighting = shader.lighting().unwrap();
        assert!(shader.is_skin_tinted());
        assert!(shader.is_double_sided());
        assert!(!shader.has_glowmap());
        assert_eq!(lighting.skin_tint_color, Some([1.0, 0.5, 0.25]));
        assert_eq!(lighting.fresnel_power, 5.0);
        assert_eq!(lighting.glossiness, 80.0);
    }

    #[test]
    fn effect_shader_textures_map_to_slots() {
        let mut nif = NifBuilder::new(83);
        let shader = nif.effect_shader(&EffectShaderDesc {
            greyscale_texture: "textures\\effects\\gradient.dds".to_string(),
            ..EffectShaderDesc::default()
        });
        let shape = nif.ni_tri_shape("Glow", &quad(), shader, -1);
        nif.node("Root", Transform::default(), &[shape]);
        let file = NifFile::from_bytes(&nif.build()).unwrap();

        let shape = &file.shapes()[0];
        let shader = file.shader(shape).unwrap();
        assert!(shader.is_effect());
        assert_eq!(shader.alpha(), 0.5);
        assert_eq!(shader.emissive_multiple(), 2.0);

        let slots = file.texture_slots(shape).unwrap();
        assert_eq!(slots[0], "textures\\effects\\glow.dds");
        assert_eq!(slots[3], "textures\\effects\\gradient.dds");
        assert_eq!(slots[1], "");
    }
}
