//! Builds small NIF files in memory for tests.

use super::header::FILE_VERSION;
use super::shader::{flags1, flags2};
use super::Transform;
use half::f16;

#[derive(Default)]
pub struct ByteWriter {
    pub buf: Vec<u8>,
}

impl ByteWriter {
    pub fn u8(&mut self, x: u8) { self.buf.push(x); }
    pub fn u16(&mut self, x: u16) { self.buf.extend_from_slice(&x.to_le_bytes()); }
    pub fn u32(&mut self, x: u32) { self.buf.extend_from_slice(&x.to_le_bytes()); }
    pub fn u64(&mut self, x: u64) { self.buf.extend_from_slice(&x.to_le_bytes()); }
    pub fn i32(&mut self, x: i32) { self.buf.extend_from_slice(&x.to_le_bytes()); }
    pub fn f32(&mut self, x: f32) { self.buf.extend_from_slice(&x.to_le_bytes()); }
    pub fn half(&mut self, x: f32) { self.u16(f16::from_f32(x).to_bits()); }
    pub fn floats(&mut self, xs: &[f32]) {
        for &x in xs {
            self.f32(x);
        }
    }
    pub fn bytes(&mut self, b: &[u8]) { self.buf.extend_from_slice(b); }
    pub fn sized_string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.bytes(s.as_bytes());
    }
    pub fn export_string(&mut self, s: &str) {
        self.u8(s.len() as u8 + 1);
        self.bytes(s.as_bytes());
        self.u8(0);
    }
}

pub struct TestMesh {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub triangles: Vec<[u16; 3]>,
}

/// A unit quad in the XY plane facing +Z.
pub fn quad() -> TestMesh {
    TestMesh {
        vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        triangles: vec![[0, 1, 2], [0, 2, 3]],
    }
}

pub fn translation(x: f32, y: f32, z: f32) -> Transform {
    Transform { translation: [x, y, z], ..Transform::default() }
}

pub struct LightingShaderDesc {
    pub shader_type: u32,
    pub flags1: u32,
    pub flags2: u32,
    pub texture_set: i32,
    pub uv_offset: [f32; 2],
    pub uv_scale: [f32; 2],
    pub emissive_color: [f32; 3],
    pub emissive_multiple: f32,
    pub alpha: f32,
    pub glossiness: f32,
    pub specular_color: [f32; 3],
    pub specular_strength: f32,
    pub softlight: f32,
    pub rimlight_power: f32,
    pub tint_color: [f32; 3],
}

impl Default for LightingShaderDesc {
    fn default() -> LightingShaderDesc {
        LightingShaderDesc {
            shader_type: 0,
            flags1: flags1::Z_BUFFER_TEST | flags1::SPECULAR,
            flags2: flags2::Z_BUFFER_WRITE,
            texture_set: -1,
            uv_offset: [0.0, 0.0],
            uv_scale: [1.0, 1.0],
            emissive_color: [0.0, 0.0, 0.0],
            emissive_multiple: 1.0,
            alpha: 1.0,
            glossiness: 80.0,
            specular_color: [1.0, 1.0, 1.0],
            specular_strength: 1.0,
            softlight: 0.3,
            rimlight_power: 2.0,
            tint_color: [1.0, 0.5, 0.25],
        }
    }
}

pub struct EffectShaderDesc {
    pub flags1: u32,
    pub flags2: u32,
    pub source_texture: String,
    pub greyscale_texture: String,
    pub base_color: [f32; 4],
    pub base_color_scale: f32,
}

impl Default for EffectShaderDesc {
    fn default() -> EffectShaderDesc {
        EffectShaderDesc {
            flags1: flags1::Z_BUFFER_TEST,
            flags2: 0,
            source_texture: "textures\\effects\\glow.dds".to_string(),
            greyscale_texture: String::new(),
            base_color: [1.0, 1.0, 1.0, 0.5],
            base_color_scale: 2.0,
        }
    }
}

pub struct NifBuilder {
    bsver: u32,
    strings: Vec<String>,
    blocks: Vec<(String, Vec<u8>)>,
}

impl NifBuilder {
    pub fn new(bsver: u32) -> NifBuilder {
        NifBuilder { bsver, strings: vec![], blocks: vec![] }
    }

    fn string_index(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return u32::MAX;
        }
        match self.strings.iter().position(|x| x == s) {
            Some(i) => i as u32,
            None => {
                self.strings.push(s.to_string());
                self.strings.len() as u32 - 1
            }
        }
    }

    pub fn raw_block(&mut self, type_name: &str, data: Vec<u8>) -> i32 {
        self.blocks.push((type_name.to_string(), data));
        self.blocks.len() as i32 - 1
    }

    fn object_net(&mut self, w: &mut ByteWriter, name: &str, shader_type: Option<u32>) {
        if let Some(ty) = shader_type {
            w.u32(ty);
        }
        let idx = self.string_index(name);
        w.u32(idx);
        w.u32(0); // extra data
        w.i32(-1); // controller
    }

    fn av_object(&mut self, w: &mut ByteWriter, name: &str, xf: Transform) {
        self.object_net(w, name, None);
        w.u32(14);
        w.floats(&xf.translation);
        for row in &xf.rotation {
            w.floats(row);
        }
        w.f32(xf.scale);
        w.i32(-1); // collision
    }

    pub fn node(&mut self, name: &str, xf: Transform, children: &[i32]) -> i32 {
        let mut w = ByteWriter::default();
        self.av_object(&mut w, name, xf);
        w.u32(children.len() as u32);
        for &c in children {
            w.i32(c);
        }
        if self.bsver < 130 {
            w.u32(0); // effects
        }
        self.raw_block("NiNode", w.buf)
    }

    pub fn texture_set(&mut self, paths: &[&str]) -> i32 {
        let mut w = ByteWriter::default();
        w.u32(paths.len() as u32);
        for p in paths {
            w.sized_string(p);
        }
        self.raw_block("BSShaderTextureSet", w.buf)
    }

    pub fn alpha_property(&mut self, flags: u16, threshold: u8) -> i32 {
        let mut w = ByteWriter::default();
        self.object_net(&mut w, "", None);
        w.u16(flags);
        w.u8(threshold);
        self.raw_block("NiAlphaProperty", w.buf)
    }

    pub fn lighting_shader(&mut self, d: &LightingShaderDesc) -> i32 {
        let mut w = ByteWriter::default();
        self.object_net(&mut w, "Material", Some(d.shader_type));
        w.u32(d.flags1);
        w.u32(d.flags2);
        w.floats(&d.uv_offset);
        w.floats(&d.uv_scale);
        w.i32(d.texture_set);
        w.floats(&d.emissive_color);
        w.f32(d.emissive_multiple);
        if self.bsver >= 130 {
            w.u32(u32::MAX); // wet material
        }
        w.u32(3); // clamp mode
        w.f32(d.alpha);
        w.f32(1.0); // refraction
        w.f32(d.glossiness);
        w.floats(&d.specular_color);
        w.f32(d.specular_strength);
        if self.bsver < 130 {
            w.f32(d.softlight);
            w.f32(d.rimlight_power);
        } else {
            w.f32(0.3); // subsurface rolloff
            w.f32(d.rimlight_power);
            w.f32(1.0); // grayscale to palette
            w.f32(5.0); // fresnel
            w.floats(&[-1.0, -1.0, -1.0, -1.0, -1.0, -1.0]);
        }
        match d.shader_type {
            5 | 6 => w.floats(&d.tint_color),
            11 => w.floats(&[0.5, 0.8, 2.0, 3.0, 0.25]),
            _ => (),
        }
        self.raw_block("BSLightingShaderProperty", w.buf)
    }

    pub fn effect_shader(&mut self, d: &EffectShaderDesc) -> i32 {
        let mut w = ByteWriter::default();
        self.object_net(&mut w, "Effect", None);
        w.u32(d.flags1);
        w.u32(d.flags2);
        w.floats(&[0.0, 0.0, 1.0, 1.0]);
        w.sized_string(&d.source_texture);
        w.bytes(&[3, 255, 0, 0]);
        w.floats(&[1.0, 1.0, 1.0, 0.0]);
        w.floats(&d.base_color);
        w.f32(d.base_color_scale);
        w.f32(100.0);
        w.sized_string(&d.greyscale_texture);
        if self.bsver >= 130 {
            w.sized_string("");
            w.sized_string("");
            w.sized_string("");
            w.f32(1.0);
        }
        self.raw_block("BSEffectShaderProperty", w.buf)
    }

    pub fn bs_tri_shape(
        &mut self,
        name: &str,
        xf: Transform,
        mesh: &TestMesh,
        shader: i32,
        alpha: i32,
    ) -> i32 {
        let mut w = ByteWriter::default();
        self.av_object(&mut w, name, xf);
        w.floats(&[0.5, 0.5, 0.0, 0.75]); // bounding sphere
        w.i32(-1); // skin
        w.i32(shader);
        w.i32(alpha);

        // position + bitangent x, UV, normal + bitangent y
        let attrs: u64 = 0x001 | 0x002 | 0x008 | 0x400;
        let stride_words = (16 + 4 + 4) / 4;
        w.u64(stride_words | attrs << 44);
        if self.bsver >= 130 {
            w.u32(mesh.triangles.len() as u32);
        } else {
            w.u16(mesh.triangles.len() as u16);
        }
        w.u16(mesh.vertices.len() as u16);
        w.u32((mesh.vertices.len() * 24 + mesh.triangles.len() * 6) as u32);
        for i in 0..mesh.vertices.len() {
            w.floats(&mesh.vertices[i]);
            w.f32(0.0);
            w.half(mesh.uvs[i][0]);
            w.half(mesh.uvs[i][1]);
            for &n in &mesh.normals[i] {
                w.u8(((n + 1.0) / 2.0 * 255.0).round() as u8);
            }
            w.u8(128);
        }
        for t in &mesh.triangles {
            w.u16(t[0]);
            w.u16(t[1]);
            w.u16(t[2]);
        }
        if self.bsver == 100 {
            w.u32(0); // particle data
        }
        self.raw_block("BSTriShape", w.buf)
    }

    pub fn ni_tri_shape(&mut self, name: &str, mesh: &TestMesh, shader: i32, alpha: i32) -> i32 {
        let mut d = ByteWriter::default();
        d.i32(0);
        d.u16(mesh.vertices.len() as u16);
        d.u8(0);
        d.u8(0);
        d.u8(1);
        for v in &mesh.vertices {
            d.floats(v);
        }
        d.u16(1); // one UV set
        d.u8(1);
        for n in &mesh.normals {
            d.floats(n);
        }
        d.floats(&[0.5, 0.5, 0.0, 0.75]);
        d.u8(0); // no colors
        for uv in &mesh.uvs {
            d.floats(uv);
        }
        d.u16(0);
        d.i32(-1);
        d.u16(mesh.triangles.len() as u16);
        d.u32(mesh.triangles.len() as u32 * 3);
        d.u8(1);
        for t in &mesh.triangles {
            d.u16(t[0]);
            d.u16(t[1]);
            d.u16(t[2]);
        }
        d.u16(0); // match groups
        let data = self.raw_block("NiTriShapeData", d.buf);

        let mut w = ByteWriter::default();
        self.av_object(&mut w, name, Transform::default());
        w.i32(data);
        w.i32(-1); // skin
        w.u32(0); // materials
        w.i32(-1);
        w.u8(0);
        w.i32(shader);
        w.i32(alpha);
        self.raw_block("NiTriShape", w.buf)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut w = ByteWriter::default();
        w.bytes(b"Gamebryo File Format, Version 20.2.0.7\n");
        w.u32(FILE_VERSION);
        w.u8(1);
        w.u32(12);
        w.u32(self.blocks.len() as u32);
        w.u32(self.bsver);
        w.export_string("tests");
        w.export_string("");
        w.export_string("");
        if self.bsver >= 103 {
            w.export_string("");
        }

        let mut types: Vec<&str> = vec![];
        for (ty, _) in &self.blocks {
            if !types.contains(&ty.as_str()) {
                types.push(ty);
            }
        }
        w.u16(types.len() as u16);
        for ty in &types {
            w.sized_string(ty);
        }
        for (ty, _) in &self.blocks {
            w.u16(types.iter().position(|t| *t == ty.as_str()).unwrap() as u16);
        }
        for (_, data) in &self.blocks {
            w.u32(data.len() as u32);
        }
        w.u32(self.strings.len() as u32);
        w.u32(self.strings.iter().map(|s| s.len()).max().unwrap_or(0) as u32);
        for s in &self.strings {
            w.sized_string(s);
        }
        w.u32(0); // groups

        for (_, data) in &self.blocks {
            w.bytes(data);
        }
        w.buf
    }
}
