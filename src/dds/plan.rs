//! The sequence of image uploads needed to put a `Texture` on the GPU.
//!
//! One entry per (layer, face, level), in that nesting order. Keeping
//! this separate from the GL calls lets it be checked without a context.

use super::format::{translate, GpuFormat};
use super::{Target, Texture};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UploadCall {
    Compressed1d,
    Compressed2d,
    Compressed3d,
    Uncompressed1d,
    Uncompressed2d,
    Uncompressed3d,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Upload {
    pub layer: u32,
    pub face: u32,
    pub level: u32,
    pub call: UploadCall,
    /// Which cube face this writes, if the target is a cube.
    pub cube_face: Option<u32>,
    /// Size arguments, with unused trailing dimensions set to 1. Array
    /// targets pass the layer in place of the next dimension.
    pub size: [u32; 3],
}

pub fn plan(tex: &Texture) -> Vec<Upload> {
    let compressed = match translate(tex.format).gpu {
        GpuFormat::Compressed(_) => true,
        _ => false,
    };

    let mut uploads = Vec::with_capacity((tex.layers * tex.faces * tex.levels) as usize);
    for layer in 0..tex.layers {
        for face in 0..tex.faces {
            for level in 0..tex.levels {
                let (x, y, z) = tex.extent(level);
                let (dims, size) = match tex.target {
                    Target::Tex1d => (1, [x, 1, 1]),
                    Target::Tex1dArray => (2, [x, layer, 1]),
                    Target::Tex2d | Target::Cube => (2, [x, y, 1]),
                    Target::Tex2dArray | Target::CubeArray => (3, [x, y, layer]),
                    Target::Tex3d => (3, [x, y, z]),
                };
                let call = match (compressed, dims) {
                    (true, 1) => UploadCall::Compressed1d,
                    (true, 2) => UploadCall::Compressed2d,
                    (true, _) => UploadCall::Compressed3d,
                    (false, 1) => UploadCall::Uncompressed1d,
                    (false, 2) => UploadCall::Uncompressed2d,
                    (false, _) => UploadCall::Uncompressed3d,
                };
                let cube_face = if tex.target.is_cube() { Some(face) } else { None };
                uploads.push(Upload { layer, face, level, call, cube_face, size });
            }
        }
    }
    uploads
}
