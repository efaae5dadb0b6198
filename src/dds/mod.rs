//! DDS texture decoding.
//!
//! `Texture::from_bytes` parses a DDS file (legacy or DX10 header) into
//! its target kind, format and a table of per-image byte ranges laid out
//! layer, then face, then mip level. What actually goes to the GPU is
//! worked out by `plan` and the conversion helpers in `decode`.

pub mod decode;
pub mod format;
pub mod plan;

use self::format::Format;
use crate::errors::Result;
use ddsfile::{Caps2, D3D10ResourceDimension, Dds, MiscFlag};
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Target {
    Tex1d,
    Tex1dArray,
    Tex2d,
    Tex2dArray,
    Tex3d,
    Cube,
    CubeArray,
}

impl Target {
    pub fn is_cube(self) -> bool {
        self == Target::Cube || self == Target::CubeArray
    }
}

pub struct Texture {
    pub target: Target,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layers: u32,
    pub faces: u32,
    pub levels: u32,
    data: Vec<u8>,
    images: Vec<Range<usize>>,
}

impl Texture {
    pub fn from_bytes(bytes: &[u8]) -> Result<Texture> {
        let dds = Dds::read(&mut &bytes[..])?;
        let format = match format::detect(&dds) {
            Some(f) => f,
            None => bail!("unsupported DDS pixel format"),
        };

        let header = &dds.header;
        let width = header.width.max(1);
        let mut height = header.height.max(1);
        let mut depth = header.depth.unwrap_or(1).max(1);
        let mut levels = header.mip_map_count.unwrap_or(1).max(1);

        let (target, layers, faces) = match dds.header10 {
            Some(ref h10) => {
                let array_size = h10.array_size.max(1);
                match h10.resource_dimension {
                    D3D10ResourceDimension::Texture1D if array_size > 1 => (Target::Tex1dArray, array_size, 1),
                    D3D10ResourceDimension::Texture1D => (Target::Tex1d, 1, 1),
                    D3D10ResourceDimension::Texture3D => (Target::Tex3d, 1, 1),
                    _ if h10.misc_flag.contains(MiscFlag::TEXTURECUBE) => {
                        if array_size > 1 {
                            (Target::CubeArray, array_size, 6)
                        } else {
                            (Target::Cube, 1, 6)
                        }
                    }
                    _ if array_size > 1 => (Target::Tex2dArray, array_size, 1),
                    _ => (Target::Tex2d, 1, 1),
                }
            }
            None => {
                if header.caps2.contains(Caps2::CUBEMAP) {
                    (Target::Cube, 1, 6)
                } else if header.caps2.contains(Caps2::VOLUME) && depth > 1 {
                    (Target::Tex3d, 1, 1)
                } else {
                    (Target::Tex2d, 1, 1)
                }
            }
        };
        if target != Target::Tex3d {
            depth = 1;
        }
        if target == Target::Tex1d || target == Target::Tex1dArray {
            height = 1;
        }

        // A full mip chain is as long as it gets; extra levels are dropped.
        let max_levels = 32 - width.max(height).max(depth).leading_zeros();
        if levels > max_levels {
            debug!("dds: clamping {} mip levels to {}", levels, max_levels);
            levels = max_levels;
        }

        // Every image takes at least one 1x1 image worth of bytes, so a
        // count the data can't hold is rejected before allocating.
        let count = (layers as u64)
            .checked_mul(faces as u64)
            .and_then(|n| n.checked_mul(levels as u64));
        let smallest = format.image_size(1, 1, 1).unwrap_or(1).max(1) as u64;
        let count = match count {
            Some(n) if n <= dds.data.len() as u64 / smallest => n as usize,
            _ => bail!("DDS data is truncated: {} layers x {} faces x {} levels in {} bytes",
                layers, faces, levels, dds.data.len()),
        };

        // Work out where every image lives
        let mut images = Vec::with_capacity(count);
        let mut offset = 0usize;
        for _layer in 0..layers {
            for _face in 0..faces {
                for level in 0..levels {
                    let (w, h, d) = mip_extent((width, height, depth), level);
                    let end = format.image_size(w, h, d).and_then(|size| offset.checked_add(size));
                    match end {
                        Some(end) if end <= dds.data.len() => {
                            images.push(offset..end);
                            offset = end;
                        }
                        _ => bail!("DDS data is truncated: image {} of {} overruns {} bytes",
                            images.len(), count, dds.data.len()),
                    }
                }
            }
        }

        trace!("dds: {:?} {:?} {}x{}x{} layers={} faces={} levels={}",
            target, format, width, height, depth, layers, faces, levels);

        Ok(Texture {
            target,
            format,
            width,
            height,
            depth,
            layers,
            faces,
            levels,
            data: dds.data,
            images,
        })
    }

    pub fn extent(&self, level: u32) -> (u32, u32, u32) {
        mip_extent((self.width, self.height, self.depth), level)
    }

    pub fn image(&self, layer: u32, face: u32, level: u32) -> &[u8] {
        let idx = ((layer * self.faces + face) * self.levels + level) as usize;
        &self.data[self.images[idx].clone()]
    }
}

pub fn mip_extent((w, h, d): (u32, u32, u32), level: u32) -> (u32, u32, u32) {
    let shrink = |x: u32| x.checked_shr(level).unwrap_or(0).max(1);
    (shrink(w), shrink(h), shrink(d))
}

/// The shape of a DDS file written by `write_dx10_header`.
#[derive(Debug, Copy, Clone)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    /// Only meaningful for 3D textures.
    pub depth: u32,
    pub levels: u32,
    pub array_size: u32,
    pub dimension: D3D10ResourceDimension,
    pub cube: bool,
    pub dxgi_format: u32,
}

impl Layout {
    pub fn tex2d(width: u32, height: u32, levels: u32, dxgi_format: u32) -> Layout {
        Layout {
            width,
            height,
            depth: 1,
            levels,
            array_size: 1,
            dimension: D3D10ResourceDimension::Texture2D,
            cube: false,
            dxgi_format,
        }
    }
}

/// Builds a DDS file in memory; used to re-wrap archived textures and
/// in tests.
pub fn write_dx10_header(out: &mut Vec<u8>, layout: &Layout) {
    const DDSD_CAPS: u32 = 0x1;
    const DDSD_HEIGHT: u32 = 0x2;
    const DDSD_WIDTH: u32 = 0x4;
    const DDSD_PIXELFORMAT: u32 = 0x1000;
    const DDSD_MIPMAPCOUNT: u32 = 0x20000;
    const DDSD_DEPTH: u32 = 0x80_0000;
    const DDPF_FOURCC: u32 = 0x4;
    const DDSCAPS_COMPLEX: u32 = 0x8;
    const DDSCAPS_TEXTURE: u32 = 0x1000;
    const DDSCAPS_MIPMAP: u32 = 0x40_0000;
    const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0xFE00;
    const DDSCAPS2_VOLUME: u32 = 0x20_0000;
    const MISC_TEXTURECUBE: u32 = 0x4;

    let volume = layout.dimension == D3D10ResourceDimension::Texture3D;
    let mut put = |x: u32| out.extend_from_slice(&x.to_le_bytes());
    put(u32::from_le_bytes(*b"DDS "));
    put(124);
    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT | DDSD_MIPMAPCOUNT;
    if volume {
        flags |= DDSD_DEPTH;
    }
    put(flags);
    put(layout.height);
    put(layout.width);
    put(0); // pitch
    put(if volume { layout.depth } else { 0 });
    put(layout.levels);
    for _ in 0..11 {
        put(0);
    }
    // pixel format
    put(32);
    put(DDPF_FOURCC);
    put(u32::from_le_bytes(*b"DX10"));
    for _ in 0..5 {
        put(0);
    }
    let mut caps = DDSCAPS_TEXTURE;
    if layout.levels > 1 {
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if layout.cube || volume || layout.array_size > 1 {
        caps |= DDSCAPS_COMPLEX;
    }
    put(caps);
    let mut caps2 = 0;
    if layout.cube {
        caps2 |= DDSCAPS2_CUBEMAP_ALL_FACES;
    }
    if volume {
        caps2 |= DDSCAPS2_VOLUME;
    }
    put(caps2);
    put(0);
    put(0);
    put(0);
    // DX10 header
    put(layout.dxgi_format);
    put(layout.dimension as u32);
    put(if layout.cube { MISC_TEXTURECUBE } else { 0 });
    put(layout.array_size);
    put(0);
}
