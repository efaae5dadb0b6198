//! CPU-side texel conversion: expanding uncompressed formats to RGBA and
//! decoding BC1-BC5 blocks for targets that can't take compressed data.

use super::format::{Channel, Format, Swizzle};
use crate::util::bits::BitField;
use half::f16;

/// Pixel data stored in R8G8B8A8 format.
pub struct RGBABuf(pub Vec<u8>);

impl RGBABuf {
    pub fn for_dimensions((width, height): (u32, u32)) -> RGBABuf {
        let (w, h) = (width as usize, height as usize);
        RGBABuf(vec![0; 4 * w * h])
    }

    fn with_capacity(texels: usize) -> RGBABuf {
        RGBABuf(Vec::with_capacity(4 * texels))
    }

    fn pixel(&mut self, pixel: [u8; 4]) {
        self.0.extend_from_slice(&pixel);
    }
}

/// Converts `texels` texels of an uncompressed 8-bit-ish format to RGBA8,
/// applying the swizzle. Returns `None` for formats that aren't 8-bit
/// or if `src` is too short.
pub fn expand_rgba8(format: Format, swizzle: Swizzle, src: &[u8], texels: usize) -> Option<RGBABuf> {
    let unit = format.unit_size();
    if format.is_compressed() || src.len() < texels * unit {
        return None;
    }
    let mut buf = RGBABuf::with_capacity(texels);
    for t in src.chunks_exact(unit).take(texels) {
        let raw = match format {
            Format::Rgba8 | Format::Rgbx8 => [t[0], t[1], t[2], t[3]],
            Format::Bgra8 | Format::Bgrx8 => [t[2], t[1], t[0], t[3]],
            Format::Rgb8 => [t[0], t[1], t[2], 255],
            Format::Bgr8 => [t[2], t[1], t[0], 255],
            Format::Rg8 | Format::L8A8 => [t[0], t[1], 0, 255],
            Format::R8 | Format::L8 | Format::A8 => [t[0], 0, 0, 255],
            Format::B5G6R5 => {
                let x = u16::from_le_bytes([t[0], t[1]]);
                [
                    scale_bits(x.bits(11, 16), 5),
                    scale_bits(x.bits(5, 11), 6),
                    scale_bits(x.bits(0, 5), 5),
                    255,
                ]
            }
            Format::B5G5R5A1 => {
                let x = u16::from_le_bytes([t[0], t[1]]);
                [
                    scale_bits(x.bits(10, 15), 5),
                    scale_bits(x.bits(5, 10), 5),
                    scale_bits(x.bits(0, 5), 5),
                    if x.bit(15) { 255 } else { 0 },
                ]
            }
            Format::B4G4R4A4 => {
                let x = u16::from_le_bytes([t[0], t[1]]);
                [
                    scale_bits(x.bits(8, 12), 4),
                    scale_bits(x.bits(4, 8), 4),
                    scale_bits(x.bits(0, 4), 4),
                    scale_bits(x.bits(12, 16), 4),
                ]
            }
            _ => return None,
        };
        buf.pixel(apply_swizzle(raw, swizzle, 255));
    }
    Some(buf)
}

/// Converts float formats to RGBA32F.
pub fn expand_rgba32f(format: Format, src: &[u8], texels: usize) -> Option<Vec<f32>> {
    let unit = format.unit_size();
    if src.len() < texels * unit {
        return None;
    }
    let mut out = Vec::with_capacity(4 * texels);
    match format {
        Format::Rgba16f => {
            for h in src.chunks_exact(2).take(4 * texels) {
                out.push(f16::from_bits(u16::from_le_bytes([h[0], h[1]])).to_f32());
            }
        }
        Format::Rgba32f => {
            for f in src.chunks_exact(4).take(4 * texels) {
                out.push(f32::from_le_bytes([f[0], f[1], f[2], f[3]]));
            }
        }
        _ => return None,
    }
    Some(out)
}

fn apply_swizzle<T: Copy + Default>(raw: [T; 4], swizzle: Swizzle, one: T) -> [T; 4] {
    let pick = |c: Channel| match c {
        Channel::Red => raw[0],
        Channel::Green => raw[1],
        Channel::Blue => raw[2],
        Channel::Alpha => raw[3],
        Channel::Zero => T::default(),
        Channel::One => one,
    };
    [pick(swizzle[0]), pick(swizzle[1]), pick(swizzle[2]), pick(swizzle[3])]
}

/// Expands an n-bit channel to 8 bits.
fn scale_bits(x: u16, n: u32) -> u8 {
    let max = (1u32 << n) - 1;
    ((x as u32 * 255 + max / 2) / max) as u8
}

/// Decodes a BC1-BC5 image to RGBA8. BC6H/BC7 aren't handled.
pub fn decode_block_compressed(format: Format, src: &[u8], width: u32, height: u32) -> Option<RGBABuf> {
    let block_size = format.unit_size();
    let blocks_w = ((width + 3) / 4) as usize;
    let blocks_h = ((height + 3) / 4) as usize;
    if src.len() < blocks_w * blocks_h * block_size {
        return None;
    }

    let mut buf = RGBABuf::for_dimensions((width, height));
    for by in 0..blocks_h {
        for bx in 0..blocks_w {
            let off = (by * blocks_w + bx) * block_size;
            let block = &src[off..off + block_size];
            let texels = match format {
                Format::Bc1 => color_block(block, true),
                Format::Bc2 => {
                    let mut texels = color_block(&block[8..], false);
                    let alpha = u64::from_le_bytes(array8(&block[..8]));
                    for (i, t) in texels.iter_mut().enumerate() {
                        t[3] = scale_bits(alpha.bits(4 * i as u32, 4 * i as u32 + 4) as u16, 4);
                    }
                    texels
                }
                Format::Bc3 => {
                    let mut texels = color_block(&block[8..], false);
                    let alpha = value_block(&block[..8]);
                    for i in 0..16 {
                        texels[i][3] = alpha[i];
                    }
                    texels
                }
                Format::Bc4 => {
                    let red = value_block(block);
                    let mut texels = [[0, 0, 0, 255]; 16];
                    for i in 0..16 {
                        texels[i][0] = red[i];
                    }
                    texels
                }
                Format::Bc5 => {
                    let red = value_block(&block[..8]);
                    let green = value_block(&block[8..]);
                    let mut texels = [[0, 0, 0, 255]; 16];
                    for i in 0..16 {
                        texels[i][0] = red[i];
                        texels[i][1] = green[i];
                    }
                    texels
                }
                _ => return None,
            };

            for (i, texel) in texels.iter().enumerate() {
                let x = bx * 4 + i % 4;
                let y = by * 4 + i / 4;
                if x < width as usize && y < height as usize {
                    let p = 4 * (y * width as usize + x);
                    buf.0[p..p + 4].copy_from_slice(texel);
                }
            }
        }
    }
    Some(buf)
}

fn array8(b: &[u8]) -> [u8; 8] {
    let mut a = [0; 8];
    a.copy_from_slice(&b[..8]);
    a
}

fn rgb565(x: u16) -> [u8; 4] {
    [
        scale_bits(x.bits(11, 16), 5),
        scale_bits(x.bits(5, 11), 6),
        scale_bits(x.bits(0, 5), 5),
        255,
    ]
}

/// Decodes the 8-byte color part shared by BC1-BC3. Only BC1 has the
/// three-color + transparent mode.
fn color_block(block: &[u8], allow_transparent: bool) -> [[u8; 4]; 16] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);

    let (p0, p1) = (rgb565(c0), rgb565(c1));
    let mix = |a: u8, b: u8, wa: u32, wb: u32| ((a as u32 * wa + b as u32 * wb) / (wa + wb)) as u8;
    let mut palette = [p0, p1, [0; 4], [0; 4]];
    if c0 > c1 || !allow_transparent {
        for c in 0..3 {
            palette[2][c] = mix(p0[c], p1[c], 2, 1);
            palette[3][c] = mix(p0[c], p1[c], 1, 2);
        }
        palette[2][3] = 255;
        palette[3][3] = 255;
    } else {
        for c in 0..3 {
            palette[2][c] = mix(p0[c], p1[c], 1, 1);
        }
        palette[2][3] = 255;
        // palette[3] stays transparent black
    }

    let mut texels = [[0; 4]; 16];
    for (i, t) in texels.iter_mut().enumerate() {
        *t = palette[indices.bits(2 * i as u32, 2 * i as u32 + 2) as usize];
    }
    texels
}

/// Decodes an 8-byte interpolated single-channel block (BC3 alpha, BC4,
/// each half of BC5).
fn value_block(block: &[u8]) -> [u8; 16] {
    let (v0, v1) = (block[0] as u32, block[1] as u32);
    let mut values = [0u8; 8];
    values[0] = v0 as u8;
    values[1] = v1 as u8;
    if v0 > v1 {
        for i in 1..7u32 {
            values[i as usize + 1] = (((7 - i) * v0 + i * v1) / 7) as u8;
        }
    } else {
        for i in 1..5u32 {
            values[i as usize + 1] = (((5 - i) * v0 + i * v1) / 5) as u8;
        }
        values[6] = 0;
        values[7] = 255;
    }

    let mut idx_bytes = [0u8; 8];
    idx_bytes[..6].copy_from_slice(&block[2..8]);
    let indices = u64::from_le_bytes(idx_bytes);

    let mut out = [0; 16];
    for (i, v) in out.iter_mut().enumerate() {
        *v = values[indices.bits(3 * i as u32, 3 * i as u32 + 3) as usize];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::format::translate;

    #[test]
    fn luminance_expands_to_grey() {
        let tr = translate(Format::L8);
        let buf = expand_rgba8(Format::L8, tr.swizzle, &[0x40, 0xff], 2).unwrap();
        assert_eq!(buf.0, vec![0x40, 0x40, 0x40, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn bgra_is_reordered() {
        let tr = translate(Format::Bgrx8);
        let buf = expand_rgba8(Format::Bgrx8, tr.swizzle, &[1, 2, 3, 0], 1).unwrap();
        assert_eq!(buf.0, vec![3, 2, 1, 255]);
    }

    #[test]
    fn short_source_is_rejected() {
        assert!(expand_rgba8(Format::Rgba8, translate(Format::Rgba8).swizzle, &[0; 7], 2).is_none());
    }

    #[test]
    fn bc1_solid_block() {
        // c0 = pure red, c1 = black, every index 0
        let block = [0x00, 0xf8, 0x00, 0x00, 0, 0, 0, 0];
        let buf = decode_block_compressed(Format::Bc1, &block, 4, 4).unwrap();
        assert_eq!(buf.0.len(), 64);
        assert!(buf.0.chunks(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn bc1_transparent_mode() {
        // c0 <= c1 and every index 3: transparent black
        let block = [0, 0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let buf = decode_block_compressed(Format::Bc1, &block, 2, 2).unwrap();
        assert_eq!(buf.0.len(), 16);
        assert!(buf.0.chunks(4).all(|p| p == [0, 0, 0, 0]));
    }

    #[test]
    fn bc3_alpha_endpoints() {
        let mut block = [0u8; 16];
        block[0] = 200; // a0
        block[1] = 100; // a1
        // all alpha indices 1 -> a1
        let idx: u64 = (0..16).fold(0, |acc, i| acc | (1u64 << (3 * i)));
        block[2..8].copy_from_slice(&idx.to_le_bytes()[..6]);
        let buf = decode_block_compressed(Format::Bc3, &block, 4, 4).unwrap();
        assert!(buf.0.chunks(4).all(|p| p[3] == 100));
    }
}
