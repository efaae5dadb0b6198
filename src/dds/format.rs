//! Pixel formats found in game textures and how each maps onto what the
//! renderer can upload.

use ddsfile::{Dds, DxgiFormat, PixelFormatFlags};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6hUf,
    Bc6hSf,
    Bc7,
    Rgba8,
    Rgbx8,
    Bgra8,
    Bgrx8,
    Rgb8,
    Bgr8,
    Rg8,
    R8,
    L8,
    A8,
    L8A8,
    B5G6R5,
    B5G5R5A1,
    B4G4R4A4,
    Rgba16f,
    Rgba32f,
}

/// Block-compressed formats the GPU decodes itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6hUf,
    Bc6hSf,
    Bc7,
}

/// What a texture is converted to before upload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GpuFormat {
    Compressed(Compression),
    /// 8-bit RGBA, expanded on the CPU if needed.
    Rgba8,
    /// 32-bit float RGBA, expanded on the CPU if needed.
    Rgba32f,
}

/// Source of a channel after swizzling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
    Alpha,
    Zero,
    One,
}

pub type Swizzle = [Channel; 4];

pub const IDENTITY: Swizzle = [Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha];

/// The GPU format plus the swizzle that maps the source channels onto
/// RGBA.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Translation {
    pub gpu: GpuFormat,
    pub swizzle: Swizzle,
}

pub fn translate(format: Format) -> Translation {
    use self::Channel::*;
    use self::Format::*;
    let (gpu, swizzle) = match format {
        Bc1 => (GpuFormat::Compressed(Compression::Bc1), IDENTITY),
        Bc2 => (GpuFormat::Compressed(Compression::Bc2), IDENTITY),
        Bc3 => (GpuFormat::Compressed(Compression::Bc3), IDENTITY),
        Bc4 => (GpuFormat::Compressed(Compression::Bc4), IDENTITY),
        Bc5 => (GpuFormat::Compressed(Compression::Bc5), IDENTITY),
        Bc6hUf => (GpuFormat::Compressed(Compression::Bc6hUf), IDENTITY),
        Bc6hSf => (GpuFormat::Compressed(Compression::Bc6hSf), IDENTITY),
        Bc7 => (GpuFormat::Compressed(Compression::Bc7), IDENTITY),
        Rgba8 | Bgra8 | Rgb8 | Bgr8 | B5G5R5A1 | B4G4R4A4 => (GpuFormat::Rgba8, IDENTITY),
        Rgbx8 | Bgrx8 | B5G6R5 => (GpuFormat::Rgba8, [Red, Green, Blue, One]),
        Rg8 => (GpuFormat::Rgba8, [Red, Green, Zero, One]),
        R8 => (GpuFormat::Rgba8, [Red, Zero, Zero, One]),
        L8 => (GpuFormat::Rgba8, [Red, Red, Red, One]),
        A8 => (GpuFormat::Rgba8, [Zero, Zero, Zero, Red]),
        L8A8 => (GpuFormat::Rgba8, [Red, Red, Red, Green]),
        Rgba16f | Rgba32f => (GpuFormat::Rgba32f, IDENTITY),
    };
    Translation { gpu, swizzle }
}

impl Format {
    pub fn is_compressed(self) -> bool {
        match translate(self).gpu {
            GpuFormat::Compressed(_) => true,
            _ => false,
        }
    }

    /// Bytes per 4x4 block for compressed formats, per texel otherwise.
    pub fn unit_size(self) -> usize {
        use self::Format::*;
        match self {
            Bc1 | Bc4 => 8,
            Bc2 | Bc3 | Bc5 | Bc6hUf | Bc6hSf | Bc7 => 16,
            Rgba8 | Rgbx8 | Bgra8 | Bgrx8 => 4,
            Rgb8 | Bgr8 => 3,
            Rg8 | L8A8 | B5G6R5 | B5G5R5A1 | B4G4R4A4 => 2,
            R8 | L8 | A8 => 1,
            Rgba16f => 8,
            Rgba32f => 16,
        }
    }

    /// Byte size of one image (a single level of a single face/layer),
    /// or `None` if it doesn't fit in a `usize`.
    pub fn image_size(self, width: u32, height: u32, depth: u32) -> Option<usize> {
        let (w, h, d) = (width as usize, height as usize, depth as usize);
        let (units_x, units_y) = if self.is_compressed() {
            ((w + 3) / 4, (h + 3) / 4)
        } else {
            (w, h)
        };
        units_x.checked_mul(units_y)?.checked_mul(d)?.checked_mul(self.unit_size())
    }
}

fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Identifies the format of a parsed DDS, from its DX10 header if it has
/// one, otherwise from the legacy pixel format.
pub fn detect(dds: &Dds) -> Option<Format> {
    if let Some(ref h10) = dds.header10 {
        return from_dxgi(h10.dxgi_format);
    }

    let spf = &dds.header.spf;
    if let Some(ref cc) = spf.fourcc {
        let cc = cc.0;
        return match cc {
            _ if cc == fourcc(b"DXT1") => Some(Format::Bc1),
            _ if cc == fourcc(b"DXT2") || cc == fourcc(b"DXT3") => Some(Format::Bc2),
            _ if cc == fourcc(b"DXT4") || cc == fourcc(b"DXT5") => Some(Format::Bc3),
            _ if cc == fourcc(b"ATI1") || cc == fourcc(b"BC4U") => Some(Format::Bc4),
            _ if cc == fourcc(b"ATI2") || cc == fourcc(b"BC5U") => Some(Format::Bc5),
            // D3DFMT_A16B16G16R16F, D3DFMT_A32B32G32R32F
            113 => Some(Format::Rgba16f),
            116 => Some(Format::Rgba32f),
            _ => None,
        };
    }

    let bits = spf.rgb_bit_count.unwrap_or(0);
    let r = spf.r_bit_mask.unwrap_or(0);
    let a = if spf.flags.contains(PixelFormatFlags::ALPHA_PIXELS)
        || spf.flags.contains(PixelFormatFlags::ALPHA)
    {
        spf.a_bit_mask.unwrap_or(0)
    } else {
        0
    };

    if spf.flags.contains(PixelFormatFlags::RGB) {
        return match (bits, r, a) {
            (32, 0x00ff_0000, 0) => Some(Format::Bgrx8),
            (32, 0x00ff_0000, _) => Some(Format::Bgra8),
            (32, 0x0000_00ff, 0) => Some(Format::Rgbx8),
            (32, 0x0000_00ff, _) => Some(Format::Rgba8),
            (24, 0x00ff_0000, _) => Some(Format::Bgr8),
            (24, 0x0000_00ff, _) => Some(Format::Rgb8),
            (16, 0xf800, _) => Some(Format::B5G6R5),
            (16, 0x7c00, _) => Some(Format::B5G5R5A1),
            (16, 0x0f00, _) => Some(Format::B4G4R4A4),
            (16, 0x00ff, _) => Some(Format::Rg8),
            (8, 0xff, _) => Some(Format::R8),
            _ => None,
        };
    }
    if spf.flags.contains(PixelFormatFlags::LUMINANCE) {
        return match (bits, a) {
            (8, _) => Some(Format::L8),
            (16, 0) => None,
            (16, _) => Some(Format::L8A8),
            _ => None,
        };
    }
    if spf.flags.contains(PixelFormatFlags::ALPHA) && bits == 8 {
        return Some(Format::A8);
    }
    None
}

fn from_dxgi(format: DxgiFormat) -> Option<Format> {
    Some(match format {
        DxgiFormat::BC1_Typeless | DxgiFormat::BC1_UNorm | DxgiFormat::BC1_UNorm_sRGB => Format::Bc1,
        DxgiFormat::BC2_Typeless | DxgiFormat::BC2_UNorm | DxgiFormat::BC2_UNorm_sRGB => Format::Bc2,
        DxgiFormat::BC3_Typeless | DxgiFormat::BC3_UNorm | DxgiFormat::BC3_UNorm_sRGB => Format::Bc3,
        DxgiFormat::BC4_Typeless | DxgiFormat::BC4_UNorm | DxgiFormat::BC4_SNorm => Format::Bc4,
        DxgiFormat::BC5_Typeless | DxgiFormat::BC5_UNorm | DxgiFormat::BC5_SNorm => Format::Bc5,
        DxgiFormat::BC6H_Typeless | DxgiFormat::BC6H_UF16 => Format::Bc6hUf,
        DxgiFormat::BC6H_SF16 => Format::Bc6hSf,
        DxgiFormat::BC7_Typeless | DxgiFormat::BC7_UNorm | DxgiFormat::BC7_UNorm_sRGB => Format::Bc7,
        DxgiFormat::R8G8B8A8_Typeless
        | DxgiFormat::R8G8B8A8_UNorm
        | DxgiFormat::R8G8B8A8_UNorm_sRGB => Format::Rgba8,
        DxgiFormat::B8G8R8A8_Typeless
        | DxgiFormat::B8G8R8A8_UNorm
        | DxgiFormat::B8G8R8A8_UNorm_sRGB => Format::Bgra8,
        DxgiFormat::B8G8R8X8_Typeless
        | DxgiFormat::B8G8R8X8_UNorm
        | DxgiFormat::B8G8R8X8_UNorm_sRGB => Format::Bgrx8,
        DxgiFormat::R8G8_UNorm => Format::Rg8,
        DxgiFormat::R8_UNorm => Format::R8,
        DxgiFormat::A8_UNorm => Format::A8,
        DxgiFormat::B5G6R5_UNorm => Format::B5G6R5,
        DxgiFormat::B5G5R5A1_UNorm => Format::B5G5R5A1,
        DxgiFormat::B4G4R4A4_UNorm => Format::B4G4R4A4,
        DxgiFormat::R16G16B16A16_Float => Format::Rgba16f,
        DxgiFormat::R32G32B32A32_Float => Format::Rgba32f,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swizzled_formats_expand_to_rgba() {
        let t = translate(Format::L8);
        assert_eq!(t.gpu, GpuFormat::Rgba8);
        assert_eq!(t.swizzle, [Channel::Red, Channel::Red, Channel::Red, Channel::One]);

        let t = translate(Format::A8);
        assert_eq!(t.swizzle[3], Channel::Red);

        assert_eq!(translate(Format::Bc3).gpu, GpuFormat::Compressed(Compression::Bc3));
        assert_eq!(translate(Format::Rgba16f).gpu, GpuFormat::Rgba32f);
    }

    #[test]
    fn image_sizes() {
        assert_eq!(Format::Bc1.image_size(4, 4, 1), Some(8));
        assert_eq!(Format::Bc1.image_size(1, 1, 1), Some(8));
        assert_eq!(Format::Bc3.image_size(256, 128, 1), Some(64 * 32 * 16));
        assert_eq!(Format::Bgra8.image_size(3, 5, 2), Some(3 * 5 * 2 * 4));
        assert_eq!(Format::L8.image_size(7, 1, 1), Some(7));
        assert_eq!(Format::Rgba32f.image_size(u32::MAX, u32::MAX, u32::MAX), None);
    }
}
