//! Textures on the GPU.
//!
//! `TextureManager` turns texture paths into uploaded textures, caching
//! by path, and owns the solid-color fallbacks used for slots that
//! can't be resolved.

use super::texture_cache::TextureCache;
use super::Display;
use crate::assets::Assets;
use crate::dds::decode::{decode_block_compressed, expand_rgba32f, expand_rgba8};
use crate::dds::format::{translate, Compression, GpuFormat, Translation};
use crate::dds::plan::{plan, Upload, UploadCall};
use crate::dds::{Target, Texture};
use crate::errors::Result;
use glium::buffer::{Buffer, BufferMode, BufferType};
use glium::framebuffer::{SimpleFrameBuffer, ToColorAttachment};
use glium::texture::{
    CompressedFormat, CompressedMipmapsOption, CompressedTexture2d, CubeLayer, Cubemap,
    CubemapArray, MipmapsOption, PixelValue, RawImage2d, Texture1d, Texture1dArray, Texture2d,
    Texture2dArray, Texture3d, TextureAny, TextureAnyMipmap, UncompressedFloatFormat,
};
use glium::uniforms::{
    MagnifySamplerFilter, MinifySamplerFilter, SamplerBehavior, SamplerWrapFunction, UniformValue,
};
use glium::{BlitTarget, Rect, Surface};
use std::ops::Range;
use std::rc::Rc;

pub enum GpuTexture {
    Plain(Texture2d, SamplerBehavior),
    Compressed(CompressedTexture2d, SamplerBehavior),
    Cube(Cubemap, SamplerBehavior),
    Line(Texture1d, SamplerBehavior),
    LineArray(Texture1dArray, SamplerBehavior),
    Array(Texture2dArray, SamplerBehavior),
    Volume(Texture3d, SamplerBehavior),
    CubeArray(CubemapArray, SamplerBehavior),
}

impl GpuTexture {
    pub fn target(&self) -> Target {
        match *self {
            GpuTexture::Plain(..) | GpuTexture::Compressed(..) => Target::Tex2d,
            GpuTexture::Cube(..) => Target::Cube,
            GpuTexture::Line(..) => Target::Tex1d,
            GpuTexture::LineArray(..) => Target::Tex1dArray,
            GpuTexture::Array(..) => Target::Tex2dArray,
            GpuTexture::Volume(..) => Target::Tex3d,
            GpuTexture::CubeArray(..) => Target::CubeArray,
        }
    }

    pub fn as_uniform(&self) -> UniformValue {
        match *self {
            GpuTexture::Plain(ref t, s) => UniformValue::Texture2d(t, Some(s)),
            GpuTexture::Compressed(ref t, s) => UniformValue::CompressedTexture2d(t, Some(s)),
            GpuTexture::Cube(ref t, s) => UniformValue::Cubemap(t, Some(s)),
            GpuTexture::Line(ref t, s) => UniformValue::Texture1d(t, Some(s)),
            GpuTexture::LineArray(ref t, s) => UniformValue::Texture1dArray(t, Some(s)),
            GpuTexture::Array(ref t, s) => UniformValue::Texture2dArray(t, Some(s)),
            GpuTexture::Volume(ref t, s) => UniformValue::Texture3d(t, Some(s)),
            GpuTexture::CubeArray(ref t, s) => UniformValue::CubemapArray(t, Some(s)),
        }
    }

    fn any(&self) -> &TextureAny {
        match *self {
            GpuTexture::Plain(ref t, _) => &**t,
            GpuTexture::Compressed(ref t, _) => &**t,
            GpuTexture::Cube(ref t, _) => &**t,
            GpuTexture::Line(ref t, _) => &**t,
            GpuTexture::LineArray(ref t, _) => &**t,
            GpuTexture::Array(ref t, _) => &**t,
            GpuTexture::Volume(ref t, _) => &**t,
            GpuTexture::CubeArray(ref t, _) => &**t,
        }
    }
}

/// The solid-color stand-ins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// Magenta
    Error,
    Black,
    White,
    /// The unperturbed normal (0.5, 0.5, 1).
    FlatNormal,
}

impl Fallback {
    pub fn color(self) -> [f32; 4] {
        match self {
            Fallback::Error => [1.0, 0.0, 1.0, 1.0],
            Fallback::Black => [0.0, 0.0, 0.0, 1.0],
            Fallback::White => [1.0, 1.0, 1.0, 1.0],
            Fallback::FlatNormal => [0.5, 0.5, 1.0, 1.0],
        }
    }
}

/// Where materials get their textures from.
pub trait TextureProvider {
    type Texture;
    fn texture(&mut self, path: &str) -> Option<Rc<Self::Texture>>;
    fn fallback(&mut self, which: Fallback) -> Option<Rc<Self::Texture>>;
}

pub struct TextureManager {
    display: Display,
    assets: Rc<Assets>,
    cache: TextureCache<GpuTexture>,
    fallbacks: Vec<(Fallback, Rc<GpuTexture>)>,
    empty_cube: Option<Rc<GpuTexture>>,
}

impl TextureManager {
    pub fn new(display: &Display, assets: Rc<Assets>) -> TextureManager {
        TextureManager {
            display: display.clone(),
            assets,
            cache: TextureCache::new(),
            fallbacks: vec![],
            empty_cube: None,
        }
    }

    /// A black cube map, for cube slots with nothing in them.
    pub fn empty_cube(&mut self) -> Option<Rc<GpuTexture>> {
        if self.empty_cube.is_none() {
            match black_cube(&self.display) {
                Ok(t) => self.empty_cube = Some(Rc::new(t)),
                Err(e) => warn!("couldn't create cube map: {}", e),
            }
        }
        self.empty_cube.clone()
    }

    pub fn num_loaded(&self) -> usize {
        self.cache.num_loaded()
    }

    /// Frees every texture this manager made.
    pub fn cleanup(&mut self) {
        self.cache.clear();
        self.fallbacks.clear();
        self.empty_cube = None;
    }
}

impl TextureProvider for TextureManager {
    type Texture = GpuTexture;

    fn texture(&mut self, path: &str) -> Option<Rc<GpuTexture>> {
        let TextureManager { ref display, ref assets, ref mut cache, .. } = *self;
        cache.get_or_load(path, |p| load(display, assets, p))
    }

    fn fallback(&mut self, which: Fallback) -> Option<Rc<GpuTexture>> {
        if let Some(&(_, ref t)) = self.fallbacks.iter().find(|&&(f, _)| f == which) {
            return Some(t.clone());
        }
        match solid_color(&self.display, which.color()) {
            Ok(t) => {
                let t = Rc::new(t);
                self.fallbacks.push((which, t.clone()));
                Some(t)
            }
            Err(e) => {
                warn!("couldn't create {:?} texture: {}", which, e);
                None
            }
        }
    }
}

fn load(display: &Display, assets: &Assets, path: &str) -> Option<GpuTexture> {
    let tex = assets.load(path, |bytes| match Texture::from_bytes(bytes) {
        Ok(t) => Some(t),
        Err(e) => {
            debug!("couldn't decode {}: {}", path, e);
            None
        }
    })?;
    match upload(display, &tex) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("couldn't upload {}: {}", path, e);
            None
        }
    }
}

fn sampler(levels: u32) -> SamplerBehavior {
    SamplerBehavior {
        minify_filter: if levels > 1 {
            MinifySamplerFilter::LinearMipmapLinear
        } else {
            MinifySamplerFilter::Linear
        },
        magnify_filter: MagnifySamplerFilter::Linear,
        wrap_function: (
            SamplerWrapFunction::Repeat,
            SamplerWrapFunction::Repeat,
            SamplerWrapFunction::Repeat,
        ),
        ..Default::default()
    }
}

fn mipmaps(levels: u32) -> MipmapsOption {
    if levels > 1 {
        MipmapsOption::EmptyMipmapsMax(levels - 1)
    } else {
        MipmapsOption::NoMipmap
    }
}

fn compressed_format(c: Compression) -> CompressedFormat {
    match c {
        Compression::Bc1 => CompressedFormat::S3tcDxt1Alpha,
        Compression::Bc2 => CompressedFormat::S3tcDxt3Alpha,
        Compression::Bc3 => CompressedFormat::S3tcDxt5Alpha,
        Compression::Bc4 => CompressedFormat::RgtcFormatU,
        Compression::Bc5 => CompressedFormat::RgtcFormatUU,
        Compression::Bc6hUf => CompressedFormat::BptcUnsignedFloat3,
        Compression::Bc6hSf => CompressedFormat::BptcSignedFloat3,
        Compression::Bc7 => CompressedFormat::BptcUnorm4,
    }
}

fn solid_color(display: &Display, color: [f32; 4]) -> Result<GpuTexture> {
    let image = RawImage2d::from_raw_rgba(color.to_vec(), (1, 1));
    let tex = Texture2d::with_format(
        display,
        image,
        UncompressedFloatFormat::F32F32F32F32,
        MipmapsOption::NoMipmap,
    )?;
    Ok(GpuTexture::Plain(tex, sampler(1)))
}

fn black_cube(display: &Display) -> Result<GpuTexture> {
    let cube = Cubemap::empty_with_format(
        display,
        UncompressedFloatFormat::U8U8U8U8,
        MipmapsOption::NoMipmap,
        1,
    )?;
    for &layer in &CUBE_LAYERS {
        let mut fb = match SimpleFrameBuffer::new(display, cube.main_level().image(layer)) {
            Ok(fb) => fb,
            Err(e) => bail!("cube face isn't renderable: {:?}", e),
        };
        fb.clear_color(0.0, 0.0, 0.0, 1.0);
    }
    Ok(GpuTexture::Cube(cube, sampler(1)))
}

const CUBE_LAYERS: [CubeLayer; 6] = [
    CubeLayer::PositiveX,
    CubeLayer::NegativeX,
    CubeLayer::PositiveY,
    CubeLayer::NegativeY,
    CubeLayer::PositiveZ,
    CubeLayer::NegativeZ,
];

/// Uploads every image of `tex` into a texture of the same target.
pub fn upload(display: &Display, tex: &Texture) -> Result<GpuTexture> {
    let translation = translate(tex.format);
    let uploads = plan(tex);
    match tex.target {
        Target::Tex2d => match translation.gpu {
            GpuFormat::Compressed(c) => upload_compressed_2d(display, tex, c, &uploads),
            _ => upload_2d(display, tex, translation, &uploads),
        },
        Target::Cube | Target::CubeArray => upload_cube(display, tex, translation, &uploads),
        Target::Tex1d | Target::Tex1dArray | Target::Tex2dArray | Target::Tex3d => {
            upload_layered(display, tex, translation, &uploads)
        }
    }
}

fn upload_compressed_2d(
    display: &Display,
    tex: &Texture,
    c: Compression,
    uploads: &[Upload],
) -> Result<GpuTexture> {
    let format = compressed_format(c);
    let mips = if tex.levels > 1 {
        CompressedMipmapsOption::EmptyMipmapsMax(tex.levels - 1)
    } else {
        CompressedMipmapsOption::NoMipmap
    };
    let gl_tex = CompressedTexture2d::empty_with_format(display, format, mips, tex.width, tex.height)?;
    for u in uploads {
        check!(u.call == UploadCall::Compressed2d)?;
        let [w, h, _] = u.size;
        let mip = match gl_tex.mipmap(u.level) {
            Some(m) => m,
            None => bail!("no mip level {}", u.level),
        };
        let rect = Rect { left: 0, bottom: 0, width: w, height: h };
        let data = tex.image(u.layer, u.face, u.level);
        if mip.write_compressed_data(rect, data, w, h, format).is_err() {
            bail!("couldn't write mip level {}", u.level);
        }
    }
    Ok(GpuTexture::Compressed(gl_tex, sampler(tex.levels)))
}

fn upload_2d(
    display: &Display,
    tex: &Texture,
    translation: Translation,
    uploads: &[Upload],
) -> Result<GpuTexture> {
    let internal = internal_format(translation);
    let gl_tex = Texture2d::empty_with_format(display, internal, mipmaps(tex.levels), tex.width, tex.height)?;
    for u in uploads {
        check!(u.call == UploadCall::Uncompressed2d)?;
        let [w, h, _] = u.size;
        let mip = match gl_tex.mipmap(u.level) {
            Some(m) => m,
            None => bail!("no mip level {}", u.level),
        };
        let rect = Rect { left: 0, bottom: 0, width: w, height: h };
        let src = tex.image(u.layer, u.face, u.level);
        match rgba_image(tex, translation, src, (w, h, 1))? {
            Texels::Rgba8(data) => mip.write(rect, RawImage2d::from_raw_rgba(data, (w, h))),
            Texels::Rgba32f(data) => mip.write(rect, RawImage2d::from_raw_rgba(data, (w, h))),
        }
    }
    Ok(GpuTexture::Plain(gl_tex, sampler(tex.levels)))
}

/// Cube faces can only be filled by rendering into them, so each face
/// goes up as a plain texture first and is blitted across. Compressed
/// faces are decoded on the CPU.
fn upload_cube(
    display: &Display,
    tex: &Texture,
    translation: Translation,
    uploads: &[Upload],
) -> Result<GpuTexture> {
    let internal = internal_format(translation);
    let mips = mipmaps(tex.levels);
    let gpu = if tex.target == Target::CubeArray {
        let cubes = CubemapArray::empty_with_format(display, internal, mips, tex.width, tex.layers)?;
        GpuTexture::CubeArray(cubes, sampler(tex.levels))
    } else {
        GpuTexture::Cube(Cubemap::empty_with_format(display, internal, mips, tex.width)?, sampler(tex.levels))
    };

    for u in uploads {
        match u.call {
            UploadCall::Compressed2d | UploadCall::Uncompressed2d
            | UploadCall::Compressed3d | UploadCall::Uncompressed3d => (),
            call => bail!("unexpected {:?} upload for a cube map", call),
        }
        let (w, h, _) = tex.extent(u.level);
        let src = tex.image(u.layer, u.face, u.level);
        let face_tex = match rgba_image(tex, translation, src, (w, h, 1))? {
            Texels::Rgba8(data) => {
                let image = RawImage2d::from_raw_rgba(data, (w, h));
                Texture2d::with_format(display, image, internal, MipmapsOption::NoMipmap)?
            }
            Texels::Rgba32f(data) => {
                let image = RawImage2d::from_raw_rgba(data, (w, h));
                Texture2d::with_format(display, image, internal, MipmapsOption::NoMipmap)?
            }
        };

        let face = CUBE_LAYERS[(u.cube_face.unwrap_or(0) as usize).min(5)];
        match gpu {
            GpuTexture::CubeArray(ref cubes, _) => {
                let layer = cubes.mipmap(u.level).and_then(|m| m.layer(u.layer));
                match layer {
                    Some(l) => blit_face(display, &face_tex, l.image(face), (w, h))?,
                    None => bail!("no layer {} at mip level {}", u.layer, u.level),
                }
            }
            GpuTexture::Cube(ref cube, _) => match cube.mipmap(u.level) {
                Some(m) => blit_face(display, &face_tex, m.image(face), (w, h))?,
                None => bail!("no mip level {}", u.level),
            },
            _ => bail!("{:?} isn't a cube map target", tex.target),
        }
    }
    Ok(gpu)
}

fn blit_face<'a, C>(display: &Display, face_tex: &Texture2d, dest: C, (w, h): (u32, u32)) -> Result<()>
where
    C: ToColorAttachment<'a>,
{
    let fb = match SimpleFrameBuffer::new(display, dest) {
        Ok(fb) => fb,
        Err(e) => bail!("cube face isn't renderable: {:?}", e),
    };
    let target = BlitTarget { left: 0, bottom: 0, width: w as i32, height: h as i32 };
    face_tex.as_surface().blit_whole_color_to(&fb, &target, MagnifySamplerFilter::Nearest);
    Ok(())
}

/// 1D, array and volume textures. glium only writes these from a pixel
/// buffer, so every image goes up as RGBA with compressed images
/// decoded on the CPU first.
fn upload_layered(
    display: &Display,
    tex: &Texture,
    translation: Translation,
    uploads: &[Upload],
) -> Result<GpuTexture> {
    let internal = internal_format(translation);
    let mips = mipmaps(tex.levels);
    let s = sampler(tex.levels);
    let gpu = match tex.target {
        Target::Tex1d => GpuTexture::Line(Texture1d::empty_with_format(display, internal, mips, tex.width)?, s),
        Target::Tex1dArray => {
            let t = Texture1dArray::empty_with_format(display, internal, mips, tex.width, tex.layers)?;
            GpuTexture::LineArray(t, s)
        }
        Target::Tex2dArray => {
            let t = Texture2dArray::empty_with_format(display, internal, mips, tex.width, tex.height, tex.layers)?;
            GpuTexture::Array(t, s)
        }
        Target::Tex3d => {
            let t = Texture3d::empty_with_format(display, internal, mips, tex.width, tex.height, tex.depth)?;
            GpuTexture::Volume(t, s)
        }
        target => bail!("{:?} can't be filled from a pixel buffer", target),
    };

    for u in uploads {
        let mip = match gpu.any().mipmap(u.level) {
            Some(m) => m,
            None => bail!("no mip level {}", u.level),
        };
        // The plan passes the layer in place of the next dimension
        let [x, y, z] = u.size;
        let (extent, ys, zs) = match u.call {
            UploadCall::Compressed1d | UploadCall::Uncompressed1d => ((x, 1, 1), 0..1, 0..1),
            _ if tex.target == Target::Tex1dArray => ((x, 1, 1), y..y + 1, 0..1),
            _ if tex.target == Target::Tex2dArray => ((x, y, 1), 0..y, z..z + 1),
            _ => ((x, y, z), 0..y, 0..z),
        };
        let src = tex.image(u.layer, u.face, u.level);
        match rgba_image(tex, translation, src, extent)? {
            Texels::Rgba8(data) => {
                let pixels: Vec<(u8, u8, u8, u8)> =
                    data.chunks_exact(4).map(|p| (p[0], p[1], p[2], p[3])).collect();
                write_pixels(display, &mip, &pixels, 0..x, ys, zs)?;
            }
            Texels::Rgba32f(data) => {
                let pixels: Vec<(f32, f32, f32, f32)> =
                    data.chunks_exact(4).map(|p| (p[0], p[1], p[2], p[3])).collect();
                write_pixels(display, &mip, &pixels, 0..x, ys, zs)?;
            }
        }
    }
    Ok(gpu)
}

fn write_pixels<P: PixelValue>(
    display: &Display,
    mip: &TextureAnyMipmap,
    pixels: &[P],
    xs: Range<u32>,
    ys: Range<u32>,
    zs: Range<u32>,
) -> Result<()> {
    let buf = Buffer::new(display, pixels, BufferType::PixelUnpackBuffer, BufferMode::Default)?;
    mip.raw_upload_from_pixel_buffer(buf.as_slice(), xs, ys, zs);
    Ok(())
}

enum Texels {
    Rgba8(Vec<u8>),
    Rgba32f(Vec<f32>),
}

/// Converts one image to RGBA. Compressed volumes are decoded a slice at
/// a time.
fn rgba_image(tex: &Texture, translation: Translation, src: &[u8], (w, h, d): (u32, u32, u32)) -> Result<Texels> {
    if let GpuFormat::Compressed(_) = translation.gpu {
        let slice = match tex.format.image_size(w, h, 1) {
            Some(n) if n > 0 => n,
            _ => bail!("bad {:?} image size {}x{}", tex.format, w, h),
        };
        let mut out = Vec::with_capacity(4 * (w * h * d) as usize);
        for chunk in src.chunks(slice).take(d as usize) {
            match decode_block_compressed(tex.format, chunk, w, h) {
                Some(rgba) => out.extend(rgba.0),
                None => bail!("can't decode {:?} images here", tex.format),
            }
        }
        return Ok(Texels::Rgba8(out));
    }

    let texels = (w * h * d) as usize;
    if translation.gpu == GpuFormat::Rgba32f {
        match expand_rgba32f(tex.format, src, texels) {
            Some(data) => Ok(Texels::Rgba32f(data)),
            None => bail!("can't expand {:?}", tex.format),
        }
    } else {
        match expand_rgba8(tex.format, translation.swizzle, src, texels) {
            Some(data) => Ok(Texels::Rgba8(data.0)),
            None => bail!("can't expand {:?}", tex.format),
        }
    }
}

fn internal_format(translation: Translation) -> UncompressedFloatFormat {
    if translation.gpu == GpuFormat::Rgba32f {
        UncompressedFloatFormat::F32F32F32F32
    } else {
        UncompressedFloatFormat::U8U8U8U8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::tests::{layout_bytes, DXGI_BC1_UNORM};
    use crate::dds::Layout;
    use ddsfile::D3D10ResourceDimension;

    const DXGI_B8G8R8A8_UNORM: u32 = 87;

    #[test]
    fn compressed_volumes_decode_slice_by_slice() {
        let layout = Layout {
            depth: 2,
            dimension: D3D10ResourceDimension::Texture3D,
            ..Layout::tex2d(4, 4, 1, DXGI_BC1_UNORM)
        };
        // Two BC1 blocks: solid white, then solid black
        let mut data = vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
        data.extend_from_slice(&[0; 8]);
        let tex = Texture::from_bytes(&layout_bytes(&layout, &data)).unwrap();
        let rgba = match rgba_image(&tex, translate(tex.format), tex.image(0, 0, 0), (4, 4, 2)).unwrap() {
            Texels::Rgba8(d) => d,
            Texels::Rgba32f(_) => panic!("expected 8-bit texels"),
        };
        assert_eq!(rgba.len(), 2 * 16 * 4);
        assert_eq!(&rgba[..4], &[255, 255, 255, 255]);
        assert_eq!(&rgba[16 * 4..16 * 4 + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn line_images_expand_to_rgba() {
        let layout = Layout {
            dimension: D3D10ResourceDimension::Texture1D,
            ..Layout::tex2d(2, 1, 1, DXGI_B8G8R8A8_UNORM)
        };
        let tex = Texture::from_bytes(&layout_bytes(&layout, &[1, 2, 3, 4, 5, 6, 7, 8])).unwrap();
        assert_eq!(tex.target, Target::Tex1d);
        let (w, h, d) = tex.extent(0);
        let rgba = match rgba_image(&tex, translate(tex.format), tex.image(0, 0, 0), (w, h, d)).unwrap() {
            Texels::Rgba8(d) => d,
            Texels::Rgba32f(_) => panic!("expected 8-bit texels"),
        };
        assert_eq!(rgba, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }
}
