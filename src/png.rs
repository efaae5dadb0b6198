use crate::errors::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes RGBA8 pixels whose first row is the bottom of the image (the
/// order GL reads framebuffers in) as a PNG.
pub fn write_bottom_up(path: &Path, rgba: &[u8], width: u32, height: u32) -> Result<()> {
    let fout = BufWriter::new(File::create(path)?);
    encode(fout, &flip_rows(rgba, width, height)?, width, height)
}

pub fn encode<W: Write>(w: W, rgba: &[u8], width: u32, height: u32) -> Result<()> {
    let mut enc = ::png::Encoder::new(w, width, height);
    enc.set_color(::png::ColorType::Rgba);
    enc.set_depth(::png::BitDepth::Eight);
    let mut writer = enc.write_header()?;
    writer.write_image_data(rgba)?;
    Ok(())
}

fn flip_rows(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let stride = width as usize * 4;
    check!(rgba.len() == stride * height as usize)?;
    if stride == 0 {
        return Ok(vec![]);
    }
    Ok(rgba.chunks(stride).rev().flat_map(|row| row.iter().cloned()).collect())
}
