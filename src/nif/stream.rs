//! Version-aware primitive reader for the body of a NIF block.

use super::Version;
use crate::errors::Result;
use crate::util::cur::Cur;
use half::f16;

/// Reads NIF primitives from the bytes of one block.
pub struct Stream<'a> {
    cur: Cur<'a>,
    pub version: Version,
    strings: &'a [String],
}

impl<'a> Stream<'a> {
    pub fn new(buf: &'a [u8], version: Version, strings: &'a [String]) -> Stream<'a> {
        Stream { cur: Cur::new(buf), version, strings }
    }

    pub fn bs(&self) -> u32 {
        self.version.stream
    }

    pub fn pos(&self) -> usize {
        self.cur.pos()
    }

    pub fn remaining(&self) -> usize {
        self.cur.bytes_remaining()
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.cur.next_n_u8s(n)?;
        Ok(())
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.cur.next_n_u8s(n)
    }

    pub fn u8(&mut self) -> Result<u8> { self.cur.next::<u8>() }
    pub fn u16(&mut self) -> Result<u16> { self.cur.next::<u16>() }
    pub fn u32(&mut self) -> Result<u32> { self.cur.next::<u32>() }
    pub fn u64(&mut self) -> Result<u64> { self.cur.next::<u64>() }
    pub fn i32(&mut self) -> Result<i32> { self.cur.next::<i32>() }
    pub fn f32(&mut self) -> Result<f32> { self.cur.next::<f32>() }

    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn half(&mut self) -> Result<f32> {
        Ok(f16::from_bits(self.u16()?).to_f32())
    }

    pub fn vec2(&mut self) -> Result<[f32; 2]> {
        Ok([self.f32()?, self.f32()?])
    }

    pub fn vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    pub fn vec4(&mut self) -> Result<[f32; 4]> {
        Ok([self.f32()?, self.f32()?, self.f32()?, self.f32()?])
    }

    /// Row-major 3x3 matrix.
    pub fn matrix33(&mut self) -> Result<[[f32; 3]; 3]> {
        Ok([self.vec3()?, self.vec3()?, self.vec3()?])
    }

    /// `n` consecutive Vector3s. The length is bounds-checked before
    /// anything is allocated.
    pub fn vec3_array(&mut self, n: usize) -> Result<Vec<[f32; 3]>> {
        let view = self.cur.next_n::<(f32, f32, f32)>(n)?;
        Ok(view.map(|(x, y, z)| [x, y, z]).collect())
    }

    pub fn vec2_array(&mut self, n: usize) -> Result<Vec<[f32; 2]>> {
        let view = self.cur.next_n::<(f32, f32)>(n)?;
        Ok(view.map(|(u, v)| [u, v]).collect())
    }

    pub fn color4_array(&mut self, n: usize) -> Result<Vec<[f32; 4]>> {
        let view = self.cur.next_n::<((f32, f32), (f32, f32))>(n)?;
        Ok(view.map(|((r, g), (b, a))| [r, g, b, a]).collect())
    }

    pub fn triangles(&mut self, n: usize) -> Result<Vec<[u16; 3]>> {
        let view = self.cur.next_n::<(u16, u16, u16)>(n)?;
        Ok(view.map(|(a, b, c)| [a, b, c]).collect())
    }

    pub fn u16_array(&mut self, n: usize) -> Result<Vec<u16>> {
        Ok(self.cur.next_n::<u16>(n)?.collect())
    }

    /// A string stored as an index into the header's string table.
    pub fn string(&mut self) -> Result<String> {
        let idx = self.u32()?;
        if idx == u32::MAX {
            return Ok(String::new());
        }
        match self.strings.get(idx as usize) {
            Some(s) => Ok(s.clone()),
            None => bail!("string index {} out of range ({} strings)", idx, self.strings.len()),
        }
    }

    /// A string stored inline with a u32 length prefix.
    pub fn sized_string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        Ok(decode_string(bytes))
    }

    /// A reference to another block; negative means none.
    pub fn block_ref(&mut self) -> Result<Option<usize>> {
        let r = self.i32()?;
        Ok(if r < 0 { None } else { Some(r as usize) })
    }

    /// A u32 count followed by that many block references. Null
    /// references are dropped.
    pub fn ref_list(&mut self) -> Result<Vec<usize>> {
        let n = self.u32()? as usize;
        let refs = self.cur.next_n::<i32>(n)?;
        Ok(refs.filter(|&r| r >= 0).map(|r| r as usize).collect())
    }
}

/// NIF strings are Windows-1252 in practice; anything non-ASCII is
/// rare enough in paths that a lossy UTF-8 decode is fine. Trailing
/// NULs are dropped.
pub fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[test]
fn test_decode_string() {
    assert_eq!(decode_string(b"textures\\a.dds\0"), "textures\\a.dds");
    assert_eq!(decode_string(b"\0\0"), "");
    assert_eq!(decode_string(b"plain"), "plain");
}
