use super::{normalize_name, read_at, read_exact_vec};
use crate::dds::{write_dx10_header, Layout};
use crate::errors::Result;
use crate::util::cur::Cur;
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const GNRL_RECORD_SIZE: usize = 36;
const DX10_RECORD_SIZE: usize = 24;
const DX10_CHUNK_SIZE: usize = 24;

struct Chunk {
    offset: u64,
    packed_size: u32,
    unpacked_size: u32,
}

enum Entry {
    General(Chunk),
    Texture {
        height: u16,
        width: u16,
        num_mips: u8,
        dxgi_format: u8,
        is_cube: bool,
        chunks: Vec<Chunk>,
    },
}

pub struct Ba2 {
    pub path: PathBuf,
    pub version: u32,
    files: HashMap<String, Entry>,
}

impl Ba2 {
    pub fn read(mut f: File, path: &Path) -> Result<Ba2> {
        let header = read_exact_vec(&mut f, 24)?;
        let cur = Cur::new(&header);
        fields!(cur, Ba2Header {
            magic: [u8; 4],
            version: u32,
            kind: [u8; 4],
            file_count: u32,
            name_table_offset: u64,
        });
        check!(magic == b"BTDX")?;
        if version != 1 && version != 7 && version != 8 {
            bail!("unsupported BA2 version {}", version);
        }

        let mut entries = vec![];
        match kind {
            b"GNRL" => {
                let records = read_exact_vec(&mut f, file_count as usize * GNRL_RECORD_SIZE)?;
                let mut cur = Cur::new(&records);
                for _ in 0..file_count {
                    cur.next_n_u8s(12)?; // name hash, extension, dir hash
                    cur.next::<u32>()?; // flags
                    let offset = cur.next::<u64>()?;
                    let packed_size = cur.next::<u32>()?;
                    let unpacked_size = cur.next::<u32>()?;
                    cur.next::<u32>()?; // 0xBAADF00D
                    entries.push(Entry::General(Chunk { offset, packed_size, unpacked_size }));
                }
            }
            b"DX10" => {
                for _ in 0..file_count {
                    let record = read_exact_vec(&mut f, DX10_RECORD_SIZE)?;
                    let mut cur = Cur::new(&record);
                    cur.next_n_u8s(12)?; // name hash, extension, dir hash
                    cur.next::<u8>()?;
                    let num_chunks = cur.next::<u8>()?;
                    let _chunk_header_size = cur.next::<u16>()?;
                    let height = cur.next::<u16>()?;
                    let width = cur.next::<u16>()?;
                    let num_mips = cur.next::<u8>()?;
                    let dxgi_format = cur.next::<u8>()?;
                    let flags = cur.next::<u8>()?;
                    let _tile_mode = cur.next::<u8>()?;

                    let chunk_bytes = read_exact_vec(&mut f, num_chunks as usize * DX10_CHUNK_SIZE)?;
                    let mut cur = Cur::new(&chunk_bytes);
                    let mut chunks = Vec::with_capacity(num_chunks as usize);
                    for _ in 0..num_chunks {
                        let offset = cur.next::<u64>()?;
                        let packed_size = cur.next::<u32>()?;
                        let unpacked_size = cur.next::<u32>()?;
                        cur.next::<u16>()?; // start mip
                        cur.next::<u16>()?; // end mip
                        cur.next::<u32>()?; // 0xBAADF00D
                        chunks.push(Chunk { offset, packed_size, unpacked_size });
                    }
                    entries.push(Entry::Texture {
                        height,
                        width,
                        num_mips,
                        dxgi_format,
                        is_cube: flags & 1 != 0,
                        chunks,
                    });
                }
            }
            _ => bail!("unsupported BA2 type {:?}", String::from_utf8_lossy(kind)),
        }

        // The name table runs to the end of the file
        f.seek(SeekFrom::Start(name_table_offset))?;
        let mut names = vec![];
        f.read_to_end(&mut names)?;
        let mut cur = Cur::new(&names);
        let mut files = HashMap::with_capacity(entries.len());
        for entry in entries {
            let len = cur.next::<u16>()? as usize;
            let name = String::from_utf8_lossy(cur.next_n_u8s(len)?).into_owned();
            files.insert(normalize_name(&name), entry);
        }

        Ok(Ba2 { path: path.to_owned(), version, files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn extract_key(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entry = match self.files.get(key) {
            Some(e) => e,
            None => return Ok(None),
        };
        match *entry {
            Entry::General(ref chunk) => Ok(Some(self.read_chunk(chunk)?)),
            Entry::Texture { height, width, num_mips, dxgi_format, is_cube, ref chunks } => {
                let mut out = vec![];
                let layout = Layout {
                    cube: is_cube,
                    ..Layout::tex2d(width as u32, height as u32, num_mips.max(1) as u32, dxgi_format as u32)
                };
                write_dx10_header(&mut out, &layout);
                for chunk in chunks {
                    out.extend(self.read_chunk(chunk)?);
                }
                Ok(Some(out))
            }
        }
    }

    fn read_chunk(&self, chunk: &Chunk) -> Result<Vec<u8>> {
        if chunk.packed_size == 0 {
            return read_at(&self.path, chunk.offset, chunk.unpacked_size as usize);
        }
        let packed = read_at(&self.path, chunk.offset, chunk.packed_size as usize)?;
        let mut out = Vec::with_capacity(chunk.unpacked_size as usize);
        ZlibDecoder::new(&packed[..]).read_to_end(&mut out)?;
        if out.len() != chunk.unpacked_size as usize {
            warn!("{}: chunk decompressed to {} bytes, expected {}",
                self.path.display(), out.len(), chunk.unpacked_size);
        }
        Ok(out)
    }
}

/// Writes BA2 files for tests.
#[cfg(test)]
pub mod writer {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(vec![], Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// A general archive; files are zlib-packed if `pack` is set.
    pub fn write_general(pack: bool, files: &[(&str, &[u8])]) -> Vec<u8> {
        let blobs: Vec<Vec<u8>> = files
            .iter()
            .map(|f| if pack { compress(f.1) } else { f.1.to_vec() })
            .collect();
        let data_start = 24 + files.len() * 36;
        let name_table_offset = data_start + blobs.iter().map(|b| b.len()).sum::<usize>();

        let mut out = vec![];
        out.extend_from_slice(b"BTDX");
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(b"GNRL");
        out.extend_from_slice(&(files.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name_table_offset as u64).to_le_bytes());
        let mut offset = data_start as u64;
        for (f, blob) in files.iter().zip(&blobs) {
            out.extend_from_slice(&[0; 12]);
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            let packed = if pack { blob.len() as u32 } else { 0 };
            out.extend_from_slice(&packed.to_le_bytes());
            out.extend_from_slice(&(f.1.len() as u32).to_le_bytes());
            out.extend_from_slice(&0xBAAD_F00Du32.to_le_bytes());
            offset += blob.len() as u64;
        }
        for blob in &blobs {
            out.extend_from_slice(blob);
        }
        for f in files {
            out.extend_from_slice(&(f.0.len() as u16).to_le_bytes());
            out.extend_from_slice(f.0.as_bytes());
        }
        out
    }

    /// A texture archive holding one texture stored as a single packed
    /// chunk.
    pub fn write_texture(name: &str, width: u16, height: u16, mips: u8, dxgi: u8, data: &[u8]) -> Vec<u8> {
        let packed = compress(data);
        let data_start = 24 + 24 + 24;
        let name_table_offset = data_start + packed.len();

        let mut out = vec![];
        out.extend_from_slice(b"BTDX");
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(b"DX10");
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(name_table_offset as u64).to_le_bytes());

        out.extend_from_slice(&[0; 12]);
        out.push(0);
        out.push(1); // chunks
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.push(mips);
        out.push(dxgi);
        out.push(0);
        out.push(8);

        out.extend_from_slice(&(data_start as u64).to_le_bytes());
        out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&(mips as u16 - 1).to_le_bytes());
        out.extend_from_slice(&0xBAAD_F00Du32.to_le_bytes());

        out.extend_from_slice(&packed);
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::writer::*;
    use crate::archive::Archive;
    use crate::dds::Texture;

    fn open(bytes: &[u8]) -> (tempfile::TempDir, Archive) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.ba2");
        std::fs::write(&path, bytes).unwrap();
        let archive = Archive::open(&path).unwrap();
        (dir, archive)
    }

    #[test]
    fn extracts_general_files() {
        let bytes = write_general(true, &[
            ("Meshes\\Box.nif", &b"box data"[..]),
            ("Materials\\a.bgsm", &b"material"[..]),
        ]);
        let (_dir, ba2) = open(&bytes);
        assert_eq!(ba2.len(), 2);
        assert_eq!(ba2.extract("meshes/box.nif").unwrap().unwrap(), b"box data");
        assert_eq!(ba2.extract("materials\\A.BGSM").unwrap().unwrap(), b"material");
        assert!(!ba2.contains("meshes\\other.nif"));
    }

    #[test]
    fn extracts_stored_files() {
        let bytes = write_general(false, &[("a.txt", &b"plain"[..])]);
        let (_dir, ba2) = open(&bytes);
        assert_eq!(ba2.extract("A.TXT").unwrap().unwrap(), b"plain");
    }

    #[test]
    fn rebuilds_dds_for_textures() {
        // 8x8 BC1 with a 4x4 mip
        let data = vec![0x55u8; 4 * 8 + 8];
        let bytes = write_texture("Textures\\T.dds", 8, 8, 2, 71, &data);
        let (_dir, ba2) = open(&bytes);
        let dds = ba2.extract("textures\\t.dds").unwrap().unwrap();
        assert_eq!(&dds[..4], b"DDS ");
        let tex = Texture::from_bytes(&dds).unwrap();
        assert_eq!((tex.width, tex.height, tex.levels), (8, 8, 2));
        assert_eq!(tex.image(0, 0, 1), &[0x55; 8][..]);
    }
}
