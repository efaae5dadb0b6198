use super::{normalize_name, read_at, read_exact_vec};
use crate::errors::{Result, ResultExt};
use crate::util::cur::Cur;
use flate2::read::ZlibDecoder;
use lz4_flex::frame::FrameDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const VERSION_OBLIVION: u32 = 103;
pub const VERSION_SKYRIM: u32 = 104;
pub const VERSION_SKYRIM_SE: u32 = 105;

const FLAG_FOLDER_NAMES: u32 = 0x1;
const FLAG_FILE_NAMES: u32 = 0x2;
const FLAG_COMPRESSED: u32 = 0x4;
const FLAG_EMBEDDED_NAMES: u32 = 0x100;

const SIZE_COMPRESSION_TOGGLE: u32 = 0x4000_0000;
const SIZE_MASK: u32 = 0x3FFF_FFFF;

struct Entry {
    offset: u64,
    size: u32,
    compressed: bool,
}

pub struct Bsa {
    pub path: PathBuf,
    pub version: u32,
    archive_flags: u32,
    files: HashMap<String, Entry>,
}

impl Bsa {
    pub fn read(mut f: File, path: &Path) -> Result<Bsa> {
        let header = read_exact_vec(&mut f, 36)?;
        let cur = Cur::new(&header);
        fields!(cur, BsaHeader {
            magic: [u8; 4],
            version: u32,
            folder_records_offset: u32,
            archive_flags: u32,
            folder_count: u32,
            file_count: u32,
            total_folder_name_len: u32,
            total_file_name_len: u32,
            file_flags: u32,
        });
        let _ = file_flags;
        check!(magic == b"BSA\0")?;
        if version != VERSION_OBLIVION && version != VERSION_SKYRIM && version != VERSION_SKYRIM_SE {
            bail!("unsupported BSA version {}", version);
        }
        if archive_flags & FLAG_FILE_NAMES == 0 {
            bail!("BSA has no file names");
        }
        check!(folder_records_offset == 36)?;

        let folder_record_size = if version == VERSION_SKYRIM_SE { 24 } else { 16 };
        let folder_names_len = if archive_flags & FLAG_FOLDER_NAMES != 0 {
            total_folder_name_len as usize + folder_count as usize
        } else {
            0
        };
        let index_len = folder_count as usize * folder_record_size
            + folder_names_len
            + file_count as usize * 16
            + total_file_name_len as usize;
        let index = read_exact_vec(&mut f, index_len)
            .chain_err(|| format!("couldn't read index of {}", path.display()))?;
        let mut cur = Cur::new(&index);

        let mut folder_file_counts = Vec::with_capacity(folder_count as usize);
        for _ in 0..folder_count {
            let _hash = cur.next::<u64>()?;
            let count = cur.next::<u32>()?;
            if version == VERSION_SKYRIM_SE {
                cur.next::<u32>()?;
                cur.next::<u64>()?;
            } else {
                cur.next::<u32>()?;
            }
            folder_file_counts.push(count);
        }

        struct Record {
            folder: String,
            size: u32,
            offset: u32,
        }
        let mut records = vec![];
        for &count in &folder_file_counts {
            let folder = if archive_flags & FLAG_FOLDER_NAMES != 0 {
                let len = cur.next::<u8>()? as usize;
                crate::nif::stream::decode_string(cur.next_n_u8s(len)?)
            } else {
                String::new()
            };
            for _ in 0..count {
                let _hash = cur.next::<u64>()?;
                let size = cur.next::<u32>()?;
                let offset = cur.next::<u32>()?;
                records.push(Record { folder: folder.clone(), size, offset });
            }
        }
        if records.len() != file_count as usize {
            bail!("BSA folder counts don't add up to its file count");
        }

        let mut files = HashMap::with_capacity(records.len());
        for record in records {
            let name = cur.next_until(0, 512)?;
            let name = String::from_utf8_lossy(name);
            let full = if record.folder.is_empty() {
                name.into_owned()
            } else {
                format!("{}\\{}", record.folder, name)
            };
            let default_compressed = archive_flags & FLAG_COMPRESSED != 0;
            let entry = Entry {
                offset: record.offset as u64,
                size: record.size & SIZE_MASK,
                compressed: default_compressed ^ (record.size & SIZE_COMPRESSION_TOGGLE != 0),
            };
            files.insert(normalize_name(&full), entry);
        }

        Ok(Bsa { path: path.to_owned(), version, archive_flags, files })
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
        let raw = read_at(&self.path, entry.offset, entry.size as usize)?;
        let mut data = &raw[..];

        if self.version >= VERSION_SKYRIM && self.archive_flags & FLAG_EMBEDDED_NAMES != 0 {
            let len = *data.first().ok_or("BSA file record is empty")? as usize;
            if data.len() < len + 1 {
                bail!("BSA embedded name runs past the file data");
            }
            data = &data[len + 1..];
        }

        if !entry.compressed {
            return Ok(Some(data.to_vec()));
        }

        let mut cur = Cur::new(data);
        let original_size = cur.next::<u32>()? as usize;
        let packed = cur.slice_from_cur_to_end();
        let mut out = Vec::with_capacity(original_size);
        if self.version == VERSION_SKYRIM_SE {
            FrameDecoder::new(packed).read_to_end(&mut out)?;
        } else {
            ZlibDecoder::new(packed).read_to_end(&mut out)?;
        }
        if out.len() != original_size {
            warn!("{}: {} decompressed to {} bytes, expected {}",
                self.path.display(), key, out.len(), original_size);
        }
        Ok(Some(out))
    }
}

/// Writes BSA files for tests.
#[cfg(test)]
pub mod writer {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use lz4_flex::frame::FrameEncoder;
    use std::io::Write;

    /// `files` are (folder, file name, contents). Files are stored
    /// compressed if `compress` is set.
    pub fn write_bsa(version: u32, compress: bool, files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut folders: Vec<&str> = vec![];
        for &(folder, _, _) in files {
            if !folders.contains(&folder) {
                folders.push(folder);
            }
        }
        let grouped: Vec<Vec<&(&str, &str, &[u8])>> = folders
            .iter()
            .map(|f| files.iter().filter(|x| x.0 == *f).collect())
            .collect();

        let folder_record_size = if version == VERSION_SKYRIM_SE { 24 } else { 16 };
        let total_folder_name_len: usize = folders.iter().map(|f| f.len() + 1).sum();
        let total_file_name_len: usize = files.iter().map(|f| f.1.len() + 1).sum();
        let index_len = folders.len() * folder_record_size
            + total_folder_name_len + folders.len()
            + files.len() * 16
            + total_file_name_len;
        let data_start = 36 + index_len;

        // Lay out file data
        let mut blobs = vec![];
        for group in &grouped {
            for &&(_, _, contents) in group {
                let blob = if compress {
                    let mut blob = (contents.len() as u32).to_le_bytes().to_vec();
                    if version == VERSION_SKYRIM_SE {
                        let mut enc = FrameEncoder::new(vec![]);
                        enc.write_all(contents).unwrap();
                        blob.extend(enc.finish().unwrap());
                    } else {
                        let mut enc = ZlibEncoder::new(vec![], Compression::default());
                        enc.write_all(contents).unwrap();
                        blob.extend(enc.finish().unwrap());
                    }
                    blob
                } else {
                    contents.to_vec()
                };
                blobs.push(blob);
            }
        }

        let mut out = vec![];
        let put32 = |out: &mut Vec<u8>, x: u32| out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(b"BSA\0");
        put32(&mut out, version);
        put32(&mut out, 36);
        let flags = FLAG_FOLDER_NAMES | FLAG_FILE_NAMES | if compress { FLAG_COMPRESSED } else { 0 };
        put32(&mut out, flags);
        put32(&mut out, folders.len() as u32);
        put32(&mut out, files.len() as u32);
        put32(&mut out, total_folder_name_len as u32);
        put32(&mut out, total_file_name_len as u32);
        put32(&mut out, 0);

        for group in &grouped {
            out.extend_from_slice(&0u64.to_le_bytes());
            put32(&mut out, group.len() as u32);
            if version == VERSION_SKYRIM_SE {
                put32(&mut out, 0);
                out.extend_from_slice(&0u64.to_le_bytes());
            } else {
                put32(&mut out, 0);
            }
        }
        let mut offset = data_start;
        let mut blob_iter = blobs.iter();
        for (folder, group) in folders.iter().zip(&grouped) {
            out.push(folder.len() as u8 + 1);
            out.extend_from_slice(folder.as_bytes());
            out.push(0);
            for _ in group {
                let blob = blob_iter.next().unwrap();
                out.extend_from_slice(&0u64.to_le_bytes());
                put32(&mut out, blob.len() as u32);
                put32(&mut out, offset as u32);
                offset += blob.len();
            }
        }
        for group in &grouped {
            for &&(_, name, _) in group {
                out.extend_from_slice(name.as_bytes());
                out.push(0);
            }
        }
        assert_eq!(out.len(), data_start);
        for blob in &blobs {
            out.extend_from_slice(blob);
        }
        out
    }
}
