//! Bethesda archives: BSA (Skyrim, Skyrim SE) and BA2 (Fallout 4).
//!
//! Opening an archive reads just its index; file data is read from disk
//! on `extract`. Names are matched case-insensitively with either slash.

pub mod ba2;
pub mod bsa;

use crate::errors::{Result, ResultExt};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub enum Archive {
    Bsa(bsa::Bsa),
    Ba2(ba2::Ba2),
}

impl Archive {
    pub fn open(path: &Path) -> Result<Archive> {
        let mut f = File::open(path)
            .chain_err(|| format!("couldn't open archive {}", path.display()))?;
        let mut magic = [0; 4];
        f.read_exact(&mut magic)?;
        f.seek(SeekFrom::Start(0))?;
        let archive = match &magic {
            b"BSA\0" => Archive::Bsa(bsa::Bsa::read(f, path)?),
            b"BTDX" => Archive::Ba2(ba2::Ba2::read(f, path)?),
            _ => bail!("{} is not a BSA or BA2 archive", path.display()),
        };
        debug!("opened {} ({} files)", path.display(), archive.len());
        Ok(archive)
    }

    pub fn path(&self) -> &Path {
        match *self {
            Archive::Bsa(ref a) => &a.path,
            Archive::Ba2(ref a) => &a.path,
        }
    }

    pub fn len(&self) -> usize {
        match *self {
            Archive::Bsa(ref a) => a.len(),
            Archive::Ba2(ref a) => a.len(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        lookup_keys(name).iter().any(|key| match *self {
            Archive::Bsa(ref a) => a.contains_key(key),
            Archive::Ba2(ref a) => a.contains_key(key),
        })
    }

    /// Extracts a file, or `Ok(None)` if the archive doesn't have it.
    pub fn extract(&self, name: &str) -> Result<Option<Vec<u8>>> {
        for key in &lookup_keys(name) {
            let data = match *self {
                Archive::Bsa(ref a) => a.extract_key(key)?,
                Archive::Ba2(ref a) => a.extract_key(key)?,
            };
            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}

/// Keeps archives open by path. An archive that fails to open is
/// remembered too, so the error is only logged once.
#[derive(Default)]
pub struct ArchiveCache {
    open: RefCell<HashMap<PathBuf, Option<Rc<Archive>>>>,
}

impl ArchiveCache {
    pub fn get(&self, path: &Path) -> Option<Rc<Archive>> {
        if let Some(cached) = self.open.borrow().get(path) {
            return cached.clone();
        }
        let archive = match Archive::open(path) {
            Ok(a) => Some(Rc::new(a)),
            Err(e) => {
                debug!("couldn't open archive {}: {}", path.display(), e);
                None
            }
        };
        self.open.borrow_mut().insert(path.to_owned(), archive.clone());
        archive
    }

    /// How many archive paths have been tried.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.open.borrow().len()
    }
}

/// Lowercases, uses backslashes, drops leading separators.
pub fn normalize_name(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c == '/' { '\\' } else { c.to_ascii_lowercase() })
        .collect();
    name.trim_start_matches('\\').to_string()
}

/// Keys to try for a name: normalized, then with a leading `data\`
/// removed since mesh-relative paths sometimes carry it.
fn lookup_keys(name: &str) -> Vec<String> {
    let key = normalize_name(name);
    let mut keys = vec![];
    if let Some(rest) = key.strip_prefix("data\\") {
        keys.push(rest.to_string());
    }
    keys.insert(0, key);
    keys
}

fn read_at(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    f.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0; len];
    f.read_exact(&mut buf)
        .chain_err(|| format!("archive {} is truncated", path.display()))?;
    Ok(buf)
}

fn read_exact_vec<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![];
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        bail!("archive index is truncated");
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("/Textures/Armor/Iron.DDS"), "textures\\armor\\iron.dds");
        assert_eq!(normalize_name("meshes\\a.nif"), "meshes\\a.nif");
        assert_eq!(lookup_keys("Data/Meshes/a.nif"), vec!["data\\meshes\\a.nif", "meshes\\a.nif"]);
    }
}
