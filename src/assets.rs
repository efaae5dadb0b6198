//! Finds the bytes behind a data-relative path.
//!
//! Lookup order:
//!
//! 1. a loose file, from the mod overlay or the game's data directory;
//! 2. the archives of the highest-priority mod that provides the path;
//! 3. the game's archives, last declared first.
//!
//! A loose file is final even if it fails to decode. For archives the
//! first one that both extracts and decodes wins; every failure on the
//! way is logged at debug level and the next candidate is tried.

use crate::archive::ArchiveCache;
use crate::organizer::{clean_path, find_case_insensitive, list_archives, Organizer};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct Assets {
    organizer: Rc<dyn Organizer>,
    archives: Rc<ArchiveCache>,
    warned_no_data: Cell<bool>,
    warned_no_archives: Cell<bool>,
}

impl Assets {
    pub fn new(organizer: Rc<dyn Organizer>, archives: Rc<ArchiveCache>) -> Assets {
        Assets {
            organizer,
            archives,
            warned_no_data: Cell::new(false),
            warned_no_archives: Cell::new(false),
        }
    }

    /// The loose file for `path`: the overlay's copy if any mod has one,
    /// else the data directory's.
    pub fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        if let Some(p) = self.organizer.resolve_path(path) {
            if p.is_absolute() && p.is_file() {
                return Some(p);
            }
        }
        let data_dir = self.organizer.data_directory()?;
        let rel = clean_path(path)?;
        find_case_insensitive(&data_dir, &rel)
    }

    /// Reads the raw bytes for `path`.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.load(path, |bytes| Some(bytes.to_vec()))
    }

    /// Looks `path` up and decodes it with `decode`.
    pub fn load<T, F>(&self, path: &str, mut decode: F) -> Option<T>
    where
        F: FnMut(&[u8]) -> Option<T>,
    {
        if self.organizer.data_directory().is_none() {
            if !self.warned_no_data.replace(true) {
                warn!("no game data directory configured; assets can't be found");
            }
            return None;
        }

        if let Some(file) = self.resolve_path(path) {
            debug!("{}: loose file {}", path, file.display());
            return match fs::read(&file) {
                Ok(bytes) => decode(&bytes),
                Err(e) => {
                    debug!("couldn't read {}: {}", file.display(), e);
                    None
                }
            };
        }

        if let Some(origin) = self.organizer.file_origins(path).into_iter().next() {
            if let Some(dir) = self.organizer.mod_directory(&origin) {
                for archive in list_archives(&dir) {
                    if let Some(x) = self.from_archive(&archive, path, &mut decode) {
                        return Some(x);
                    }
                }
            }
        }

        let archives = match self.organizer.game_archives() {
            Some(archives) => archives,
            None => {
                if !self.warned_no_archives.replace(true) {
                    warn!("the game's archive list is unavailable");
                }
                return None;
            }
        };
        for name in archives.iter().rev() {
            let archive = match self.resolve_path(name) {
                Some(p) => p,
                None => {
                    debug!("archive {} not found", name);
                    continue;
                }
            };
            if let Some(x) = self.from_archive(&archive, path, &mut decode) {
                return Some(x);
            }
        }

        debug!("{}: not found", path);
        None
    }

    fn from_archive<T, F>(&self, archive: &Path, path: &str, decode: &mut F) -> Option<T>
    where
        F: FnMut(&[u8]) -> Option<T>,
    {
        let archive = self.archives.get(archive)?;
        match archive.extract(path) {
            Ok(Some(bytes)) => {
                debug!("{}: found in {}", path, archive.path().display());
                decode(&bytes)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("couldn't extract {} from {}: {}", path, archive.path().display(), e);
                None
            }
        }
    }
}
