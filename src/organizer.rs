//! The mod-manager view of the game's data directory.
//!
//! Assets are looked up through an `Organizer`: a virtual file system
//! where installed mods overlay the game's data directory in priority
//! order, each mod possibly shipping its own archives. `ModOrganizer`
//! implements it over a plain mods directory laid out the way Mod
//! Organizer lays it out (one folder per mod, priority from a mod list).

use crate::archive::ArchiveCache;
use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub trait Organizer {
    /// Where the highest-priority mod providing `path` has it, if any
    /// mod does. `path` is relative to the data directory.
    fn resolve_path(&self, path: &str) -> Option<PathBuf>;

    /// The game's data directory. `None` if no game is configured.
    fn data_directory(&self) -> Option<PathBuf>;

    /// Names of the mods that provide `path`, loose or in one of their
    /// archives, highest priority first.
    fn file_origins(&self, path: &str) -> Vec<String>;

    fn mod_directory(&self, name: &str) -> Option<PathBuf>;

    /// Archive file names (relative to the data directory) the game
    /// loads, in load order. `None` if this organizer can't tell.
    fn game_archives(&self) -> Option<Vec<String>>;
}

pub struct ModOrganizer {
    data_dir: Option<PathBuf>,
    mods_dir: Option<PathBuf>,
    /// Enabled mods, highest priority first.
    mods: Vec<String>,
    archives: Option<Vec<String>>,
    archive_cache: Rc<ArchiveCache>,
}

impl ModOrganizer {
    /// `archive_cache` should be the one `Assets` extracts from, so each
    /// mod archive is only indexed once.
    pub fn new(config: &Config, archive_cache: Rc<ArchiveCache>) -> ModOrganizer {
        ModOrganizer {
            data_dir: config.data_dir.clone(),
            mods_dir: config.mods_dir.clone(),
            mods: config.mods.clone(),
            archives: config.archives.clone(),
            archive_cache,
        }
    }

    fn mod_dirs(&self) -> impl Iterator<Item = (&str, PathBuf)> + '_ {
        let mods_dir = self.mods_dir.as_ref();
        self.mods
            .iter()
            .filter_map(move |name| Some((name.as_str(), mods_dir?.join(name))))
            .filter(|(_, dir)| dir.is_dir())
    }
}

impl Organizer for ModOrganizer {
    fn resolve_path(&self, path: &str) -> Option<PathBuf> {
        let rel = clean_path(path)?;
        self.mod_dirs().find_map(|(_, dir)| find_case_insensitive(&dir, &rel))
    }

    fn data_directory(&self) -> Option<PathBuf> {
        self.data_dir.clone()
    }

    fn file_origins(&self, path: &str) -> Vec<String> {
        let rel = match clean_path(path) {
            Some(rel) => rel,
            None => return vec![],
        };
        self.mod_dirs()
            .filter(|(_, dir)| {
                find_case_insensitive(dir, &rel).is_some()
                    || list_archives(dir).iter().any(|a| {
                        self.archive_cache.get(a).map(|a| a.contains(path)).unwrap_or(false)
                    })
            })
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn mod_directory(&self, name: &str) -> Option<PathBuf> {
        let dir = self.mods_dir.as_ref()?.join(name);
        if dir.is_dir() { Some(dir) } else { None }
    }

    fn game_archives(&self) -> Option<Vec<String>> {
        if let Some(ref archives) = self.archives {
            return Some(archives.clone());
        }
        // Without a configured list, every archive in the data directory
        // in name order
        let data_dir = self.data_dir.as_ref()?;
        let mut names: Vec<String> = fs::read_dir(data_dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| is_archive_name(name))
            .collect();
        names.sort();
        Some(names)
    }
}

/// Normalizes a data-relative path: forward slashes, no `.` or empty
/// components, `..` applied. `None` if it climbs out of the root or is
/// empty.
pub fn clean_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = vec![];
    for comp in path.split(|c| c == '/' || c == '\\') {
        match comp {
            "" | "." => (),
            ".." => {
                parts.pop()?;
            }
            _ => parts.push(comp),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Finds `rel` (slash-separated) under `root`, matching each component
/// without regard to ASCII case. Only files are returned.
pub fn find_case_insensitive(root: &Path, rel: &str) -> Option<PathBuf> {
    let exact = root.join(rel);
    if exact.is_file() {
        return Some(exact);
    }
    let mut cur = root.to_path_buf();
    for comp in rel.split('/') {
        let next = cur.join(comp);
        if next.exists() {
            cur = next;
            continue;
        }
        let entry = fs::read_dir(&cur)
            .ok()?
            .filter_map(|e| e.ok())
            .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(comp))?;
        cur = entry.path();
    }
    if cur.is_file() { Some(cur) } else { None }
}

pub fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".bsa") || lower.ends_with(".ba2")
}

/// Every archive in a mod's file tree, in path order.
pub fn list_archives(dir: &Path) -> Vec<PathBuf> {
    let mut found = vec![];
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let entries = match fs::read_dir(&d) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_archive_name(&entry.file_name().to_string_lossy()) {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

/// Enabled mods from a Mod Organizer `modlist.txt`, highest priority
/// first. Lines are `+Name` (enabled), `-Name` (disabled), `*Name`
/// (unmanaged) or `#` comments.
pub fn parse_modlist(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .filter_map(|l| l.strip_prefix('+'))
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn clean_path_normalizes() {
        assert_eq!(clean_path("textures\\a\\..\\b.dds").as_deref(), Some("textures/b.dds"));
        assert_eq!(clean_path("/./meshes//x.nif").as_deref(), Some("meshes/x.nif"));
        assert_eq!(clean_path("../x"), None);
        assert_eq!(clean_path(""), None);
    }

    #[test]
    fn modlist_keeps_enabled_mods_in_order() {
        let text = "# comment\n+High\n-Disabled\n*DLC: Dawnguard\n+Low\n";
        assert_eq!(parse_modlist(text), vec!["High", "Low"]);
    }

    fn setup() -> (tempfile::TempDir, ModOrganizer) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for (path, contents) in &[
            ("data/textures/a.dds", "data"),
            ("mods/High/Textures/A.dds", "high"),
            ("mods/Low/textures/a.dds", "low"),
            ("mods/Low/textures/only_low.dds", "low"),
        ] {
            let p = root.join(path);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, contents).unwrap();
        }
        let config = Config {
            data_dir: Some(root.join("data")),
            mods_dir: Some(root.join("mods")),
            mods: vec!["High".into(), "Missing".into(), "Low".into()],
            ..Config::default()
        };
        let org = ModOrganizer::new(&config, Rc::new(ArchiveCache::default()));
        (dir, org)
    }

    #[test]
    fn highest_priority_mod_wins() {
        let (_dir, org) = setup();
        let p = org.resolve_path("textures\\a.dds").unwrap();
        assert_eq!(fs::read_to_string(p).unwrap(), "high");
        let p = org.resolve_path("TEXTURES/only_low.dds").unwrap();
        assert_eq!(fs::read_to_string(p).unwrap(), "low");
        assert!(org.resolve_path("textures/none.dds").is_none());
    }

    #[test]
    fn origins_are_in_priority_order() {
        let (_dir, org) = setup();
        assert_eq!(org.file_origins("textures/a.dds"), vec!["High", "Low"]);
        assert!(org.file_origins("textures/none.dds").is_empty());
        assert!(org.mod_directory("Missing").is_none());
    }
}
