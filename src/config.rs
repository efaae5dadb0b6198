//! Where to find game data, mods and shaders.
//!
//! Settings come from an optional JSON profile (`--profile`) and are
//! then overridden by command-line options. A profile looks like:
//!
//! ```text
//! {
//!     "game": "Skyrim Special Edition",
//!     "data": "C:/Games/Skyrim Special Edition/Data",
//!     "mods": "C:/Modding/MO2/mods",
//!     "modlist": ["HighestPriorityMod", "OtherMod"],
//!     "archives": ["Skyrim - Textures0.bsa", "Skyrim - Meshes0.bsa"],
//!     "shaders": "C:/Tools/nifview/shaders",
//!     "isolated_camera": false,
//!     "debug_gl": false
//! }
//! ```
//!
//! Relative paths in a profile are relative to the profile's directory.
//! `"modlist"` lists the enabled mods, highest priority first, or names
//! a Mod Organizer `modlist.txt`.

use crate::errors::{Result, ResultExt};
use crate::organizer::parse_modlist;
use clap::ArgMatches;
use json::JsonValue;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub game: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub mods_dir: Option<PathBuf>,
    /// Enabled mods, highest priority first.
    pub mods: Vec<String>,
    pub archives: Option<Vec<String>>,
    pub shaders_dir: Option<PathBuf>,
    pub isolated_camera: bool,
    /// Ask for a debug GL context and log what the driver reports.
    pub debug_gl: bool,
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Config> {
        let mut config = match matches.value_of_os("profile") {
            Some(path) => Config::load_profile(Path::new(path))?,
            None => Config::default(),
        };

        if let Some(game) = matches.value_of("game") {
            config.game = Some(game.to_string());
        }
        if let Some(data) = matches.value_of_os("data") {
            config.data_dir = Some(PathBuf::from(data));
        }
        if let Some(mods) = matches.value_of_os("mods") {
            config.mods_dir = Some(PathBuf::from(mods));
        }
        if let Some(modlist) = matches.value_of_os("modlist") {
            config.mods = read_modlist(Path::new(modlist))?;
        }
        if let Some(shaders) = matches.value_of_os("shaders") {
            config.shaders_dir = Some(PathBuf::from(shaders));
        }
        if matches.is_present("isolated-camera") {
            config.isolated_camera = true;
        }
        if matches.is_present("debug-gl") {
            config.debug_gl = true;
        }

        if config.mods.is_empty() {
            if let Some(ref mods_dir) = config.mods_dir {
                // No mod list: every mod folder, in name order
                config.mods = list_mod_folders(mods_dir);
            }
        }
        debug!("config: {:?}", config);
        Ok(config)
    }

    pub fn load_profile(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .chain_err(|| format!("couldn't read profile {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Config::from_json(&text, base)
            .chain_err(|| format!("bad profile {}", path.display()))
    }

    pub fn from_json(text: &str, base: &Path) -> Result<Config> {
        let v = json::parse(text)?;
        if !v.is_object() {
            bail!("profile must be a JSON object");
        }
        let path_of = |key: &str| -> Result<Option<PathBuf>> {
            match v[key] {
                JsonValue::Null => Ok(None),
                ref x => match x.as_str() {
                    Some(s) => Ok(Some(base.join(s))),
                    None => bail!("\"{}\" must be a string", key),
                },
            }
        };
        let strings_of = |key: &str| -> Result<Option<Vec<String>>> {
            match v[key] {
                JsonValue::Null => Ok(None),
                JsonValue::Array(ref items) => {
                    let mut out = vec![];
                    for item in items {
                        match item.as_str() {
                            Some(s) => out.push(s.to_string()),
                            None => bail!("\"{}\" must only hold strings", key),
                        }
                    }
                    Ok(Some(out))
                }
                _ => bail!("\"{}\" must be an array", key),
            }
        };

        let mut config = Config {
            game: v["game"].as_str().map(|s| s.to_string()),
            data_dir: path_of("data")?,
            mods_dir: path_of("mods")?,
            mods: vec![],
            archives: strings_of("archives")?,
            shaders_dir: path_of("shaders")?,
            isolated_camera: v["isolated_camera"].as_bool().unwrap_or(false),
            debug_gl: v["debug_gl"].as_bool().unwrap_or(false),
        };
        if v["modlist"].is_string() {
            if let Some(modlist) = path_of("modlist")? {
                config.mods = read_modlist(&modlist)?;
            }
        } else if let Some(mods) = strings_of("modlist")? {
            config.mods = mods;
        }
        Ok(config)
    }

    /// The directory holding the GLSL sources: as configured, else a
    /// `shaders` directory beside the executable, else the one in the
    /// source tree.
    pub fn shaders_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.shaders_dir {
            return dir.clone();
        }
        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                let candidate = dir.join("shaders");
                if candidate.is_dir() {
                    return candidate;
                }
            }
        }
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"))
    }
}

fn read_modlist(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .chain_err(|| format!("couldn't read mod list {}", path.display()))?;
    Ok(parse_modlist(&text))
}

fn list_mod_folders(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) => {
            warn!("couldn't list mods in {}: {}", dir.display(), e);
            vec![]
        }
    };
    names.sort();
    names
}
