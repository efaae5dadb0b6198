//! The interactive preview window.

pub mod camera;
pub mod input;
mod main_loop;
pub mod material;
pub mod scene_viewer;
pub mod shader_registry;
pub mod shape;
pub mod texture_cache;
pub mod texture_manager;
pub mod uniforms;
mod window;

use self::scene_viewer::SceneViewer;
use crate::assets::Assets;
use crate::config::Config;
use crate::errors::Result;
use crate::info::Stats;
use crate::nif::NifFile;
use std::path::PathBuf;
use std::rc::Rc;

pub type Display = glium::Display<glium::glutin::surface::WindowSurface>;

pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;

/// Opens a window previewing `nif` and runs until it's closed. `label`
/// names the mesh in the title bar and the snapshot file.
pub fn main(nif: &NifFile, assets: Rc<Assets>, config: &Config, label: &str) -> Result<()> {
    let title = format!("{} - {}", label, Stats::of(nif));
    let snapshot_path = PathBuf::from(format!("{}-snapshot.png", file_stem(label)));
    let shaders_dir = config.shaders_dir();
    let isolated = config.isolated_camera;
    main_loop::main_loop(
        |display| SceneViewer::new(display, nif, assets, shaders_dir, isolated),
        title,
        snapshot_path,
        config.debug_gl,
    )
}

fn file_stem(label: &str) -> &str {
    let name = label.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(label);
    match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::file_stem;

    #[test]
    fn snapshot_names() {
        assert_eq!(file_stem("meshes\\armor\\cuirass.nif"), "cuirass");
        assert_eq!(file_stem("/tmp/tree.BTO"), "tree");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }
}
