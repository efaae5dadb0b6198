//! The `info` subcommand: what the viewer would draw, as text.

use crate::assets::Assets;
use crate::nif::NifFile;
use crate::viewer::material::{select_pipeline, AlphaState};
use std::fmt::{self, Write};

/// Totals over the visible shapes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub vertices: usize,
    pub faces: usize,
    pub shapes: usize,
}

impl Stats {
    pub fn of(nif: &NifFile) -> Stats {
        let mut stats = Stats::default();
        for shape in nif.shapes().iter().filter(|s| !s.is_hidden()) {
            if let Some(ref geom) = shape.geometry {
                stats.vertices += geom.num_vertices();
                stats.faces += geom.num_triangles();
                stats.shapes += 1;
            }
        }
        stats
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Verts: {} | Faces: {} | Shapes: {}", self.vertices, self.faces, self.shapes)
    }
}

pub fn main(nif: &NifFile, assets: &Assets, label: &str) {
    let mut s = String::new();
    let res = write_info(&mut s, nif, label, |path| assets.load(path, |_| Some(())).is_some());
    if res.is_ok() {
        print!("{}", s);
    }
}

/// `found` says whether a texture path resolves.
pub fn write_info<F>(w: &mut String, nif: &NifFile, label: &str, mut found: F) -> fmt::Result
where
    F: FnMut(&str) -> bool,
{
    let version = nif.version();
    writeln!(w, "{} - {}", label, Stats::of(nif))?;
    writeln!(w, "  Version: {:#x}, user {}, stream {}", version.file, version.user, version.stream)?;
    if let Some(root) = nif.root_name() {
        writeln!(w, "  Root: {:?}", root)?;
    }

    for shape in nif.shapes() {
        write!(w, "  Shape {:?}:", shape.name)?;
        if shape.is_hidden() {
            write!(w, " (hidden)")?;
        }
        writeln!(w)?;
        if let Some(ref geom) = shape.geometry {
            writeln!(w, "    Verts: {}, Faces: {}", geom.num_vertices(), geom.num_triangles())?;
        }

        let shader = nif.shader(shape);
        match select_pipeline(shader, version.is_fo4()) {
            Some(p) => writeln!(w, "    Pipeline: {:?}", p)?,
            None => writeln!(w, "    Pipeline: none")?,
        }
        if let Some(alpha) = nif.alpha_property(shape) {
            let a = AlphaState::from_property(alpha);
            write!(w, "    Alpha:")?;
            if a.blend_enable {
                write!(w, " blend {:?}/{:?}", a.src_blend, a.dst_blend)?;
            }
            if a.test_enable {
                write!(w, " test {:?} {:.3}", a.test_mode, a.threshold)?;
            }
            writeln!(w)?;
        }

        let slots = nif.texture_slots(shape).unwrap_or_default();
        for (i, path) in slots.iter().enumerate().filter(|&(_, p)| !p.is_empty()) {
            let status = if found(path) { "" } else { " (missing)" };
            writeln!(w, "    [{}] {}{}", i, path, status)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nif::test_util::*;
    use crate::nif::Transform;

    fn sample() -> NifFile {
        let mut nif = NifBuilder::new(100);
        let textures = nif.texture_set(&["textures\\a_d.dds", "textures\\a_n.dds"]);
        let shader = nif.lighting_shader(&LightingShaderDesc {
            texture_set: textures,
            ..LightingShaderDesc::default()
        });
        let alpha = nif.alpha_property(0x12ED, 128);
        let a = nif.bs_tri_shape("A", Transform::default(), &quad(), shader, alpha);
        let b = nif.bs_tri_shape("B", translation(2.0, 0.0, 0.0), &quad(), -1, -1);
        nif.node("Root", Transform::default(), &[a, b]);
        NifFile::from_bytes(&nif.build()).unwrap()
    }

    #[test]
    fn counts_visible_shapes() {
        let stats = Stats::of(&sample());
        assert_eq!(stats, Stats { vertices: 8, faces: 4, shapes: 2 });
        assert_eq!(stats.to_string(), "Verts: 8 | Faces: 4 | Shapes: 2");
    }

    #[test]
    fn lists_shapes_and_textures() {
        let mut s = String::new();
        write_info(&mut s, &sample(), "a.nif", |p| p.ends_with("_d.dds")).unwrap();
        assert!(s.starts_with("a.nif - Verts: 8 | Faces: 4 | Shapes: 2\n"));
        assert!(s.contains("  Root: \"Root\"\n"));
        assert!(s.contains("Pipeline: SkDefault"));
        assert!(s.contains("Pipeline: none"));
        assert!(s.contains("blend SrcAlpha/OneMinusSrcAlpha test Greater"));
        assert!(s.contains("[0] textures\\a_d.dds\n"));
        assert!(s.contains("[1] textures\\a_n.dds (missing)\n"));
    }
}
