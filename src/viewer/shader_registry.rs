//! Lazily built shader programs, one per material pipeline.

use super::material::Pipeline;
use super::Display;
use glium::program::ProgramCreationInput;
use glium::Program;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ShaderRegistry {
    display: Display,
    dir: PathBuf,
    /// `None` remembers a pipeline that failed to build so it isn't retried
    /// every frame.
    programs: HashMap<Pipeline, Option<Program>>,
}

impl ShaderRegistry {
    pub fn new(display: &Display, dir: PathBuf) -> ShaderRegistry {
        ShaderRegistry {
            display: display.clone(),
            dir,
            programs: HashMap::new(),
        }
    }

    /// The program for `pipeline`, building it on first use. `None` if its
    /// sources can't be read or don't compile.
    pub fn program(&mut self, pipeline: Pipeline) -> Option<&Program> {
        let ShaderRegistry { ref display, ref dir, ref mut programs } = *self;
        programs
            .entry(pipeline)
            .or_insert_with(|| build(display, dir, pipeline))
            .as_ref()
    }

    pub fn cleanup(&mut self) {
        self.programs.clear();
    }
}

pub fn source_paths(dir: &Path, pipeline: Pipeline) -> (PathBuf, PathBuf) {
    let (vert, frag) = pipeline.sources();
    (dir.join(vert), dir.join(frag))
}

fn build(display: &Display, dir: &Path, pipeline: Pipeline) -> Option<Program> {
    let (vert_path, frag_path) = source_paths(dir, pipeline);
    let read = |path: &Path| match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("couldn't read shader {}: {}", path.display(), e);
            None
        }
    };
    let vertex_shader = read(&vert_path)?;
    let fragment_shader = read(&frag_path)?;

    let input = ProgramCreationInput::SourceCode {
        vertex_shader: &vertex_shader,
        fragment_shader: &fragment_shader,
        geometry_shader: None,
        tessellation_control_shader: None,
        tessellation_evaluation_shader: None,
        transform_feedback_varyings: None,
        outputs_srgb: true,
        uses_point_size: false,
    };
    match Program::new(display, input) {
        Ok(program) => {
            debug!("built {:?} program", pipeline);
            Some(program)
        }
        Err(e) => {
            warn!(
                "couldn't build {:?} program ({}, {}): {}",
                pipeline,
                vert_path.display(),
                frag_path.display(),
                e,
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_live_in_the_shader_dir() {
        let (v, f) = source_paths(Path::new("shaders"), Pipeline::SkMultilayer);
        assert_eq!(v, Path::new("shaders").join("default.vert"));
        assert_eq!(f, Path::new("shaders").join("sk_multilayer.frag"));
    }

    #[test]
    fn shipped_shaders_exist() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders");
        for &p in &Pipeline::ALL {
            let (v, f) = source_paths(&dir, p);
            assert!(v.is_file(), "{}", v.display());
            assert!(f.is_file(), "{}", f.display());
        }
    }
}
