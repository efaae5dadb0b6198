//! Command-line entry point.

use crate::archive::ArchiveCache;
use crate::assets::Assets;
use crate::config::Config;
use crate::errors::{Error, Result, ResultExt};
use crate::nif::NifFile;
use crate::organizer::ModOrganizer;
use crate::{info, logger, version, viewer};
use clap::{App, ArgMatches};
use std::path::Path;
use std::rc::Rc;

/// Mesh file extensions the viewer accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["bto", "btr", "nif"];

fn app() -> App<'static, 'static> {
    clap_app!(nifview =>
        (@setting ArgRequiredElseHelp)
        (@setting DisableVersion)
        (@setting VersionlessSubcommands)
        (about: "Previewer for Bethesda NIF meshes")
        (@arg version: -V --version "Print version info")
        (@arg verbose: -v --verbose +multiple +global "Log more (repeat for even more)")
        (@arg data: -d --data +takes_value +global "Game data directory")
        (@arg mods: -m --mods +takes_value +global "Directory holding one folder per mod")
        (@arg modlist: --modlist +takes_value +global "Mod Organizer modlist.txt giving the enabled mods")
        (@arg profile: -p --profile +takes_value +global "JSON profile with the settings above")
        (@arg game: -g --game +takes_value +global "Game name, for the log")
        (@arg shaders: --shaders +takes_value +global "Directory of GLSL shaders")
        (@subcommand view =>
            (about: "Open a preview window for a mesh")
            (alias: "v")
            (@arg INPUT: +required {validate_input} "Mesh file or path inside the game data")
            (@arg ("isolated-camera"): --("isolated-camera") "Don't share the camera with other previews")
            (@arg ("debug-gl"): --("debug-gl") "Use a debug GL context and log its messages")
        )
        (@subcommand info =>
            (about: "Print the shapes, shaders and textures of a mesh")
            (alias: "i")
            (@arg INPUT: +required {validate_input} "Mesh file or path inside the game data")
        )
    )
}

pub fn has_supported_extension(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn validate_input(path: String) -> ::std::result::Result<(), String> {
    if has_supported_extension(&path) {
        Ok(())
    } else {
        Err(format!("expected a .{} file", SUPPORTED_EXTENSIONS.join(", .")))
    }
}

/// Runs the program, returning the exit code.
pub fn run() -> i32 {
    let matches = app().get_matches();

    let verbosity = match matches.subcommand() {
        (_, Some(sub)) => sub.occurrences_of("verbose").max(matches.occurrences_of("verbose")),
        _ => matches.occurrences_of("verbose"),
    };
    logger::init(logger::level_for_verbosity(verbosity));

    if matches.is_present("version") {
        version::print_version_info();
        return 0;
    }

    let res = match matches.subcommand() {
        ("view", Some(sub)) => view(sub),
        ("info", Some(sub)) => info(sub),
        _ => {
            let _ = app().print_help();
            println!();
            return 0;
        }
    };
    match res {
        Ok(()) => 0,
        Err(e) => {
            report(&e);
            1
        }
    }
}

fn report(e: &Error) {
    let mut msg = e.to_string();
    for cause in e.iter().skip(1) {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
    }
    error!("{}", msg);
}

fn setup(matches: &ArgMatches) -> Result<(Config, Rc<Assets>)> {
    let config = Config::from_matches(matches)?;
    if let Some(ref game) = config.game {
        info!("game: {}", game);
    }
    let archives = Rc::new(ArchiveCache::default());
    let organizer = Rc::new(ModOrganizer::new(&config, archives.clone()));
    let assets = Rc::new(Assets::new(organizer, archives));
    Ok((config, assets))
}

/// Reads the input mesh. A path that isn't on disk is looked up in the
/// game data, so meshes inside archives can be previewed too.
fn load_input(matches: &ArgMatches, assets: &Assets) -> Result<(NifFile, String)> {
    let input = matches.value_of("INPUT").unwrap_or_default();
    let path = Path::new(input);
    let nif = if path.is_file() {
        NifFile::load(path)
    } else {
        match assets.read(input) {
            Some(buf) => NifFile::from_bytes(&buf),
            None => bail!("couldn't find {}", input),
        }
    };
    let nif = nif.chain_err(|| format!("couldn't read {}", input))?;
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string());
    Ok((nif, label))
}

fn view(matches: &ArgMatches) -> Result<()> {
    let (config, assets) = setup(matches)?;
    let (nif, label) = load_input(matches, &assets)?;
    viewer::main(&nif, assets, &config, &label)
}

fn info(matches: &ArgMatches) -> Result<()> {
    let (_config, assets) = setup(matches)?;
    let (nif, label) = load_input(matches, &assets)?;
    info::main(&nif, &assets, &label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_extensions() {
        assert!(has_supported_extension("meshes/a.nif"));
        assert!(has_supported_extension("C:\\trees\\b.BTO"));
        assert!(has_supported_extension("c.btr"));
        assert!(!has_supported_extension("d.dds"));
        assert!(!has_supported_extension("nif"));
    }

    #[test]
    fn parses_view_options() {
        let m = app()
            .get_matches_from_safe(vec![
                "nifview", "-v", "view", "a.nif", "--data", "/data", "--isolated-camera", "--debug-gl",
            ])
            .unwrap();
        let (name, sub) = m.subcommand();
        assert_eq!(name, "view");
        let sub = sub.unwrap();
        assert_eq!(sub.value_of("INPUT"), Some("a.nif"));
        assert_eq!(sub.value_of("data"), Some("/data"));
        assert!(sub.is_present("isolated-camera"));
        assert!(sub.is_present("debug-gl"));

        let m = app().get_matches_from_safe(vec!["nifview", "i", "a.nif"]).unwrap();
        assert_eq!(m.subcommand_name(), Some("info"));
    }

    #[test]
    fn rejects_other_files() {
        assert!(app().get_matches_from_safe(vec!["nifview", "view", "a.dds"]).is_err());
    }
}
