#![recursion_limit = "1024"] // for error_chain

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate glium;
#[macro_use]
extern crate clap;

#[macro_use]
mod errors;
#[macro_use]
mod util;
mod archive;
mod assets;
mod cli;
mod config;
mod dds;
mod geometry;
mod info;
mod logger;
mod nif;
mod organizer;
mod png;
mod version;
mod viewer;

fn main() {
    let code = cli::run();
    std::process::exit(code);
}
