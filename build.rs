//! Build script for vocalist
//!
//! Renders man pages from the CLI definitions using clap_mangen.

use clap::CommandFactory;
use clap_mangen::Man;
use std::env;
use std::fs::{self, File};
use std::io::Error;
use std::path::{Path, PathBuf};

include!("src/cli.rs");

fn render(cmd: &clap::Command, dir: &Path, page: &str) -> Result<(), Error> {
    let mut file = File::create(dir.join(format!("{}.1", page)))?;
    Man::new(cmd.clone()).render(&mut file)
}

fn main() -> Result<(), Error> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=VOCALIST_GEN_MANPAGES");

    // Release builds, or on request
    let profile = env::var("PROFILE").unwrap_or_default();
    if env::var("VOCALIST_GEN_MANPAGES").is_err() && profile != "release" {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string()));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let cmd = Cli::command();
    render(&cmd, &man_dir, "vocalist")?;

    // vocalist-notes.1, vocalist-notes-add.1, ...
    for sub in cmd.get_subcommands().filter(|c| c.get_name() != "help") {
        let page = format!("vocalist-{}", sub.get_name());
        render(sub, &man_dir, &page)?;
        for nested in sub.get_subcommands().filter(|c| c.get_name() != "help") {
            render(nested, &man_dir, &format!("{}-{}", page, nested.get_name()))?;
        }
    }

    println!("cargo:warning=Man pages generated in: {}", man_dir.display());
    Ok(())
}
