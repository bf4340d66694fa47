use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::CommandFactory;

#[path = "src/cli.rs"]
mod cli;

/// Man pages for `devlink` and every visible subcommand, written to
/// `$OUT_DIR/man` as `devlink.1`, `devlink-run.1`, `devlink-config-show.1`, ...
fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let man_dir = PathBuf::from(std::env::var_os("OUT_DIR").ok_or("OUT_DIR is unset")?).join("man");
    fs::create_dir_all(&man_dir)?;

    let mut pending = vec![cli::Cli::command()];
    while let Some(cmd) = pending.pop() {
        let page = man_dir.join(format!("{}.1", cmd.get_name()));
        let mut roff = Vec::new();
        clap_mangen::Man::new(cmd.clone()).render(&mut roff)?;
        fs::write(&page, roff)?;

        let parent = cmd.get_name().to_owned();
        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| sub.clone().name(format!("{parent}-{}", sub.get_name()))),
        );
    }
    Ok(())
}
