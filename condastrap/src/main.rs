mod cli;
mod observability;
mod prompts;
mod wizard;

use anyhow::Result;
use clap::Parser;

use condastrap_core::config::Settings;

use crate::cli::Cli;

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(name) = cli.name {
        settings.name = name;
    }
    if let Some(dir) = cli.overlay_dir {
        settings.overlay_dir = dir;
    }
    if let Some(dir) = cli.sif_dir {
        settings.sif_dir = dir;
    }
    if let Some(runtime) = cli.runtime {
        settings.runtime = runtime;
    }

    wizard::run(&settings)
}
