//! Command line surface.
//!
//! The wizard is interactive, so flags only override the environment
//! defaults from [`condastrap_core::config::Settings`].

use std::path::PathBuf;

use clap::Parser;

const LONG_ABOUT: &str = "\
Let's make a singularity!! <3

First, cd into the directory where your overlay should live, then run
condastrap with no arguments and answer the prompts.

What happens:
  1. pick an overlay file (or unpack a fresh one from the shared directory)
  2. pick a sif file
  3. install miniconda inside the overlay, plus a specific python version
     or conda environment if you want one
  4. write the startup script (/ext3/env) that activates it on entry
  5. optionally conda/pip install packages while you're here
  6. write shortcut scripts so entering the container is one command

Re-run it any time in the same directory to change things (the sif file,
the python version, installed packages).

Built for clusters that publish a shared directory of overlay sources and
container images; point --overlay-dir and --sif-dir (or the matching
CONDASTRAP_* variables) at yours.";

#[derive(Parser, Debug)]
#[command(name = "condastrap")]
#[command(version, about = "Set up a singularity overlay with conda", long_about = LONG_ABOUT)]
pub struct Cli {
    /// Logical name for the overlay, image cache and shortcut scripts
    #[arg(long)]
    pub name: Option<String>,

    /// Directory of shared overlay sources (*.ext3.gz)
    #[arg(long, value_name = "DIR")]
    pub overlay_dir: Option<PathBuf>,

    /// Directory of shared container images (*.sif)
    #[arg(long, value_name = "DIR")]
    pub sif_dir: Option<PathBuf>,

    /// Container runtime to shell out to (singularity or apptainer)
    #[arg(long)]
    pub runtime: Option<String>,
}
