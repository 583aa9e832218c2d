//! The interactive pipeline: pick assets, bootstrap conda inside the
//! container, negotiate the python version, write the entry scripts, then
//! hang around in a menu until the user leaves.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dialoguer::console::style;
use tracing::{debug, warn};

use condastrap_core::conda::{self, CondaError};
use condastrap_core::config::{env_keys, Settings};
use condastrap_core::envname::{self, EnvAction};
use condastrap_core::runner::{self, Container};
use condastrap_core::{overlay, scripts, sif};

use crate::prompts;

const NEW_OVERLAY: &str = "new...";

const VERSION_PROMPT: &str = "Want a different python version? (e.g. 3.8, 3.6) If no, leave blank. To use the base environment, use \"-\"";

const MENU_EXIT: &str = "nothing, byeee!";
const MENU_ENTER: &str = "enter";
const MENU_ENTER_RW: &str = "enter (write)";
const MENU_INSTALL: &str = "install packages";
const MENU_ITEMS: &[&str] = &[MENU_EXIT, MENU_ENTER, MENU_ENTER_RW, MENU_INSTALL];

const INSTALL_DONE: &str = "nope I'm good!";
const INSTALLERS: &[&str] = &[
    INSTALL_DONE,
    "conda install",
    "pip install",
    "pip install -r",
    "pip install -e",
];

pub fn run(settings: &Settings) -> Result<()> {
    let cwd = env::current_dir().context("getting working directory")?;

    let (overlay_path, name) = select_overlay(settings, &cwd)?;
    let sif_path = select_sif(settings, &cwd, &name)?;
    let container = Container::new(&settings.runtime, &overlay_path, &sif_path);

    conda::install_miniconda(&container)?;
    conda::write_env_script(&container)?;
    conda::show_status(&container)?;

    negotiate_version(&container)?;
    conda::update_base(&container)?;

    println!("\nGreat you're all set!\n");
    emit_scripts(settings, &cwd, &name, &overlay_path, &sif_path)?;
    menu_loop(&container, &cwd, &name)?;

    println!("\nHappy training! :)");
    println!(
        "\nQuick commands: {}    {}",
        style(format!("./{name}")).green(),
        style(format!("./{name}rw")).green()
    );
    Ok(())
}

/// The "use one?" menu only exists when there is something local to reuse.
fn local_overlay_items(local: Vec<String>) -> Option<Vec<String>> {
    if local.is_empty() {
        return None;
    }
    let mut items = local;
    items.push(NEW_OVERLAY.to_string());
    Some(items)
}

/// Pick an overlay: reuse a local `.ext3` or unpack a fresh one from the
/// shared directory. Returns the overlay path and the logical name keying
/// everything else (sif cache, entry scripts).
fn select_overlay(settings: &Settings, cwd: &Path) -> Result<(PathBuf, String)> {
    if let Some(items) = local_overlay_items(overlay::local_overlays(cwd)) {
        let idx = prompts::select("There are overlays in this directory. Use one?", &items)?;
        if items[idx] != NEW_OVERLAY {
            let name = overlay::stem_name(&items[idx]);
            return Ok((cwd.join(&items[idx]), name));
        }
    }

    let sources = overlay::shared_overlays(&settings.overlay_dir);
    if sources.is_empty() {
        bail!(
            "no overlay sources (*.ext3.gz) in {}; set {} for your cluster",
            settings.overlay_dir.display(),
            env_keys::CONDASTRAP_OVERLAY_DIR,
        );
    }
    let labels: Vec<String> = sources.iter().map(|p| p.display().to_string()).collect();
    let preferred = settings.overlay_dir.join(&settings.default_overlay);
    let cursor = index_of(&labels, &preferred.display().to_string());
    let idx = prompts::search_select("Which overlay to use?", &labels, cursor)?;

    let name = prompts::input_with_default("Why don't you give your overlay a name?", &settings.name)?;
    let name = name.trim().to_string();
    let name = if name.is_empty() { settings.name.clone() } else { name };
    println!("You choose {name:?}");

    let dest = cwd.join(format!("{name}.ext3"));
    if dest.exists() {
        bail!("file exists: {}", dest.display());
    }
    println!("Unzipping {} to {}...", sources[idx].display(), dest.display());
    overlay::extract(&sources[idx], &dest)?;
    println!("Done!");
    Ok((dest, name))
}

/// Pick the sif image, trusting the per-name cache when the user confirms.
fn select_sif(settings: &Settings, cwd: &Path, name: &str) -> Result<String> {
    let cached = sif::read_cached(cwd, name)?;
    if let Some(ref path) = cached {
        if prompts::confirm(&format!("Use {path}"), true)? {
            return Ok(path.clone());
        }
    }

    let images = sif::shared_sifs(&settings.sif_dir);
    if images.is_empty() {
        bail!(
            "no container images (*.sif) in {}; set {} for your cluster",
            settings.sif_dir.display(),
            env_keys::CONDASTRAP_SIF_DIR,
        );
    }
    let labels: Vec<String> = images.iter().map(|p| p.display().to_string()).collect();
    let preferred = cached
        .unwrap_or_else(|| settings.sif_dir.join(&settings.default_sif).display().to_string());
    let cursor = index_of(&labels, &preferred);
    let idx = prompts::search_select("Which sif to use?", &labels, cursor)?;

    sif::write_cache(cwd, name, &labels[idx])?;
    Ok(labels[idx].clone())
}

/// Prompt for a python version until a token resolves and applies cleanly.
/// Unparseable tokens and failed creations re-prompt; anything else aborts.
fn negotiate_version(container: &Container) -> Result<()> {
    loop {
        let token = prompts::input_allow_empty(VERSION_PROMPT)?;
        let existing = conda::list_envs(container)?;
        match envname::resolve(&token, &existing) {
            Ok(EnvAction::Keep) => {
                println!("keeping environment...");
                return Ok(());
            }
            Ok(EnvAction::Reset) => {
                println!("resetting to the base environment...");
                conda::reset_activation(container)?;
                return Ok(());
            }
            Ok(EnvAction::Use { name }) => {
                println!("using environment: {name}");
                conda::activate_env(container, &name)?;
                return Ok(());
            }
            Ok(EnvAction::Create { name, version }) => {
                println!("creating environment: {name}");
                match conda::create_env(container, &name, &version) {
                    Ok(()) => {
                        conda::activate_env(container, &name)?;
                        return Ok(());
                    }
                    Err(err) if err.downcast_ref::<CondaError>().is_some() => {
                        eprintln!("{err}");
                        if let Err(err) = conda::show_python_versions(container) {
                            warn!("listing python versions failed: {err:#}");
                        }
                        eprintln!("pick one of the versions above, or do it by hand and re-run:");
                        eprintln!(
                            "    {} exec --overlay \"{}\" \"{}\" /bin/bash",
                            container.runtime(),
                            container.overlay().display(),
                            container.sif()
                        );
                        eprintln!("    conda create -n {name} python={version}");
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!(
                    "try a version like 3.10 or 3.9.2, a name+version like myenv3.8, an existing \
                     environment name, \"-\" for the base environment, or leave it blank to keep \
                     the current one"
                );
            }
        }
    }
}

/// Write `./{name}` and `./{name}rw` and show how to use them.
fn emit_scripts(
    settings: &Settings,
    cwd: &Path,
    name: &str,
    overlay_path: &Path,
    sif_path: &str,
) -> Result<()> {
    let (ro, rw) = scripts::write_scripts(cwd, name, &settings.runtime)?;
    debug!("wrote {} and {}", ro.display(), rw.display());

    println!(
        "To enter the container, run: {} \n\nwhich is equivalent to:\n{}",
        style(format!("./{name}")).green(),
        scripts::one_liner(&settings.runtime, overlay_path, sif_path, true)
    );
    println!(
        "\nGPUs are picked up automatically (--nv is added when nvidia-smi sees one). To force it: {}",
        style(format!("./{name} --nv")).green()
    );
    println!(
        "The above command opens with read-only. To open with write permissions: {} \n",
        style(format!("./{name}rw")).green()
    );
    Ok(())
}

fn menu_loop(container: &Container, cwd: &Path, name: &str) -> Result<()> {
    loop {
        let idx = prompts::select("What do you want to do?", MENU_ITEMS)?;
        match MENU_ITEMS[idx] {
            MENU_EXIT => return Ok(()),
            MENU_ENTER => runner::run_script(&cwd.join(name))?,
            MENU_ENTER_RW => runner::run_script(&cwd.join(format!("{name}rw")))?,
            MENU_INSTALL => install_packages(container)?,
            _ => {}
        }
    }
}

/// Offer conda/pip installs until the user is done. A failed install is
/// printed but does not abort the wizard.
fn install_packages(container: &Container) -> Result<()> {
    loop {
        let idx = prompts::select("Do you want to install any packages?", INSTALLERS)?;
        let installer = INSTALLERS[idx];
        if installer == INSTALL_DONE {
            return Ok(());
        }
        let args = prompts::input_allow_empty(installer)?;
        if args.trim().is_empty() {
            continue;
        }
        if let Err(err) = container.run(&format!("{installer} {}", args.trim())) {
            eprintln!("{err:#}");
        }
    }
}

fn index_of(items: &[String], target: &str) -> usize {
    items.iter().position(|item| item == target).unwrap_or(0)
}
