//! Configuration for condastrap.
//!
//! All configuration is read from environment variables or CLI arguments.
//! No global configuration file is used.
//!
//! Environment variable keys are centralized here for consistency.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_OVERLAY_DIR: &str = "/scratch/work/public/overlay-fs-ext3";
pub const DEFAULT_SIF_DIR: &str = "/scratch/work/public/singularity";
pub const DEFAULT_OVERLAY: &str = "overlay-5GB-200K.ext3.gz";
pub const DEFAULT_SIF: &str = "cuda11.0-cudnn8-devel-ubuntu18.04.sif";
pub const DEFAULT_NAME: &str = "sing";
pub const DEFAULT_RUNTIME: &str = "singularity";

/// Environment variable key constants.
/// Use these when reading env vars to avoid typos and enable refactoring.
pub mod env_keys {
    pub const CONDASTRAP_OVERLAY_DIR: &str = "CONDASTRAP_OVERLAY_DIR";
    pub const CONDASTRAP_SIF_DIR: &str = "CONDASTRAP_SIF_DIR";
    pub const CONDASTRAP_DEFAULT_OVERLAY: &str = "CONDASTRAP_DEFAULT_OVERLAY";
    pub const CONDASTRAP_DEFAULT_SIF: &str = "CONDASTRAP_DEFAULT_SIF";
    pub const CONDASTRAP_NAME: &str = "CONDASTRAP_NAME";
    pub const CONDASTRAP_RUNTIME: &str = "CONDASTRAP_RUNTIME";
    pub const CONDASTRAP_QUIET: &str = "CONDASTRAP_QUIET";
    pub const CONDASTRAP_LOG_LEVEL: &str = "CONDASTRAP_LOG_LEVEL";

    /// Legacy name override honored by the original shell tooling.
    pub const SING_CMD: &str = "SING_CMD";

    pub const NAME_ALIASES: &[&str] = &[SING_CMD];
}

/// Read `primary` or the first set alias, falling back to `default`.
/// Empty values count as unset.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Read `primary` or the first set alias; empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    std::iter::once(primary)
        .chain(aliases.iter().copied())
        .find_map(|key| {
            let value = env::var(key).ok()?;
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        })
}

/// Boolean env var: anything other than 0/false/no/off counts as true.
/// Unset or empty falls back to `default`.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(primary, aliases) {
        Some(s) => !matches!(s.to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        None => default,
    }
}

/// Process-wide defaults, assembled once at startup.
///
/// CLI flags override individual fields after [`Settings::from_env`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared directory of `.ext3.gz` overlay sources.
    pub overlay_dir: PathBuf,
    /// Shared directory of `.sif` container images.
    pub sif_dir: PathBuf,
    /// File name (within `overlay_dir`) preselected in the overlay menu.
    pub default_overlay: String,
    /// File name (within `sif_dir`) preselected in the image menu.
    pub default_sif: String,
    /// Logical name keying the overlay, the sif cache and the wrapper scripts.
    pub name: String,
    /// Container runtime binary (`singularity` or `apptainer`).
    pub runtime: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            overlay_dir: PathBuf::from(env_or(
                env_keys::CONDASTRAP_OVERLAY_DIR,
                &[],
                || DEFAULT_OVERLAY_DIR.to_string(),
            )),
            sif_dir: PathBuf::from(env_or(env_keys::CONDASTRAP_SIF_DIR, &[], || {
                DEFAULT_SIF_DIR.to_string()
            })),
            default_overlay: env_or(env_keys::CONDASTRAP_DEFAULT_OVERLAY, &[], || {
                DEFAULT_OVERLAY.to_string()
            }),
            default_sif: env_or(env_keys::CONDASTRAP_DEFAULT_SIF, &[], || {
                DEFAULT_SIF.to_string()
            }),
            name: env_or(env_keys::CONDASTRAP_NAME, env_keys::NAME_ALIASES, || {
                DEFAULT_NAME.to_string()
            }),
            runtime: env_or(env_keys::CONDASTRAP_RUNTIME, &[], || {
                DEFAULT_RUNTIME.to_string()
            }),
        }
    }
}

/// Log verbosity knobs: quiet, log_level.
///
/// `CONDASTRAP_QUIET` also reaches inside the container (the runtime passes
/// the host environment through) where it silences the `/ext3/env` banner.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            let quiet = env_bool(env_keys::CONDASTRAP_QUIET, &[], false);
            let log_level = env_or(env_keys::CONDASTRAP_LOG_LEVEL, &[], || {
                "condastrap=info".to_string()
            });
            Self { quiet, log_level }
        })
    }
}
