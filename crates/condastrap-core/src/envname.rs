//! Environment-name resolution for typed version tokens.
//!
//! Turns whatever the user types at the version prompt ("3.11", "myenv3.9",
//! an existing environment name, "-", or nothing) into a concrete action.
//! Pure string logic; the caller supplies the list of existing environments
//! and performs the chosen action inside the container.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// What to do with the conda environment after reading one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvAction {
    /// Leave the current activation untouched.
    Keep,
    /// Go back to the base environment (clears the activation override).
    Reset,
    /// Activate an environment that already exists.
    Use { name: String },
    /// Create `name` with `python=version`, then activate it.
    Create { name: String, version: String },
}

/// Recoverable input mistakes; the prompt loop re-asks on these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("could not determine version from {token:?}")]
    NoVersion { token: String },
}

// <letters><digits-and-dots><letters>, anchored. Anything else is not a
// version token.
fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]*)([0-9.]*)([A-Za-z]*)$").expect("valid regex"))
}

/// Resolve a typed token against the existing environment names.
///
/// Reserved tokens bypass parsing: empty keeps the current selection, `-` or
/// `base` resets to the base environment. A token exactly matching an
/// existing name (case-sensitive) is used verbatim. Everything else must
/// carry a numeric version: `3.11` becomes `py311`, `3.11.2` becomes
/// `py311_2`, `myenv3.11` names the env `myenv` with python 3.11.
pub fn resolve(token: &str, existing: &[String]) -> Result<EnvAction, ResolveError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(EnvAction::Keep);
    }
    if token == "-" || token == "base" {
        return Ok(EnvAction::Reset);
    }
    if existing.iter().any(|e| e == token) {
        return Ok(EnvAction::Use {
            name: token.to_string(),
        });
    }

    let caps = token_re()
        .captures(token)
        .ok_or_else(|| ResolveError::NoVersion {
            token: token.to_string(),
        })?;
    let (prefix, version, suffix) = (&caps[1], &caps[2], &caps[3]);
    if version.is_empty() {
        return Err(ResolveError::NoVersion {
            token: token.to_string(),
        });
    }

    let name = if prefix.is_empty() {
        format!("py{}{}", collapse_version(version), suffix)
    } else {
        format!("{prefix}{suffix}")
    };

    if existing.iter().any(|e| e == &name) {
        Ok(EnvAction::Use { name })
    } else {
        Ok(EnvAction::Create {
            name,
            version: version.to_string(),
        })
    }
}

/// `3.11` -> `311`, `3.11.2` -> `311_2`: drop the first dot, underscore the
/// rest.
fn collapse_version(version: &str) -> String {
    version.replacen('.', "", 1).replace('.', "_")
}
