//! Container image (`.sif`) selection state.
//!
//! The last chosen image path is remembered in a hidden one-line cache file
//! `.{name}.sifpath` next to the overlay, so re-runs can offer it back.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// `.{name}.sifpath` under `dir`.
pub fn cache_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{name}.sifpath"))
}

/// Previously cached image path, if any. Whitespace-only caches count as
/// absent.
pub fn read_cached(dir: &Path, name: &str) -> Result<Option<String>> {
    let path = cache_path(dir, name);
    match fs::read_to_string(&path) {
        Ok(s) => {
            let s = s.trim().to_string();
            Ok(if s.is_empty() { None } else { Some(s) })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Record the chosen image path for next time.
pub fn write_cache(dir: &Path, name: &str, sif: &str) -> Result<()> {
    let path = cache_path(dir, name);
    tracing::debug!("caching sif choice in {}", path.display());
    fs::write(&path, sif).with_context(|| format!("writing {}", path.display()))?;
    // group-readable like the emitted scripts
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o774);
    fs::set_permissions(&path, perms)?;
    Ok(())
}

/// Full paths of `*.sif` images directly under `dir`, sorted.
/// A missing or unreadable directory counts as having none.
pub fn shared_sifs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(".sif"))
        .collect();
    names.sort();
    names.into_iter().map(|n| dir.join(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(read_cached(tmp.path(), "sing").unwrap(), None);

        write_cache(tmp.path(), "sing", "/shared/cuda.sif").unwrap();
        assert_eq!(
            read_cached(tmp.path(), "sing").unwrap(),
            Some("/shared/cuda.sif".to_string())
        );
        assert!(tmp.path().join(".sing.sifpath").exists());
    }

    #[test]
    fn test_blank_cache_counts_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(cache_path(tmp.path(), "sing"), "  \n").unwrap();
        assert_eq!(read_cached(tmp.path(), "sing").unwrap(), None);
    }

    #[test]
    fn test_cached_path_is_trimmed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(cache_path(tmp.path(), "proj"), "/shared/a.sif\n").unwrap();
        assert_eq!(
            read_cached(tmp.path(), "proj").unwrap(),
            Some("/shared/a.sif".to_string())
        );
    }

    #[test]
    fn test_shared_sifs_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.sif"), b"x").unwrap();
        fs::write(tmp.path().join("a.sif"), b"x").unwrap();
        fs::write(tmp.path().join("readme.md"), b"x").unwrap();

        let found = shared_sifs(tmp.path());
        assert_eq!(
            found,
            vec![tmp.path().join("a.sif"), tmp.path().join("b.sif")]
        );
    }

    #[test]
    fn test_shared_sifs_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(shared_sifs(&tmp.path().join("nope")).is_empty());
    }
}
