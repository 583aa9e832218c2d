//! Overlay image discovery and extraction.
//!
//! Overlays are opaque ext3 blobs: local ones live next to the wizard as
//! `{name}.ext3`, shared sources are gzipped `.ext3.gz` files in a cluster
//! directory. Nothing here parses image contents.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;

/// File names of `*.ext3` overlays directly under `dir`, sorted.
/// A missing or unreadable directory counts as having none.
pub fn local_overlays(dir: &Path) -> Vec<String> {
    list_files(dir, ".ext3")
}

/// Full paths of `*.ext3.gz` sources directly under `dir`, sorted.
pub fn shared_overlays(dir: &Path) -> Vec<PathBuf> {
    list_files(dir, ".ext3.gz")
        .into_iter()
        .map(|name| dir.join(name))
        .collect()
}

fn list_files(dir: &Path, suffix: &str) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(suffix))
        .collect();
    names.sort();
    names
}

/// Default overlay name for a source file: strip `.gz`, then one more
/// extension. `overlay-5GB-200K.ext3.gz` -> `overlay-5GB-200K`.
pub fn stem_name(file_name: &str) -> String {
    let s = file_name.strip_suffix(".gz").unwrap_or(file_name);
    match s.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => s.to_string(),
    }
}

/// Decompress `src` (gzip) into `dest`. Refuses to overwrite.
pub fn extract(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        bail!("file exists: {}", dest.display());
    }
    tracing::debug!("extracting {} to {}", src.display(), dest.display());
    let f = File::open(src).with_context(|| format!("opening {}", src.display()))?;
    let mut reader = GzDecoder::new(BufReader::new(f));
    let mut out = File::create(dest).with_context(|| format!("creating {}", dest.display()))?;
    io::copy(&mut reader, &mut out)
        .with_context(|| format!("unpacking {} to {}", src.display(), dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn write_gz(path: &Path, content: &[u8]) {
        let f = File::create(path).unwrap();
        let mut enc = GzEncoder::new(f, Compression::default());
        enc.write_all(content).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn test_local_overlays_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.ext3"), b"x").unwrap();
        fs::write(tmp.path().join("a.ext3"), b"x").unwrap();
        fs::write(tmp.path().join("c.ext3.gz"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(tmp.path().join("dir.ext3")).unwrap();

        let found = local_overlays(tmp.path());
        assert_eq!(found, vec!["a.ext3".to_string(), "b.ext3".to_string()]);
    }

    #[test]
    fn test_local_overlays_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let found = local_overlays(&tmp.path().join("nope"));
        assert!(found.is_empty());
    }

    #[test]
    fn test_shared_overlays_returns_full_paths() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("overlay-5GB-200K.ext3.gz"), b"x").unwrap();
        fs::write(tmp.path().join("plain.ext3"), b"x").unwrap();

        let found = shared_overlays(tmp.path());
        assert_eq!(found, vec![tmp.path().join("overlay-5GB-200K.ext3.gz")]);
    }

    #[test]
    fn test_stem_name() {
        assert_eq!(stem_name("overlay-5GB-200K.ext3.gz"), "overlay-5GB-200K");
        assert_eq!(stem_name("proj.ext3"), "proj");
        assert_eq!(stem_name("bare"), "bare");
    }

    #[test]
    fn test_extract_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("overlay.ext3.gz");
        let dest = tmp.path().join("mine.ext3");
        write_gz(&src, b"pretend this is ext3");

        extract(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"pretend this is ext3");
    }

    #[test]
    fn test_extract_refuses_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("overlay.ext3.gz");
        let dest = tmp.path().join("mine.ext3");
        write_gz(&src, b"data");
        fs::write(&dest, b"already here").unwrap();

        let err = extract(&src, &dest).unwrap_err();
        assert!(err.to_string().contains("file exists"));
        // original contents untouched
        assert_eq!(fs::read(&dest).unwrap(), b"already here");
    }
}
