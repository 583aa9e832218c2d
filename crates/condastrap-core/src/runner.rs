//! Container runtime plumbing.
//!
//! Everything the wizard does inside the container goes through one shape: a
//! bash heredoc handed to `{runtime} exec --overlay {overlay} {sif}
//! /bin/bash`. Interactive steps inherit the terminal; queries capture
//! stdout. The overlay is mounted writable here; only the emitted wrapper
//! scripts mount read-only.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{bail, Context, Result};

/// One overlay + image pair, entered through a runtime binary.
#[derive(Debug, Clone)]
pub struct Container {
    runtime: String,
    overlay: PathBuf,
    sif: String,
}

impl Container {
    pub fn new(runtime: &str, overlay: &Path, sif: &str) -> Self {
        Self {
            runtime: runtime.to_string(),
            overlay: overlay.to_path_buf(),
            sif: sif.to_string(),
        }
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn overlay(&self) -> &Path {
        &self.overlay
    }

    pub fn sif(&self) -> &str {
        &self.sif
    }

    /// Host command feeding `script` to a shell inside the container.
    /// `/ext3/env` is sourced first (silently) once it exists, so conda is
    /// on PATH for every step after bootstrap.
    fn heredoc(&self, script: &str) -> String {
        format!(
            "{} exec --overlay \"{}\" \"{}\" /bin/bash << 'EOFXXX'\n\
             [[ -e /ext3/env ]] && . /ext3/env > /dev/null\n\
             {}\nEOFXXX",
            self.runtime,
            self.overlay.display(),
            self.sif,
            script.trim()
        )
    }

    /// Run a script inside the container with the terminal attached.
    pub fn run(&self, script: &str) -> Result<()> {
        let status = self.run_status(script)?;
        if !status.success() {
            bail!("container step failed ({status})");
        }
        Ok(())
    }

    /// Like [`Container::run`] but hands the exit status back, for steps
    /// where a non-zero exit is an answer rather than an error.
    pub fn run_status(&self, script: &str) -> Result<ExitStatus> {
        let cmd = self.heredoc(script);
        tracing::debug!(runtime = %self.runtime, "container exec:\n{cmd}");
        Command::new("bash")
            .arg("-c")
            .arg(&cmd)
            .status()
            .with_context(|| format!("spawning {}", self.runtime))
    }

    /// Run a query inside the container and capture its stdout.
    pub fn capture(&self, script: &str) -> Result<String> {
        let cmd = self.heredoc(script);
        tracing::debug!(runtime = %self.runtime, "container query:\n{cmd}");
        let out = Command::new("bash")
            .arg("-c")
            .arg(&cmd)
            .output()
            .with_context(|| format!("spawning {}", self.runtime))?;
        if !out.status.success() {
            bail!(
                "container query failed: {}",
                String::from_utf8_lossy(&out.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// Run an emitted wrapper script (or any executable) with the terminal
/// attached.
pub fn run_script(path: &Path) -> Result<()> {
    tracing::debug!("running {}", path.display());
    let status = Command::new(path)
        .status()
        .with_context(|| format!("running {}", path.display()))?;
    if !status.success() {
        bail!("{} exited with {status}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> Container {
        Container::new("singularity", Path::new("/work/sing.ext3"), "/shared/cuda.sif")
    }

    #[test]
    fn test_heredoc_shape() {
        let cmd = container().heredoc("conda info --envs");
        assert!(cmd.starts_with(
            "singularity exec --overlay \"/work/sing.ext3\" \"/shared/cuda.sif\" /bin/bash << 'EOFXXX'"
        ));
        assert!(cmd.ends_with("conda info --envs\nEOFXXX"));
    }

    #[test]
    fn test_heredoc_sources_env_first() {
        let cmd = container().heredoc("true");
        let lines: Vec<&str> = cmd.lines().collect();
        assert_eq!(lines[1], "[[ -e /ext3/env ]] && . /ext3/env > /dev/null");
    }

    #[test]
    fn test_heredoc_trims_script_body() {
        let cmd = container().heredoc("\n\techo hi\n");
        assert!(cmd.contains("\necho hi\nEOFXXX"));
    }

    #[test]
    fn test_custom_runtime_binary() {
        let c = Container::new("apptainer", Path::new("a.ext3"), "b.sif");
        assert!(c.heredoc("true").starts_with("apptainer exec "));
    }
}
