//! Conda bootstrap and environment management inside the container.
//!
//! Fixed shell snippets, fed through [`Container::run`]: install Miniconda
//! under `/ext3/miniconda3` if absent, write the `/ext3/env` startup script,
//! and manage named environments. The activation override
//! `/ext3/conda.activate` is a one-line file sourced by `/ext3/env` on every
//! container entry.

use anyhow::Result;
use thiserror::Error;

use crate::runner::Container;

#[derive(Debug, Error)]
pub enum CondaError {
    #[error("could not create environment {name} with python={version}")]
    CreateFailed { name: String, version: String },
}

const INSTALL_MINICONDA: &str = r#"
# download miniconda
CONDAURL="https://repo.continuum.io/miniconda/Miniconda3-latest-Linux-x86_64.sh"
CONDASH="Miniconda3-latest-Linux-x86_64.sh"
CONDADIR="/ext3/miniconda3"
echo Miniconda Install Location: $CONDADIR
if [ ! -e "$CONDADIR" ] && [ ! -z $CONDADIR ]; then
	echo installing miniconda inside container...
	echo URL: $CONDAURL
	echo Script Location: $CONDASH
	[[ ! -f "$CONDASH" ]] && wget "$CONDAURL"
	bash "$CONDASH" -b -p "$CONDADIR"
	rm "$CONDASH"
	echo "================================="
	echo "Installed miniconda"
	echo
else
	echo miniconda exists: "$CONDADIR"
fi
"#;

// The banner stays quiet when CONDASTRAP_QUIET is set; the runtime passes
// the host environment through to the container.
const WRITE_ENV_SCRIPT: &str = r#"
# write environment file

cat > /ext3/env << 'EOFENV'
#!/bin/bash
export PATH=/ext3/miniconda3/bin:$PATH
source /ext3/miniconda3/etc/profile.d/conda.sh -y
[[ -f /ext3/conda.activate ]] && source /ext3/conda.activate

if [[ -z "$CONDASTRAP_QUIET" ]]; then
echo "hello :) your python:" "$(type -P python)"
python --version 2>&1
fi
EOFENV
chmod +x /ext3/env
"#;

const SHOW_STATUS: &str = r#"
# show conda/python info
conda info --envs
type -P python
echo "You're currently setup with:"
python --version
"#;

const UPDATE_BASE: &str = r#"
echo Updating conda and pip...
conda update -n base conda -yq
conda install pip -yq
"#;

const LIST_ENVS: &str = "ls -1 /ext3/miniconda3/envs 2> /dev/null || true";

const AVAILABLE_VERSIONS: &str = r#"
echo "Available python versions:"
conda search python 2> /dev/null | awk 'NR > 1 {print $2}' | sort -u | tr '\n' ' '
echo
"#;

const RESET_ACTIVATION: &str = r#"echo "" > /ext3/conda.activate"#;

/// Install Miniconda into the overlay if it is not there yet.
pub fn install_miniconda(c: &Container) -> Result<()> {
    c.run(INSTALL_MINICONDA)
}

/// (Re)write `/ext3/env`, the script every container entry sources.
pub fn write_env_script(c: &Container) -> Result<()> {
    c.run(WRITE_ENV_SCRIPT)
}

/// Print the current conda envs and python to the terminal.
pub fn show_status(c: &Container) -> Result<()> {
    c.run(SHOW_STATUS)
}

/// Update base conda and make sure pip is present.
pub fn update_base(c: &Container) -> Result<()> {
    c.run(UPDATE_BASE)
}

/// Names of the environments that currently exist inside the overlay.
pub fn list_envs(c: &Container) -> Result<Vec<String>> {
    Ok(parse_env_listing(&c.capture(LIST_ENVS)?))
}

fn parse_env_listing(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Clear the activation override: next entry lands in the base environment.
pub fn reset_activation(c: &Container) -> Result<()> {
    c.run(RESET_ACTIVATION)
}

/// Point the activation override at `name`.
///
/// The existence check and the write happen in the same in-container
/// snippet, so the override can never name a directory that was not there
/// at write time.
pub fn activate_env(c: &Container, name: &str) -> Result<()> {
    c.run(&activation_script(name))
}

fn activation_script(name: &str) -> String {
    format!(
        r#"if [[ -d "/ext3/miniconda3/envs/{name}" ]]; then
	echo "conda activate {name}" > /ext3/conda.activate
else
	echo "environment missing: {name}" >&2
	exit 1
fi"#
    )
}

/// Create `name` with `python={version}`. Conda runs interactively so the
/// user confirms the solve. A non-zero exit becomes
/// [`CondaError::CreateFailed`], which the prompt loop treats as
/// recoverable.
pub fn create_env(c: &Container, name: &str, version: &str) -> Result<()> {
    let status = c.run_status(&create_script(name, version))?;
    if !status.success() {
        return Err(CondaError::CreateFailed {
            name: name.to_string(),
            version: version.to_string(),
        }
        .into());
    }
    Ok(())
}

fn create_script(name: &str, version: &str) -> String {
    format!(
        r#"export PATH=/ext3/miniconda3/bin:$PATH
conda create -n "{name}" python="{version}""#
    )
}

/// Print the python versions conda can install, for remediation after a
/// failed create.
pub fn show_python_versions(c: &Container) -> Result<()> {
    c.run(AVAILABLE_VERSIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_listing() {
        let envs = parse_env_listing("py311\n\nmyenv\n  \n");
        assert_eq!(envs, vec!["py311".to_string(), "myenv".to_string()]);
    }

    #[test]
    fn test_parse_env_listing_empty() {
        assert!(parse_env_listing("").is_empty());
        assert!(parse_env_listing("\n\n").is_empty());
    }

    #[test]
    fn test_activation_script_checks_before_writing() {
        let script = activation_script("py311");
        let check = script.find(r#"[[ -d "/ext3/miniconda3/envs/py311" ]]"#);
        let write = script.find(r#"echo "conda activate py311" > /ext3/conda.activate"#);
        assert!(check.is_some());
        assert!(write.is_some());
        assert!(check < write);
        assert!(script.contains("exit 1"));
    }

    #[test]
    fn test_create_script_pins_name_and_version() {
        let script = create_script("py311_2", "3.11.2");
        assert!(script.contains(r#"conda create -n "py311_2" python="3.11.2""#));
        // conda on PATH even before /ext3/env exists
        assert!(script.contains("export PATH=/ext3/miniconda3/bin:$PATH"));
    }

    #[test]
    fn test_reset_writes_empty_value() {
        assert_eq!(RESET_ACTIVATION, r#"echo "" > /ext3/conda.activate"#);
    }

    #[test]
    fn test_env_file_respects_quiet() {
        assert!(WRITE_ENV_SCRIPT.contains(r#"if [[ -z "$CONDASTRAP_QUIET" ]]"#));
        assert!(WRITE_ENV_SCRIPT.contains("chmod +x /ext3/env"));
    }
}
