//! Wrapper-script emission.
//!
//! Two fixed templates parameterized by the logical name and the runtime
//! binary. The scripts re-derive their paths at run time from their own
//! directory (`$DIR/{name}.ext3`, `$(cat $DIR/.{name}.sifpath)`), so the
//! working directory can be moved or shared without regenerating them. They
//! auto-detect GPUs, forward extra arguments to the runtime, and accept a
//! command on stdin (falling back to an interactive shell).

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const FLEX_SCRIPT: &str = r#"#!/bin/bash
DIR="$(cd "$(dirname "${BASH_SOURCE[0]}")" && pwd)"
OVERLAY="$DIR/{name}.ext3"
SIF="$(cat "$DIR/.{name}.sifpath")"

# allow commands from stdin
readstdin() {
	read -N1 -t0.5 __  && { (( $? <= 128 )) && { IFS= read -rd '' _stdin; echo "$__$_stdin"; } }
}
CMD="$(readstdin)"
ARGS=()
if [[ -z "$CMD" ]]; then
	ARGS+=(--init-file /ext3/env)
else
	ARGS+=(-c ". /ext3/env;$CMD")
fi

GPUS=$(which nvidia-smi >&/dev/null && nvidia-smi --query-gpu=name --format=csv,noheader)
NV=$([[ $(echo -n "$GPUS" | awk 'NF' | wc -l) -ge 1 ]] && echo '--nv')

[[ ! -z "$NV" ]] && echo "Detected gpus, using --nv:" && echo $GPUS && echo

# run the container
set -x
{runtime} exec $NV "$@" \
	--overlay "$OVERLAY{mount}" \
	"$SIF" \
	/bin/bash "${ARGS[@]}"
"#;

const ONE_LINER: &str =
    "{runtime} exec \\\n\t--overlay {overlay} \\\n\t{sif} \\\n\t/bin/bash --init-file /ext3/env";

/// Render one wrapper script. `read_only` mounts the overlay `:ro`.
pub fn render(name: &str, runtime: &str, read_only: bool) -> String {
    FLEX_SCRIPT
        .replace("{name}", name)
        .replace("{runtime}", runtime)
        .replace("{mount}", if read_only { ":ro" } else { "" })
}

/// The expanded command a wrapper script stands for, for display.
pub fn one_liner(runtime: &str, overlay: &Path, sif: &str, read_only: bool) -> String {
    let overlay = if read_only {
        format!("{}:ro", overlay.display())
    } else {
        overlay.display().to_string()
    };
    ONE_LINER
        .replace("{runtime}", runtime)
        .replace("{overlay}", &overlay)
        .replace("{sif}", sif)
}

/// Write `{name}` (read-only) and `{name}rw` (read-write) into `dir`,
/// executable. Returns the two paths.
pub fn write_scripts(dir: &Path, name: &str, runtime: &str) -> Result<(PathBuf, PathBuf)> {
    let ro = dir.join(name);
    let rw = dir.join(format!("{name}rw"));
    write_executable(&ro, &render(name, runtime, true))?;
    write_executable(&rw, &render(name, runtime, false))?;
    Ok((ro, rw))
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o774);
    fs::set_permissions(path, perms).with_context(|| format!("chmod {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_everything() {
        let script = render("sing", "singularity", true);
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains(r#"OVERLAY="$DIR/sing.ext3""#));
        assert!(script.contains(r#"SIF="$(cat "$DIR/.sing.sifpath")""#));
        assert!(script.contains("singularity exec $NV"));
        assert!(!script.contains("{name}"));
        assert!(!script.contains("{runtime}"));
        assert!(!script.contains("{mount}"));
    }

    #[test]
    fn test_render_mount_mode() {
        let ro = render("sing", "singularity", true);
        let rw = render("sing", "singularity", false);
        assert!(ro.contains(r#"--overlay "$OVERLAY:ro""#));
        assert!(rw.contains(r#"--overlay "$OVERLAY""#));
        assert!(!rw.contains(":ro"));
    }

    #[test]
    fn test_render_keeps_bash_expansions() {
        let script = render("sing", "singularity", false);
        assert!(script.contains(r#""${BASH_SOURCE[0]}""#));
        assert!(script.contains(r#"/bin/bash "${ARGS[@]}""#));
        assert!(script.contains("--init-file /ext3/env"));
    }

    #[test]
    fn test_one_liner() {
        let s = one_liner("singularity", Path::new("/work/sing.ext3"), "/s/a.sif", true);
        assert!(s.starts_with("singularity exec"));
        assert!(s.contains("--overlay /work/sing.ext3:ro"));
        assert!(s.contains("/bin/bash --init-file /ext3/env"));
    }

    #[test]
    fn test_write_scripts_executable() {
        let tmp = tempfile::tempdir().unwrap();
        let (ro, rw) = write_scripts(tmp.path(), "sing", "singularity").unwrap();
        assert_eq!(ro, tmp.path().join("sing"));
        assert_eq!(rw, tmp.path().join("singrw"));

        for p in [&ro, &rw] {
            let mode = fs::metadata(p).unwrap().permissions().mode();
            assert_ne!(mode & 0o111, 0, "{} not executable", p.display());
        }
        let ro_body = fs::read_to_string(&ro).unwrap();
        let rw_body = fs::read_to_string(&rw).unwrap();
        assert_ne!(ro_body, rw_body);
        assert!(ro_body.contains(":ro"));
    }
}
