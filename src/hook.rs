//! Git hook scripts that call back into revhook.
//!
//! ```text
//! .git/hooks/
//! ├── pre-commit           # revhook review --staged
//! └── prepare-commit-msg   # revhook commit --message-file "$1"
//! ```
//!
//! Scripts carry a marker line so that revhook never overwrites or removes a
//! hook it did not write.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

/// Marker identifying scripts written by revhook.
pub const HOOK_MARKER: &str = "# managed by revhook";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookKind {
    /// Review staged files before each commit
    PreCommit,
    /// Prepend a summary of the staged diff to the commit message
    PrepareCommitMsg,
}

impl HookKind {
    pub fn file_name(self) -> &'static str {
        match self {
            HookKind::PreCommit => "pre-commit",
            HookKind::PrepareCommitMsg => "prepare-commit-msg",
        }
    }

    pub fn script(self) -> String {
        let body = match self {
            HookKind::PreCommit => "exec revhook review --staged\n",
            // skip merges, squashes and amends that already have a message
            HookKind::PrepareCommitMsg => concat!(
                "case \"$2\" in\n",
                "  merge|squash|commit) exit 0 ;;\n",
                "esac\n",
                "exec revhook commit --message-file \"$1\"\n",
            ),
        };
        format!("#!/bin/sh\n{HOOK_MARKER}\n{body}")
    }
}

/// Result of installing a hook.
#[derive(Debug)]
pub struct InstallResult {
    pub path: PathBuf,
    /// Whether a previous revhook script was replaced
    pub replaced: bool,
}

fn is_managed(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.contains(HOOK_MARKER))
        .unwrap_or(false)
}

/// Write the hook script for `kind` into `hooks_dir`.
///
/// Fails if a hook not written by revhook is already there, unless `force`.
pub fn install(hooks_dir: &Path, kind: HookKind, force: bool) -> Result<InstallResult> {
    std::fs::create_dir_all(hooks_dir)
        .with_context(|| format!("Failed to create hooks directory: {}", hooks_dir.display()))?;

    let path = hooks_dir.join(kind.file_name());
    let replaced = path.exists();
    if replaced && !is_managed(&path) && !force {
        anyhow::bail!(
            "{} already exists and was not installed by revhook (use --force to overwrite)",
            path.display()
        );
    }

    std::fs::write(&path, kind.script())
        .with_context(|| format!("Failed to write hook: {}", path.display()))?;
    make_executable(&path)?;

    tracing::debug!(hook = kind.file_name(), path = %path.display(), "hook installed");
    Ok(InstallResult { path, replaced })
}

/// Remove the hook for `kind` if revhook wrote it.
///
/// Returns `false` when there was nothing to remove.
pub fn uninstall(hooks_dir: &Path, kind: HookKind) -> Result<bool> {
    let path = hooks_dir.join(kind.file_name());
    if !path.exists() {
        return Ok(false);
    }
    if !is_managed(&path) {
        anyhow::bail!(
            "{} was not installed by revhook; leaving it in place",
            path.display()
        );
    }
    std::fs::remove_file(&path)
        .with_context(|| format!("Failed to remove hook: {}", path.display()))?;
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to make {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
