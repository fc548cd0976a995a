//! Git hook management — `revhook hook`.

use anyhow::Result;
use std::path::Path;

use revhook::git::GitRepo;
use revhook::hook::{self, HookKind};
use revhook::ui::icons::{CHECK, HOOK};

use super::super::HookCommands;

fn kinds(kind: Option<HookKind>) -> Vec<HookKind> {
    match kind {
        Some(kind) => vec![kind],
        None => vec![HookKind::PreCommit, HookKind::PrepareCommitMsg],
    }
}

pub fn cmd_hook(project_dir: &Path, command: HookCommands) -> Result<()> {
    let repo = GitRepo::open(project_dir)?;
    let hooks_dir = repo.hooks_dir()?;

    match command {
        HookCommands::Install { kind, force } => {
            for kind in kinds(kind) {
                let result = hook::install(&hooks_dir, kind, force)?;
                let action = if result.replaced { "Updated" } else { "Installed" };
                println!("{}{} {} hook: {}", CHECK, action, kind.file_name(), result.path.display());
            }
        }
        HookCommands::Uninstall { kind } => {
            for kind in kinds(kind) {
                if hook::uninstall(&hooks_dir, kind)? {
                    println!("{}Removed {} hook", HOOK, kind.file_name());
                } else {
                    println!("No {} hook installed", kind.file_name());
                }
            }
        }
    }

    Ok(())
}
