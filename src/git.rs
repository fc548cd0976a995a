//! Staged-change discovery for hook runs.

use anyhow::{Context, Result};
use git2::{Delta, DiffFormat, DiffOptions, Repository};
use std::path::{Path, PathBuf};

pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open the repository containing `project_dir`.
    pub fn open(project_dir: &Path) -> Result<Self> {
        let repo = Repository::discover(project_dir).with_context(|| {
            format!("Failed to open git repository at {}", project_dir.display())
        })?;
        Ok(Self { repo })
    }

    /// Root of the working tree.
    pub fn workdir(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .context("Bare repositories have no working tree")
    }

    /// `path` relative to the working tree, as the index stores it.
    ///
    /// Returns `None` for paths outside the working tree.
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        let workdir = self.workdir().ok()?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        path.strip_prefix(&workdir).ok().map(Path::to_path_buf)
    }

    /// `.git/hooks`, honoring `core.hooksPath` when set.
    pub fn hooks_dir(&self) -> Result<PathBuf> {
        let config = self.repo.config()?;
        if let Ok(custom) = config.get_path("core.hooksPath") {
            return Ok(if custom.is_absolute() {
                custom
            } else {
                self.workdir()?.join(custom)
            });
        }
        Ok(self.repo.path().join("hooks"))
    }

    fn head_tree(&self) -> Option<git2::Tree<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_tree().ok())
    }

    fn staged_diff_for(&self, paths: &[PathBuf]) -> Result<git2::Diff<'_>> {
        let mut opts = DiffOptions::new();
        for path in paths {
            opts.pathspec(path.as_path());
        }
        let head = self.head_tree();
        self.repo
            .diff_tree_to_index(head.as_ref(), None, Some(&mut opts))
            .context("Failed to diff HEAD against the index")
    }

    /// Added or modified paths in the index, relative to the working tree.
    /// Deletions are skipped.
    pub fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let diff = self.staged_diff_for(&[])?;
        let mut files = Vec::new();
        for delta in diff.deltas() {
            match delta.status() {
                Delta::Added | Delta::Modified | Delta::Renamed | Delta::Copied => {}
                _ => continue,
            }
            if let Some(path) = delta.new_file().path() {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Content of `path` as staged, which may differ from the working tree.
    pub fn staged_content(&self, path: &Path) -> Result<String> {
        let index = self.repo.index()?;
        let entry = index
            .get_path(path, 0)
            .with_context(|| format!("{} is not staged", path.display()))?;
        let blob = self.repo.find_blob(entry.id)?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    /// Unified diff of the index against HEAD, limited to `paths` when given.
    pub fn staged_diff(&self, paths: &[PathBuf]) -> Result<String> {
        let diff = self.staged_diff_for(paths)?;
        let mut buf = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                buf.push(line.origin() as u8);
            }
            buf.extend_from_slice(line.content());
            true
        })
        .context("Failed to render staged diff")?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
