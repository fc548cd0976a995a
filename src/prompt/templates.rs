//! Task instruction templates.
//!
//! Defaults are compiled into the binary from `prompts/`. A project can
//! replace any of them by dropping a file with the same name into
//! `.revhook/prompts/`:
//!
//! ```text
//! .revhook/prompts/
//! ├── review.md     # TaskKind::Review
//! ├── test.md       # TaskKind::TestGeneration
//! └── commit.md     # TaskKind::CommitSummary
//! ```

use rust_embed::RustEmbed;
use std::path::{Path, PathBuf};

use crate::config::TaskKind;
use crate::errors::{Result, RevhookError};

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/prompts/"]
struct DefaultTemplates;

/// Resolves a task kind to its instruction text.
pub trait TemplateStore: Send + Sync {
    /// `Ok(None)` when no template is registered for `task`.
    fn template(&self, task: TaskKind) -> Result<Option<String>>;
}

/// Where a template was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// `.revhook/prompts/<name>`
    Local(PathBuf),
    /// Compiled-in default
    Embedded,
    /// Neither exists
    Missing,
}

/// Project overrides layered over the embedded defaults.
#[derive(Debug, Clone, Default)]
pub struct TemplateLoader {
    override_dir: Option<PathBuf>,
}

impl TemplateLoader {
    /// Loader that only knows the embedded defaults.
    pub fn embedded() -> Self {
        Self { override_dir: None }
    }

    /// Loader that prefers files from `prompts_dir` when present.
    pub fn with_overrides(prompts_dir: &Path) -> Self {
        Self {
            override_dir: Some(prompts_dir.to_path_buf()),
        }
    }

    pub fn resolve_source(&self, task: TaskKind) -> TemplateSource {
        let name = task.template_name();
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(name);
            if path.is_file() {
                return TemplateSource::Local(path);
            }
        }
        if DefaultTemplates::get(name).is_some() {
            TemplateSource::Embedded
        } else {
            TemplateSource::Missing
        }
    }

    /// Embedded default text for `task`, ignoring overrides.
    pub fn default_text(task: TaskKind) -> Option<String> {
        DefaultTemplates::get(task.template_name())
            .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
    }
}

impl TemplateStore for TemplateLoader {
    fn template(&self, task: TaskKind) -> Result<Option<String>> {
        match self.resolve_source(task) {
            TemplateSource::Local(path) => {
                tracing::debug!(path = %path.display(), "using local template override");
                std::fs::read_to_string(&path).map(Some).map_err(|e| {
                    RevhookError::config(format!(
                        "Failed to read template {}: {}",
                        path.display(),
                        e
                    ))
                })
            }
            TemplateSource::Embedded => Ok(Self::default_text(task)),
            TemplateSource::Missing => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_every_task_has_an_embedded_template() {
        let loader = TemplateLoader::embedded();
        for task in TaskKind::ALL {
            assert_eq!(loader.resolve_source(task), TemplateSource::Embedded);
            let text = loader.template(task).unwrap().unwrap();
            assert!(!text.trim().is_empty());
        }
    }

    #[test]
    fn test_review_template_mentions_reject_marker() {
        let text = TemplateLoader::default_text(TaskKind::Review).unwrap();
        assert!(text.contains("[REJECT]"));
    }

    #[test]
    fn test_local_override_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("review.md"), "custom review rubric").unwrap();

        let loader = TemplateLoader::with_overrides(dir.path());
        assert_eq!(
            loader.resolve_source(TaskKind::Review),
            TemplateSource::Local(dir.path().join("review.md"))
        );
        assert_eq!(
            loader.template(TaskKind::Review).unwrap().as_deref(),
            Some("custom review rubric")
        );
        // other tasks fall back to the defaults
        assert_eq!(
            loader.resolve_source(TaskKind::CommitSummary),
            TemplateSource::Embedded
        );
    }

    #[test]
    fn test_missing_override_dir_falls_back() {
        let loader = TemplateLoader::with_overrides(Path::new("/nonexistent/revhook/prompts"));
        assert_eq!(
            loader.resolve_source(TaskKind::TestGeneration),
            TemplateSource::Embedded
        );
    }
}
