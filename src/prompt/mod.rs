//! Prompt building.
//!
//! A [`PromptSet`] is the task prompt followed by one prompt per code unit.
//! The task prompt comes from a [`TemplateStore`]; code units come from a
//! [`Segmenter`] picked by task kind.

pub mod segment;
pub mod templates;

use std::path::{Path, PathBuf};

use crate::config::{Config, TaskKind};
use crate::errors::{Result, RevhookError};

pub use segment::{CodeSegmenter, DiffSegmenter, Segmenter};
pub use templates::{TemplateLoader, TemplateSource, TemplateStore};

/// Source of the text to prompt with: literal content, a file path, or both.
///
/// Content wins when both are present.
#[derive(Debug, Clone, Default)]
pub struct PromptInput {
    pub content: Option<String>,
    pub path: Option<PathBuf>,
}

impl PromptInput {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            path: None,
        }
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            content: None,
            path: Some(path.into()),
        }
    }

    /// Label used in logs and reports.
    pub fn label(&self) -> String {
        match self.path {
            Some(ref path) => path.display().to_string(),
            None => "<inline>".to_string(),
        }
    }

    fn resolve(&self) -> Result<String> {
        if let Some(ref content) = self.content {
            return Ok(content.clone());
        }
        let Some(ref path) = self.path else {
            return Err(RevhookError::input("no file content or file path supplied"));
        };
        read_source(path)
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| RevhookError::input(format!("cannot read {}: {}", path.display(), e)))
}

/// Ordered prompts for one input. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    prompts: Vec<String>,
}

impl PromptSet {
    pub fn new(task_prompt: String, code_units: Vec<String>) -> Self {
        let mut prompts = Vec::with_capacity(code_units.len() + 1);
        prompts.push(task_prompt);
        prompts.extend(code_units);
        Self { prompts }
    }

    pub fn task_prompt(&self) -> &str {
        &self.prompts[0]
    }

    pub fn code_units(&self) -> &[String] {
        &self.prompts[1..]
    }

    pub fn has_code_units(&self) -> bool {
        self.prompts.len() > 1
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

pub struct PromptBuilder {
    store: Box<dyn TemplateStore>,
    custom_instructions: Option<String>,
}

impl PromptBuilder {
    pub fn new(store: Box<dyn TemplateStore>, custom_instructions: Option<String>) -> Self {
        Self {
            store,
            custom_instructions: custom_instructions.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Builder using `.revhook/prompts/` overrides over the embedded defaults.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Box::new(TemplateLoader::with_overrides(&config.prompts_dir())),
            config.custom_instructions.clone(),
        )
    }

    /// Task prompt for `task`, with the custom suffix appended.
    pub fn task_prompt(&self, task: TaskKind) -> Result<String> {
        let template = self
            .store
            .template(task)?
            .ok_or_else(|| RevhookError::config(format!("no prompt template for task '{task}'")))?;

        let mut prompt = template.trim_end().to_string();
        if let Some(ref custom) = self.custom_instructions {
            prompt.push_str("\n\n");
            prompt.push_str(custom.trim());
        }
        Ok(prompt)
    }

    pub fn generate_prompt(&self, task: TaskKind, input: &PromptInput) -> Result<PromptSet> {
        let task_prompt = self.task_prompt(task)?;
        let source = input.resolve()?;
        let units = segment::for_task(task).split(&source);
        tracing::debug!(
            input = %input.label(),
            task = %task,
            units = units.len(),
            "prompt set built"
        );
        Ok(PromptSet::new(task_prompt, units))
    }
}
