//! Configuration for revhook.
//!
//! Settings are layered the same way for every run:
//! 1. `.revhook/revhook.toml` (or `--config <path>`)
//! 2. Environment variables (after `.env` has been loaded)
//! 3. CLI arguments (task kind, verbosity)
//!
//! The result is an immutable [`Config`] that is assembled once at startup and
//! passed by reference into every component.
//!
//! # Configuration File Format
//!
//! ```toml
//! [chat]
//! model = "gpt-3.5-turbo"
//! send_by_proxy = false
//! max_tokens = 1000
//! max_model_tokens = 4000
//!
//! [prompt]
//! custom_instructions = "Answer in English."
//! include_extensions = ["rs", "ts", "py"]
//!
//! [security]
//! security_regex = "(?i)api[_-]?key\\s*=\\s*\\S+"
//!
//! [run]
//! task = "review"
//! cursor_policy = "per-file"
//! fail_on_findings = false
//! review_fail_marker = "[REJECT]"
//! ```

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::RevhookError;

/// Name of the per-project configuration directory.
pub const REVHOOK_DIR: &str = ".revhook";

/// Name of the configuration file inside [`REVHOOK_DIR`].
pub const CONFIG_FILE: &str = "revhook.toml";

/// Upper bound for a single chat request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "OPENAI_ACCESS_TOKEN";

/// Which kind of answer the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskKind {
    /// Review code units and comment on problems
    #[default]
    #[serde(rename = "review")]
    Review,
    /// Suggest unit tests for each code unit
    #[serde(rename = "test", alias = "test-generation")]
    TestGeneration,
    /// Summarize a staged diff into commit message text
    #[serde(rename = "commit", alias = "commit-summary")]
    CommitSummary,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::Review,
        TaskKind::TestGeneration,
        TaskKind::CommitSummary,
    ];

    /// File name of the instruction template for this task.
    pub fn template_name(self) -> &'static str {
        match self {
            TaskKind::Review => "review.md",
            TaskKind::TestGeneration => "test.md",
            TaskKind::CommitSummary => "commit.md",
        }
    }

    /// Whether the input is a diff rather than whole source files.
    pub fn works_on_diff(self) -> bool {
        matches!(self, TaskKind::CommitSummary)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Review => write!(f, "review"),
            TaskKind::TestGeneration => write!(f, "test"),
            TaskKind::CommitSummary => write!(f, "commit"),
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = RevhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "review" => Ok(TaskKind::Review),
            "test" | "test-generation" => Ok(TaskKind::TestGeneration),
            "commit" | "commit-summary" => Ok(TaskKind::CommitSummary),
            _ => Err(RevhookError::config(format!(
                "Invalid task kind '{}'. Valid values: review, test, commit",
                s
            ))),
        }
    }
}

/// Whether the conversation cursor survives from one file to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorPolicy {
    /// Every file starts a fresh conversation with the task prompt
    #[default]
    PerFile,
    /// All files of one invocation share a single conversation
    Shared,
}

impl std::fmt::Display for CursorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CursorPolicy::PerFile => write!(f, "per-file"),
            CursorPolicy::Shared => write!(f, "shared"),
        }
    }
}

/// `[chat]` section: model and backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_model")]
    pub model: String,
    /// Use the reverse-proxy backend instead of the official API
    #[serde(default)]
    pub send_by_proxy: bool,
    /// Completion length cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Context window used when rebuilding history for the official API
    #[serde(default = "default_max_model_tokens")]
    pub max_model_tokens: u32,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_max_model_tokens() -> u32 {
    4000
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_proxy_url() -> String {
    "https://chat.openai.com/backend-api/conversation".to_string()
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            send_by_proxy: false,
            max_tokens: default_max_tokens(),
            max_model_tokens: default_max_model_tokens(),
            api_base_url: default_api_base_url(),
            proxy_url: default_proxy_url(),
        }
    }
}

/// `[prompt]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSection {
    /// Appended to every task prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    /// File extensions picked up from the git stage
    #[serde(default = "default_include_extensions")]
    pub include_extensions: Vec<String>,
}

fn default_include_extensions() -> Vec<String> {
    [
        "rs", "go", "py", "js", "jsx", "ts", "tsx", "java", "kt", "c", "h", "cc", "cpp", "hpp",
        "cs", "rb", "php", "swift", "scala", "vue",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PromptSection {
    fn default() -> Self {
        Self {
            custom_instructions: None,
            include_extensions: default_include_extensions(),
        }
    }
}

/// `[security]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Matches are replaced before any text leaves the process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_regex: Option<String>,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default)]
    pub task: TaskKind,
    #[serde(default)]
    pub cursor_policy: CursorPolicy,
    /// Exit non-zero from `review` when a reply carries `review_fail_marker`
    #[serde(default)]
    pub fail_on_findings: bool,
    #[serde(default = "default_review_fail_marker")]
    pub review_fail_marker: String,
}

fn default_review_fail_marker() -> String {
    "[REJECT]".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            task: TaskKind::default(),
            cursor_policy: CursorPolicy::default(),
            fail_on_findings: false,
            review_fail_marker: default_review_fail_marker(),
        }
    }
}

/// Contents of `.revhook/revhook.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevhookToml {
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub prompt: PromptSection,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub run: RunSection,
}

impl RevhookToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse revhook.toml")
    }

    /// Load `.revhook/revhook.toml`, or defaults when the file doesn't exist.
    pub fn load_or_default(revhook_dir: &Path) -> Result<Self> {
        let config_path = revhook_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize revhook.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("REVHOOK_MODEL") {
            self.chat.model = model;
        }
        if let Some(flag) = lookup("REVHOOK_SEND_BY_PROXY") {
            self.chat.send_by_proxy = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Some(max) = lookup("REVHOOK_MAX_TOKENS").and_then(|v| v.trim().parse().ok()) {
            self.chat.max_tokens = max;
        }
        if let Some(url) = lookup("REVHOOK_API_BASE_URL") {
            self.chat.api_base_url = url;
        }
        if let Some(url) = lookup("REVHOOK_PROXY_URL") {
            self.chat.proxy_url = url;
        }
        if let Some(pattern) = lookup("REVHOOK_SECURITY_REGEX") {
            self.security.security_regex = Some(pattern);
        }
        if let Some(extra) = lookup("REVHOOK_CUSTOM_INSTRUCTIONS") {
            self.prompt.custom_instructions = Some(extra);
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.chat.model.trim().is_empty() {
            warnings.push("chat.model is empty".to_string());
        }
        if self.chat.max_tokens == 0 {
            warnings.push("chat.max_tokens must be greater than 0".to_string());
        }
        if self.chat.max_tokens >= self.chat.max_model_tokens {
            warnings.push(format!(
                "chat.max_tokens ({}) leaves no room for the prompt within max_model_tokens ({})",
                self.chat.max_tokens, self.chat.max_model_tokens
            ));
        }
        if let Some(ref pattern) = self.security.security_regex
            && let Err(e) = Regex::new(pattern)
        {
            warnings.push(format!("Invalid security_regex '{}': {}", pattern, e));
        }
        if self.run.review_fail_marker.trim().is_empty() && self.run.fail_on_findings {
            warnings.push("run.fail_on_findings is set but review_fail_marker is empty".into());
        }

        warnings
    }
}

/// Resolved, immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub revhook_dir: PathBuf,
    pub task: TaskKind,
    pub model: String,
    pub send_by_proxy: bool,
    pub max_tokens: u32,
    pub max_model_tokens: u32,
    pub api_base_url: String,
    pub proxy_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub security_regex: Option<Regex>,
    pub custom_instructions: Option<String>,
    pub include_extensions: Vec<String>,
    pub cursor_policy: CursorPolicy,
    pub fail_on_findings: bool,
    pub review_fail_marker: String,
    pub verbose: bool,
}

impl Config {
    /// Load the config file, apply the process environment and resolve.
    ///
    /// `config_path` overrides the default `.revhook/revhook.toml` location.
    /// `task` overrides `[run].task`.
    pub fn load(
        project_dir: &Path,
        config_path: Option<&Path>,
        task: Option<TaskKind>,
        verbose: bool,
    ) -> Result<Self> {
        let revhook_dir = project_dir.join(REVHOOK_DIR);
        let mut toml = match config_path {
            Some(path) => RevhookToml::load(path)?,
            None => RevhookToml::load_or_default(&revhook_dir)?,
        };
        let lookup = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        toml.apply_env(lookup);
        if let Some(task) = task {
            toml.run.task = task;
        }

        let mut config = Self::resolve(project_dir, &toml, lookup)?;
        config.verbose = verbose;
        Ok(config)
    }

    /// Build a `Config` from parsed settings and a credential lookup.
    pub fn resolve(
        project_dir: &Path,
        toml: &RevhookToml,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RevhookError> {
        let model = toml.chat.model.trim().to_string();
        if model.is_empty() {
            return Err(RevhookError::config("No model configured (chat.model)"));
        }

        let security_regex = match toml.security.security_regex.as_deref() {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern).map_err(|e| {
                RevhookError::config(format!("Invalid security_regex '{}': {}", pattern, e))
            })?),
            _ => None,
        };

        let api_key = lookup(ENV_API_KEY);
        let access_token = lookup(ENV_ACCESS_TOKEN);
        if toml.chat.send_by_proxy && access_token.is_none() {
            return Err(RevhookError::config(format!(
                "send_by_proxy is enabled but {} is not set",
                ENV_ACCESS_TOKEN
            )));
        }
        if !toml.chat.send_by_proxy && api_key.is_none() {
            return Err(RevhookError::config(format!(
                "{} is not set (or enable chat.send_by_proxy)",
                ENV_API_KEY
            )));
        }

        let custom_instructions = toml
            .prompt
            .custom_instructions
            .clone()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            revhook_dir: project_dir.join(REVHOOK_DIR),
            task: toml.run.task,
            model,
            send_by_proxy: toml.chat.send_by_proxy,
            max_tokens: toml.chat.max_tokens,
            max_model_tokens: toml.chat.max_model_tokens,
            api_base_url: toml.chat.api_base_url.trim_end_matches('/').to_string(),
            proxy_url: toml.chat.proxy_url.clone(),
            api_key,
            access_token,
            timeout: REQUEST_TIMEOUT,
            security_regex,
            custom_instructions,
            include_extensions: toml.prompt.include_extensions.clone(),
            cursor_policy: toml.run.cursor_policy,
            fail_on_findings: toml.run.fail_on_findings,
            review_fail_marker: toml.run.review_fail_marker.clone(),
            verbose: false,
        })
    }

    /// Directory that holds per-file markdown reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.revhook_dir.join("reports")
    }

    /// Directory whose `<task>.md` files override the embedded templates.
    pub fn prompts_dir(&self) -> PathBuf {
        self.revhook_dir.join("prompts")
    }

    /// Whether `path` has one of the configured extensions.
    pub fn is_included(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.include_extensions
                    .iter()
                    .any(|inc| inc.eq_ignore_ascii_case(ext))
            })
    }
}
