//! Markdown reports under `.revhook/reports/`, one per input.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::TaskKind;
use crate::orchestrator::RunOutcome;

const SEPARATOR: &str = "\n\n---\n\n";

pub struct ReportWriter {
    dir: PathBuf,
    task: TaskKind,
    model: String,
}

impl ReportWriter {
    pub fn new(dir: &Path, task: TaskKind, model: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            task,
            model: model.to_string(),
        }
    }

    /// Write the report for `source`, replacing any earlier one.
    pub fn write(&self, source: &str, outcome: &RunOutcome) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create reports directory: {}", self.dir.display()))?;
        let path = self.dir.join(report_file_name(source));
        std::fs::write(&path, self.render(source, outcome, Utc::now()))
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(path)
    }

    fn render(&self, source: &str, outcome: &RunOutcome, at: DateTime<Utc>) -> String {
        let status = if outcome.succeeded { "ok" } else { "failed" };
        let mut out = format!(
            "# {} report: {}\n\n- Model: {}\n- Generated: {}\n- Status: {}\n\n",
            self.task,
            source,
            self.model,
            at.format("%Y-%m-%d %H:%M:%S UTC"),
            status
        );
        if outcome.messages.is_empty() {
            out.push_str("_Nothing to review._\n");
        } else {
            out.push_str(&outcome.messages.join(SEPARATOR));
            out.push('\n');
        }
        out
    }
}

/// `src/app/main.rs` → `src_app_main.rs.md`
fn report_file_name(source: &str) -> String {
    let name: String = source
        .trim_start_matches("./")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' | '<' | '>' => '_',
            c => c,
        })
        .collect();
    let name = name.trim_matches('_');
    if name.is_empty() {
        "input.md".to_string()
    } else {
        format!("{name}.md")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn writer(dir: &Path) -> ReportWriter {
        ReportWriter::new(dir, TaskKind::Review, "gpt-4")
    }

    #[test]
    fn test_report_file_names() {
        assert_eq!(report_file_name("src/app/main.rs"), "src_app_main.rs.md");
        assert_eq!(report_file_name("./lib.rs"), "lib.rs.md");
        assert_eq!(report_file_name("<stdin>"), "stdin.md");
        assert_eq!(report_file_name(""), "input.md");
    }

    #[test]
    fn test_render_separates_replies() {
        let dir = tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let outcome = RunOutcome::success(vec!["first".into(), "second".into()]);

        let text = writer(dir.path()).render("src/lib.rs", &outcome, at);

        assert!(text.starts_with("# review report: src/lib.rs\n"));
        assert!(text.contains("- Model: gpt-4\n"));
        assert!(text.contains("- Generated: 2024-05-01 12:30:00 UTC\n"));
        assert!(text.contains("- Status: ok\n"));
        assert!(text.ends_with("first\n\n---\n\nsecond\n"));
    }

    #[test]
    fn test_render_failure_and_empty() {
        let dir = tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        let failed = writer(dir.path()).render("a.rs", &RunOutcome::failure("sentinel"), at);
        assert!(failed.contains("- Status: failed"));
        assert!(failed.ends_with("sentinel\n"));

        let empty = writer(dir.path()).render("a.rs", &RunOutcome::success(vec![]), at);
        assert!(empty.contains("_Nothing to review._"));
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempdir().unwrap();
        let reports = dir.path().join(".revhook").join("reports");
        let path = writer(&reports)
            .write("src/lib.rs", &RunOutcome::success(vec!["ok".into()]))
            .unwrap();

        assert_eq!(path, reports.join("src_lib.rs.md"));
        assert!(std::fs::read_to_string(path).unwrap().contains("ok"));
    }
}
