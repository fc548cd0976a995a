//! Model-backed commands: `revhook review`, `revhook test`, `revhook commit`.

use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use revhook::config::{Config, TaskKind};
use revhook::git::GitRepo;
use revhook::orchestrator::{Orchestrator, RunOutcome};
use revhook::prompt::{PromptBuilder, PromptInput};
use revhook::report::ReportWriter;
use revhook::runner::RunController;
use revhook::session::SessionClient;
use revhook::ui::SpinnerProgress;
use revhook::ui::icons::{FILE, WARN};

use super::super::{Cli, TaskArgs};

type Controller = RunController<SessionClient, SpinnerProgress>;

fn build_controller(config: &Config, cancel: CancellationToken) -> Result<Controller> {
    let session = SessionClient::from_config(config)?;
    Ok(RunController::new(
        Orchestrator::with_cancellation(session, cancel),
        PromptBuilder::from_config(config),
        SpinnerProgress::new(config.task),
        config.task,
        config.cursor_policy,
    ))
}

/// Cancel in-flight requests on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling request");
            trigger.cancel();
        }
    });
    cancel
}

/// Explicit files as given, or the staged version of every staged file.
fn collect_inputs(config: &Config, args: &TaskArgs) -> Result<Vec<PromptInput>> {
    if !args.files.is_empty() && !args.staged {
        return Ok(args
            .files
            .iter()
            .map(|file| {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    config.project_dir.join(file)
                };
                PromptInput::path(path)
            })
            .collect());
    }

    let repo = GitRepo::open(&config.project_dir)?;
    let mut staged = repo.staged_files()?;
    if !args.files.is_empty() {
        let wanted: Vec<PathBuf> = args
            .files
            .iter()
            .filter_map(|f| repo.relative_path(&config.project_dir.join(f)))
            .collect();
        staged.retain(|path| wanted.contains(path));
    }

    let mut inputs = Vec::new();
    for path in staged {
        if !config.is_included(&path) {
            tracing::debug!(path = %path.display(), "skipping file with excluded extension");
            continue;
        }
        let content = repo.staged_content(&path)?;
        inputs.push(PromptInput {
            content: Some(content),
            path: Some(path),
        });
    }
    Ok(inputs)
}

fn print_outcome(label: &str, outcome: &RunOutcome) {
    println!("{}{}", FILE, style(label).bold());
    println!();
    for message in &outcome.messages {
        println!("{}", message.trim_end());
        println!();
    }
}

fn is_rejected(config: &Config, outcome: &RunOutcome) -> bool {
    config.task == TaskKind::Review
        && outcome.succeeded
        && !config.review_fail_marker.is_empty()
        && outcome
            .messages
            .iter()
            .any(|m| m.contains(&config.review_fail_marker))
}

pub async fn cmd_task(
    cli: &Cli,
    project_dir: &Path,
    task: TaskKind,
    args: &TaskArgs,
) -> Result<ExitCode> {
    let config = Config::load(project_dir, cli.config.as_deref(), Some(task), cli.verbose)?;

    let inputs = collect_inputs(&config, args)?;
    if inputs.is_empty() {
        println!("No files to process.");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = cancel_on_ctrl_c();
    let mut controller = build_controller(&config, cancel.clone())?;
    let reports = args
        .report
        .then(|| ReportWriter::new(&config.reports_dir(), task, &config.model));

    let mut rejected = Vec::new();
    for input in &inputs {
        if cancel.is_cancelled() {
            break;
        }
        let label = input.label();
        let outcome = controller.run_outcome(input).await;
        print_outcome(&label, &outcome);

        if let Some(ref writer) = reports {
            let path = writer.write(&label, &outcome)?;
            tracing::debug!(report = %path.display(), "report written");
        }
        if is_rejected(&config, &outcome) {
            rejected.push(label);
        }
    }

    if cancel.is_cancelled() {
        return Ok(ExitCode::from(130));
    }
    if config.fail_on_findings && !rejected.is_empty() {
        eprintln!(
            "{}{} file(s) rejected by review: {}",
            WARN,
            rejected.len(),
            rejected.join(", ")
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Put `summary` above the existing message, keeping git's comment lines.
fn prepend_summary(existing: &str, summary: &str) -> String {
    let summary = summary.trim();
    if existing.trim().is_empty() {
        format!("{summary}\n")
    } else {
        format!("{summary}\n\n{existing}")
    }
}

/// Commit summaries are advisory; a missing one must not abort the commit.
fn skip_summary(reason: &anyhow::Error) -> ExitCode {
    tracing::warn!("commit summary skipped: {:#}", reason);
    eprintln!("{}No commit summary generated.", WARN);
    ExitCode::SUCCESS
}

pub async fn cmd_commit(
    cli: &Cli,
    project_dir: &Path,
    message_file: Option<&Path>,
) -> Result<ExitCode> {
    let config = match Config::load(
        project_dir,
        cli.config.as_deref(),
        Some(TaskKind::CommitSummary),
        cli.verbose,
    ) {
        Ok(config) => config,
        Err(e) => return Ok(skip_summary(&e)),
    };

    let repo = GitRepo::open(&config.project_dir)?;
    let staged: Vec<PathBuf> = repo
        .staged_files()?
        .into_iter()
        .filter(|p| config.is_included(p))
        .collect();
    let diff = if staged.is_empty() {
        String::new()
    } else {
        repo.staged_diff(&staged)?
    };
    if diff.trim().is_empty() {
        println!("Nothing staged to summarize.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut controller = match build_controller(&config, cancel_on_ctrl_c()) {
        Ok(controller) => controller,
        Err(e) => return Ok(skip_summary(&e)),
    };
    let outcome = controller.run_outcome(&PromptInput::content(diff)).await;

    if !outcome.succeeded || outcome.messages.is_empty() {
        eprintln!("{}No commit summary generated.", WARN);
        return Ok(ExitCode::SUCCESS);
    }
    let summary = outcome.messages.join("\n\n");

    match message_file {
        Some(path) => {
            let existing = std::fs::read_to_string(path).unwrap_or_default();
            std::fs::write(path, prepend_summary(&existing, &summary))
                .with_context(|| format!("Failed to write commit message: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "commit summary written");
        }
        None => println!("{}", summary.trim_end()),
    }
    Ok(ExitCode::SUCCESS)
}
