//! Per-input driver: progress indicator, orchestration, failure containment.
//!
//! A failing input never takes the process down. Its error is logged, the
//! indicator shows a failure, and the caller receives [`FAILURE_SENTINEL`]
//! in place of the replies so the next input can still be processed.

use crate::config::{CursorPolicy, TaskKind};
use crate::errors::Result;
use crate::orchestrator::{ConversationCursor, Orchestrator, RunOutcome};
use crate::prompt::{PromptBuilder, PromptInput};
use crate::session::{ChatSession, ProgressSink};

/// Returned instead of the replies when an input fails.
pub const FAILURE_SENTINEL: &str = "Failed to get a response from the model. See the log for details.";

/// Observer for the lifecycle of one input.
pub trait Progress: Send + Sync {
    fn start(&self, text: &str);
    fn update(&self, text: &str);
    fn succeed(&self, text: &str);
    fn fail(&self, text: &str);
    /// Stop the indicator. Called on every exit path; must tolerate repeats.
    fn stop(&self);
}

/// Streams partial replies into [`Progress::update`].
struct PartialUpdates<'a>(&'a dyn Progress);

impl ProgressSink for PartialUpdates<'_> {
    fn on_partial(&self, partial: &str) {
        self.0.update(partial);
    }
}

/// Stops the indicator even when the run future is dropped mid-request.
struct StopGuard<'a>(&'a dyn Progress);

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

pub struct RunController<S, P> {
    orchestrator: Orchestrator<S>,
    builder: PromptBuilder,
    progress: P,
    task: TaskKind,
    cursor_policy: CursorPolicy,
    cursor: ConversationCursor,
}

impl<S: ChatSession, P: Progress> RunController<S, P> {
    pub fn new(
        orchestrator: Orchestrator<S>,
        builder: PromptBuilder,
        progress: P,
        task: TaskKind,
        cursor_policy: CursorPolicy,
    ) -> Self {
        Self {
            orchestrator,
            builder,
            progress,
            task,
            cursor_policy,
            cursor: ConversationCursor::fresh(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.orchestrator
    }

    /// Replies for `input`, or a single [`FAILURE_SENTINEL`].
    pub async fn run(&mut self, input: &PromptInput) -> Vec<String> {
        self.run_outcome(input).await.messages
    }

    pub async fn run_outcome(&mut self, input: &PromptInput) -> RunOutcome {
        let label = input.label();
        let progress: &dyn Progress = &self.progress;
        let _guard = StopGuard(progress);
        progress.start(&format!("{} {}", verb(self.task), label));

        let cursor = match self.cursor_policy {
            CursorPolicy::PerFile => ConversationCursor::fresh(),
            CursorPolicy::Shared => std::mem::take(&mut self.cursor),
        };
        let sink = PartialUpdates(progress);

        match process(&self.orchestrator, &self.builder, self.task, input, cursor, &sink).await {
            Ok((outcome, cursor)) => {
                if self.cursor_policy == CursorPolicy::Shared {
                    self.cursor = cursor;
                }
                progress.succeed(&format!("{label}: {} replies", outcome.messages.len()));
                outcome
            }
            Err(e) => {
                tracing::error!(input = %label, task = %self.task, error = %e, "request failed");
                progress.fail(&format!("{label}: {e}"));
                RunOutcome::failure(FAILURE_SENTINEL)
            }
        }
    }
}

async fn process<S: ChatSession>(
    orchestrator: &Orchestrator<S>,
    builder: &PromptBuilder,
    task: TaskKind,
    input: &PromptInput,
    cursor: ConversationCursor,
    sink: &dyn ProgressSink,
) -> Result<(RunOutcome, ConversationCursor)> {
    let prompts = builder.generate_prompt(task, input)?;
    orchestrator.process_unit(&prompts, cursor, Some(sink)).await
}

fn verb(task: TaskKind) -> &'static str {
    match task {
        TaskKind::Review => "Reviewing",
        TaskKind::TestGeneration => "Writing tests for",
        TaskKind::CommitSummary => "Summarizing",
    }
}
