use console::{Term, style};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::TaskKind;
use crate::runner::Progress;
use crate::ui::icons::{CHECK, COMMIT, CROSS, REVIEW, TEST};

/// Longest slice of a streaming reply shown next to the spinner.
const PREVIEW_CHARS: usize = 60;

/// Terminal spinner for one input at a time, rendered via `indicatif`.
///
/// Drawn on stderr so replies printed to stdout stay clean. When stderr is
/// not a terminal (hooks run by GUI git clients, CI) the bar is hidden.
///
/// Each [`Progress::start`] opens a new bar, leaving the previous input's
/// final line on screen.
pub struct SpinnerProgress {
    bar: Mutex<ProgressBar>,
    task: TaskKind,
    hidden: bool,
}

impl SpinnerProgress {
    pub fn new(task: TaskKind) -> Self {
        Self::with_visibility(task, !Term::stderr().is_term())
    }

    /// A spinner that never draws.
    pub fn hidden(task: TaskKind) -> Self {
        Self::with_visibility(task, true)
    }

    fn with_visibility(task: TaskKind, hidden: bool) -> Self {
        Self {
            bar: Mutex::new(new_bar(hidden)),
            task,
            hidden,
        }
    }

    fn current(&self) -> ProgressBar {
        self.bar.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn icon(&self) -> String {
        match self.task {
            TaskKind::Review => REVIEW.to_string(),
            TaskKind::TestGeneration => TEST.to_string(),
            TaskKind::CommitSummary => COMMIT.to_string(),
        }
    }
}

fn new_bar(hidden: bool) -> ProgressBar {
    let target = if hidden {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stderr()
    };
    let bar = ProgressBar::with_draw_target(None, target);
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix} {spinner} {msg}")
            .expect("progress bar template is a valid static string"),
    );
    bar
}

impl Progress for SpinnerProgress {
    fn start(&self, text: &str) {
        let bar = new_bar(self.hidden);
        bar.set_prefix(self.icon());
        bar.set_message(text.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut current = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if !current.is_finished() {
            current.finish_and_clear();
        }
        *current = bar;
    }

    fn update(&self, text: &str) {
        self.current().set_message(format!(
            "{} {}",
            style(format!("({} chars)", text.chars().count())).dim(),
            style(preview(text)).dim()
        ));
    }

    fn succeed(&self, text: &str) {
        self.current()
            .finish_with_message(format!("{}{}", CHECK, style(text).green()));
    }

    fn fail(&self, text: &str) {
        self.current()
            .abandon_with_message(format!("{}{}", CROSS, style(text).red()));
    }

    fn stop(&self) {
        let bar = self.current();
        if !bar.is_finished() {
            bar.finish_and_clear();
        }
    }
}

/// Tail of the last non-empty line of `text`, at most [`PREVIEW_CHARS`] long.
fn preview(text: &str) -> String {
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();
    let count = line.chars().count();
    if count <= PREVIEW_CHARS {
        line.to_string()
    } else {
        let tail: String = line.chars().skip(count - PREVIEW_CHARS + 1).collect();
        format!("…{tail}")
    }
}
