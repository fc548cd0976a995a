//! Conversation orchestration for one input unit.
//!
//! ```text
//! Init ──(no code units)──────────────────────────────▶ Done (empty)
//!   │
//!   ▼
//! Bootstrap ──(cursor set: reuse it)──┐
//!   │ send task prompt, no parent     │
//!   ▼                                 ▼
//! Iterate: send unit ─▶ continue once if truncated ─▶ advance cursor
//!   │
//!   ▼
//! Done (one message per code unit)
//! ```
//!
//! The cursor is passed in and handed back, so the caller decides whether a
//! conversation carries over to the next file.

use tokio_util::sync::CancellationToken;

use crate::continuation::{CONTINUE_PROMPT, merge_continuation, needs_continuation};
use crate::errors::Result;
use crate::prompt::PromptSet;
use crate::session::{ChatMessage, ChatSession, ParentContext, ProgressSink, SendOptions};

/// Result of processing one input unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub succeeded: bool,
    pub messages: Vec<String>,
}

impl RunOutcome {
    pub fn success(messages: Vec<String>) -> Self {
        Self {
            succeeded: true,
            messages,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            messages: vec![message.into()],
        }
    }
}

/// Latest reply of a conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationCursor {
    last: Option<ChatMessage>,
}

impl ConversationCursor {
    /// A cursor with no conversation yet.
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.last.is_some()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.last.as_ref()
    }

    pub fn parent(&self) -> Option<ParentContext> {
        self.last.as_ref().map(ChatMessage::parent_context)
    }

    fn advance(self, reply: ChatMessage) -> Self {
        Self { last: Some(reply) }
    }
}

pub struct Orchestrator<S> {
    session: S,
    cancel: CancellationToken,
}

impl<S: ChatSession> Orchestrator<S> {
    pub fn new(session: S) -> Self {
        Self::with_cancellation(session, CancellationToken::new())
    }

    /// Every request gets a child of `cancel`; cancelling it aborts the
    /// request in flight.
    pub fn with_cancellation(session: S, cancel: CancellationToken) -> Self {
        Self { session, cancel }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Send every code unit of `prompts`, chained onto `cursor`.
    ///
    /// Returns the replies in prompt order and the cursor after the last one.
    /// Any failed request aborts the unit; nothing partial is returned.
    pub async fn process_unit(
        &self,
        prompts: &PromptSet,
        cursor: ConversationCursor,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<(RunOutcome, ConversationCursor)> {
        if !prompts.has_code_units() {
            tracing::debug!("no code units, nothing to send");
            return Ok((RunOutcome::success(Vec::new()), cursor));
        }

        let mut cursor = if cursor.is_set() {
            tracing::debug!("reusing conversation cursor");
            cursor
        } else {
            let reply = self.send(prompts.task_prompt(), None, None).await?;
            tracing::debug!(conversation = %reply.conversation_id, "conversation started");
            cursor.advance(reply)
        };

        let mut messages = Vec::with_capacity(prompts.code_units().len());
        for (index, unit) in prompts.code_units().iter().enumerate() {
            let parent = cursor.parent();
            let reply = self.send(unit, parent.as_ref(), progress).await?;
            let reply = self.complete_truncated(reply, progress).await?;
            tracing::debug!(unit = index + 1, chars = reply.text.len(), "reply received");

            messages.push(reply.text.clone());
            cursor = cursor.advance(reply);
        }

        Ok((RunOutcome::success(messages), cursor))
    }

    /// Ask once for the rest of a reply cut off inside a code block.
    async fn complete_truncated(
        &self,
        reply: ChatMessage,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<ChatMessage> {
        if !needs_continuation(&reply.text) {
            return Ok(reply);
        }
        tracing::info!("reply ends inside a code block, asking to continue");
        let parent = reply.parent_context();
        let continuation = self.send(CONTINUE_PROMPT, Some(&parent), progress).await?;
        Ok(merge_continuation(reply, continuation))
    }

    async fn send(
        &self,
        text: &str,
        parent: Option<&ParentContext>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<ChatMessage> {
        let options = SendOptions {
            progress,
            cancel: self.cancel.child_token(),
        };
        self.session.send(text, parent, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RevhookError;
    use crate::session::testing::{MockBackend, Scripted, client};
    use crate::session::{ParentContext, SessionClient};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl ProgressSink for RecordingSink {
        fn on_partial(&self, partial: &str) {
            self.0.lock().unwrap().push(partial.to_string());
        }
    }

    fn orchestrator(backend: MockBackend) -> Orchestrator<SessionClient<MockBackend>> {
        Orchestrator::new(client(backend))
    }

    fn prompts(units: &[&str]) -> PromptSet {
        PromptSet::new(
            "TASK".to_string(),
            units.iter().map(|u| u.to_string()).collect(),
        )
    }

    fn parent(id: &str) -> Option<ParentContext> {
        Some(ParentContext {
            conversation_id: "conv-1".into(),
            parent_message_id: id.into(),
        })
    }

    #[tokio::test]
    async fn test_no_code_units_never_calls_session() {
        let orch = orchestrator(MockBackend::replies(&["unused"]));

        let (outcome, cursor) = orch
            .process_unit(&prompts(&[]), ConversationCursor::fresh(), None)
            .await
            .unwrap();

        assert!(outcome.succeeded);
        assert!(outcome.messages.is_empty());
        assert!(!cursor.is_set());
        assert!(orch.session().backend().recorded().is_empty());
    }

    #[tokio::test]
    async fn test_requests_are_chained_in_order() {
        let orch = orchestrator(MockBackend::replies(&["ok", "r1", "r2", "r3"]));

        let (outcome, cursor) = orch
            .process_unit(&prompts(&["u1", "u2", "u3"]), ConversationCursor::fresh(), None)
            .await
            .unwrap();

        assert_eq!(outcome.messages, vec!["r1", "r2", "r3"]);
        let sent = orch.session().backend().recorded();
        let texts: Vec<&str> = sent.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["TASK", "u1", "u2", "u3"]);
        assert_eq!(sent[0].parent, None);
        assert_eq!(sent[1].parent, parent("m1"));
        assert_eq!(sent[2].parent, parent("m2"));
        assert_eq!(sent[3].parent, parent("m3"));
        assert_eq!(cursor.last().unwrap().id, "m4");
    }

    #[tokio::test]
    async fn test_task_reply_is_not_part_of_outcome() {
        let orch = orchestrator(MockBackend::replies(&["ready", "looks fine"]));
        let (outcome, _) = orch
            .process_unit(&prompts(&["fn a() {}"]), ConversationCursor::fresh(), None)
            .await
            .unwrap();
        assert_eq!(outcome.messages, vec!["looks fine"]);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_continued_and_merged() {
        let orch = orchestrator(MockBackend::replies(&[
            "ok",
            "```rust\nfn a() {",
            "\n}\n```",
            "next",
        ]));

        let (outcome, _) = orch
            .process_unit(&prompts(&["u1", "u2"]), ConversationCursor::fresh(), None)
            .await
            .unwrap();

        assert_eq!(outcome.messages, vec!["```rust\nfn a() {\n}\n```", "next"]);
        let sent = orch.session().backend().recorded();
        assert_eq!(sent[2].text, CONTINUE_PROMPT);
        assert_eq!(sent[2].parent, parent("m2"));
        // the next unit chains onto the continuation reply
        assert_eq!(sent[3].parent, parent("m3"));
    }

    #[tokio::test]
    async fn test_continuation_happens_only_once() {
        let orch = orchestrator(MockBackend::replies(&["ok", "A ```", "B ```x```"]));

        let (outcome, cursor) = orch
            .process_unit(&prompts(&["u1"]), ConversationCursor::fresh(), None)
            .await
            .unwrap();

        assert_eq!(outcome.messages, vec!["A ```B ```x```"]);
        assert_eq!(orch.session().backend().recorded().len(), 3);
        assert_eq!(cursor.last().unwrap().id, "m3");
    }

    #[tokio::test]
    async fn test_existing_cursor_skips_task_prompt() {
        let orch = orchestrator(MockBackend::replies(&["r1"]));
        let cursor = ConversationCursor::fresh().advance(ChatMessage {
            text: "earlier".into(),
            id: "prev".into(),
            conversation_id: "conv-1".into(),
        });

        let (outcome, _) = orch
            .process_unit(&prompts(&["u1"]), cursor, None)
            .await
            .unwrap();

        assert_eq!(outcome.messages, vec!["r1"]);
        let sent = orch.session().backend().recorded();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "u1");
        assert_eq!(sent[0].parent, parent("prev"));
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_prompts() {
        let orch = orchestrator(MockBackend::new(vec![
            Scripted::Reply("ok"),
            Scripted::Reply("r1"),
            Scripted::Fail,
            Scripted::Reply("r3"),
        ]));

        let err = orch
            .process_unit(&prompts(&["u1", "u2", "u3"]), ConversationCursor::fresh(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, RevhookError::Remote(_)));
        assert_eq!(orch.session().backend().recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_bootstrap_sends_without_progress() {
        let orch = orchestrator(MockBackend::replies(&["ok", "r1"]));
        let sink = RecordingSink::default();

        orch.process_unit(&prompts(&["u1"]), ConversationCursor::fresh(), Some(&sink))
            .await
            .unwrap();

        let sent = orch.session().backend().recorded();
        assert!(!sent[0].had_progress);
        assert!(sent[1].had_progress);
        assert_eq!(*sink.0.lock().unwrap(), vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_unit() {
        let cancel = CancellationToken::new();
        let orch = Orchestrator::with_cancellation(
            client(MockBackend::new(vec![Scripted::Hang])),
            cancel.clone(),
        );
        cancel.cancel();

        let err = orch
            .process_unit(&prompts(&["u1"]), ConversationCursor::fresh(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RevhookError::Cancelled));
    }
}
