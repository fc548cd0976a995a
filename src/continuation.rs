//! Truncated-reply detection.
//!
//! A reply that stops in the middle of a fenced code block leaves an odd
//! number of fence markers behind. That is the only signal used: the length
//! limit of the completion cut it off, so one `continue` message is sent and
//! the two replies are glued together.

use crate::session::ChatMessage;

/// Markdown code-fence delimiter.
pub const FENCE_MARKER: &str = "```";

/// Literal text of the follow-up request.
pub const CONTINUE_PROMPT: &str = "continue";

/// Number of fence markers in `text`.
pub fn count_fences(text: &str) -> usize {
    text.matches(FENCE_MARKER).count()
}

/// True iff `text` contains an odd number of fence markers.
pub fn needs_continuation(text: &str) -> bool {
    count_fences(text) % 2 == 1
}

/// Append `continuation` to `previous`.
///
/// The continuation's identifiers replace the original ones so that the next
/// request chains onto the latest reply.
pub fn merge_continuation(previous: ChatMessage, continuation: ChatMessage) -> ChatMessage {
    let mut text = previous.text;
    text.push_str(&continuation.text);
    ChatMessage {
        text,
        id: continuation.id,
        conversation_id: continuation.conversation_id,
    }
}
