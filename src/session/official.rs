//! Official, API-key authenticated chat completions backend.
//!
//! The completions endpoint is stateless. To give the model conversational
//! context, every exchange is kept in an in-memory store for the lifetime of
//! the process and the parent chain is replayed as the `messages` array.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use super::sse::{check_status, for_each_data};
use super::{ChatBackend, ChatMessage, ChatRequest, CompletionParams};
use crate::errors::{RemoteError, Result};

/// Rough characters-per-token ratio used to budget replayed history.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    top_p: f32,
    stop: &'a [String],
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    role: Role,
    text: String,
    parent_id: Option<String>,
}

/// Accumulates a streamed reply.
#[derive(Debug, Default)]
struct ReplyState {
    text: String,
    received: bool,
}

impl ReplyState {
    fn apply(&mut self, data: &str) -> Result<()> {
        let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
            RemoteError::InvalidResponse(format!("failed to parse stream chunk: {e}"))
        })?;
        if let Some(err) = chunk.error {
            return Err(RemoteError::InvalidResponse(err.message).into());
        }

        self.received = true;
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                self.text.push_str(&content);
            }
        }
        Ok(())
    }
}

pub struct OfficialClient {
    http: Client,
    base_url: String,
    api_key: String,
    params: CompletionParams,
    store: Mutex<HashMap<String, StoredMessage>>,
}

impl OfficialClient {
    pub fn new(base_url: String, api_key: String, params: CompletionParams) -> Result<Self> {
        let http = Client::builder().build().map_err(RemoteError::from)?;
        Ok(Self::with_http(http, base_url, api_key, params))
    }

    fn with_http(
        http: Client,
        base_url: String,
        api_key: String,
        params: CompletionParams,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            params,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Character budget left for the prompt once the reply is reserved.
    fn history_budget(&self) -> usize {
        self.params
            .max_model_tokens
            .saturating_sub(self.params.max_tokens) as usize
            * CHARS_PER_TOKEN
    }

    /// Replay the chain ending at `parent_id`, newest last, followed by `text`.
    ///
    /// Older messages are dropped once the budget is exhausted. The new user
    /// message is always included.
    fn build_history(&self, text: &str, parent_id: Option<&str>) -> Vec<WireMessage> {
        let budget = self.history_budget();
        let mut used = text.len();
        let mut history = VecDeque::new();

        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = parent_id.map(str::to_string);
        while let Some(id) = next {
            let Some(stored) = store.get(&id) else {
                break;
            };
            if used + stored.text.len() > budget {
                break;
            }
            used += stored.text.len();
            history.push_front(WireMessage {
                role: stored.role,
                content: stored.text.clone(),
            });
            next = stored.parent_id.clone();
        }

        history.push_back(WireMessage {
            role: Role::User,
            content: text.to_string(),
        });
        history.into()
    }

    fn remember(&self, id: String, role: Role, text: String, parent_id: Option<String>) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.insert(
            id,
            StoredMessage {
                role,
                text,
                parent_id,
            },
        );
    }

    fn request_body(&self, messages: Vec<WireMessage>) -> CompletionRequest<'_> {
        CompletionRequest {
            model: &self.params.model,
            messages,
            temperature: self.params.temperature,
            top_p: self.params.top_p,
            stop: &self.params.stop,
            max_tokens: self.params.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl ChatBackend for OfficialClient {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatMessage> {
        let parent_id = request.parent.map(|p| p.parent_message_id.clone());
        let conversation_id = request
            .parent
            .map(|p| p.conversation_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let messages = self.build_history(request.text, parent_id.as_deref());
        tracing::debug!(
            history = messages.len(),
            conversation = %conversation_id,
            "sending chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(RemoteError::from)?;
        let response = check_status(response).await?;

        let progress = request.progress;
        let mut state = ReplyState::default();
        for_each_data(response, |data| {
            state.apply(data)?;
            if let Some(sink) = progress {
                sink.on_partial(&state.text);
            }
            Ok(())
        })
        .await?;

        if !state.received {
            return Err(RemoteError::EmptyReply.into());
        }

        // keys are minted locally; completion ids may repeat across replies
        let user_id = Uuid::new_v4().to_string();
        let reply_id = Uuid::new_v4().to_string();
        self.remember(
            user_id.clone(),
            Role::User,
            request.text.to_string(),
            parent_id,
        );
        self.remember(
            reply_id.clone(),
            Role::Assistant,
            state.text.clone(),
            Some(user_id),
        );

        Ok(ChatMessage {
            text: state.text,
            id: reply_id,
            conversation_id,
        })
    }
}
