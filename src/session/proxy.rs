//! Reverse-proxy backend for the web chat conversation endpoint.
//!
//! Authenticated with a session access token instead of an API key. The remote
//! side keeps the conversation; requests link to it with `conversation_id` and
//! `parent_message_id`. Each streamed event carries the cumulative reply text.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sse::{check_status, for_each_data};
use super::{ChatBackend, ChatMessage, ChatRequest, CompletionParams};
use crate::errors::{RemoteError, Result};

#[derive(Debug, Serialize)]
struct ConversationRequest<'a> {
    action: &'static str,
    messages: Vec<OutgoingMessage<'a>>,
    model: &'a str,
    parent_message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    id: String,
    role: &'static str,
    content: OutgoingContent<'a>,
}

#[derive(Debug, Serialize)]
struct OutgoingContent<'a> {
    content_type: &'static str,
    parts: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct ConversationEvent {
    #[serde(default)]
    message: Option<EventMessage>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EventMessage {
    id: String,
    #[serde(default)]
    author: Option<Author>,
    #[serde(default)]
    content: Option<EventContent>,
}

#[derive(Debug, Deserialize)]
struct Author {
    role: String,
}

#[derive(Debug, Deserialize)]
struct EventContent {
    #[serde(default)]
    parts: Vec<serde_json::Value>,
}

/// Latest state of a streamed reply. Events replace rather than append.
#[derive(Debug, Default)]
struct ReplyState {
    text: String,
    reply_id: Option<String>,
    conversation_id: Option<String>,
}

impl ReplyState {
    /// Apply one event; returns true when the visible text changed.
    fn apply(&mut self, data: &str) -> Result<bool> {
        let event: ConversationEvent = serde_json::from_str(data).map_err(|e| {
            RemoteError::InvalidResponse(format!("failed to parse conversation event: {e}"))
        })?;

        if let Some(error) = event.error.filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(RemoteError::InvalidResponse(message).into());
        }

        if let Some(conversation_id) = event.conversation_id {
            self.conversation_id = Some(conversation_id);
        }

        let Some(message) = event.message else {
            return Ok(false);
        };
        let is_assistant = message
            .author
            .as_ref()
            .is_none_or(|a| a.role == "assistant");
        if !is_assistant {
            return Ok(false);
        }

        self.reply_id = Some(message.id);
        let text = message
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.as_str().map(str::to_string));
        match text {
            Some(text) if text != self.text => {
                self.text = text;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct ProxyClient {
    http: Client,
    url: String,
    access_token: String,
    params: CompletionParams,
}

impl ProxyClient {
    pub fn new(url: String, access_token: String, params: CompletionParams) -> Result<Self> {
        let http = Client::builder().build().map_err(RemoteError::from)?;
        Ok(Self::with_http(http, url, access_token, params))
    }

    fn with_http(
        http: Client,
        url: String,
        access_token: String,
        params: CompletionParams,
    ) -> Self {
        Self {
            http,
            url,
            access_token,
            params,
        }
    }

    fn request_body<'a>(
        &'a self,
        text: &'a str,
        parent: Option<&'a super::ParentContext>,
    ) -> ConversationRequest<'a> {
        ConversationRequest {
            action: "next",
            messages: vec![OutgoingMessage {
                id: Uuid::new_v4().to_string(),
                role: "user",
                content: OutgoingContent {
                    content_type: "text",
                    parts: [text],
                },
            }],
            model: &self.params.model,
            parent_message_id: parent
                .map(|p| p.parent_message_id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            conversation_id: parent.map(|p| p.conversation_id.as_str()),
        }
    }
}

#[async_trait]
impl ChatBackend for ProxyClient {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatMessage> {
        let body = self.request_body(request.text, request.parent);
        tracing::debug!(
            conversation = body.conversation_id.unwrap_or("(new)"),
            "sending conversation message via proxy"
        );

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(RemoteError::from)?;
        let response = check_status(response).await?;

        let progress = request.progress;
        let mut state = ReplyState::default();
        for_each_data(response, |data| {
            if state.apply(data)?
                && let Some(sink) = progress
            {
                sink.on_partial(&state.text);
            }
            Ok(())
        })
        .await?;

        let Some(id) = state.reply_id else {
            return Err(RemoteError::EmptyReply.into());
        };
        let conversation_id = state
            .conversation_id
            .or_else(|| request.parent.map(|p| p.conversation_id.clone()))
            .ok_or_else(|| {
                RemoteError::InvalidResponse("reply carried no conversation_id".into())
            })?;

        Ok(ChatMessage {
            text: state.text,
            id,
            conversation_id,
        })
    }
}
