//! Chat session client.
//!
//! [`SessionClient`] is the single entry point the orchestrator talks to. It
//! owns one [`ChatBackend`], chosen once from configuration:
//!
//! | Backend            | Auth                  | Conversation state                 |
//! |--------------------|-----------------------|------------------------------------|
//! | `Backend::Official`| API key               | kept locally, replayed per request |
//! | `Backend::Proxy`   | session access token  | kept remotely, linked by ids       |
//!
//! Every request goes through the same pipeline: redaction, dispatch with the
//! configured upper bound, and an optional cancellation token.

pub mod official;
pub mod proxy;
pub mod redact;
pub mod sse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::errors::{Result, RevhookError};

pub use official::OfficialClient;
pub use proxy::ProxyClient;
pub use redact::{REDACTED_PLACEHOLDER, Redactor};

/// A reply from the remote side plus its correlation ids.
///
/// `id` and `conversation_id` are opaque; they are only ever echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub id: String,
    pub conversation_id: String,
}

impl ChatMessage {
    /// Parent context for a request that should follow this message.
    pub fn parent_context(&self) -> ParentContext {
        ParentContext {
            conversation_id: self.conversation_id.clone(),
            parent_message_id: self.id.clone(),
        }
    }
}

/// Conversation linkage for a follow-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentContext {
    pub conversation_id: String,
    pub parent_message_id: String,
}

/// Receives the partial reply text while a response streams in.
///
/// `partial` is always the full text received so far.
pub trait ProgressSink: Send + Sync {
    fn on_partial(&self, partial: &str);
}

/// Fixed completion parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub max_model_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Vec<String>,
}

impl CompletionParams {
    pub const TEMPERATURE: f32 = 0.0;
    pub const TOP_P: f32 = 0.4;
    pub const STOP: &'static str = "###";

    pub fn new(model: impl Into<String>, max_tokens: u32, max_model_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            max_model_tokens,
            temperature: Self::TEMPERATURE,
            top_p: Self::TOP_P,
            stop: vec![Self::STOP.to_string()],
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.model, config.max_tokens, config.max_model_tokens)
    }
}

/// One outbound request as seen by a backend. `text` is already redacted.
pub struct ChatRequest<'a> {
    pub text: &'a str,
    pub parent: Option<&'a ParentContext>,
    pub progress: Option<&'a dyn ProgressSink>,
}

/// A wire implementation of the chat endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatMessage>;
}

/// Per-request options supplied by the caller.
#[derive(Clone, Default)]
pub struct SendOptions<'a> {
    /// Streaming updates; `None` sends the request without surfacing progress
    pub progress: Option<&'a dyn ProgressSink>,
    /// Cancels this request only
    pub cancel: CancellationToken,
}

/// What the orchestrator needs from a chat session.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn send(
        &self,
        text: &str,
        parent: Option<&ParentContext>,
        options: SendOptions<'_>,
    ) -> Result<ChatMessage>;
}

/// The two wire variants, selected once at startup.
pub enum Backend {
    Official(OfficialClient),
    Proxy(ProxyClient),
}

impl Backend {
    /// Pick the backend named by `send_by_proxy`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let params = CompletionParams::from_config(config);
        if config.send_by_proxy {
            let token = config.access_token.clone().ok_or_else(|| {
                RevhookError::config("Proxy backend selected without an access token")
            })?;
            Ok(Backend::Proxy(ProxyClient::new(
                config.proxy_url.clone(),
                token,
                params,
            )?))
        } else {
            let key = config
                .api_key
                .clone()
                .ok_or_else(|| RevhookError::config("Official backend selected without an API key"))?;
            Ok(Backend::Official(OfficialClient::new(
                config.api_base_url.clone(),
                key,
                params,
            )?))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Official(_) => "official",
            Backend::Proxy(_) => "proxy",
        }
    }
}

#[async_trait]
impl ChatBackend for Backend {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatMessage> {
        match self {
            Backend::Official(client) => client.complete(request).await,
            Backend::Proxy(client) => client.complete(request).await,
        }
    }
}

/// Redacting, time-bounded, cancellable wrapper around a backend.
pub struct SessionClient<B = Backend> {
    backend: B,
    redactor: Redactor,
    timeout: Duration,
}

impl SessionClient<Backend> {
    /// Build the client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = Backend::from_config(config)?;
        tracing::debug!(backend = backend.name(), model = %config.model, "chat backend selected");
        Ok(Self::new(
            backend,
            Redactor::new(config.security_regex.clone()),
            config.timeout,
        ))
    }
}

impl<B: ChatBackend> SessionClient<B> {
    pub fn new(backend: B, redactor: Redactor, timeout: Duration) -> Self {
        Self {
            backend,
            redactor,
            timeout,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: ChatBackend> ChatSession for SessionClient<B> {
    async fn send(
        &self,
        text: &str,
        parent: Option<&ParentContext>,
        options: SendOptions<'_>,
    ) -> Result<ChatMessage> {
        let text: Cow<'_, str> = self.redactor.redact(text);
        if let Cow::Owned(_) = text {
            tracing::debug!("outgoing message redacted");
        }

        let request = ChatRequest {
            text: text.as_ref(),
            parent,
            progress: options.progress,
        };

        tokio::select! {
            biased;
            _ = options.cancel.cancelled() => Err(RevhookError::Cancelled),
            reply = tokio::time::timeout(self.timeout, self.backend.complete(request)) => {
                match reply {
                    Ok(reply) => reply,
                    Err(_) => Err(RevhookError::Timeout(self.timeout)),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend that records every request it receives.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub text: String,
        pub parent: Option<ParentContext>,
        pub had_progress: bool,
    }

    /// Scripted reply: text, or an error produced on demand.
    pub enum Scripted {
        Reply(&'static str),
        Fail,
        Hang,
    }

    #[derive(Default)]
    pub struct MockBackend {
        script: Mutex<VecDeque<Scripted>>,
        pub requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockBackend {
        pub fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn replies(texts: &[&'static str]) -> Self {
            Self::new(texts.iter().map(|t| Scripted::Reply(*t)).collect())
        }

        pub fn recorded(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatBackend for MockBackend {
        async fn complete(&self, request: ChatRequest<'_>) -> Result<ChatMessage> {
            let n = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(RecordedRequest {
                    text: request.text.to_string(),
                    parent: request.parent.cloned(),
                    had_progress: request.progress.is_some(),
                });
                requests.len()
            };
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Reply(text)) => {
                    if let Some(progress) = request.progress {
                        progress.on_partial(text);
                    }
                    Ok(ChatMessage {
                        text: text.to_string(),
                        id: format!("m{}", n),
                        conversation_id: request
                            .parent
                            .map(|p| p.conversation_id.clone())
                            .unwrap_or_else(|| "conv-1".to_string()),
                    })
                }
                Some(Scripted::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Some(Scripted::Fail) | None => Err(crate::errors::RemoteError::Api {
                    status: 500,
                    message: "boom".into(),
                }
                .into()),
            }
        }
    }

    /// Test client with no redaction and a generous timeout.
    pub fn client(backend: MockBackend) -> SessionClient<MockBackend> {
        SessionClient::new(backend, Redactor::disabled(), Duration::from_secs(5))
    }

    /// Collects every partial text a backend streams.
    #[derive(Default)]
    pub struct PartialLog(Mutex<Vec<String>>);

    impl PartialLog {
        pub fn partials(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ProgressSink for PartialLog {
        fn on_partial(&self, partial: &str) {
            self.0.lock().unwrap().push(partial.to_string());
        }
    }

    /// HTTP client that ignores proxy settings from the environment.
    pub fn direct_http() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// SSE body with one `data:` line per event, terminated by `[DONE]`.
    pub fn sse_body(events: &[&str]) -> String {
        let mut body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
        body.push_str("data: [DONE]\n\n");
        body
    }

    /// A request as received by [`serve`].
    #[derive(Debug)]
    pub struct CapturedRequest {
        /// Request line and headers, lowercased
        pub head: String,
        pub body: serde_json::Value,
    }

    pub struct TestServer {
        pub url: String,
        handle: tokio::task::JoinHandle<Vec<CapturedRequest>>,
    }

    impl TestServer {
        /// Every request received, once all canned responses are served.
        pub async fn requests(self) -> Vec<CapturedRequest> {
            self.handle.await.unwrap()
        }
    }

    /// Answer one connection per `(status, body)` pair, in order.
    pub async fn serve(responses: Vec<(u16, String)>) -> TestServer {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            requests
        });
        TestServer { url, handle }
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let start = end + 4;
                if buf.len() >= start + len {
                    let body = serde_json::from_slice(&buf[start..start + len])
                        .unwrap_or(serde_json::Value::Null);
                    return CapturedRequest { head, body };
                }
            }
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed mid-request");
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}
