//! Server-sent event plumbing shared by both backends.

use futures_util::StreamExt;
use reqwest::Response;

use crate::errors::{RemoteError, Result};

/// Terminal payload of a completion stream.
pub const DONE: &str = "[DONE]";

/// Incremental decoder that turns raw body chunks into `data:` payloads.
///
/// Chunks may end anywhere, including inside a UTF-8 sequence, so bytes are
/// buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = parse_line(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        None
    } else {
        Some(data.to_string())
    }
}

/// Turn a non-2xx response into [`RemoteError::Api`].
pub async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "(no body)".to_string());
    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Drive `on_data` with every payload until `[DONE]` or end of body.
pub async fn for_each_data<F>(response: Response, mut on_data: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()> + Send,
{
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RemoteError::from)?;
        for data in decoder.push(&chunk) {
            if data == DONE {
                return Ok(());
            }
            on_data(&data)?;
        }
    }

    if let Some(data) = decoder.finish()
        && data != DONE
    {
        on_data(&data)?;
    }
    Ok(())
}
