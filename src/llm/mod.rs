//! Reqwest-based LLM client implementing OpenAI-compatible Chat Completions streaming.

use std::{pin::Pin, time::Duration};

use anyhow::{Context, Result};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
}

#[derive(Debug)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let timeout = cfg
            .get("REQUEST_TIMEOUT")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        let api_base_url = cfg.get("API_BASE_URL").unwrap_or_else(|| "default".into());
        let mut base_url = if api_base_url == "default" {
            "https://api.openai.com/v1".to_string()
        } else {
            api_base_url
        };
        let trimmed = base_url.trim_end_matches('/');
        if !trimmed.ends_with("/v1") && !trimmed.contains("/v1/") {
            base_url = format!("{}/v1", trimmed);
        } else {
            base_url = trimmed.to_string();
        }
        let api_key = cfg.get("OPENAI_API_KEY");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self { http, base_url, api_key })
    }

    pub fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        opts: ChatOptions,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let api_key = self.api_key.clone();

        Box::pin(try_stream! {
            let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("text/event-stream"));
            if let Some(key) = api_key.clone() {
                let hv = HeaderValue::from_str(&format!("Bearer {}", key))?;
                headers.insert(AUTHORIZATION, hv);
            }

            debug!(model = %opts.model, messages = messages.len(), "sending chat request");
            let mut body = serde_json::json!({
                "model": opts.model,
                "temperature": opts.temperature,
                "top_p": opts.top_p,
                "messages": messages,
                "stream": true,
            });
            if let Some(max_tokens) = opts.max_tokens {
                body["max_tokens"] = serde_json::json!(max_tokens);
            }

            let resp = http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .context("failed to send chat request")?;

            if !resp.status().is_success() {
                let status = resp.status();
                Err(anyhow::anyhow!("LLM error: {}", status))?;
            }

            let mut buf: Vec<u8> = Vec::new();
            let mut stream = resp.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let bytes = chunk.context("stream error")?;
                buf.extend_from_slice(&bytes);
                for line in take_lines(&mut buf) {
                    if line.is_empty() || line.starts_with(':') { continue; }
                    if let Some(payload) = line.strip_prefix("data:") {
                        let payload = payload.trim();
                        if payload == "[DONE]" { yield StreamEvent::Done; return; }
                        // malformed lines are skipped
                        if let Ok(chunk) = serde_json::from_str::<Chunk>(payload) {
                            for choice in chunk.choices {
                                if let Some(content) = choice.delta.and_then(|d| d.content) {
                                    if !content.is_empty() {
                                        yield StreamEvent::Content(content);
                                    }
                                }
                            }
                        }
                    }
                }
            }
            yield StreamEvent::Done;
        })
    }

    /// Streams a completion and returns the concatenated content.
    pub async fn complete(&self, messages: Vec<ChatMessage>, opts: ChatOptions) -> Result<String> {
        let mut stream = self.chat_stream(messages, opts);
        let mut out = String::new();
        while let Some(ev) = stream.next().await {
            match ev? {
                StreamEvent::Content(t) => out.push_str(&t),
                StreamEvent::Done => break,
            }
        }
        Ok(out)
    }
}

/// Drains every complete line from `buf`. Decoding happens per line, so a
/// multi-byte character split across network chunks stays intact.
fn take_lines(buf: &mut Vec<u8>) -> Vec<String> {
    let Some(end) = buf.iter().rposition(|b| *b == b'\n') else {
        return Vec::new();
    };
    let complete: Vec<u8> = buf.drain(..=end).collect();
    complete[..end]
        .split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Content(String),
    Done,
}

// Minimal chunk structures for OpenAI-like streaming
#[derive(Debug, Deserialize)]
struct Chunk {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_version_suffix() {
        let mut cfg = Config::from_path(std::path::Path::new("/nonexistent/.mathpadrc"));
        cfg.set("API_BASE_URL", "http://localhost:8080/");
        let client = LlmClient::from_config(&cfg).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn lines_survive_split_multibyte_characters() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"π\"}}]}\n".as_bytes();
        let cut = event.iter().position(|b| *b == 0xCF).unwrap() + 1;

        let mut buf = Vec::new();
        buf.extend_from_slice(&event[..cut]);
        assert!(take_lines(&mut buf).is_empty());
        buf.extend_from_slice(&event[cut..]);
        let lines = take_lines(&mut buf);

        assert!(buf.is_empty());
        assert_eq!(lines[0], "data: {\"choices\":[{\"delta\":{\"content\":\"π\"}}]}");
        assert!(!lines[0].contains('\u{FFFD}'));
    }

    #[test]
    fn partial_lines_stay_buffered() {
        let mut buf = b"data: one\r\ndata: tw".to_vec();
        assert_eq!(take_lines(&mut buf), vec!["data: one"]);
        assert_eq!(buf, b"data: tw");
    }

    #[test]
    fn chunks_tolerate_missing_fields() {
        let chunk: Chunk =
            serde_json::from_str(r#"{"id":"x","choices":[{"delta":{"content":"hi"}}]}"#).unwrap();
        assert_eq!(chunk.choices[0].delta.as_ref().unwrap().content.as_deref(), Some("hi"));
    }
}
