//! Code generation: turns a problem statement into script code for a mode.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::execution::Mode;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, Role};
use crate::role::mode_role_text;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("could not find code in the response")]
    NoCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub explanation: String,
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, problem: &str, mode: Mode) -> Result<GeneratedCode, GenerationError>;
}

/// Generator backed by an OpenAI-compatible chat model.
#[derive(Debug)]
pub struct LlmCodeGenerator {
    client: LlmClient,
    options: ChatOptions,
}

impl LlmCodeGenerator {
    pub fn new(client: LlmClient, options: ChatOptions) -> Self {
        Self { client, options }
    }

    pub fn from_config(cfg: &Config, options: ChatOptions) -> anyhow::Result<Self> {
        Ok(Self::new(LlmClient::from_config(cfg)?, options))
    }
}

#[async_trait]
impl CodeGenerator for LlmCodeGenerator {
    async fn generate(&self, problem: &str, mode: Mode) -> Result<GeneratedCode, GenerationError> {
        let messages = vec![
            ChatMessage::new(Role::System, mode_role_text(mode)),
            ChatMessage::new(Role::User, problem),
        ];
        let reply = self
            .client
            .complete(messages, self.options.clone())
            .await
            .map_err(|e| GenerationError::Network(format!("{:#}", e)))?;
        debug!(%mode, chars = reply.len(), "model replied");
        parse_response(&reply)
    }
}

#[derive(Deserialize)]
struct JsonReply {
    code: String,
    #[serde(default)]
    explanation: String,
}

const FENCE_LANGS: &[&str] = &["javascript", "js", "typescript", "ts", ""];

/// Extracts code and explanation from a model reply: either a JSON object
/// `{ code, explanation }` or prose with one fenced code block.
pub fn parse_response(reply: &str) -> Result<GeneratedCode, GenerationError> {
    let trimmed = reply.trim();
    if trimmed.starts_with('{') {
        if let Ok(json) = serde_json::from_str::<JsonReply>(trimmed) {
            if !json.code.trim().is_empty() {
                return Ok(GeneratedCode { code: json.code, explanation: json.explanation });
            }
        }
    }

    let mut search = 0;
    while let Some(rel) = trimmed[search..].find("```") {
        let open = search + rel;
        let after_ticks = open + 3;
        let line_end = trimmed[after_ticks..]
            .find('\n')
            .map(|i| after_ticks + i)
            .unwrap_or(trimmed.len());
        let lang = trimmed[after_ticks..line_end].trim().to_ascii_lowercase();
        let body_start = (line_end + 1).min(trimmed.len());
        let Some(close_rel) = trimmed[body_start..].find("```") else {
            break;
        };
        let close = body_start + close_rel;
        if FENCE_LANGS.contains(&lang.as_str()) {
            let code = trimmed[body_start..close].trim().to_string();
            let explanation = format!("{}\n\n{}", trimmed[..open].trim(), trimmed[close + 3..].trim())
                .trim()
                .to_string();
            if !code.is_empty() {
                return Ok(GeneratedCode { code, explanation });
            }
        }
        search = close + 3;
    }
    Err(GenerationError::NoCode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_with_explanation() {
        let reply = "Sum the numbers.\n```javascript\nreturn 1 + 2;\n```\nDone.";
        let generated = parse_response(reply).unwrap();
        assert_eq!(generated.code, "return 1 + 2;");
        assert_eq!(generated.explanation, "Sum the numbers.\n\nDone.");
    }

    #[test]
    fn skips_blocks_in_other_languages() {
        let reply = "```python\nprint(1)\n```\n```js\nreturn 1;\n```";
        assert_eq!(parse_response(reply).unwrap().code, "return 1;");
    }

    #[test]
    fn json_reply() {
        let reply = r#"{"code": "return 2;", "explanation": "two"}"#;
        let generated = parse_response(reply).unwrap();
        assert_eq!(generated.code, "return 2;");
        assert_eq!(generated.explanation, "two");
    }

    #[test]
    fn no_code() {
        assert!(matches!(parse_response("I cannot help."), Err(GenerationError::NoCode)));
        assert!(matches!(parse_response("```js\n```"), Err(GenerationError::NoCode)));
    }
}
