//! Generative collaborator: the chat interface and its OpenAI-compatible
//! HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{LlmConfig, Provider};
use crate::error::{ProviderError, SynthError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of the conversation sent to the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Turns a conversation into candidate program text.
///
/// Implementations are treated as unreliable: any error costs the caller
/// one attempt and nothing else.
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, ProviderError>;
}

/// Chat-completions client for OpenAI, OpenRouter and compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    provider: Provider,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig) -> Result<Self, SynthError> {
        let endpoint = format!("{}/chat/completions", config.base_url()?);
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SynthError::Client)?;
        Ok(OpenAiCompatibleClient {
            http,
            endpoint,
            provider: config.provider,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Collaborator for OpenAiCompatibleClient {
    async fn complete(&self, conversation: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": conversation,
        });

        let mut req = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        if self.provider == Provider::OpenRouter {
            req = req
                .header("HTTP-Referer", "https://localhost")
                .header("X-Title", "abracadabra");
        }

        let response = req.send().await?;
        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        parse_completion(&body_text)
    }
}

/// Pulls the first choice's trimmed text out of a chat-completions body.
fn parse_completion(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ProviderError::EmptyContent)
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Reduces a reply to program text.
///
/// If the reply contains a fenced block, the body of the first one is used
/// (an unterminated fence runs to the end); a language tag on the opening
/// fence line is dropped. Otherwise the reply is used as is.
pub fn extract_code(reply: &str) -> String {
    let Some(start) = reply.find("```") else {
        return reply.to_string();
    };
    let after = &reply[start + 3..];
    let body = match after.find("```") {
        Some(end) => &after[..end],
        None => after,
    };
    let body = match body.split_once('\n') {
        Some((tag, rest)) if is_language_tag(tag) => rest,
        _ => body,
    };
    body.to_string()
}

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    line.is_empty()
        || line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_reply() {
        let reply = "a = g.node('X')\nresult['outputs'] = [a.out(0)]";
        assert_eq!(extract_code(reply), reply);
    }

    #[test]
    fn test_extract_first_fenced_block() {
        let reply = "Here you go:\n```python\na = g.node('X')\n```\nand also\n```\nb = 1\n```";
        assert_eq!(extract_code(reply), "a = g.node('X')\n");
    }

    #[test]
    fn test_extract_untagged_and_unterminated() {
        assert_eq!(extract_code("```\nx = 1\n```"), "x = 1\n");
        assert_eq!(extract_code("```py\nx = 1\n"), "x = 1\n");
    }

    #[test]
    fn test_extract_keeps_code_on_fence_line() {
        assert_eq!(extract_code("```x = g.node('A')```"), "x = g.node('A')");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  x = 1 \n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "x = 1");

        let empty = r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#;
        assert!(matches!(
            parse_completion(empty),
            Err(ProviderError::EmptyContent)
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(ProviderError::EmptyContent)
        ));
        assert!(matches!(
            parse_completion("not json"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_messages_serialize_in_chat_shape() {
        let value = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(value, json!({ "role": "assistant", "content": "hi" }));
    }

    #[test]
    fn test_client_endpoint() {
        let config = LlmConfig {
            provider: Provider::OpenRouter,
            ..LlmConfig::default()
        };
        let client = OpenAiCompatibleClient::new(&config).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }
}
