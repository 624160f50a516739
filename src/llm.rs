//! Chat-completion client for an OpenAI-compatible endpoint (Groq by default).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;

/// Reply returned by [`chat_reply`] when the completion call fails.
pub const CHAT_FAILURE_REPLY: &str = "Sorry, something went wrong.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Front-end model names and the API models they resolve to. The first
/// entry is the fallback for unknown names.
static MODEL_MAPPING: [(&str, &str); 3] = [
    ("LLaMA3", "llama3-70b-8192"),
    ("LLaMA3-versatile", "llama-3.3-70b-versatile"),
    ("LLaMA2", "llama2-70b-4096"),
];

static LANGUAGES: [(&str, &str); 12] = [
    ("en", "English"),
    ("hi", "Hindi"),
    ("kn", "Kannada"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("sa", "Sanskrit"),
    ("mr", "Marathi"),
    ("bn", "Bengali"),
    ("gu", "Gujarati"),
    ("pa", "Punjabi"),
    ("or", "Odia"),
    ("ml", "Malayalam"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete `messages` with the API model `model`, returning the reply text.
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// Resolve a front-end model name; unknown or missing names use `LLaMA3`.
pub fn resolve_model(name: Option<&str>) -> &'static str {
    let fallback = MODEL_MAPPING[0].1;
    name.and_then(|n| MODEL_MAPPING.iter().find(|(k, _)| *k == n))
        .map(|(_, v)| *v)
        .unwrap_or(fallback)
}

/// English name of a language code, e.g. `"kn"` → `"Kannada"`.
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// System prompt, asking for a reply in `language` when it is not English.
pub fn system_prompt(language: Option<&str>) -> String {
    match language.and_then(language_name) {
        Some(name) if name != "English" => format!(
            "{} Always reply in {}, using its native script.",
            SYSTEM_PROMPT, name
        ),
        _ => SYSTEM_PROMPT.to_string(),
    }
}

/// Groq's OpenAI-compatible `chat/completions` endpoint.
///
/// The key is read from `GROQ_API_KEY` at construction; a missing key only
/// fails when a completion is requested.
pub struct GroqClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl GroqClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()),
            temperature: config.temperature,
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GROQ_API_KEY environment variable not set"))?;

        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Chat request to {} failed", self.api_url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Chat API error {}: {}", status, text);
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("Invalid chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))
    }
}

/// Plain chat: one user message, answered under the language-aware system
/// prompt. Failures are logged and answered with [`CHAT_FAILURE_REPLY`].
pub async fn chat_reply(
    chat: &dyn ChatModel,
    model_name: Option<&str>,
    language: Option<&str>,
    message: &str,
) -> String {
    let model = resolve_model(model_name);
    let messages = [
        ChatMessage::system(system_prompt(language)),
        ChatMessage::user(message),
    ];
    match chat.complete(model, &messages).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(model, error = %e, "chat completion failed");
            CHAT_FAILURE_REPLY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for Recording {
        async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            if self.fail {
                bail!("upstream 500");
            }
            Ok("namaste".to_string())
        }
    }

    #[test]
    fn model_names_map_with_fallback() {
        assert_eq!(resolve_model(Some("LLaMA2")), "llama2-70b-4096");
        assert_eq!(resolve_model(Some("LLaMA3-versatile")), "llama-3.3-70b-versatile");
        assert_eq!(resolve_model(Some("gpt-9")), "llama3-70b-8192");
        assert_eq!(resolve_model(None), "llama3-70b-8192");
    }

    #[test]
    fn non_english_languages_change_the_prompt() {
        assert_eq!(system_prompt(Some("en")), SYSTEM_PROMPT);
        assert_eq!(system_prompt(Some("xx")), SYSTEM_PROMPT);
        assert!(system_prompt(Some("ta")).contains("Tamil"));
    }

    #[tokio::test]
    async fn chat_reply_sends_system_then_user() {
        let chat = Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        };
        let reply = chat_reply(&chat, Some("LLaMA2"), Some("hi"), "hello").await;
        assert_eq!(reply, "namaste");

        let seen = chat.seen.lock().unwrap();
        let (model, messages) = &seen[0];
        assert_eq!(model, "llama2-70b-4096");
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Hindi"));
        assert_eq!(messages[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn chat_reply_apologizes_on_failure() {
        let chat = Recording {
            seen: Mutex::new(Vec::new()),
            fail: true,
        };
        assert_eq!(chat_reply(&chat, None, None, "hi").await, CHAT_FAILURE_REPLY);
    }
}
