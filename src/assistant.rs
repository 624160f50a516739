//! Document summaries and question answering over stored extracted text.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::llm::{resolve_model, ChatMessage, ChatModel};
use crate::store::Store;
use crate::upload::truncate_chars;

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that writes concise, accurate summaries of documents.";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("file content {0} not found")]
    NotFound(String),
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct Assistant {
    chat: Arc<dyn ChatModel>,
    model: &'static str,
    max_context_chars: usize,
}

impl Assistant {
    pub fn new(chat: Arc<dyn ChatModel>, config: &LlmConfig) -> Self {
        Self {
            chat,
            model: resolve_model(Some(&config.default_model)),
            max_context_chars: config.max_context_chars,
        }
    }

    fn context(&self, text: &str) -> String {
        let (text, truncated) = truncate_chars(text.to_string(), self.max_context_chars);
        if truncated {
            tracing::debug!(limit = self.max_context_chars, "document context truncated");
        }
        text
    }

    /// Summarize `text`, cut to the configured context size first.
    pub async fn summarize_document(&self, text: &str) -> Result<String, AssistantError> {
        if text.trim().is_empty() {
            return Err(AssistantError::EmptyInput("document text"));
        }
        let messages = [
            ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Summarize the following document in a few short paragraphs, \
                 highlighting its key points.\n\n{}",
                self.context(text)
            )),
        ];
        Ok(self.chat.complete(self.model, &messages).await?)
    }

    /// Answer `question` from the stored text of `content_id` only.
    pub async fn answer_question(
        &self,
        store: &dyn Store,
        content_id: &str,
        question: &str,
    ) -> Result<String, AssistantError> {
        if question.trim().is_empty() {
            return Err(AssistantError::EmptyInput("question"));
        }
        let content = store
            .get_file_content(content_id)
            .await?
            .ok_or_else(|| AssistantError::NotFound(content_id.to_string()))?;

        let messages = [
            ChatMessage::system(format!(
                "Answer questions using only the document below. If the answer is not \
                 in the document, say that it is not covered.\n\nDocument ({}):\n{}",
                content.filename,
                self.context(&content.text)
            )),
            ChatMessage::user(question),
        ];
        Ok(self.chat.complete(self.model, &messages).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FileKind;
    use crate::models::FileContent;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Echo {
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for Echo {
        async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok("ok".to_string())
        }
    }

    fn config(max_context_chars: usize) -> LlmConfig {
        LlmConfig {
            max_context_chars,
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn summary_context_is_truncated() {
        let echo = Arc::new(Echo::default());
        let assistant = Assistant::new(echo.clone(), &config(10));
        assistant
            .summarize_document("abcdefghijklmnopqrstuvwxyz")
            .await
            .unwrap();
        let prompts = echo.prompts.lock().unwrap();
        let user = &prompts[0][1].content;
        assert!(user.ends_with("abcdefghij"));
    }

    #[tokio::test]
    async fn missing_content_is_not_found() {
        let assistant = Assistant::new(Arc::new(Echo::default()), &config(100));
        let err = assistant
            .answer_question(&InMemoryStore::new(), "nope", "what?")
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn answers_from_stored_text() {
        let store = InMemoryStore::new();
        store
            .save_file_content(&FileContent {
                id: "c1".to_string(),
                filename: "notes.txt".to_string(),
                content_type: None,
                kind: FileKind::Text,
                extractor: "plain-text".to_string(),
                text: "The monsoon arrives in June.".to_string(),
                truncated: false,
                source_sha256: String::new(),
                created_at: 0,
            })
            .await
            .unwrap();

        let echo = Arc::new(Echo::default());
        let assistant = Assistant::new(echo.clone(), &config(1000));
        let answer = assistant
            .answer_question(&store, "c1", "When does the monsoon arrive?")
            .await
            .unwrap();
        assert_eq!(answer, "ok");

        let prompts = echo.prompts.lock().unwrap();
        assert!(prompts[0][0].content.contains("The monsoon arrives in June."));
        assert_eq!(prompts[0][1].content, "When does the monsoon arrive?");
    }
}
