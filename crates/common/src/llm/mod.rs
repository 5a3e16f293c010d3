//! Language-model gateway
//!
//! Provides a unified interface over hosted chat-completion providers:
//! - OpenAI-compatible chat completions
//! - A scripted mock for tests and offline runs
//!
//! and the best-effort gateway built on top of it: grounded answers and
//! question-to-query plans that degrade to fixed defaults instead of
//! failing.

mod gateway;
mod openai;

pub use gateway::{
    answer_prompt, plan_prompt, Answer, ChatMessage, Completion, LanguageGateway, QueryPlan,
    ANSWER_SOURCE, FALLBACK_ANSWER, REFUSAL_SENTENCE,
};
pub use openai::OpenAiChat;

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Trait for single-prompt text completion
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Complete a single user prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Scripted completion model for testing
///
/// Replies are served in order; once the script runs out the last entry
/// repeats. Every prompt is recorded.
pub struct MockCompletion {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    last: Mutex<std::result::Result<String, String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn script(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            last: Mutex::new(Err("no scripted reply".to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `text`
    pub fn replying(text: &str) -> Self {
        Self::script(vec![Ok(text.to_string())])
    }

    /// Always fail with `message`
    pub fn failing(message: &str) -> Self {
        Self::script(vec![Err(message.to_string())])
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionModel for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let poisoned = || AppError::Internal {
            message: "mock completion state poisoned".to_string(),
        };

        self.prompts.lock().map_err(|_| poisoned())?.push(prompt.to_string());

        let mut last = self.last.lock().map_err(|_| poisoned())?;
        if let Some(next) = self.script.lock().map_err(|_| poisoned())?.pop_front() {
            *last = next;
        }

        last.clone().map_err(|message| AppError::LanguageModel { message })
    }

    fn model_name(&self) -> &str {
        "mock-completion"
    }
}

/// Create a completion model based on configuration
pub fn create_completion_model(config: &LlmConfig) -> Result<Arc<dyn CompletionModel>> {
    match config.provider.as_str() {
        "openai" => {
            if config.api_key.is_none() {
                tracing::warn!("No API key configured, every answer will use the fallback");
            }
            Ok(Arc::new(OpenAiChat::new(config)?))
        }
        "mock" => Ok(Arc::new(MockCompletion::replying(REFUSAL_SENTENCE))),
        other => Err(AppError::Configuration {
            message: format!("Unknown completion provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_script_then_repeat() {
        let mock = MockCompletion::script(vec![Ok("one".into()), Err("down".into())]);
        assert_eq!(mock.complete("a").await.unwrap(), "one");
        assert!(mock.complete("b").await.is_err());
        assert!(mock.complete("c").await.is_err());
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_create_mock_provider() {
        let config = LlmConfig {
            provider: "mock".into(),
            ..LlmConfig::default()
        };
        let model = create_completion_model(&config).unwrap();
        assert_eq!(model.model_name(), "mock-completion");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let config = LlmConfig {
            provider: "anthropic-typo".into(),
            ..LlmConfig::default()
        };
        let err = create_completion_model(&config).err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert!(err.to_string().contains("anthropic-typo"));
    }
}
