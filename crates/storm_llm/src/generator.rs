//! The text-generation seam.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LlmError, LlmResult};

/// Model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    Gemini,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 3] = [Self::OpenAI, Self::Anthropic, Self::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::Gemini => "gemini-1.5-pro",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// Overrides the generator's configured model
    pub model: Option<String>,
    pub temperature: f32,
    /// Ask for a JSON object and reject anything else
    pub json_mode: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            model: None,
            temperature: 0.7,
            json_mode: false,
        }
    }

    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Produces text for a prompt.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String>;

    /// Short label for logs.
    fn name(&self) -> String;
}

/// Tries each generator in order until one succeeds.
pub struct FallbackGenerator {
    generators: Vec<Arc<dyn TextGenerator>>,
}

impl FallbackGenerator {
    pub fn new(generators: Vec<Arc<dyn TextGenerator>>) -> Self {
        Self { generators }
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

#[async_trait]
impl TextGenerator for FallbackGenerator {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String> {
        let mut last_error = LlmError::NotConfigured;
        for (i, generator) in self.generators.iter().enumerate() {
            if i > 0 {
                info!(generator = %generator.name(), "Trying fallback generator");
            }
            match generator.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(generator = %generator.name(), error = %e, "Generation failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn name(&self) -> String {
        let names: Vec<String> = self.generators.iter().map(|g| g.name()).collect();
        format!("fallback[{}]", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock(name: &'static str, result: LlmResult<String>) -> Arc<dyn TextGenerator> {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(move |_| result.clone());
        generator.expect_name().return_const(name.to_string());
        Arc::new(generator)
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("write a poem")
            .system("you are terse")
            .temperature(0.2)
            .json();
        assert_eq!(request.system_prompt.as_deref(), Some("you are terse"));
        assert!(request.json_mode);
        assert!(request.model.is_none());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(LlmProvider::Gemini.api_key_var(), "GEMINI_API_KEY");
        let parsed: LlmProvider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(parsed, LlmProvider::OpenAI);
    }

    #[tokio::test]
    async fn test_fallback_uses_next_generator() {
        let chain = FallbackGenerator::new(vec![
            mock("first", Err(LlmError::RateLimited("busy".into()))),
            mock("second", Ok("hello".into())),
        ]);
        let text = chain.generate(&GenerationRequest::new("hi")).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_fallback_returns_last_error() {
        let chain = FallbackGenerator::new(vec![
            mock("first", Err(LlmError::Auth("bad".into()))),
            mock("second", Err(LlmError::Connection("down".into()))),
        ]);
        let err = chain.generate(&GenerationRequest::new("hi")).await.unwrap_err();
        assert_eq!(err, LlmError::Connection("down".into()));
        assert_eq!(chain.name(), "fallback[first,second]");
    }

    #[tokio::test]
    async fn test_empty_chain_is_not_configured() {
        let chain = FallbackGenerator::new(Vec::new());
        assert!(chain.is_empty());
        let err = chain.generate(&GenerationRequest::new("hi")).await.unwrap_err();
        assert_eq!(err, LlmError::NotConfigured);
    }
}
