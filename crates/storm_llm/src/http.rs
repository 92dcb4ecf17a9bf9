//! HTTP adapter for hosted model APIs.
//!
//! Supports OpenAI, Anthropic and Gemini. Keys come from the environment;
//! `STORM_LLM_MODEL` overrides the model name.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::generator::{FallbackGenerator, GenerationRequest, LlmProvider, TextGenerator};

const MAX_TOKENS: u32 = 4096;

/// Calls one provider over HTTPS.
pub struct HttpGenerator {
    provider: LlmProvider,
    api_key: String,
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(provider: LlmProvider, api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            max_retries: 3,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Build a generator for `provider` from its environment key.
    pub fn from_env(provider: LlmProvider) -> LlmResult<Self> {
        let key = std::env::var(provider.api_key_var()).map_err(|_| LlmError::NotConfigured)?;
        if key.is_empty() {
            return Err(LlmError::NotConfigured);
        }
        let model = std::env::var("STORM_LLM_MODEL").ok().filter(|m| !m.is_empty());
        Ok(Self::new(provider, key, model))
    }

    /// Every configured provider, `preferred` first, chained for fallback.
    pub fn chain_from_env(preferred: LlmProvider) -> LlmResult<FallbackGenerator> {
        let mut order = vec![preferred];
        order.extend(LlmProvider::ALL.iter().copied().filter(|p| *p != preferred));

        let generators: Vec<std::sync::Arc<dyn TextGenerator>> = order
            .into_iter()
            .filter_map(|provider| Self::from_env(provider).ok())
            .map(|g| std::sync::Arc::new(g) as std::sync::Arc<dyn TextGenerator>)
            .collect();

        if generators.is_empty() {
            return Err(LlmError::NotConfigured);
        }
        Ok(FallbackGenerator::new(generators))
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &GenerationRequest) -> reqwest::RequestBuilder {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        match self.provider {
            LlmProvider::OpenAI => {
                let mut messages = Vec::new();
                if let Some(system) = &request.system_prompt {
                    messages.push(ChatMessage::new("system", system));
                }
                messages.push(ChatMessage::new("user", &request.prompt));
                let mut body = json!({
                    "model": model,
                    "messages": messages,
                    "temperature": request.temperature,
                    "max_tokens": MAX_TOKENS,
                });
                if request.json_mode {
                    body["response_format"] = json!({ "type": "json_object" });
                }
                self.client
                    .post("https://api.openai.com/v1/chat/completions")
                    .bearer_auth(&self.api_key)
                    .json(&body)
            }
            LlmProvider::Anthropic => {
                let body = json!({
                    "model": model,
                    "max_tokens": MAX_TOKENS,
                    "temperature": request.temperature,
                    "system": request.system_prompt,
                    "messages": [ChatMessage::new("user", &request.prompt)],
                });
                self.client
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body)
            }
            LlmProvider::Gemini => {
                let mut body = json!({
                    "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
                    "generationConfig": { "temperature": request.temperature },
                });
                if let Some(system) = &request.system_prompt {
                    body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
                }
                if request.json_mode {
                    body["generationConfig"]["responseMimeType"] = json!("application/json");
                }
                let url = format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                    model
                );
                self.client
                    .post(url)
                    .query(&[("key", self.api_key.as_str())])
                    .json(&body)
            }
        }
    }

    async fn call_once(&self, request: &GenerationRequest) -> LlmResult<String> {
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        extract_text(self.provider, &body)
    }
}

/// Pull the generated text out of a provider response body.
pub fn extract_text(provider: LlmProvider, body: &str) -> LlmResult<String> {
    let parse_err = |e: serde_json::Error| LlmError::Api {
        status: 200,
        message: format!("Unexpected response shape: {}", e),
    };
    let empty = || LlmError::Api {
        status: 200,
        message: format!("No content in {} response", provider),
    };

    match provider {
        LlmProvider::OpenAI => {
            let parsed: OpenAiResponse = serde_json::from_str(body).map_err(parse_err)?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(empty)
        }
        LlmProvider::Anthropic => {
            let parsed: AnthropicResponse = serde_json::from_str(body).map_err(parse_err)?;
            parsed
                .content
                .into_iter()
                .find_map(|c| c.text)
                .ok_or_else(empty)
        }
        LlmProvider::Gemini => {
            let parsed: GeminiResponse = serde_json::from_str(body).map_err(parse_err)?;
            parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
                .ok_or_else(empty)
        }
    }
}

/// Check JSON-mode output. Models sometimes wrap JSON in a markdown fence.
pub fn validate_json(text: &str) -> LlmResult<String> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    serde_json::from_str::<serde_json::Value>(unfenced)
        .map(|_| unfenced.to_string())
        .map_err(|e| LlmError::InvalidJson(e.to_string()))
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String> {
        let mut last_error = LlmError::NotConfigured;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // 2s, 4s
                tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
            }
            debug!(provider = %self.provider, model = %self.model, attempt = attempt + 1, "Calling model");

            match self.call_once(request).await {
                Ok(text) if request.json_mode => return validate_json(&text),
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    warn!(provider = %self.provider, attempt = attempt + 1, error = %e, "Transient model error");
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    fn name(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn new(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_custom_models() {
        let generator = HttpGenerator::new(LlmProvider::Anthropic, "key", None);
        assert_eq!(generator.model(), "claude-3-5-sonnet-20241022");

        let generator = HttpGenerator::new(LlmProvider::OpenAI, "key", Some("gpt-4o-mini".into()));
        assert_eq!(generator.model(), "gpt-4o-mini");
        assert_eq!(generator.name(), "openai:gpt-4o-mini");
    }

    #[test]
    fn test_extract_openai() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#;
        assert_eq!(extract_text(LlmProvider::OpenAI, body).unwrap(), "hi there");
    }

    #[test]
    fn test_extract_anthropic() {
        let body = r#"{"content":[{"type":"text","text":"hello"}],"usage":{"input_tokens":1}}"#;
        assert_eq!(extract_text(LlmProvider::Anthropic, body).unwrap(), "hello");
    }

    #[test]
    fn test_extract_gemini() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"hola"}]}}]}"#;
        assert_eq!(extract_text(LlmProvider::Gemini, body).unwrap(), "hola");

        let err = extract_text(LlmProvider::Gemini, r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 200, .. }));
    }

    #[test]
    fn test_validate_json() {
        assert_eq!(validate_json("{\"a\":1}").unwrap(), "{\"a\":1}");
        assert_eq!(validate_json("```json\n{\"a\":1}\n```").unwrap(), "{\"a\":1}");
        assert!(matches!(validate_json("not json"), Err(LlmError::InvalidJson(_))));
    }
}
