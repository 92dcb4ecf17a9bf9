//! Generator construction and trait-object use.

use std::sync::Arc;

use async_trait::async_trait;
use storm_llm::{
    FallbackGenerator, GenerationRequest, HttpGenerator, LlmError, LlmProvider, LlmResult,
    TextGenerator,
};

struct Canned(&'static str);

#[async_trait]
impl TextGenerator for Canned {
    async fn generate(&self, request: &GenerationRequest) -> LlmResult<String> {
        if request.json_mode {
            Ok(self.0.to_string())
        } else {
            Err(LlmError::InvalidJson("json only".into()))
        }
    }

    fn name(&self) -> String {
        "canned".to_string()
    }
}

#[test]
fn test_empty_key_is_not_configured() {
    std::env::set_var("GEMINI_API_KEY", "");
    let err = HttpGenerator::from_env(LlmProvider::Gemini).err();
    assert_eq!(err, Some(LlmError::NotConfigured));
}

#[test]
fn test_generator_behind_trait_object() {
    let generator: Arc<dyn TextGenerator> = Arc::new(Canned("{\"files\":[]}"));
    let chain = FallbackGenerator::new(vec![generator]);
    assert_eq!(chain.name(), "fallback[canned]");

    let request = GenerationRequest::new("list files").json();
    let text = tokio_test::block_on(chain.generate(&request)).unwrap();
    assert_eq!(text, "{\"files\":[]}");
}

#[test]
fn test_no_providers_configured() {
    for provider in LlmProvider::ALL {
        std::env::set_var(provider.api_key_var(), "");
    }
    let err = HttpGenerator::chain_from_env(LlmProvider::OpenAI).err();
    assert!(matches!(err, Some(LlmError::NotConfigured)));
}
