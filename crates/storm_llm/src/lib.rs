//! # storm_llm
//!
//! Text generation for Storm.
//!
//! The builder only depends on [`TextGenerator`]. [`HttpGenerator`] talks to
//! OpenAI, Anthropic or Gemini, and [`FallbackGenerator`] chains several of
//! them so a failing provider hands over to the next one.
//!
//! Enable the `mock` feature to get `MockTextGenerator` in downstream tests.

pub mod error;
pub mod generator;
pub mod http;

pub use error::{LlmError, LlmResult};
pub use generator::{FallbackGenerator, GenerationRequest, LlmProvider, TextGenerator};
#[cfg(any(test, feature = "mock"))]
pub use generator::MockTextGenerator;
pub use http::{extract_text, validate_json, HttpGenerator};
