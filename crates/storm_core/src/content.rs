//! File content from a text-generation provider.

use std::sync::Arc;

use async_trait::async_trait;
use storm_llm::{GenerationRequest, TextGenerator};
use storm_planner::{synthesize_file_content, ContentSource, ProjectType, TechStack};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a senior software engineer generating source files for a new project. \
Reply with the complete file content only, without explanations or markdown fences.";

/// [`ContentSource`] that asks a [`TextGenerator`] for every file and falls
/// back to the template table when generation fails or returns nothing.
pub struct GeneratedContent {
    generator: Arc<dyn TextGenerator>,
}

impl GeneratedContent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn request(&self, path: &str, project_type: ProjectType, stack: &TechStack) -> GenerationRequest {
        let prompt = format!(
            "Write the file `{}` for a {} built with {}.",
            path,
            project_type.label(),
            stack.summary()
        );
        GenerationRequest::new(prompt).system(SYSTEM_PROMPT).temperature(0.2)
    }
}

#[async_trait]
impl ContentSource for GeneratedContent {
    async fn file_content(&self, path: &str, project_type: ProjectType, stack: &TechStack) -> String {
        let request = self.request(path, project_type, stack);
        match self.generator.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(path, generator = %self.generator.name(), "Generated file content");
                strip_fences(&text)
            }
            Ok(_) => {
                warn!(path, "Generator returned empty content, using template");
                synthesize_file_content(path, project_type, stack)
            }
            Err(e) => {
                warn!(path, error = %e, "Content generation failed, using template");
                synthesize_file_content(path, project_type, stack)
            }
        }
    }
}

/// Drop a surrounding markdown code fence if the model added one anyway.
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().skip(1).collect();
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
        lines.pop();
    }
    let mut body = lines.join("\n");
    body.push('\n');
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use storm_llm::{LlmError, MockTextGenerator};
    use storm_planner::{Framework, Language};

    fn flask() -> TechStack {
        TechStack::new(Language::Python, Framework::Flask)
    }

    #[tokio::test]
    async fn test_uses_generated_text() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|req| req.prompt.contains("`app.py`") && req.prompt.contains("flask"))
            .returning(|_| Ok("```python\nprint('hi')\n```".to_string()));
        mock.expect_name().return_const("mock".to_string());

        let source = GeneratedContent::new(Arc::new(mock));
        let content = source.file_content("app.py", ProjectType::Web, &flask()).await;
        assert_eq!(content, "print('hi')\n");
    }

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .returning(|_| Err(LlmError::Auth("bad key".to_string())));
        mock.expect_name().return_const("mock".to_string());

        let source = GeneratedContent::new(Arc::new(mock));
        let content = source.file_content("app.py", ProjectType::Web, &flask()).await;
        assert_eq!(content, synthesize_file_content("app.py", ProjectType::Web, &flask()));
    }

    #[tokio::test]
    async fn test_falls_back_on_blank_output() {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate().returning(|_| Ok("   ".to_string()));
        mock.expect_name().return_const("mock".to_string());

        let source = GeneratedContent::new(Arc::new(mock));
        let content = source.file_content("requirements.txt", ProjectType::Web, &flask()).await;
        assert_eq!(
            content,
            synthesize_file_content("requirements.txt", ProjectType::Web, &flask())
        );
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("plain"), "plain");
        assert_eq!(strip_fences("```\na\nb\n```"), "a\nb\n");
    }
}
