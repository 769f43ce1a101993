//! The `TextGenerator` trait -- the adapter interface for generative-text
//! backends.
//!
//! The trait is object-safe so it can be injected as
//! `Arc<dyn TextGenerator>` into [`crate::plan::StudyPlanTaskManager`] and
//! [`crate::assist::AssistService`].

pub mod gemini;

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

pub use gemini::{GeminiClient, GeminiConfig};

/// Shape of the text the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// The backend should answer with a bare JSON document.
    Json,
}

/// Prompt in, text out. Implementations may fail or be slow.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate free text for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate a JSON document for `prompt`.
    ///
    /// Backends without a structured-output mode can rely on the default,
    /// which defers to [`TextGenerator::generate`] and leaves validation to
    /// the caller.
    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

// Compile-time assertion: TextGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};

/// Run one generation bounded by `limit`.
pub async fn generate_with_timeout(
    generator: &dyn TextGenerator,
    prompt: &str,
    format: ResponseFormat,
    limit: Duration,
) -> Result<String> {
    let call = async {
        match format {
            ResponseFormat::Text => generator.generate(prompt).await,
            ResponseFormat::Json => generator.generate_json(prompt).await,
        }
    };
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "{} did not respond within {}s",
            generator.name(),
            limit.as_secs_f32()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_uppercase())
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn json_mode_defaults_to_plain_generation() {
        let generator: Box<dyn TextGenerator> = Box::new(EchoGenerator);
        let out = generate_with_timeout(
            generator.as_ref(),
            "hi",
            ResponseFormat::Json,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(out, "HI");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let err = generate_with_timeout(
            &StalledGenerator,
            "hi",
            ResponseFormat::Text,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("stalled did not respond"));
    }
}
