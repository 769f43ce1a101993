//! Plain-text AI helpers: chatbot, note summarizer, quiz generator.
//!
//! These never fail. Any generator error or timeout comes back as an
//! `"Error: <message>"` string so the caller can show it verbatim.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::generator::{ResponseFormat, TextGenerator, generate_with_timeout};
use crate::store::{PlanStore, record_usage_best_effort};

pub const CHATBOT_FEATURE: &str = "chatbot";
pub const SUMMARIZER_FEATURE: &str = "summarizer";
pub const QUIZ_FEATURE: &str = "quiz";

pub struct AssistService {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn PlanStore>,
    timeout: Duration,
}

impl AssistService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn PlanStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            store,
            timeout,
        }
    }

    pub async fn ask_chatbot(&self, user_id: Option<&str>, prompt: &str) -> String {
        let full = format!(
            "You are GradMate, an assistant for university students. Answer questions \
             about studies, exam preparation, placements and careers clearly and briefly.\n\n\
             Student: {}",
            prompt.trim()
        );
        self.run(user_id, CHATBOT_FEATURE, prompt, &full).await
    }

    pub async fn summarize_notes(&self, user_id: Option<&str>, text: &str) -> String {
        let full = format!(
            "Summarize the following notes into concise bullet points a student can \
             revise from:\n\n{}",
            text.trim()
        );
        self.run(user_id, SUMMARIZER_FEATURE, text, &full).await
    }

    pub async fn generate_quiz(&self, user_id: Option<&str>, content: &str) -> String {
        let full = format!(
            "Create 5 multiple-choice questions (with answers) from this content:\n\n{}",
            content.trim()
        );
        self.run(user_id, QUIZ_FEATURE, content, &full).await
    }

    async fn run(&self, user_id: Option<&str>, feature: &str, input: &str, prompt: &str) -> String {
        if input.trim().is_empty() {
            return "Error: no input provided".to_string();
        }

        let response = match generate_with_timeout(
            self.generator.as_ref(),
            prompt,
            ResponseFormat::Text,
            self.timeout,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(feature, error = %format!("{e:#}"), "AI helper failed");
                format!("Error: {e:#}")
            }
        };

        if let Some(user_id) = user_id {
            record_usage_best_effort(self.store.as_ref(), user_id, feature, input, &response)
                .await;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    use crate::store::MemoryPlanStore;

    use super::*;

    struct FixedGenerator(Result<&'static str, &'static str>);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            match self.0 {
                Ok(text) => Ok(format!("{text} ({} chars)", prompt.len())),
                Err(msg) => bail!("{msg}"),
            }
        }
    }

    fn service(generator: FixedGenerator) -> (AssistService, Arc<MemoryPlanStore>) {
        let store = Arc::new(MemoryPlanStore::new());
        let svc = AssistService::new(Arc::new(generator), store.clone(), Duration::from_secs(5));
        (svc, store)
    }

    #[tokio::test]
    async fn failures_become_error_strings() {
        let (svc, _) = service(FixedGenerator(Err("quota exceeded")));
        let out = svc.generate_quiz(None, "Photosynthesis converts light.").await;
        assert_eq!(out, "Error: quota exceeded");
    }

    #[tokio::test]
    async fn empty_input_is_an_error_string() {
        let (svc, store) = service(FixedGenerator(Ok("ok")));
        assert!(svc.summarize_notes(Some("u1"), "   ").await.starts_with("Error:"));
        assert!(store.usage_records().await.is_empty());
    }

    #[tokio::test]
    async fn usage_recorded_only_for_known_users() {
        let (svc, store) = service(FixedGenerator(Ok("answer")));
        let anon = svc.ask_chatbot(None, "What is a heap?").await;
        assert!(anon.starts_with("answer"));
        assert!(store.usage_records().await.is_empty());

        svc.ask_chatbot(Some("u1"), "What is a heap?").await;
        let records = store.usage_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner_id, "u1");
        assert_eq!(records[0].feature, CHATBOT_FEATURE);
        assert_eq!(records[0].request, "What is a heap?");
    }
}
