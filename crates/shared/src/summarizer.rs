use tracing::error;

use crate::llm::{ChatModel, ChatRequest, LlmError};

const SUMMARY_TEMPERATURE: f32 = 0.7;
const TRANSLATION_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperSummary {
    pub translated_title: String,
    pub summary: String,
}

/// Summarizes papers and translates their titles into the configured language
pub struct PaperSummarizer<'a, M: ChatModel> {
    model: &'a M,
    language: String,
}

impl<'a, M: ChatModel> PaperSummarizer<'a, M> {
    pub fn new(model: &'a M, language: impl Into<String>) -> Self {
        Self {
            model,
            language: language.into(),
        }
    }

    pub async fn summarize(&self, title: &str, abstract_text: &str) -> Result<PaperSummary, LlmError> {
        let summary = self
            .model
            .complete(ChatRequest::new(
                self.summary_prompt(title, abstract_text),
                SUMMARY_TEMPERATURE,
            ))
            .await
            .inspect_err(|e| error!(error = %e, title, "Summarization failed"))?;

        let translated_title = self
            .model
            .complete(ChatRequest::new(
                self.translation_prompt(title),
                TRANSLATION_TEMPERATURE,
            ))
            .await
            .inspect_err(|e| error!(error = %e, title, "Title translation failed"))?;

        Ok(PaperSummary {
            translated_title: translated_title.trim().to_string(),
            summary: summary.trim().to_string(),
        })
    }

    fn summary_prompt(&self, title: &str, abstract_text: &str) -> String {
        format!(
            "Summarize the following research paper. Provide the most important information in up to 3 sentences. Respond in {}.\n\nTitle: {}\nAbstract: {}",
            self.language, title, abstract_text
        )
    }

    fn translation_prompt(&self, title: &str) -> String {
        format!(
            "Translate the following title of article to {}, only respond with the translated title: {}",
            self.language, title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        requests: Mutex<Vec<ChatRequest>>,
        fail_translation: bool,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
            let is_translation = request.prompt.starts_with("Translate");
            self.requests.lock().unwrap().push(request);
            if is_translation {
                if self.fail_translation {
                    return Err(LlmError::Connection("reset".into()));
                }
                Ok("  Titre traduit \n".to_string())
            } else {
                Ok("Une phrase. Deux phrases.".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_summary_and_translation_requests() {
        let model = RecordingModel::default();
        let summarizer = PaperSummarizer::new(&model, "French");

        let result = summarizer
            .summarize("Audio Tokenizers", "We tokenize audio.")
            .await
            .unwrap();
        assert_eq!(result.translated_title, "Titre traduit");
        assert_eq!(result.summary, "Une phrase. Deux phrases.");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].temperature, 0.7);
        assert!(requests[0].prompt.contains("up to 3 sentences"));
        assert!(requests[0].prompt.contains("Respond in French"));
        assert!(requests[0].prompt.contains("Abstract: We tokenize audio."));
        assert_eq!(requests[1].temperature, 0.0);
        assert!(requests[1].prompt.ends_with("only respond with the translated title: Audio Tokenizers"));
    }

    #[tokio::test]
    async fn test_translation_failure_propagates() {
        let model = RecordingModel {
            fail_translation: true,
            ..Default::default()
        };
        let summarizer = PaperSummarizer::new(&model, "English");
        let result = summarizer.summarize("t", "a").await;
        assert!(matches!(result, Err(LlmError::Connection(_))));
    }
}
