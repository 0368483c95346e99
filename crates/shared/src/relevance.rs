use tracing::{error, warn};

use crate::llm::{ChatModel, ChatRequest, LlmError};
use crate::models::Relevance;

/// Scores papers against a free-text statement of the user's interests
pub struct RelevanceEvaluator<'a, M: ChatModel> {
    model: &'a M,
}

impl<'a, M: ChatModel> RelevanceEvaluator<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Only connectivity and rate-limit failures are returned. A reply that is
    /// not 0, 1 or 2, or any other API failure (5xx included), scores the
    /// paper as Low.
    pub async fn evaluate(
        &self,
        title: &str,
        abstract_text: &str,
        user_interest: &str,
    ) -> Result<Relevance, LlmError> {
        let request =
            ChatRequest::new(build_prompt(title, abstract_text, user_interest), 0.0).with_max_tokens(1);

        match self.model.complete(request).await {
            Ok(reply) => Ok(parse_relevance(&reply, title)),
            Err(e @ (LlmError::Connection(_) | LlmError::RateLimited(_))) => {
                error!(error = %e, title, "Relevance check failed");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, title, "Unexpected error during relevance evaluation. Defaulting to Low");
                Ok(Relevance::Low)
            }
        }
    }
}

fn build_prompt(title: &str, abstract_text: &str, user_interest: &str) -> String {
    format!(
        r#"Given the following research paper's title and abstract, and a (list of) user's area of interest,
rate the relevance of the paper to the user's interest.
Respond with only a single integer:
0 for Low relevance to all of the user's interests,
1 for Medium relevance to any of the user's interests,
2 for High relevance to any of the user's interests.

User's Interest: {}

Paper Title: {}
Paper Abstract: {}

Relevance Score (0, 1, or 2):"#,
        user_interest, title, abstract_text
    )
}

/// Map the model's reply to a score, falling back to Low with a warning.
pub fn parse_relevance(reply: &str, title: &str) -> Relevance {
    let trimmed = reply.trim();
    match trimmed.parse::<i64>() {
        Ok(score) => Relevance::from_score(score).unwrap_or_else(|| {
            warn!(reply = trimmed, title, "Unexpected relevance score. Defaulting to Low");
            Relevance::Low
        }),
        Err(_) => {
            warn!(reply = trimmed, title, "Relevance score is not an integer. Defaulting to Low");
            Relevance::Low
        }
    }
}
