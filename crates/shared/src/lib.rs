// Public modules
pub mod arxiv;
pub mod config;
pub mod listing;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod relevance;
pub mod summarizer;
pub mod webhook;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use arxiv::{ArxivClient, MetadataSource};
pub use config::{Config, FilterLevel, RunOptions};
pub use listing::{ListingFetcher, ListingSource};
pub use llm::{ChatModel, LlmError, OpenAiClient};
pub use models::{PaperMetadata, PaperOutcome, PaperRecord, Relevance, Stage};
pub use pipeline::{split_into_batches, Pipeline};
pub use relevance::RelevanceEvaluator;
pub use summarizer::{PaperSummarizer, PaperSummary};
pub use webhook::{ConsoleNotifier, Notifier, WebhookClient};
