use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::arxiv::MetadataSource;
use crate::config::{FilterLevel, RunOptions};
use crate::listing::ListingSource;
use crate::llm::ChatModel;
use crate::models::{PaperOutcome, PaperRecord, Stage};
use crate::relevance::RelevanceEvaluator;
use crate::summarizer::PaperSummarizer;
use crate::webhook::{dispatch_batches, Notifier};

/// Drives every discovered paper through metadata, relevance and summary
pub struct Pipeline<'a, L: ListingSource, S: MetadataSource, M: ChatModel> {
    listing: &'a L,
    metadata: &'a S,
    evaluator: RelevanceEvaluator<'a, M>,
    summarizer: PaperSummarizer<'a, M>,
    options: RunOptions,
}

impl<'a, L, S, M> Pipeline<'a, L, S, M>
where
    L: ListingSource,
    S: MetadataSource,
    M: ChatModel,
{
    pub fn new(
        listing: &'a L,
        metadata: &'a S,
        model: &'a M,
        summary_language: &str,
        options: RunOptions,
    ) -> Self {
        Self {
            listing,
            metadata,
            evaluator: RelevanceEvaluator::new(model),
            summarizer: PaperSummarizer::new(model, summary_language),
            options,
        }
    }

    fn user_interest(&self) -> Option<&str> {
        self.options
            .user_interest
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Filtering needs an interest to score against; without one it is off.
    fn min_score(&self) -> Option<u8> {
        if self.user_interest().is_none() && self.options.filter_level != FilterLevel::None {
            warn!(
                filter_level = %self.options.filter_level,
                "User interest not specified, but a filter level is set. Skipping filtering"
            );
            return None;
        }
        self.options.filter_level.min_score()
    }

    /// Run one paper through every stage. Failures come back as values.
    pub async fn process_paper(&self, paper_id: &str, min_score: Option<u8>) -> PaperOutcome {
        let failed = |stage: Stage, reason: String| PaperOutcome::Failed {
            id: paper_id.to_string(),
            stage,
            reason,
        };

        let metadata = match self.metadata.fetch_metadata(paper_id).await {
            Ok(metadata) => metadata,
            Err(e) => return failed(Stage::Metadata, format!("{:#}", e)),
        };
        if metadata.title.is_empty() || metadata.abstract_text.is_empty() || metadata.url.is_empty()
        {
            return failed(Stage::Metadata, "incomplete metadata".to_string());
        }
        let mut record = PaperRecord::new(paper_id, metadata);

        if let Some(interest) = self.user_interest() {
            let relevance = match self
                .evaluator
                .evaluate(&record.title, &record.abstract_text, interest)
                .await
            {
                Ok(relevance) => relevance,
                Err(e) => return failed(Stage::Relevance, e.to_string()),
            };
            info!(paper_id, title = %record.title, %relevance, "Relevance evaluated");

            if min_score.is_some_and(|min| relevance.score() < min) {
                return PaperOutcome::BelowThreshold {
                    id: record.id,
                    title: record.title,
                    relevance,
                };
            }
            // Scored once; the same value is used for ordering later
            record.relevance = Some(relevance);
        }

        match self
            .summarizer
            .summarize(&record.title, &record.abstract_text)
            .await
        {
            Ok(result) => {
                record.summary = Some(result.summary);
                record.translated_title = Some(result.translated_title);
            }
            Err(e) => return failed(Stage::Summary, e.to_string()),
        }

        PaperOutcome::Completed(record)
    }

    /// Process papers strictly in order, one at a time
    pub async fn process_all(&self, paper_ids: &[String]) -> Vec<PaperOutcome> {
        let min_score = self.min_score();
        let mut outcomes = Vec::with_capacity(paper_ids.len());

        for paper_id in paper_ids {
            info!(paper_id = %paper_id, "Processing paper");
            let outcome = self.process_paper(paper_id, min_score).await;

            match &outcome {
                PaperOutcome::Completed(_) => {}
                PaperOutcome::BelowThreshold {
                    id,
                    title,
                    relevance,
                } => {
                    info!(
                        paper_id = %id,
                        %title,
                        relevance = relevance.score(),
                        filter_level = %self.options.filter_level,
                        "Below filter level. Skipping summarization"
                    );
                }
                PaperOutcome::Failed { id, stage, reason } => {
                    error!(paper_id = %id, %stage, %reason, "Failed to process paper");
                }
            }

            outcomes.push(outcome);
        }

        outcomes
    }

    /// Fetch the listing and process every paper on it.
    ///
    /// Only a listing failure is an error. `Ok(None)` means no paper made it
    /// through.
    pub async fn run(&self) -> Result<Option<Vec<PaperRecord>>> {
        let category = &self.options.category;
        info!(%category, "Starting arXiv summarization");

        let paper_ids = self
            .listing
            .paper_ids(category)
            .await
            .with_context(|| format!("Failed to fetch the listing for {}", category))?;

        let mut papers: Vec<PaperRecord> = self
            .process_all(&paper_ids)
            .await
            .into_iter()
            .filter_map(|outcome| match outcome {
                PaperOutcome::Completed(record) => Some(record),
                _ => None,
            })
            .collect();

        if papers.is_empty() {
            warn!("No papers were successfully processed");
            return Ok(None);
        }

        info!(
            processed = papers.len(),
            discovered = paper_ids.len(),
            "Finished processing papers"
        );

        if self.user_interest().is_some() {
            sort_by_relevance(&mut papers);
            info!(count = papers.len(), "Sorted papers by relevance (descending)");
        }

        Ok(Some(papers))
    }

    /// Run the pipeline and hand the results to `notifier` in batches.
    /// Returns the number of batches delivered.
    pub async fn run_and_dispatch<N: Notifier>(
        &self,
        notifier: Option<&N>,
        date: NaiveDate,
    ) -> Result<usize> {
        let Some(papers) = self.run().await? else {
            warn!("Processing failed or no papers were found. Nothing to send");
            return Ok(0);
        };

        let Some(notifier) = notifier else {
            info!(count = papers.len(), "Webhook URL not configured. Papers will not be sent");
            return Ok(0);
        };

        Ok(dispatch_batches(
            notifier,
            &papers,
            &self.options.category,
            self.options.max_papers_split,
            date,
        )
        .await)
    }
}

/// Highest relevance first; ties keep their listing order.
pub fn sort_by_relevance(papers: &mut [PaperRecord]) {
    // sort_by_key is stable
    papers.sort_by_key(|p| std::cmp::Reverse(p.relevance_score()));
}

/// Split into the fewest batches of at most `max_per_batch`, sized as
/// evenly as possible (23 at 10 -> 8, 8, 7).
pub fn split_into_batches<T>(items: &[T], max_per_batch: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return Vec::new();
    }
    let max_per_batch = max_per_batch.max(1);
    let num_batches = items.len().div_ceil(max_per_batch);
    let batch_size = items.len().div_ceil(num_batches);
    items.chunks(batch_size).collect()
}

/// `eess.AS` for a single batch, `eess.AS (2/3)` otherwise
pub fn batch_label(category: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        category.to_string()
    } else {
        format!("{} ({}/{})", category, index + 1, total)
    }
}
