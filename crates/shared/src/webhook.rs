use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{error, info};

use crate::models::PaperRecord;
use crate::pipeline::{batch_label, split_into_batches};

/// Anything that can deliver a formatted digest message
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    msg_type: &'static str,
    content: WebhookContent<'a>,
}

#[derive(Serialize)]
struct WebhookContent<'a> {
    text: &'a str,
}

/// Posts digests as `{"msg_type": "text", "content": {"text": ...}}`
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookClient {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = WebhookPayload {
            msg_type: "text",
            content: WebhookContent { text },
        };

        // .json() sets Content-Type: application/json
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send webhook request")?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Webhook returned status {}: {}", status, error_text);
        }

        Ok(())
    }
}

/// Prints digests to stdout instead of posting them
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        println!("{}\n", text);
        Ok(())
    }
}

/// Render one batch of papers as a plain-text message
pub fn format_digest(papers: &[PaperRecord], label: &str, date: NaiveDate) -> String {
    let mut text = format!(
        "{} Arxiv papers summary for {}:\n\n",
        date.format("%Y-%m-%d"),
        label
    );

    for paper in papers {
        text.push_str(&format!("Title: {}\n", paper.title));
        if let Some(translated) = &paper.translated_title {
            text.push_str(&format!("{}\n", translated));
        }
        text.push_str(&format!("Authors: {}\n", paper.authors));
        text.push_str(&format!("URL: {}\n", paper.url));
        if let Some(relevance) = paper.relevance {
            text.push_str(&format!("Relevance: {}\n", relevance));
        }
        text.push_str(&format!(
            "Summary: {}\n\n",
            paper.summary.as_deref().unwrap_or_default()
        ));
    }

    text.trim_end_matches('\n').to_string()
}

/// Send every batch in order. A failed batch is logged and the rest are
/// still attempted. Returns how many batches were delivered.
pub async fn dispatch_batches<N: Notifier>(
    notifier: &N,
    papers: &[PaperRecord],
    category: &str,
    max_per_batch: usize,
    date: NaiveDate,
) -> usize {
    let batches = split_into_batches(papers, max_per_batch);
    let total = batches.len();
    let mut delivered = 0;

    for (index, batch) in batches.iter().enumerate() {
        let label = batch_label(category, index, total);
        let text = format_digest(batch, &label, date);

        info!(batch = %label, papers = batch.len(), "Sending papers to webhook");
        match notifier.send(&text).await {
            Ok(()) => {
                info!(batch = %label, papers = batch.len(), "Batch delivered");
                delivered += 1;
            }
            Err(e) => {
                error!(batch = %label, error = %e, "Error sending batch");
            }
        }
    }

    delivered
}
