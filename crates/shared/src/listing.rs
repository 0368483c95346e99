use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::info;

const LISTING_BASE_URL: &str = "https://arxiv.org/list";
const ABSTRACT_LINK_PREFIX: &str = "/abs/";

/// Anything that can list the paper ids newly submitted to a category
#[async_trait]
pub trait ListingSource {
    async fn paper_ids(&self, category: &str) -> Result<Vec<String>>;
}

/// Scrapes the arXiv "new submissions" page for a category
pub struct ListingFetcher {
    client: Client,
    base_url: String,
}

impl ListingFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: LISTING_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn listing_url(&self, category: &str) -> String {
        format!("{}/{}/new", self.base_url, category)
    }

    pub async fn fetch_links(&self, category: &str) -> Result<Vec<String>> {
        let url = self.listing_url(category);
        info!(%url, "Fetching paper links");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch arXiv listing page {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("arXiv listing page {} returned HTTP {}", url, status);
        }

        let html = response
            .text()
            .await
            .context("Failed to read arXiv listing page body")?;

        let links = extract_abstract_links(&html)?;
        info!(count = links.len(), "Found abstract links");

        Ok(links)
    }
}

#[async_trait]
impl ListingSource for ListingFetcher {
    async fn paper_ids(&self, category: &str) -> Result<Vec<String>> {
        let links = self.fetch_links(category).await?;
        Ok(links.iter().map(|link| paper_id_from_link(link)).collect())
    }
}

/// Every `/abs/...` href in document order, repeats dropped.
///
/// This is the only place that knows about the listing page's markup.
pub fn extract_abstract_links(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("a[href]").map_err(|e| anyhow::anyhow!("Invalid selector: {:?}", e))?;

    let mut seen = HashSet::new();
    let links = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with(ABSTRACT_LINK_PREFIX))
        .filter(|href| seen.insert(href.to_string()))
        .map(|href| href.to_string())
        .collect();

    Ok(links)
}

/// `/abs/2501.01234` -> `2501.01234`, `/abs/hep-th/9901001` -> `hep-th/9901001`
pub fn paper_id_from_link(link: &str) -> String {
    link.strip_prefix(ABSTRACT_LINK_PREFIX)
        .unwrap_or(link)
        .trim_matches('/')
        .to_string()
}
