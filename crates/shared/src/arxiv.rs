//! arXiv metadata client
//!
//! Looks papers up through the Atom export API.
//! See: https://info.arxiv.org/help/api/user-manual.html

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

use crate::models::PaperMetadata;

const API_BASE_URL: &str = "https://export.arxiv.org/api/query";

/// Author lists longer than this are condensed to two names and "et al."
const MAX_LISTED_AUTHORS: usize = 3;

/// Anything that can resolve a paper id to its metadata
#[async_trait]
pub trait MetadataSource {
    async fn fetch_metadata(&self, paper_id: &str) -> Result<PaperMetadata>;
}

pub struct ArxivClient {
    client: Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("arxiv-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query_url(&self, paper_id: &str) -> String {
        format!(
            "{}?id_list={}&max_results=1",
            self.base_url,
            urlencoding::encode(paper_id)
        )
    }
}

#[async_trait]
impl MetadataSource for ArxivClient {
    async fn fetch_metadata(&self, paper_id: &str) -> Result<PaperMetadata> {
        let url = self.query_url(paper_id);
        debug!(%url, "arXiv metadata lookup");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to query arXiv API for {}", paper_id))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("arXiv API returned error: {} - {}", status, error_text);
        }

        let xml = response
            .text()
            .await
            .context("Failed to read arXiv API response")?;

        parse_metadata(&xml).with_context(|| format!("No usable metadata for {}", paper_id))
    }
}

#[derive(Debug, Default, Clone)]
struct AtomEntry {
    id: String,
    title: String,
    summary: String,
    authors: Vec<String>,
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
    AuthorName,
}

fn parse_entries(xml: &str) -> Result<Vec<AtomEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut in_author = false;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match (e.local_name().as_ref(), current.is_some()) {
                (b"entry", _) => current = Some(AtomEntry::default()),
                (b"author", true) => in_author = true,
                (b"id", true) if !in_author => field = Some(Field::Id),
                (b"title", true) => field = Some(Field::Title),
                (b"summary", true) => field = Some(Field::Summary),
                (b"name", true) if in_author => field = Some(Field::AuthorName),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    text.push_str(&t.unescape().context("Invalid text in arXiv feed")?);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"entry" => {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                    }
                    b"author" => in_author = false,
                    _ => {
                        if let (Some(f), Some(entry)) = (field.take(), current.as_mut()) {
                            let value = std::mem::take(&mut text);
                            match f {
                                Field::Id => entry.id = value.trim().to_string(),
                                Field::Title => entry.title = collapse_whitespace(&value),
                                Field::Summary => entry.summary = value.trim().to_string(),
                                Field::AuthorName => {
                                    let name = collapse_whitespace(&value);
                                    if !name.is_empty() {
                                        entry.authors.push(name);
                                    }
                                }
                            }
                        }
                        text.clear();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("XML parse error at {}: {}", reader.buffer_position(), e),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// Parse an Atom response for a single-id query into paper metadata
pub fn parse_metadata(xml: &str) -> Result<PaperMetadata> {
    let entry = parse_entries(xml)?
        .into_iter()
        .next()
        .context("arXiv API returned no entries")?;

    // Malformed ids come back as a single entry describing the error
    if entry.id.contains("/api/errors") {
        anyhow::bail!("arXiv API error: {}", entry.summary);
    }

    if entry.title.is_empty() {
        anyhow::bail!("arXiv entry {} has no title", entry.id);
    }
    if entry.summary.is_empty() {
        anyhow::bail!("arXiv entry {} has no abstract", entry.id);
    }
    if entry.id.is_empty() {
        anyhow::bail!("arXiv entry '{}' has no URL", entry.title);
    }

    Ok(PaperMetadata {
        title: entry.title,
        authors: condense_authors(&entry.authors),
        abstract_text: entry.summary,
        url: normalize_url(&entry.id),
    })
}

/// Join author names, collapsing long lists to "A, B, et al."
pub fn condense_authors<S: AsRef<str>>(authors: &[S]) -> String {
    let names: Vec<&str> = authors.iter().map(|a| a.as_ref()).collect();
    if names.len() > MAX_LISTED_AUTHORS {
        format!("{}, et al.", names[..2].join(", "))
    } else {
        names.join(", ")
    }
}

/// Force a secure scheme on arXiv URLs
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <link href="http://arxiv.org/api/query?id_list=2501.01234" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query: id_list=2501.01234</title>
  <id>http://arxiv.org/api/abc123</id>
  <entry>
    <id>http://arxiv.org/abs/2501.01234v2</id>
    <updated>2025-01-15T12:00:00Z</updated>
    <title>Speech Enhancement with
      Diffusion &amp; Flow Models</title>
    <summary>  We study speech enhancement.
It works.  </summary>
    <author><name>Alice Doe</name></author>
    <author>
      <name>Bob Smith</name>
      <arxiv:affiliation xmlns:arxiv="http://arxiv.org/schemas/atom">MIT</arxiv:affiliation>
    </author>
    <author><name>Carol Jones</name></author>
    <author><name>Dan Brown</name></author>
    <link href="http://arxiv.org/abs/2501.01234v2" rel="alternate" type="text/html"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="eess.AS"/>
  </entry>
</feed>
"#;

    const ERROR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_bogus</id>
    <title>Error</title>
    <summary>incorrect id format for bogus</summary>
  </entry>
</feed>
"#;

    #[test]
    fn test_parse_metadata() {
        let metadata = parse_metadata(FEED).unwrap();
        assert_eq!(
            metadata.title,
            "Speech Enhancement with Diffusion & Flow Models"
        );
        assert_eq!(metadata.abstract_text, "We study speech enhancement.\nIt works.");
        assert_eq!(metadata.authors, "Alice Doe, Bob Smith, et al.");
        assert_eq!(metadata.url, "https://arxiv.org/abs/2501.01234v2");
    }

    #[test]
    fn test_feed_title_not_mistaken_for_entry() {
        let entries = parse_entries(FEED).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].authors.len(), 4);
    }

    #[test]
    fn test_empty_feed_is_an_error() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_metadata(xml).is_err());
    }

    #[test]
    fn test_error_entry_is_an_error() {
        let err = parse_metadata(ERROR_FEED).unwrap_err();
        assert!(err.to_string().contains("incorrect id format"));
    }

    #[test]
    fn test_condense_authors_short_lists_unchanged() {
        assert_eq!(condense_authors::<&str>(&[]), "");
        assert_eq!(condense_authors(&["A"]), "A");
        assert_eq!(condense_authors(&["A", "B", "C"]), "A, B, C");
    }

    #[test]
    fn test_condense_authors_long_list() {
        assert_eq!(condense_authors(&["A", "B", "C", "D"]), "A, B, et al.");
        assert_eq!(
            condense_authors(&["A", "B", "C", "D", "E", "F"]),
            "A, B, et al."
        );
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("http://arxiv.org/abs/2501.01234v1"),
            "https://arxiv.org/abs/2501.01234v1"
        );
        assert_eq!(
            normalize_url("https://arxiv.org/abs/2501.01234v1"),
            "https://arxiv.org/abs/2501.01234v1"
        );
    }

    #[test]
    fn test_query_url_encodes_id() {
        let client = ArxivClient::new().unwrap();
        assert_eq!(
            client.query_url("hep-th/9901001"),
            "https://export.arxiv.org/api/query?id_list=hep-th%2F9901001&max_results=1"
        );
    }

    #[tokio::test]
    async fn test_fetch_metadata_from_served_feed() {
        let base = serve_once(200, "application/atom+xml", FEED).await;
        let client = ArxivClient::new()
            .unwrap()
            .with_base_url(format!("{}/api/query", base));
        let metadata = client.fetch_metadata("2501.01234").await.unwrap();
        assert_eq!(
            metadata.title,
            "Speech Enhancement with Diffusion & Flow Models"
        );
        assert_eq!(metadata.authors, "Alice Doe, Bob Smith, et al.");
        assert_eq!(metadata.url, "https://arxiv.org/abs/2501.01234v2");
    }

    #[tokio::test]
    async fn test_fetch_metadata_error_status() {
        let base = serve_once(500, "text/plain", "upstream down").await;
        let client = ArxivClient::new()
            .unwrap()
            .with_base_url(format!("{}/api/query", base));
        let err = client.fetch_metadata("2501.01234").await.unwrap_err();
        assert!(err.to_string().contains("upstream down"));
    }
}
