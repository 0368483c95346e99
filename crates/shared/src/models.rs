use serde::{Deserialize, Serialize};
use std::fmt;

/// Paper metadata as returned by the arXiv API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: String,
    pub abstract_text: String,
    pub url: String,
}

/// Ordinal relevance of a paper to the user's stated interests
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relevance {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl Relevance {
    pub fn from_score(score: i64) -> Option<Self> {
        match score {
            0 => Some(Relevance::Low),
            1 => Some(Relevance::Medium),
            2 => Some(Relevance::High),
            _ => None,
        }
    }

    pub fn score(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            Relevance::Low => "Low",
            Relevance::Medium => "Medium",
            Relevance::High => "High",
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully processed paper, ready for the digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: String,
    pub title: String,
    pub translated_title: Option<String>,
    pub authors: String,
    pub abstract_text: String,
    pub url: String,
    pub summary: Option<String>,
    /// `None` when no user interest was configured for the run
    pub relevance: Option<Relevance>,
}

impl PaperRecord {
    pub fn new(id: impl Into<String>, metadata: PaperMetadata) -> Self {
        Self {
            id: id.into(),
            title: metadata.title,
            translated_title: None,
            authors: metadata.authors,
            abstract_text: metadata.abstract_text,
            url: metadata.url,
            summary: None,
            relevance: None,
        }
    }

    /// Relevance score used for ordering; unscored papers count as 0.
    pub fn relevance_score(&self) -> u8 {
        self.relevance.map(|r| r.score()).unwrap_or(0)
    }
}

/// Pipeline stage a paper was being processed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Relevance,
    Summary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Metadata => "metadata",
            Stage::Relevance => "relevance",
            Stage::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Result of running one paper through the pipeline
#[derive(Debug, Clone)]
pub enum PaperOutcome {
    Completed(PaperRecord),
    BelowThreshold {
        id: String,
        title: String,
        relevance: Relevance,
    },
    Failed {
        id: String,
        stage: Stage,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_from_score() {
        assert_eq!(Relevance::from_score(0), Some(Relevance::Low));
        assert_eq!(Relevance::from_score(1), Some(Relevance::Medium));
        assert_eq!(Relevance::from_score(2), Some(Relevance::High));
        assert_eq!(Relevance::from_score(3), None);
        assert_eq!(Relevance::from_score(-1), None);
    }

    #[test]
    fn test_relevance_labels() {
        assert_eq!(Relevance::Low.to_string(), "Low");
        assert_eq!(Relevance::Medium.label(), "Medium");
        assert_eq!(Relevance::High.score(), 2);
    }

    #[test]
    fn test_unscored_record_counts_as_zero() {
        let record = PaperRecord::new(
            "2501.00001",
            PaperMetadata {
                title: "A".to_string(),
                authors: "B".to_string(),
                abstract_text: "C".to_string(),
                url: "https://arxiv.org/abs/2501.00001v1".to_string(),
            },
        );
        assert_eq!(record.relevance_score(), 0);
        assert!(record.summary.is_none());
    }
}
