use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "gpt-3.5-turbo";
pub const DEFAULT_SUMMARY_LANGUAGE: &str = "English";
pub const DEFAULT_CATEGORY: &str = "eess.AS";
pub const DEFAULT_MAX_PAPERS_SPLIT: usize = 10;

/// Settings read from the environment (and any `.env` file)
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model_name: String,
    pub summary_language: String,
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY").context(
            "OPENAI_API_KEY not found.\n\n\
            To fix this, create ~/.config/arxiv-digest/.env with:\n  \
            OPENAI_API_KEY=your_key_here\n  \
            WEBHOOK_URL=https://your.webhook/endpoint (optional)",
        )?;

        let base_url = get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url)
            .with_context(|| format!("OPENAI_BASE_URL is not a valid URL: {}", base_url))?;

        // A bad webhook only disables delivery; papers are still processed
        let webhook_url = get("WEBHOOK_URL").filter(|url| match Url::parse(url) {
            Ok(_) => true,
            Err(e) => {
                warn!(%url, error = %e, "WEBHOOK_URL is not a valid URL. Papers will not be sent");
                false
            }
        });

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_name: get("OPENAI_MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            summary_language: get("SUMMARY_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_SUMMARY_LANGUAGE.to_string()),
            webhook_url,
        })
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/arxiv-digest/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("arxiv-digest").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

/// Minimum relevance a paper needs before it gets summarized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterLevel {
    #[default]
    None,
    Low,
    Mid,
    High,
}

impl FilterLevel {
    /// Lowest score that passes, or `None` when nothing is filtered.
    pub fn min_score(&self) -> Option<u8> {
        match self {
            FilterLevel::None => None,
            FilterLevel::Low => Some(0),
            FilterLevel::Mid => Some(1),
            FilterLevel::High => Some(2),
        }
    }
}

impl FromStr for FilterLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(FilterLevel::None),
            "low" => Ok(FilterLevel::Low),
            "mid" => Ok(FilterLevel::Mid),
            "high" => Ok(FilterLevel::High),
            other => anyhow::bail!(
                "Invalid filter level: {}. Use 'low', 'mid', 'high', or 'none'",
                other
            ),
        }
    }
}

impl fmt::Display for FilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterLevel::None => "none",
            FilterLevel::Low => "low",
            FilterLevel::Mid => "mid",
            FilterLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// Per-run options taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub category: String,
    pub max_papers_split: usize,
    pub user_interest: Option<String>,
    pub filter_level: FilterLevel,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            max_papers_split: DEFAULT_MAX_PAPERS_SPLIT,
            user_interest: None,
            filter_level: FilterLevel::None,
        }
    }
}
