//! Web search collaborator contract and search options.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recency filter handed to the search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    #[default]
    Year,
    None,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::None => "none",
        }
    }
}

/// Options for one search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub time_range: TimeRange,
    pub max_results: u32,
    pub chunks_per_source: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            time_range: TimeRange::Year,
            max_results: 1,
            chunks_per_source: 3,
        }
    }
}

impl SearchOptions {
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.max_results) {
            bail!("search.max_results must be between 1 and 3");
        }
        if !(1..=3).contains(&self.chunks_per_source) {
            bail!("search.chunks_per_source must be between 1 and 3");
        }
        Ok(())
    }

    /// Copy with every field set in `overrides` replaced.
    pub fn merged(self, overrides: &OptionOverrides) -> Self {
        Self {
            time_range: overrides.time_range.unwrap_or(self.time_range),
            max_results: overrides.max_results.unwrap_or(self.max_results),
            chunks_per_source: overrides
                .chunks_per_source
                .unwrap_or(self.chunks_per_source),
        }
    }
}

/// Partial search options supplied by a start command or a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionOverrides {
    #[serde(default, alias = "time_range", skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, alias = "max_results", skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(
        default,
        alias = "chunks_per_source",
        skip_serializing_if = "Option::is_none"
    )]
    pub chunks_per_source: Option<u32>,
}

/// One hit returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Provider response, persisted as the session's latest search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search provider is not configured")]
    NotConfigured,
    #[error("search request failed: {0}")]
    Failed(String),
}

/// Web search provider.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_set_fields() {
        let merged = SearchOptions::default().merged(&OptionOverrides {
            max_results: Some(3),
            ..OptionOverrides::default()
        });
        assert_eq!(merged.max_results, 3);
        assert_eq!(merged.time_range, TimeRange::Year);
        assert_eq!(merged.chunks_per_source, 3);
    }

    #[test]
    fn overrides_accept_both_spellings() {
        let camel: OptionOverrides =
            serde_json::from_str(r#"{"timeRange": "week"}"#).expect("camelCase");
        let snake: OptionOverrides =
            serde_json::from_str(r#"{"time_range": "week", "max_results": 2}"#).expect("snake");
        assert_eq!(camel.time_range, Some(TimeRange::Week));
        assert_eq!(snake.time_range, Some(TimeRange::Week));
        assert_eq!(snake.max_results, Some(2));
    }

    #[test]
    fn out_of_range_options_are_rejected() {
        let options = SearchOptions {
            max_results: 0,
            ..SearchOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
