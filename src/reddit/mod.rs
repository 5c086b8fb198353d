// src/reddit/mod.rs
//! Post source surface: item types, search time windows, and the
//! `PostSource` trait the orchestrator drives. The concrete HTTP client
//! lives in `client`.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One search result from the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    /// Self-text body; empty for link posts.
    pub body: String,
    /// Net score. Can go negative on heavily downvoted posts.
    pub upvotes: i64,
    pub subreddit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedditComment {
    pub body: String,
    pub upvotes: i64,
}

/// Search recency filter, serialized to the source's `t=` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    #[default]
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Contract the discovery orchestrator consumes.
///
/// `search` may fail transiently (network/5xx) and is retried by the
/// implementation. `fetch_comments` never fails: an unavailable comment
/// tree degrades to an empty list so one bad post cannot lose the batch.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Return up to `limit` posts matching `query`, skipping the first
    /// `skip` results of the overall listing (pagination by skip-count).
    async fn search(
        &self,
        query: &str,
        limit: u32,
        window: TimeWindow,
        skip: u32,
    ) -> Result<Vec<RedditPost>>;

    /// Up to `limit` comments for `post`; empty when unavailable.
    async fn fetch_comments(&self, post: &RedditPost, limit: u32) -> Vec<RedditComment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_window_round_trips() {
        for w in [
            TimeWindow::Hour,
            TimeWindow::Day,
            TimeWindow::Week,
            TimeWindow::Month,
            TimeWindow::Year,
            TimeWindow::All,
        ] {
            assert_eq!(TimeWindow::parse(w.as_str()), Some(w));
        }
        assert_eq!(TimeWindow::parse("fortnight"), None);
    }
}
