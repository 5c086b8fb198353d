// src/analysis/mod.rs
//! Insight types produced by the LLM collaborator and the trait the
//! orchestrator calls. The crate owns the typed shape and validation of
//! these values; how they are generated is the adapter's concern.

pub mod openrouter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reddit::{RedditComment, RedditPost};

/// A pain point identified from community discussions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PainPoint {
    pub description: String,
    pub solution_summary: String,
    #[serde(default)]
    pub upvotes: u32,
}

/// Content idea generated from the discovered insights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentIdea {
    pub title: String,
    pub description: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Controversy {
    pub is_controversial: bool,
    /// e.g. "60% supportive, 40% critical" when controversial.
    pub for_against_split: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngagementSignals {
    /// "high" | "medium" | "low"
    pub popularity: String,
    pub virality_potential: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum KnowledgeDepth {
    BeginnerFriendly,
    Intermediate,
    Expert,
}

/// Case-study-level narrative context for one selected idea.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailedContext {
    pub idea_title: String,
    pub idea_description: String,
    /// 500-2000 word narrative analysis of the cached discussions.
    pub full_post_and_comment_analysis: String,
    pub emotional_aspect: String,
    pub controversial_aspect: Controversy,
    pub engagement_signals: EngagementSignals,
    pub knowledge_depth: KnowledgeDepth,
    pub category: String,
}

/// Truncation limits applied when shaping posts for analysis.
const DIGEST_BODY_CHARS: usize = 1000;
const DIGEST_COMMENT_CHARS: usize = 500;
const DIGEST_COMMENTS_PER_POST: usize = 10;

/// One post plus its top comments, trimmed for prompt budgets. This is the
/// raw payload cached between the discover and get-context phases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostDigest {
    pub title: String,
    pub body: String,
    pub upvotes: i64,
    pub comments: Vec<CommentDigest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentDigest {
    pub body: String,
    pub upvotes: i64,
}

impl PostDigest {
    pub fn from_post(post: &RedditPost, comments: &[RedditComment]) -> Self {
        Self {
            title: post.title.clone(),
            body: post.body.chars().take(DIGEST_BODY_CHARS).collect(),
            upvotes: post.upvotes,
            comments: comments
                .iter()
                .take(DIGEST_COMMENTS_PER_POST)
                .map(|c| CommentDigest {
                    body: c.body.chars().take(DIGEST_COMMENT_CHARS).collect(),
                    upvotes: c.upvotes,
                })
                .collect(),
        }
    }
}

/// LLM analysis surface consumed by the orchestrator. All methods may fail
/// on malformed structured output; the orchestrator propagates those
/// failures without attempting repair.
#[async_trait]
pub trait InsightAnalyzer: Send + Sync {
    async fn analyze_pain_points(
        &self,
        query: &str,
        posts: &[PostDigest],
    ) -> Result<Vec<PainPoint>>;

    async fn generate_content_ideas(
        &self,
        query: &str,
        posts: &[PostDigest],
        pain_points: &[PainPoint],
    ) -> Result<Vec<ContentIdea>>;

    async fn generate_detailed_context(
        &self,
        idea_title: &str,
        idea_description: &str,
        posts: &[PostDigest],
    ) -> Result<DetailedContext>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_truncates_body_and_comments() {
        let post = RedditPost {
            id: "t3_x".into(),
            title: "t".into(),
            body: "x".repeat(5000),
            upvotes: 7,
            subreddit: "s".into(),
        };
        let comments: Vec<RedditComment> = (0..15)
            .map(|i| RedditComment {
                body: "y".repeat(900),
                upvotes: i,
            })
            .collect();

        let digest = PostDigest::from_post(&post, &comments);
        assert_eq!(digest.body.chars().count(), 1000);
        assert_eq!(digest.comments.len(), 10);
        assert_eq!(digest.comments[0].body.chars().count(), 500);
    }

    #[test]
    fn knowledge_depth_uses_kebab_case() {
        let parsed: KnowledgeDepth =
            serde_json::from_str("\"beginner-friendly\"").expect("kebab-case variant");
        assert_eq!(parsed, KnowledgeDepth::BeginnerFriendly);
        assert!(serde_json::from_str::<KnowledgeDepth>("\"novice\"").is_err());
    }
}
