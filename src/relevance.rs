// src/relevance.rs
//! Relevance gate for raw search results: additive heuristic scoring against
//! the user's query, then partition into relevant / filtered-out.
//!
//! Scores are capped at 1.0; each rule contributes at most once and records
//! a human-readable reason in evaluation order.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::reddit::RedditPost;

pub const DEFAULT_MIN_THRESHOLD: f32 = 0.3;

/// Rule weights, in evaluation order.
const W_PHRASE_TITLE: f32 = 0.5;
const W_PHRASE_BODY: f32 = 0.25;
const W_ALL_WORDS_TITLE: f32 = 0.3;
const W_PARTIAL_WORDS_TITLE: f32 = 0.15;
const W_ALL_WORDS_BODY: f32 = 0.15;
const W_SUBREDDIT: f32 = 0.1;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]+\b").expect("word regex"));

/// A post with its relevance score and the rules that fired.
#[derive(Debug, Clone)]
pub struct ScoredPost {
    pub post: RedditPost,
    pub relevance_score: f32,
    pub match_reasons: Vec<String>,
}

/// Scores posts for relevance to a query.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    min_threshold: f32,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_THRESHOLD)
    }
}

impl RelevanceScorer {
    /// `min_threshold` is clamped into [0, 1]; 0.3 is moderate strictness.
    pub fn new(min_threshold: f32) -> Self {
        Self {
            min_threshold: min_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn min_threshold(&self) -> f32 {
        self.min_threshold
    }

    /// Score a single post against `query`.
    pub fn score_post(&self, post: RedditPost, query: &str) -> ScoredPost {
        let mut score = 0.0f32;
        let mut reasons = Vec::new();

        let query_lower = query.trim().to_lowercase();
        let query_words: HashSet<&str> = query_lower.split_whitespace().collect();
        let phrases = extract_phrases(&query_lower);

        let title = post.title.to_lowercase();
        let body = post.body.to_lowercase();

        // 1) Exact phrase match in title (highest weight)
        for phrase in &phrases {
            if title.contains(phrase.as_str()) {
                score += W_PHRASE_TITLE;
                reasons.push(format!("Exact phrase '{phrase}' in title"));
                break;
            }
        }

        // 2) Exact phrase match in body
        for phrase in &phrases {
            if body.contains(phrase.as_str()) {
                score += W_PHRASE_BODY;
                reasons.push(format!("Exact phrase '{phrase}' in body"));
                break;
            }
        }

        // 3) All query words in title, else partial credit (mutually exclusive)
        let title_words = word_set(&title);
        if !query_words.is_empty() && query_words.iter().all(|w| title_words.contains(*w)) {
            score += W_ALL_WORDS_TITLE;
            reasons.push("All query words in title".to_string());
        } else if !query_words.is_empty() {
            let matched = query_words
                .iter()
                .filter(|w| title_words.contains(**w))
                .count();
            if matched > 0 {
                score += W_PARTIAL_WORDS_TITLE * (matched as f32 / query_words.len() as f32);
                reasons.push(format!(
                    "Partial match: {matched}/{} words",
                    query_words.len()
                ));
            }
        }

        // 4) All query words in body
        let body_words = word_set(&body);
        if !query_words.is_empty() && query_words.iter().all(|w| body_words.contains(*w)) {
            score += W_ALL_WORDS_BODY;
            reasons.push("All query words in body".to_string());
        }

        // 5) Query phrase inside the subreddit name (with or without spaces)
        let subreddit = post.subreddit.to_lowercase();
        if !subreddit.is_empty() {
            for phrase in &phrases {
                let condensed = phrase.replace(' ', "");
                if subreddit.contains(&condensed) || subreddit.contains(phrase.as_str()) {
                    score += W_SUBREDDIT;
                    reasons.push(format!("Query in subreddit: r/{}", post.subreddit));
                    break;
                }
            }
        }

        ScoredPost {
            post,
            relevance_score: score.min(1.0),
            match_reasons: reasons,
        }
    }

    /// Score every post and partition at the threshold. The relevant
    /// partition is ordered by `score * max(upvotes, 1)` descending (stable
    /// on ties); the filtered-out partition keeps input order.
    pub fn filter_posts(
        &self,
        posts: Vec<RedditPost>,
        query: &str,
    ) -> (Vec<ScoredPost>, Vec<ScoredPost>) {
        let scored: Vec<ScoredPost> = posts
            .into_iter()
            .map(|p| self.score_post(p, query))
            .collect();

        let (mut relevant, filtered_out): (Vec<_>, Vec<_>) = scored
            .into_iter()
            .partition(|sp| sp.relevance_score >= self.min_threshold);

        relevant.sort_by(|a, b| {
            combined_rank(b)
                .partial_cmp(&combined_rank(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        (relevant, filtered_out)
    }
}

/// Relevance weighted by popularity; unpopular posts still rank by score.
fn combined_rank(sp: &ScoredPost) -> f64 {
    f64::from(sp.relevance_score) * sp.post.upvotes.max(1) as f64
}

/// Full query plus every adjacent-word bigram.
fn extract_phrases(query_lower: &str) -> Vec<String> {
    let mut phrases = vec![query_lower.to_string()];
    let words: Vec<&str> = query_lower.split_whitespace().collect();
    if words.len() >= 2 {
        for pair in words.windows(2) {
            phrases.push(format!("{} {}", pair[0], pair[1]));
        }
    }
    phrases
}

fn word_set(text_lower: &str) -> HashSet<&str> {
    WORD_RE.find_iter(text_lower).map(|m| m.as_str()).collect()
}
