// src/research.rs
//! Discovery orchestration: incremental batch fetch with relevance-gated
//! early stop, parallel comment enrichment, concurrent insight extraction,
//! and the two-phase discover / get-context protocol over the cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::analysis::{ContentIdea, DetailedContext, InsightAnalyzer, PainPoint, PostDigest};
use crate::cache::DiscoveryCache;
use crate::config::DiscoveryConfig;
use crate::error::{ResearchError, Result};
use crate::extract::{extract_keywords, extract_questions};
use crate::reddit::{PostSource, RedditPost, TimeWindow};
use crate::relevance::{RelevanceScorer, ScoredPost};

/// Posts whose comment trees are fetched after the loop.
const TOP_POSTS_FOR_COMMENTS: usize = 20;

/// Upper bound on each insight list in a result.
const MAX_INSIGHTS: usize = 10;

/// One-time metrics registration (so series show up for any exporter).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("discovery_runs_total", "Discovery orchestrations started.");
        describe_counter!("discovery_batches_total", "Search batches fetched.");
        describe_counter!(
            "discovery_posts_fetched_total",
            "Posts returned by the source across all batches."
        );
        describe_counter!(
            "discovery_posts_relevant_total",
            "Posts that passed the relevance gate."
        );
        describe_counter!(
            "discovery_posts_filtered_total",
            "Posts rejected by the relevance gate."
        );
        describe_counter!(
            "discovery_early_stops_total",
            "Runs that stopped before the total fetch limit."
        );
        describe_counter!(
            "comment_fetches_empty_total",
            "Comment fetches that degraded to an empty list."
        );
        describe_counter!("llm_requests_total", "Analysis backend calls issued.");
        describe_counter!("llm_request_errors_total", "Analysis backend call failures.");
        describe_histogram!("llm_request_ms", "Analysis backend latency in milliseconds.");
        describe_counter!("discovery_cache_hits_total", "Context lookups served from cache.");
        describe_counter!("discovery_cache_misses_total", "Context lookups with no entry.");
        describe_counter!(
            "discovery_cache_expired_total",
            "Context lookups that hit an expired entry."
        );
        describe_counter!(
            "discovery_cache_evictions_total",
            "Expired entries removed by the insert-time sweep."
        );
        describe_gauge!(
            "discovery_last_run_posts",
            "Posts fetched by the most recent discovery run."
        );
    });
}

/// Short anonymized id for queries in logs; raw query text is never logged.
fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Knobs for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryParams {
    pub time_window: TimeWindow,
    /// Hard cap on posts fetched from the source.
    pub total_limit: u32,
    /// Posts requested per search call.
    pub batch_size: u32,
    /// Relevant posts that end the fetch loop early.
    pub min_relevant: usize,
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            time_window: TimeWindow::Month,
            total_limit: 100,
            batch_size: 5,
            min_relevant: 3,
        }
    }
}

impl DiscoveryParams {
    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self {
            time_window: TimeWindow::Month,
            total_limit: cfg.fetch.total_limit,
            batch_size: cfg.fetch.batch_size,
            min_relevant: cfg.fetch.min_relevant,
        }
    }
}

/// Complete phase-1 output for one query, owned by its cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub query: String,
    pub questions: Vec<String>,
    pub keywords: Vec<String>,
    pub pain_points: Vec<PainPoint>,
    pub content_ideas: Vec<ContentIdea>,
    /// Trimmed post + comment payload kept for phase-2 context generation.
    pub raw_posts: Vec<PostDigest>,
    pub generated_at: DateTime<Utc>,
}

/// Orchestrates source fetching, relevance filtering, and LLM analysis.
pub struct ResearchService {
    source: Arc<dyn PostSource>,
    analyzer: Arc<dyn InsightAnalyzer>,
    scorer: RelevanceScorer,
    cache: DiscoveryCache,
    comment_limit: u32,
}

impl ResearchService {
    pub fn new(source: Arc<dyn PostSource>, analyzer: Arc<dyn InsightAnalyzer>) -> Self {
        Self::with_config(source, analyzer, &DiscoveryConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn PostSource>,
        analyzer: Arc<dyn InsightAnalyzer>,
        cfg: &DiscoveryConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            source,
            analyzer,
            scorer: RelevanceScorer::new(cfg.relevance.min_threshold),
            cache: DiscoveryCache::new(cfg.cache.ttl()),
            comment_limit: cfg.fetch.comment_limit,
        }
    }

    /// Phase 1: run a full discovery for `query` and cache the result.
    ///
    /// Always performs a fresh orchestration; an existing entry for the same
    /// query string is overwritten, never served.
    pub async fn discover(
        &self,
        query: &str,
        params: &DiscoveryParams,
    ) -> Result<Arc<DiscoveryResult>> {
        let qid = anon_hash(query);
        counter!("discovery_runs_total").increment(1);
        tracing::info!(target: "research", %qid, window = params.time_window.as_str(), "starting discovery");

        let relevant = self.fetch_relevant(query, params).await?;

        let posts: Vec<RedditPost> = relevant.iter().map(|sp| sp.post.clone()).collect();

        // Enrich the most popular posts with their comment trees, in parallel.
        // A failed fetch yields an empty list; it never aborts the batch.
        let mut top_posts = posts.clone();
        top_posts.sort_by(|a, b| b.upvotes.cmp(&a.upvotes));
        top_posts.truncate(TOP_POSTS_FOR_COMMENTS);

        let fetches = top_posts
            .iter()
            .map(|p| self.source.fetch_comments(p, self.comment_limit));
        let all_comments = futures::future::join_all(fetches).await;

        let digests: Vec<PostDigest> = top_posts
            .iter()
            .zip(all_comments.iter())
            .map(|(post, comments)| {
                if comments.is_empty() {
                    counter!("comment_fetches_empty_total").increment(1);
                }
                PostDigest::from_post(post, comments)
            })
            .collect();

        tracing::info!(target: "research", %qid, enriched = digests.len(), "fetched comment trees");

        // Question/keyword extraction and pain-point analysis are independent.
        let (questions, keywords, pain_points) = tokio::join!(
            async { extract_questions(&posts) },
            async { extract_keywords(&posts) },
            self.analyzer.analyze_pain_points(query, &digests),
        );
        let pain_points = pain_points?;

        // Idea generation consumes the pain points, so it runs after them.
        let content_ideas = self
            .analyzer
            .generate_content_ideas(query, &digests, &pain_points)
            .await?;

        let mut result = DiscoveryResult {
            query: query.to_string(),
            questions,
            keywords,
            pain_points,
            content_ideas,
            raw_posts: digests,
            generated_at: Utc::now(),
        };
        result.questions.truncate(MAX_INSIGHTS);
        result.keywords.truncate(MAX_INSIGHTS);
        result.pain_points.truncate(MAX_INSIGHTS);
        result.content_ideas.truncate(MAX_INSIGHTS);

        tracing::info!(
            target: "research",
            %qid,
            ideas = result.content_ideas.len(),
            pain_points = result.pain_points.len(),
            questions = result.questions.len(),
            keywords = result.keywords.len(),
            "discovery complete"
        );

        Ok(self.cache.insert(query, result))
    }

    /// Phase 2: generate detailed context for one previously discovered idea.
    pub async fn get_context(&self, query: &str, idea_title: &str) -> Result<DetailedContext> {
        let entry = self.cache.get(query)?;
        let idea = resolve_idea(&entry.content_ideas, idea_title)?;

        tracing::info!(
            target: "research",
            qid = %anon_hash(query),
            idea = %idea.title,
            "generating detailed context"
        );

        self.analyzer
            .generate_detailed_context(&idea.title, &idea.description, &entry.raw_posts)
            .await
    }

    /// Incremental batch-fetch loop. Batches run strictly sequentially
    /// (each skip offset depends on the count fetched so far) and each batch
    /// is scored on its own, never against earlier batches.
    async fn fetch_relevant(
        &self,
        query: &str,
        params: &DiscoveryParams,
    ) -> Result<Vec<ScoredPost>> {
        let qid = anon_hash(query);
        let mut fetched: u32 = 0;
        let mut relevant: Vec<ScoredPost> = Vec::new();
        let mut exhausted = false;

        while fetched < params.total_limit {
            let want = params.batch_size.min(params.total_limit - fetched);
            let batch = self
                .source
                .search(query, want, params.time_window, fetched)
                .await?;
            counter!("discovery_batches_total").increment(1);

            if batch.is_empty() {
                exhausted = true;
                break;
            }

            fetched += batch.len() as u32;
            counter!("discovery_posts_fetched_total").increment(batch.len() as u64);

            let (mut batch_relevant, batch_filtered) = self.scorer.filter_posts(batch, query);
            counter!("discovery_posts_relevant_total").increment(batch_relevant.len() as u64);
            counter!("discovery_posts_filtered_total").increment(batch_filtered.len() as u64);

            tracing::debug!(
                target: "research",
                %qid,
                fetched,
                kept = batch_relevant.len(),
                dropped = batch_filtered.len(),
                "scored batch"
            );
            relevant.append(&mut batch_relevant);

            if relevant.len() >= params.min_relevant {
                counter!("discovery_early_stops_total").increment(1);
                tracing::info!(target: "research", %qid, fetched, relevant = relevant.len(), "stopping early");
                break;
            }
        }

        gauge!("discovery_last_run_posts").set(fetched as f64);

        // Source exhaustion below min_relevant is not an error: proceed with
        // whatever accumulated.
        if exhausted && relevant.len() < params.min_relevant {
            tracing::warn!(
                target: "research",
                %qid,
                relevant = relevant.len(),
                min_relevant = params.min_relevant,
                "source exhausted before reaching the relevance target"
            );
        }

        Ok(relevant)
    }
}

/// Resolve a requested idea title: exact match first, then case-insensitive
/// substring in either direction. Among several substring candidates the
/// closest by normalized Levenshtein similarity wins.
fn resolve_idea<'a>(ideas: &'a [ContentIdea], requested: &str) -> Result<&'a ContentIdea> {
    if let Some(idea) = ideas.iter().find(|i| i.title == requested) {
        return Ok(idea);
    }

    let requested_lower = requested.to_lowercase();
    let best = ideas
        .iter()
        .filter(|i| {
            let title_lower = i.title.to_lowercase();
            title_lower.contains(&requested_lower) || requested_lower.contains(&title_lower)
        })
        .max_by(|a, b| {
            let sa = strsim::normalized_levenshtein(&a.title.to_lowercase(), &requested_lower);
            let sb = strsim::normalized_levenshtein(&b.title.to_lowercase(), &requested_lower);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        });

    best.ok_or_else(|| ResearchError::IdeaNotFound {
        requested: requested.to_string(),
        available: ideas.iter().map(|i| i.title.clone()).collect(),
    })
}
