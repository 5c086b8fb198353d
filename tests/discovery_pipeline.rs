// tests/discovery_pipeline.rs
// Integration tests for the incremental discovery loop, driven through
// scripted mock implementations of the source and analyzer traits.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reddit_insight_miner::analysis::{
    ContentIdea, Controversy, DetailedContext, EngagementSignals, InsightAnalyzer, KnowledgeDepth,
    PainPoint, PostDigest,
};
use reddit_insight_miner::error::Result;
use reddit_insight_miner::reddit::{PostSource, RedditComment, RedditPost, TimeWindow};
use reddit_insight_miner::research::{DiscoveryParams, ResearchService};

/// Source that serves pre-scripted search batches and records every call.
struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<RedditPost>>>,
    calls: Mutex<Vec<(u32, u32)>>, // (limit, skip)
    comments: HashMap<String, Vec<RedditComment>>,
}

impl ScriptedSource {
    fn new(batches: Vec<Vec<RedditPost>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: Mutex::new(Vec::new()),
            comments: HashMap::new(),
        }
    }

    fn with_comments(mut self, post_id: &str, comments: Vec<RedditComment>) -> Self {
        self.comments.insert(post_id.to_string(), comments);
        self
    }

    fn calls(&self) -> Vec<(u32, u32)> {
        self.calls.lock().expect("calls mutex").clone()
    }
}

#[async_trait]
impl PostSource for ScriptedSource {
    async fn search(
        &self,
        _query: &str,
        limit: u32,
        _window: TimeWindow,
        skip: u32,
    ) -> Result<Vec<RedditPost>> {
        self.calls.lock().expect("calls mutex").push((limit, skip));
        Ok(self
            .batches
            .lock()
            .expect("batches mutex")
            .pop_front()
            .unwrap_or_default())
    }

    async fn fetch_comments(&self, post: &RedditPost, _limit: u32) -> Vec<RedditComment> {
        // Posts without scripted comments behave like failed fetches:
        // they degrade to an empty list.
        self.comments.get(&post.id).cloned().unwrap_or_default()
    }
}

/// Analyzer returning fixed insights; the context narrative records how many
/// posts it received.
struct StubAnalyzer {
    ideas: Vec<ContentIdea>,
    pain_points: Vec<PainPoint>,
}

impl StubAnalyzer {
    fn new() -> Self {
        Self {
            ideas: vec![
                idea("10 Tips for EV Charging"),
                idea("EV Battery Myths"),
            ],
            pain_points: vec![PainPoint {
                description: "charging takes too long".into(),
                solution_summary: "use level 2 at home".into(),
                upvotes: 120,
            }],
        }
    }

    fn with_ideas(mut self, ideas: Vec<ContentIdea>) -> Self {
        self.ideas = ideas;
        self
    }
}

fn idea(title: &str) -> ContentIdea {
    ContentIdea {
        title: title.to_string(),
        description: format!("{title} description"),
        rationale: "community demand".into(),
    }
}

#[async_trait]
impl InsightAnalyzer for StubAnalyzer {
    async fn analyze_pain_points(
        &self,
        _query: &str,
        _posts: &[PostDigest],
    ) -> Result<Vec<PainPoint>> {
        Ok(self.pain_points.clone())
    }

    async fn generate_content_ideas(
        &self,
        _query: &str,
        _posts: &[PostDigest],
        _pain_points: &[PainPoint],
    ) -> Result<Vec<ContentIdea>> {
        Ok(self.ideas.clone())
    }

    async fn generate_detailed_context(
        &self,
        idea_title: &str,
        idea_description: &str,
        posts: &[PostDigest],
    ) -> Result<DetailedContext> {
        Ok(DetailedContext {
            idea_title: idea_title.to_string(),
            idea_description: idea_description.to_string(),
            full_post_and_comment_analysis: format!("analysis of {} posts", posts.len()),
            emotional_aspect: "curious".into(),
            controversial_aspect: Controversy {
                is_controversial: false,
                for_against_split: "n/a".into(),
            },
            engagement_signals: EngagementSignals {
                popularity: "medium".into(),
                virality_potential: "medium".into(),
            },
            knowledge_depth: KnowledgeDepth::Intermediate,
            category: "Guide".into(),
        })
    }
}

fn relevant_post(id: &str, upvotes: i64) -> RedditPost {
    RedditPost {
        id: id.to_string(),
        title: format!("Why electric cars are the future ({id})"),
        body: "thoughts on electric cars".into(),
        upvotes,
        subreddit: "electricvehicles".into(),
    }
}

fn noise_post(id: &str) -> RedditPost {
    RedditPost {
        id: id.to_string(),
        title: format!("Best sourdough recipe ({id})"),
        body: "flour, water, salt".into(),
        upvotes: 999,
        subreddit: "baking".into(),
    }
}

fn service(source: Arc<ScriptedSource>, analyzer: StubAnalyzer) -> ResearchService {
    ResearchService::new(source, Arc::new(analyzer))
}

fn params() -> DiscoveryParams {
    DiscoveryParams {
        time_window: TimeWindow::Month,
        total_limit: 100,
        batch_size: 5,
        min_relevant: 3,
    }
}

#[tokio::test]
async fn early_stop_after_enough_relevant_posts() {
    // Batch 1 yields one relevant post, batch 2 three more: the loop must
    // issue exactly two search calls, offset by the fetched count.
    let source = Arc::new(ScriptedSource::new(vec![
        vec![
            relevant_post("a1", 10),
            noise_post("n1"),
            noise_post("n2"),
            noise_post("n3"),
            noise_post("n4"),
        ],
        vec![
            relevant_post("b1", 30),
            relevant_post("b2", 20),
            relevant_post("b3", 5),
            noise_post("n5"),
            noise_post("n6"),
        ],
        vec![relevant_post("c1", 1)], // must never be requested
    ]));
    let svc = service(source.clone(), StubAnalyzer::new());

    let result = svc
        .discover("electric cars", &params())
        .await
        .expect("discovery succeeds");

    assert_eq!(source.calls(), vec![(5, 0), (5, 5)]);
    assert_eq!(result.raw_posts.len(), 4);
}

#[tokio::test]
async fn exhausted_source_proceeds_below_min_relevant() {
    // One thin batch, then the source dries up. Discovery still completes
    // with whatever accumulated.
    let source = Arc::new(ScriptedSource::new(vec![vec![
        relevant_post("a1", 10),
        noise_post("n1"),
    ]]));
    let svc = service(source.clone(), StubAnalyzer::new());

    let result = svc
        .discover("electric cars", &params())
        .await
        .expect("discovery succeeds despite thin source");

    // Second call hit the exhausted source and returned nothing.
    assert_eq!(source.calls(), vec![(5, 0), (5, 2)]);
    assert_eq!(result.raw_posts.len(), 1);
    assert!(!result.content_ideas.is_empty());
}

#[tokio::test]
async fn final_batch_is_clamped_to_total_limit() {
    let source = Arc::new(ScriptedSource::new(vec![
        vec![
            noise_post("n1"),
            noise_post("n2"),
            noise_post("n3"),
            noise_post("n4"),
            noise_post("n5"),
        ],
        vec![noise_post("n6")],
    ]));
    let svc = service(source.clone(), StubAnalyzer::new());

    let mut p = params();
    p.total_limit = 6;
    svc.discover("electric cars", &p)
        .await
        .expect("discovery completes");

    // 5 fetched, 1 remaining under the cap: the last request asks for 1.
    assert_eq!(source.calls(), vec![(5, 0), (1, 5)]);
}

#[tokio::test]
async fn one_failed_comment_fetch_does_not_lose_the_batch() {
    let source = Arc::new(
        ScriptedSource::new(vec![vec![
            relevant_post("ok", 50),
            relevant_post("broken", 40),
            relevant_post("alsook", 30),
        ]])
        .with_comments(
            "ok",
            vec![RedditComment {
                body: "works for me".into(),
                upvotes: 9,
            }],
        )
        .with_comments(
            "alsook",
            vec![RedditComment {
                body: "same here".into(),
                upvotes: 4,
            }],
        ),
    );
    let svc = service(source, StubAnalyzer::new());

    let result = svc
        .discover("electric cars", &params())
        .await
        .expect("partial comment failure is not fatal");

    assert_eq!(result.raw_posts.len(), 3);
    let empty: Vec<_> = result
        .raw_posts
        .iter()
        .filter(|d| d.comments.is_empty())
        .collect();
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].upvotes, 40);
}

#[tokio::test]
async fn comment_enrichment_targets_most_popular_posts() {
    // 25 relevant posts; only the top 20 by upvotes get comment fetches.
    let batch: Vec<RedditPost> = (0..25)
        .map(|i| relevant_post(&format!("p{i}"), i64::from(i)))
        .collect();
    let source = Arc::new(ScriptedSource::new(vec![batch]));
    let svc = service(source, StubAnalyzer::new());

    let result = svc
        .discover("electric cars", &params())
        .await
        .expect("discovery succeeds");

    assert_eq!(result.raw_posts.len(), 20);
    // Ordered by upvotes descending; the five least popular were skipped.
    assert_eq!(result.raw_posts[0].upvotes, 24);
    assert!(result.raw_posts.iter().all(|d| d.upvotes >= 5));
}

#[tokio::test]
async fn insight_lists_are_truncated_to_ten() {
    let many_ideas: Vec<ContentIdea> = (0..15).map(|i| idea(&format!("Idea {i}"))).collect();
    let source = Arc::new(ScriptedSource::new(vec![vec![
        relevant_post("a1", 10),
        relevant_post("a2", 9),
        relevant_post("a3", 8),
    ]]));
    let svc = service(source, StubAnalyzer::new().with_ideas(many_ideas));

    let result = svc
        .discover("electric cars", &params())
        .await
        .expect("discovery succeeds");

    assert_eq!(result.content_ideas.len(), 10);
}

#[tokio::test]
async fn questions_and_keywords_come_from_relevant_posts() {
    let mut question_post = relevant_post("q1", 70);
    question_post.title = "Why are electric cars so expensive to insure?".into();
    let source = Arc::new(ScriptedSource::new(vec![vec![
        question_post,
        relevant_post("a1", 10),
        relevant_post("a2", 5),
    ]]));
    let svc = service(source, StubAnalyzer::new());

    let result = svc
        .discover("electric cars", &params())
        .await
        .expect("discovery succeeds");

    assert!(result
        .questions
        .contains(&"Why are electric cars so expensive to insure?".to_string()));
    assert!(result.keywords.iter().any(|k| k.contains("electric")));
}
