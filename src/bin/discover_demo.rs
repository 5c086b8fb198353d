//! Demo that runs one discovery and one context lookup against live APIs.
//! Requires REDDIT_ACCESS_TOKEN, REDDIT_USER_AGENT, and OPENROUTER_API_KEY.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use reddit_insight_miner::analysis::openrouter::OpenRouterAnalyzer;
use reddit_insight_miner::{
    ApiCredentials, DiscoveryConfig, DiscoveryParams, RedditClient, ResearchService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "electric cars".to_string());

    let cfg = DiscoveryConfig::load();
    let creds = ApiCredentials::from_env()?;

    let source = Arc::new(RedditClient::from_credentials(&creds, &cfg));
    let analyzer = Arc::new(
        OpenRouterAnalyzer::new(&creds.openrouter_api_key, creds.openrouter_model.as_deref())
            .with_retry(cfg.retry.to_policy()),
    );
    let service = ResearchService::with_config(source, analyzer, &cfg);

    let result = service
        .discover(&query, &DiscoveryParams::from_config(&cfg))
        .await?;

    println!("Research for: {}", result.query);
    println!("\nContent ideas:");
    for (i, idea) in result.content_ideas.iter().enumerate() {
        println!("  {}. {} — {}", i + 1, idea.title, idea.description);
    }
    println!("\nPain points:");
    for pp in &result.pain_points {
        println!("  - {} (+{})", pp.description, pp.upvotes);
    }
    println!("\nQuestions: {:#?}", result.questions);
    println!("Keywords: {}", result.keywords.join(", "));

    if let Some(idea) = result.content_ideas.first() {
        let ctx = service.get_context(&query, &idea.title).await?;
        let preview: String = ctx
            .full_post_and_comment_analysis
            .chars()
            .take(400)
            .collect();
        println!("\nDetailed context for '{}':", ctx.idea_title);
        println!("{preview}...");
        println!(
            "(tone: {}, depth: {:?}, category: {})",
            ctx.emotional_aspect, ctx.knowledge_depth, ctx.category
        );
    }

    println!("discover-demo done");
    Ok(())
}
