// src/reddit/client.rs
//! Reqwest-backed `PostSource`: search and comment fetch against the Reddit
//! JSON API, gated by the token bucket and the retry policy.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;

use crate::config::{ApiCredentials, DiscoveryConfig};
use crate::error::{ResearchError, Result};
use crate::rate_limit::TokenBucketRateLimiter;
use crate::reddit::{PostSource, RedditComment, RedditPost, TimeWindow};
use crate::retry::RetryPolicy;

const SEARCH_URL: &str = "https://oauth.reddit.com/search";
const COMMENTS_URL: &str = "https://oauth.reddit.com/comments";

/// Largest page the listing endpoint serves.
const MAX_LISTING_LIMIT: u32 = 100;

pub struct RedditClient {
    http: reqwest::Client,
    access_token: Option<String>,
    rate_limiter: TokenBucketRateLimiter,
    retry: RetryPolicy,
}

impl RedditClient {
    /// `access_token` is optional so an identity that has not authorized yet
    /// can still be constructed; its searches fail with
    /// `AuthorizationRequired` until a token exists.
    pub fn new(user_agent: &str, access_token: Option<String>, cfg: &DiscoveryConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            access_token,
            rate_limiter: TokenBucketRateLimiter::new(
                cfg.rate_limit.per_second,
                cfg.rate_limit.burst,
            ),
            retry: cfg.retry.to_policy(),
        }
    }

    pub fn from_credentials(creds: &ApiCredentials, cfg: &DiscoveryConfig) -> Self {
        Self::new(
            &creds.reddit_user_agent,
            Some(creds.reddit_access_token.clone()),
            cfg,
        )
    }

    async fn try_fetch_comments(
        &self,
        token: &str,
        post: &RedditPost,
        limit: u32,
    ) -> Result<Vec<RedditComment>> {
        let url = format!("{COMMENTS_URL}/{}", post.id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("limit", limit.to_string()),
                ("depth", "1".to_string()),
                ("raw_json", "1".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ResearchError::transient(format!(
                "comment fetch returned {status}"
            )));
        }

        // The comments endpoint returns two listings: the post itself, then
        // its comment tree.
        let pages: Vec<Listing> = resp.json().await?;
        let Some(comments_page) = pages.into_iter().nth(1) else {
            return Ok(Vec::new());
        };

        Ok(comments_page
            .data
            .children
            .into_iter()
            .filter(|c| c.kind == "t1")
            .take(limit as usize)
            .map(|c| RedditComment {
                body: c.data.body.unwrap_or_default(),
                upvotes: c.data.score.unwrap_or(0),
            })
            .collect())
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn search(
        &self,
        query: &str,
        limit: u32,
        window: TimeWindow,
        skip: u32,
    ) -> Result<Vec<RedditPost>> {
        let Some(token) = self.access_token.as_deref() else {
            return Err(ResearchError::AuthorizationRequired);
        };

        // The listing endpoint pages by opaque cursor, not numeric offset:
        // fetch the first `skip + limit` results and slice off the prefix.
        let want = (skip + limit).min(MAX_LISTING_LIMIT);

        self.retry
            .run("reddit-search", ResearchError::is_retryable, || async {
                self.rate_limiter.acquire().await;
                counter!("source_search_total").increment(1);

                let resp = self
                    .http
                    .get(SEARCH_URL)
                    .bearer_auth(token)
                    .query(&[
                        ("q", query),
                        ("t", window.as_str()),
                        ("sort", "relevance"),
                        ("type", "link"),
                        ("raw_json", "1"),
                    ])
                    .query(&[("limit", want)])
                    .send()
                    .await?;

                let status = resp.status();
                if status == reqwest::StatusCode::UNAUTHORIZED
                    || status == reqwest::StatusCode::FORBIDDEN
                {
                    return Err(ResearchError::AuthorizationRequired);
                }
                if !status.is_success() {
                    counter!("source_search_errors_total").increment(1);
                    return Err(ResearchError::transient(format!(
                        "search returned {status}"
                    )));
                }

                let listing: Listing = resp.json().await?;
                Ok(listing
                    .data
                    .children
                    .into_iter()
                    .filter(|c| c.kind == "t3")
                    .skip(skip as usize)
                    .take(limit as usize)
                    .map(|c| RedditPost {
                        id: c.data.id,
                        title: c.data.title.unwrap_or_default(),
                        body: c.data.selftext.unwrap_or_default(),
                        upvotes: c.data.score.unwrap_or(0),
                        subreddit: c.data.subreddit.unwrap_or_default(),
                    })
                    .collect())
            })
            .await
    }

    async fn fetch_comments(&self, post: &RedditPost, limit: u32) -> Vec<RedditComment> {
        let Some(token) = self.access_token.as_deref() else {
            return Vec::new();
        };

        self.rate_limiter.acquire().await;

        // Unavailable comment trees degrade to empty rather than failing
        // the discovery run.
        match self.try_fetch_comments(token, post, limit).await {
            Ok(comments) => comments,
            Err(e) => {
                tracing::debug!(
                    target: "reddit",
                    post = %post.id,
                    error = %e,
                    "comment fetch failed, continuing without comments"
                );
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    kind: String,
    data: ChildData,
}

#[derive(Debug, Deserialize)]
struct ChildData {
    #[serde(default)]
    id: String,
    title: Option<String>,
    selftext: Option<String>,
    score: Option<i64>,
    subreddit: Option<String>,
    body: Option<String>,
}
