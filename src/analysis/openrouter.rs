// src/analysis/openrouter.rs
//! OpenRouter chat-completions adapter implementing `InsightAnalyzer`.
//! Structured output is requested via strict `json_schema` response formats;
//! responses are fence-stripped and deserialized into the typed insight
//! shapes. HTTP failures are retried with backoff.

use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analysis::{ContentIdea, DetailedContext, InsightAnalyzer, PainPoint, PostDigest};
use crate::error::{ResearchError, Result};
use crate::retry::RetryPolicy;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "minimax/minimax-m2.1";

/// Posts included when formatting a prompt.
const PROMPT_MAX_POSTS: usize = 50;
const PROMPT_MAX_POSTS_CONTEXT: usize = 100;
const PROMPT_COMMENT_PREVIEWS: usize = 3;
const PROMPT_COMMENT_CHARS: usize = 200;
const PROMPT_BODY_CHARS: usize = 500;

const MAX_INSIGHTS: usize = 10;

pub struct OpenRouterAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenRouterAnalyzer {
    pub fn new(api_key: impl Into<String>, model: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("reddit-insight-miner/0.1 (+github.com/reddit-insight-miner)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One retried chat-completions call; returns the raw message content.
    async fn chat(
        &self,
        label: &str,
        messages: Vec<Message>,
        temperature: f32,
        response_format: Value,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: &'a [Message],
            temperature: f32,
            response_format: &'a Value,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: &messages,
            temperature,
            response_format: &response_format,
        };

        let t0 = std::time::Instant::now();
        let out = self
            .retry
            .run(label, ResearchError::is_retryable, || async {
                counter!("llm_requests_total").increment(1);
                let resp = self
                    .http
                    .post(OPENROUTER_URL)
                    .bearer_auth(&self.api_key)
                    .json(&req)
                    .send()
                    .await?;

                let status = resp.status();
                if !status.is_success() {
                    counter!("llm_request_errors_total").increment(1);
                    return Err(ResearchError::transient(format!(
                        "analysis backend returned {status}"
                    )));
                }

                let body: Resp = resp.json().await?;
                body.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| ResearchError::analysis("response carried no choices"))
            })
            .await;
        histogram!("llm_request_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        out
    }
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[async_trait]
impl InsightAnalyzer for OpenRouterAnalyzer {
    async fn analyze_pain_points(
        &self,
        query: &str,
        posts: &[PostDigest],
    ) -> Result<Vec<PainPoint>> {
        let posts_text = format_posts(posts, PROMPT_MAX_POSTS);
        let prompt = format!(
            "Analyze the following Reddit discussions and identify the TOP 10 pain \
             points people are discussing.\n\n\
             For EACH pain point: describe it clearly, summarize the top \
             community-voted solutions, and note overall sentiment.\n\n\
             IMPORTANT: only include pain points directly related to \"{query}\". \
             Ignore tangential topics that appeared in search results.\n\n\
             Reddit Discussions:\n{posts_text}\n\n\
             Return a JSON object with a `pain_points` array of up to 10 items."
        );

        let messages = vec![
            Message {
                role: "system",
                content: "You are an expert at analyzing community discussions and \
                          identifying key pain points with their solutions. Return \
                          structured JSON data."
                    .to_string(),
            },
            Message {
                role: "user",
                content: prompt,
            },
        ];

        let schema = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "pain_points_analysis",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "pain_points": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "description": { "type": "string" },
                                    "solution_summary": { "type": "string" },
                                    "upvotes": { "type": "integer" }
                                },
                                "required": ["description", "solution_summary", "upvotes"],
                                "additionalProperties": false
                            },
                            "maxItems": MAX_INSIGHTS
                        }
                    },
                    "required": ["pain_points"],
                    "additionalProperties": false
                }
            }
        });

        #[derive(Deserialize)]
        struct Envelope {
            pain_points: Vec<PainPoint>,
        }

        let raw = self.chat("pain-points", messages, 0.3, schema).await?;
        let env: Envelope = parse_structured(&raw)?;
        let mut out = env.pain_points;
        out.truncate(MAX_INSIGHTS);
        Ok(out)
    }

    async fn generate_content_ideas(
        &self,
        query: &str,
        posts: &[PostDigest],
        pain_points: &[PainPoint],
    ) -> Result<Vec<ContentIdea>> {
        let posts_text = format_posts(posts, PROMPT_MAX_POSTS);
        let pain_points_text = pain_points
            .iter()
            .take(MAX_INSIGHTS)
            .map(|pp| format!("- {}", pp.description))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Based on the following Reddit research about \"{query}\", generate 10 \
             compelling content ideas.\n\n\
             Pain Points Identified:\n{pain_points_text}\n\n\
             Sample Reddit Discussions:\n{posts_text}\n\n\
             For EACH idea provide a compelling title, a brief description of the \
             coverage, and why it would be valuable given the insights.\n\n\
             IMPORTANT: only generate ideas directly related to \"{query}\".\n\n\
             Return a JSON object with a `content_ideas` array of up to 10 items."
        );

        let messages = vec![
            Message {
                role: "system",
                content: "You are an expert content strategist who creates engaging \
                          content ideas based on community insights. Return structured \
                          JSON data."
                    .to_string(),
            },
            Message {
                role: "user",
                content: prompt,
            },
        ];

        let schema = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "content_ideas_generation",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "content_ideas": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": { "type": "string" },
                                    "description": { "type": "string" },
                                    "rationale": { "type": "string" }
                                },
                                "required": ["title", "description", "rationale"],
                                "additionalProperties": false
                            },
                            "maxItems": MAX_INSIGHTS
                        }
                    },
                    "required": ["content_ideas"],
                    "additionalProperties": false
                }
            }
        });

        #[derive(Deserialize)]
        struct Envelope {
            content_ideas: Vec<ContentIdea>,
        }

        let raw = self.chat("content-ideas", messages, 0.7, schema).await?;
        let env: Envelope = parse_structured(&raw)?;
        let mut out = env.content_ideas;
        out.truncate(MAX_INSIGHTS);
        Ok(out)
    }

    async fn generate_detailed_context(
        &self,
        idea_title: &str,
        idea_description: &str,
        posts: &[PostDigest],
    ) -> Result<DetailedContext> {
        let posts_text = format_posts(posts, PROMPT_MAX_POSTS_CONTEXT);
        let prompt = format!(
            "You are analyzing Reddit discussions to provide exhaustive context for \
             this content idea:\n\n\
             **Content Idea:** {idea_title}\n\
             **Description:** {idea_description}\n\n\
             Provide a comprehensive, case-study-level analysis of the discussions \
             below. It will be the ONLY context available downstream, so capture \
             motivations, debates, opposing viewpoints, recurring issues, sentiment \
             shifts, consensus and minority opinions, with concrete paraphrased \
             examples. The narrative must be 500-2000 words.\n\n\
             Also classify: dominant emotional tone; whether the topic is \
             controversial and the approximate split; popularity and virality \
             (high/medium/low); knowledge depth (beginner-friendly, intermediate, \
             or expert); and the primary content category.\n\n\
             **Reddit Discussions:**\n{posts_text}"
        );

        let messages = vec![
            Message {
                role: "system",
                content: "You are an expert social media content analyst who provides \
                          exhaustive, case-study-level analysis. Extract maximum \
                          context and nuance to enable high-quality content generation \
                          downstream."
                    .to_string(),
            },
            Message {
                role: "user",
                content: prompt,
            },
        ];

        let schema = json!({
            "type": "json_schema",
            "json_schema": {
                "name": "detailed_context_analysis",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": {
                        "idea_title": { "type": "string" },
                        "idea_description": { "type": "string" },
                        "full_post_and_comment_analysis": { "type": "string" },
                        "emotional_aspect": { "type": "string" },
                        "controversial_aspect": {
                            "type": "object",
                            "properties": {
                                "is_controversial": { "type": "boolean" },
                                "for_against_split": { "type": "string" }
                            },
                            "required": ["is_controversial", "for_against_split"],
                            "additionalProperties": false
                        },
                        "engagement_signals": {
                            "type": "object",
                            "properties": {
                                "popularity": { "type": "string" },
                                "virality_potential": { "type": "string" }
                            },
                            "required": ["popularity", "virality_potential"],
                            "additionalProperties": false
                        },
                        "knowledge_depth": {
                            "type": "string",
                            "enum": ["beginner-friendly", "intermediate", "expert"]
                        },
                        "category": { "type": "string" }
                    },
                    "required": [
                        "idea_title",
                        "idea_description",
                        "full_post_and_comment_analysis",
                        "emotional_aspect",
                        "controversial_aspect",
                        "engagement_signals",
                        "knowledge_depth",
                        "category"
                    ],
                    "additionalProperties": false
                }
            }
        });

        let raw = self.chat("detailed-context", messages, 0.5, schema).await?;
        parse_structured(&raw)
    }
}

/// Strip markdown code fences some models wrap around JSON output.
fn strip_code_fences(response: &str) -> &str {
    let mut s = response.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

fn parse_structured<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| ResearchError::analysis(e.to_string()))
}

/// Render posts + top comments into prompt text.
fn format_posts(posts: &[PostDigest], max_posts: usize) -> String {
    let mut formatted = Vec::with_capacity(posts.len().min(max_posts));
    for (i, post) in posts.iter().take(max_posts).enumerate() {
        let body: String = post.body.chars().take(PROMPT_BODY_CHARS).collect();
        let comments = post
            .comments
            .iter()
            .take(PROMPT_COMMENT_PREVIEWS)
            .map(|c| {
                let preview: String = c.body.chars().take(PROMPT_COMMENT_CHARS).collect();
                format!("  -> {} (+{})", preview, c.upvotes)
            })
            .collect::<Vec<_>>()
            .join("\n");
        formatted.push(format!(
            "Post {}: {} (+{})\n{}\nTop Comments:\n{}\n---",
            i + 1,
            post.title,
            post.upvotes,
            body,
            comments
        ));
    }
    formatted.join("\n")
}
