// src/config.rs
//! Layered configuration: TOML file (path overridable via env) with
//! per-knob env overrides and sane defaults baked into `Default`. Secrets
//! (Reddit token, OpenRouter key) come from the environment only.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

pub const DEFAULT_DISCOVERY_CONFIG_PATH: &str = "config/discovery.toml";

pub const ENV_DISCOVERY_CONFIG_PATH: &str = "DISCOVERY_CONFIG_PATH";
pub const ENV_RELEVANCE_THRESHOLD: &str = "RELEVANCE_THRESHOLD";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub relevance: RelevanceCfg,
    #[serde(default)]
    pub fetch: FetchCfg,
    #[serde(default)]
    pub rate_limit: RateLimitCfg,
    #[serde(default)]
    pub retry: RetryCfg,
    #[serde(default)]
    pub cache: CacheCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceCfg {
    pub min_threshold: f32,
}

impl Default for RelevanceCfg {
    fn default() -> Self {
        Self {
            min_threshold: crate::relevance::DEFAULT_MIN_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchCfg {
    pub total_limit: u32,
    pub batch_size: u32,
    pub min_relevant: usize,
    pub comment_limit: u32,
}

impl Default for FetchCfg {
    fn default() -> Self {
        Self {
            total_limit: 100,
            batch_size: 5,
            min_relevant: 3,
            comment_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitCfg {
    pub per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitCfg {
    fn default() -> Self {
        Self {
            per_second: 1.0,
            burst: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryCfg {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 60.0,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryCfg {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs_f64(self.base_delay_secs),
            max_delay: Duration::from_secs_f64(self.max_delay_secs),
            exponential_base: self.exponential_base,
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheCfg {
    pub ttl_secs: u64,
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self { ttl_secs: 900 }
    }
}

impl CacheCfg {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

impl DiscoveryConfig {
    /// Load from DISCOVERY_CONFIG_PATH (default `config/discovery.toml`),
    /// falling back to defaults when the file is absent, then apply env
    /// overrides.
    pub fn load() -> Self {
        let path = std::env::var(ENV_DISCOVERY_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DISCOVERY_CONFIG_PATH));

        let mut cfg = match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content).unwrap_or_else(|e| {
                tracing::warn!(target: "config", error = %e, path = %path.display(), "invalid discovery config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };

        if let Some(t) = parse_threshold_env(std::env::var(ENV_RELEVANCE_THRESHOLD).ok()) {
            cfg.relevance.min_threshold = t;
        } else if !cfg.relevance.min_threshold.is_finite() {
            cfg.relevance.min_threshold = crate::relevance::DEFAULT_MIN_THRESHOLD;
        }

        cfg
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }
}

/// API secrets resolved from the environment. Missing variables are
/// reported together so one pass fixes them all.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub reddit_access_token: String,
    pub reddit_user_agent: String,
    pub openrouter_api_key: String,
    pub openrouter_model: Option<String>,
}

impl ApiCredentials {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut missing = Vec::new();
        let mut get = |name: &'static str| match std::env::var(name) {
            Ok(v) if !v.is_empty() => Some(v),
            _ => {
                missing.push(name);
                None
            }
        };

        let reddit_access_token = get("REDDIT_ACCESS_TOKEN");
        let reddit_user_agent = get("REDDIT_USER_AGENT");
        let openrouter_api_key = get("OPENROUTER_API_KEY");

        if !missing.is_empty() {
            anyhow::bail!(
                "missing required environment variables: {}",
                missing.join(", ")
            );
        }

        Ok(Self {
            reddit_access_token: reddit_access_token.expect("checked above"),
            reddit_user_agent: reddit_user_agent.expect("checked above"),
            openrouter_api_key: openrouter_api_key.expect("checked above"),
            openrouter_model: std::env::var("OPENROUTER_MODEL").ok().filter(|v| !v.is_empty()),
        })
    }
}
