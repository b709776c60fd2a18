//! Environment-backed configuration. `.env` is loaded with `dotenvy` the
//! same way the teacher's own dev setup does, before any variable is read.

use std::time::Duration;

use crate::error::CoreError;
use crate::federator::{FederatorConfig, PrioritizationWeights};
use crate::model::quality::QualityGateConfig;

#[derive(Clone, Debug)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub openrouter_model: String,
    pub openalex_email: Option<String>,
    pub pubmed_api_key: Option<String>,
    pub core_api_key: Option<String>,
    pub semantic_scholar_api_key: Option<String>,

    pub max_search_rounds: u32,
    pub max_iterations: u32,
    pub min_papers_required: u32,
    pub enable_multi_source: bool,
    pub enable_citation_validation: bool,
    pub enable_context_compression: bool,
    pub citation_style: crate::citations::CitationStyle,
    pub quality_gate: QualityGateConfig,

    pub checkpoint_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub session_remove_after: Duration,
    pub max_live_sessions: usize,

    pub federator: FederatorConfig,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_u32(name: &str, default: u32) -> u32 {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Settings {
    /// Loads `.env` (if present) then reads the process environment.
    /// `OPENROUTER_API_KEY` is the only required variable.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();

        let openrouter_api_key = env_var("OPENROUTER_API_KEY").ok_or_else(|| CoreError::Auth {
            env_var: "OPENROUTER_API_KEY".into(),
        })?;

        Ok(Self {
            openrouter_api_key,
            openrouter_model: env_var("OPENROUTER_MODEL").unwrap_or_else(|| "anthropic/claude-3.5-sonnet".into()),
            openalex_email: env_var("OPENALEX_EMAIL"),
            pubmed_api_key: env_var("PUBMED_API_KEY"),
            core_api_key: env_var("CORE_API_KEY"),
            semantic_scholar_api_key: env_var("SEMANTIC_SCHOLAR_API_KEY"),

            max_search_rounds: env_u32("MAX_SEARCH_ROUNDS", 5),
            max_iterations: env_u32("MAX_ITERATIONS", 3),
            min_papers_required: env_u32("MIN_PAPERS_REQUIRED", 5),
            enable_multi_source: env_bool("ENABLE_MULTI_SOURCE", true),
            enable_citation_validation: env_bool("ENABLE_CITATION_VALIDATION", true),
            enable_context_compression: env_bool("ENABLE_CONTEXT_COMPRESSION", true),
            citation_style: crate::citations::CitationStyle::Apa,
            quality_gate: QualityGateConfig {
                min_overall_score: env_f64("QUALITY_MIN_OVERALL_SCORE", 70.0),
                max_iterations: env_u32("MAX_ITERATIONS", 3),
            },

            checkpoint_timeout: Duration::from_secs(env_u32("CHECKPOINT_TIMEOUT_SECS", 300) as u64),
            heartbeat_interval: Duration::from_secs(env_u32("HEARTBEAT_INTERVAL_SECS", 15) as u64),
            session_remove_after: Duration::from_secs(env_u32("SESSION_REMOVE_AFTER_SECS", 60) as u64),
            max_live_sessions: env_u32("MAX_LIVE_SESSIONS", 100) as usize,

            federator: FederatorConfig {
                deadline: Duration::from_secs(env_u32("FEDERATOR_DEADLINE_SECS", 20) as u64),
                weights: PrioritizationWeights::default(),
                top_n: env_u32("FEDERATOR_TOP_N", 30) as usize,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_an_auth_error() {
        // SAFETY: test runs single-threaded w.r.t. this var; no other test touches it.
        unsafe {
            std::env::remove_var("OPENROUTER_API_KEY");
        }
        let result = Settings::from_env();
        assert!(matches!(result, Err(CoreError::Auth { .. })));
    }
}
