//! Crate-wide error taxonomy.
//!
//! Every module gets its own `thiserror`/`miette` error enum; [`CoreError`]
//! is the classification the coordinator uses to decide how a failure
//! propagates (spec §7): auth and internal failures are terminal, network
//! and rate-limit failures are retried once and otherwise degrade to a
//! partial result, timeouts fall back to an implicit decision, and aborts
//! are a clean stop rather than a failure at all.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error("authentication failed: missing or invalid {env_var}")]
    #[diagnostic(code(citeweave::error::auth))]
    Auth { env_var: String },

    #[error("rate limited by {source}")]
    #[diagnostic(code(citeweave::error::rate_limit))]
    RateLimit { source: String, retry_after_ms: Option<u64> },

    #[error("network error talking to {source}: {message}")]
    #[diagnostic(code(citeweave::error::network))]
    Network { source: String, message: String },

    #[error("timed out waiting on {what}")]
    #[diagnostic(code(citeweave::error::timeout))]
    Timeout { what: String },

    #[error("session aborted by user")]
    #[diagnostic(code(citeweave::error::abort))]
    Abort,

    #[error("validation failed: {message}")]
    #[diagnostic(code(citeweave::error::validation))]
    Validation { message: String },

    #[error("internal error: {message}")]
    #[diagnostic(code(citeweave::error::internal))]
    Internal { message: String },
}

impl CoreError {
    /// True when the coordinator should attempt one bounded retry before
    /// falling back to a partial result, rather than terminating the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::RateLimit { .. } | CoreError::Network { .. } | CoreError::Validation { .. }
        )
    }

    /// True when the failure must terminate the session outright.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoreError::Auth { .. } | CoreError::Internal { .. })
    }

    pub fn network(source: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Network {
            source: source.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal {
            message: message.into(),
        }
    }
}

/// A richer, nested-cause error event for the diagnostic event stream,
/// distinct from [`CoreError`]: this is what gets emitted, not returned.
pub mod event {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
    pub struct LadderError {
        pub message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub cause: Option<Box<LadderError>>,
        #[serde(default)]
        pub details: serde_json::Value,
    }

    impl std::fmt::Display for LadderError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl std::error::Error for LadderError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.cause.as_ref().map(|c| c as &dyn std::error::Error)
        }
    }

    impl LadderError {
        pub fn msg(m: impl Into<String>) -> Self {
            LadderError {
                message: m.into(),
                cause: None,
                details: serde_json::Value::Null,
            }
        }

        pub fn with_cause(mut self, cause: LadderError) -> Self {
            self.cause = Some(Box::new(cause));
            self
        }

        pub fn with_details(mut self, details: serde_json::Value) -> Self {
            self.details = details;
            self
        }
    }

    impl From<&super::CoreError> for LadderError {
        fn from(err: &super::CoreError) -> Self {
            LadderError::msg(err.to_string())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
    #[serde(tag = "scope", rename_all = "snake_case")]
    pub enum ErrorScope {
        Stage { kind: String, session: String },
        Source { name: String },
        Session { id: String },
        #[default]
        Coordinator,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
    pub struct ErrorEvent {
        #[serde(default = "Utc::now")]
        pub when: DateTime<Utc>,
        #[serde(default)]
        pub scope: ErrorScope,
        #[serde(default)]
        pub error: LadderError,
        #[serde(default)]
        pub tags: Vec<String>,
        #[serde(default)]
        pub context: serde_json::Value,
    }

    impl ErrorEvent {
        pub fn stage(kind: impl Into<String>, session: impl Into<String>, error: LadderError) -> Self {
            Self {
                when: Utc::now(),
                scope: ErrorScope::Stage {
                    kind: kind.into(),
                    session: session.into(),
                },
                error,
                tags: Vec::new(),
                context: serde_json::Value::Null,
            }
        }

        pub fn source(name: impl Into<String>, error: LadderError) -> Self {
            Self {
                when: Utc::now(),
                scope: ErrorScope::Source { name: name.into() },
                error,
                tags: Vec::new(),
                context: serde_json::Value::Null,
            }
        }

        pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
            self.tags.push(tag.into());
            self
        }

        pub fn with_context(mut self, context: serde_json::Value) -> Self {
            self.context = context;
            self
        }
    }
}

pub use event::{ErrorEvent, ErrorScope, LadderError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_network_are_recoverable() {
        assert!(CoreError::RateLimit { source: "core".into(), retry_after_ms: None }.is_recoverable());
        assert!(CoreError::network("arxiv", "timeout").is_recoverable());
        assert!(!CoreError::Abort.is_recoverable());
    }

    #[test]
    fn auth_and_internal_are_terminal() {
        assert!(CoreError::Auth { env_var: "OPENROUTER_API_KEY".into() }.is_terminal());
        assert!(CoreError::internal("panic").is_terminal());
        assert!(!CoreError::Timeout { what: "checkpoint".into() }.is_terminal());
    }

    #[test]
    fn ladder_error_chains_causes() {
        let err = LadderError::msg("top").with_cause(LadderError::msg("root cause"));
        assert_eq!(err.cause.unwrap().message, "root cause");
    }
}
