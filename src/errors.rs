//! Error taxonomy for the planner/executor core (spec 7).
//!
//! Five kinds rooted at a single [`HalliganError`] enum rather than a class
//! hierarchy: `Parse` and `Validation` are retryable by every stage
//! orchestrator, `Tool` is retryable only within Stage 3, and `Config`/
//! `UnsafeTarget` are fatal to the invoking command.

use thiserror::Error;

/// The error taxonomy raised anywhere in the planner/executor core.
#[derive(Debug, Error)]
pub enum HalliganError {
    /// No JSON object could be extracted from a model response (spec 4.1).
    #[error("parse error: {0}")]
    Parse(String),

    /// Parsed JSON did not conform to the expected schema, or the Stage-2
    /// post-condition failed (spec 4.2, 4.4).
    #[error("validation error: {0}")]
    Validation(String),

    /// A Stage-3 step referenced an unknown tool, a disallowed method, a
    /// malformed expression, or the underlying tool invocation failed
    /// (spec 4.5, 4.6).
    #[error("tool error: {0}")]
    Tool(String),

    /// A required environment variable was missing on `require(...)`
    /// (spec 4.8).
    #[error("config error: missing required environment variables: {0}")]
    Config(String),

    /// A non-local benchmark URL was configured without the override flag
    /// (spec 4.8).
    #[error("unsafe target error: {0}")]
    UnsafeTarget(String),
}

impl HalliganError {
    /// Construct a [`HalliganError::Parse`] from a display-able cause.
    pub fn parse(msg: impl std::fmt::Display) -> Self {
        Self::Parse(msg.to_string())
    }

    /// Construct a [`HalliganError::Validation`] from a display-able cause.
    pub fn validation(msg: impl std::fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Construct a [`HalliganError::Tool`] from a display-able cause.
    pub fn tool(msg: impl std::fmt::Display) -> Self {
        Self::Tool(msg.to_string())
    }

    /// Whether this error is retryable by the Stage 1/2 orchestrator skeleton
    /// (spec 4.7): parse and validation failures only.
    pub fn retryable_stage12(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_))
    }

    /// Whether this error is retryable by the Stage 3 orchestrator (spec 4.7):
    /// parse, validation, and tool failures.
    pub fn retryable_stage3(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_) | Self::Tool(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HalliganError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_validation_are_retryable_everywhere() {
        let parse = HalliganError::parse("bad json");
        let validation = HalliganError::validation("bad shape");
        assert!(parse.retryable_stage12());
        assert!(parse.retryable_stage3());
        assert!(validation.retryable_stage12());
        assert!(validation.retryable_stage3());
    }

    #[test]
    fn tool_error_only_retryable_in_stage3() {
        let tool = HalliganError::tool("unknown tool: nope");
        assert!(!tool.retryable_stage12());
        assert!(tool.retryable_stage3());
    }

    #[test]
    fn config_and_unsafe_target_are_fatal() {
        let config = HalliganError::Config("BROWSER_URL".to_owned());
        let unsafe_target = HalliganError::UnsafeTarget("http://example.com".to_owned());
        assert!(!config.retryable_stage12());
        assert!(!config.retryable_stage3());
        assert!(!unsafe_target.retryable_stage12());
        assert!(!unsafe_target.retryable_stage3());
    }

    #[test]
    fn display_messages_carry_context() {
        let err = HalliganError::parse("No JSON object found in response");
        assert_eq!(
            err.to_string(),
            "parse error: No JSON object found in response"
        );
    }
}
