//! Error taxonomy for the orchestration pipeline
//!
//! Only `CompletionFailure` is fatal for a turn; everything else degrades
//! into a partial result upstream (omitted tool output, LLM-only fallback).

use thiserror::Error;

/// Failures surfaced by orchestration components
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Low-confidence classification; callers default to the direct-LLM path
    #[error("classification ambiguous (confidence {0:.2})")]
    ClassificationAmbiguous(f32),

    #[error("tool timeout: {0}")]
    ToolTimeout(String),

    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// Zero web results after the relaxed-query retry
    #[error("web research exhausted: no results after retry")]
    WebResearchExhausted,

    /// The completion service errored or timed out; fatal for this turn
    #[error("completion service failure: {0}")]
    CompletionFailure(String),

    #[error("memory store failure: {0}")]
    MemoryStoreFailure(String),

    #[error("config error: {0}")]
    ConfigError(String),
}

impl OrchestratorError {
    /// Whether the turn cannot produce a model-generated reply at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestratorError::CompletionFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completion_failure_is_fatal() {
        assert!(OrchestratorError::CompletionFailure("boom".into()).is_fatal());
        assert!(!OrchestratorError::WebResearchExhausted.is_fatal());
        assert!(!OrchestratorError::ToolTimeout("calc".into()).is_fatal());
        assert!(!OrchestratorError::ClassificationAmbiguous(0.4).is_fatal());
    }
}
