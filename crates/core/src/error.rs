//! Error types for the Leash domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.
//!
//! Most failures in this system are *not* errors at the loop boundary:
//! provider faults and tool faults are absorbed into the conversation as
//! messages. Only the loop's own non-convergence (`LoopError`) propagates
//! to the caller.

use thiserror::Error;

/// The top-level error type for all Leash operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Loop errors ---
    #[error("Loop error: {0}")]
    Loop(#[from] LoopError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool not configured: {tool_name} — {reason}")]
    NotConfigured { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures of the loop driver itself.
///
/// Hitting the tool-call budget is *not* one of these — that is a normal,
/// policy-driven stop. A `LoopError` signals the driver did not converge,
/// which is a correctness bug in policy or dispatch, never an expected
/// conversational outcome.
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    #[error(
        "Iteration ceiling exceeded: {iterations} iterations without terminating (limit: {limit})"
    )]
    IterationCeilingExceeded { iterations: u32, limit: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::NotFound("crm_query".into()));
        assert!(err.to_string().contains("crm_query"));
    }

    #[test]
    fn loop_error_carries_both_counts() {
        let err = Error::Loop(LoopError::IterationCeilingExceeded {
            iterations: 16,
            limit: 15,
        });
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains("15"));
    }
}
