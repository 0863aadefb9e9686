//! Core types and error definitions for the campus capability host.
//!
//! This crate provides the foundational types shared across all host crates:
//! the unified error enum, the host→caller response envelope, and the
//! tool-call abstractions exchanged with the model coordinator.
//!
//! # Main types
//!
//! - [`CampusError`] — Unified error enum for all host subsystems.
//! - [`CampusResult`] — Convenience alias for `Result<T, CampusError>`.
//! - [`HostResponse`] — The uniform envelope returned by the request router.
//! - [`ErrorCode`] — The fixed error-code taxonomy carried in envelopes.
//! - [`ToolCall`] / [`ToolResult`] — Model-initiated tool invocations.

pub mod envelope;

pub use envelope::{ErrorBody, ErrorCode, HostResponse, ResponseMetadata};

use serde::{Deserialize, Serialize};

/// Top-level error type for the capability host.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum CampusError {
    /// An authentication or authorization failure.
    #[error("Auth error: {0}")]
    Auth(String),

    /// An error related to session creation or lookup.
    #[error("Session error: {0}")]
    Session(String),

    /// An error in the capability registry (registration, lookup).
    #[error("Registry error: {0}")]
    Registry(String),

    /// An error on the process bridge (spawn, handshake, wire IO).
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// An error raised by a domain handler during invocation.
    #[error("Handler error: {0}")]
    Handler(String),

    /// An error from the model tool-loop coordinator.
    #[error("Agent error: {0}")]
    Agent(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request (LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`CampusError`].
pub type CampusResult<T> = Result<T, CampusError>;

/// A request from the model to invoke a specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the model for this tool call.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The ID of the [`ToolCall`] this result corresponds to.
    pub call_id: String,
    /// The textual output produced by the tool.
    pub content: String,
    /// Whether the tool execution ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates an error tool result.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("call_1", "output");
        assert!(!result.is_error);
        assert_eq!(result.content, "output");
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("call_1", "failed");
        assert!(result.is_error);
    }

    #[test]
    fn test_tool_call_roundtrip() {
        let call = ToolCall {
            id: "call_9".into(),
            name: "finance:issue_invoice".into(),
            arguments: serde_json::json!({"booking_id": "b-1"}),
        };
        let json = serde_json::to_string(&call).unwrap();
        let parsed: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "finance:issue_invoice");
        assert_eq!(parsed.arguments["booking_id"], "b-1");
    }
}
