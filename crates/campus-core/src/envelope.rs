//! The uniform host→caller response envelope.
//!
//! Every router operation (tool, resource, prompt) resolves to a
//! [`HostResponse`]; domain handler failures are wrapped, never propagated.

use serde::{Deserialize, Serialize};

/// Fixed error-code taxonomy for the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Caller presented no valid session.
    Unauthorized,
    /// Session scopes do not satisfy the target's required scopes.
    Forbidden,
    /// No registered domain owns the requested tool.
    ToolNotFound,
    /// No registered domain owns the requested resource or prompt.
    ResourceNotFound,
    /// Tool input failed schema validation.
    InvalidInput,
    /// A domain handler (local or remote) failed during execution.
    ExecutionError,
    /// The session existed but has passed its expiry instant.
    SessionExpired,
    /// The request named a tenant other than the session's tenant.
    TenantMismatch,
}

/// Structured error payload inside a failed [`HostResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Execution metadata attached to successful responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Name of the domain server that handled the call.
    pub server: String,
    /// Wall-clock handler duration in milliseconds.
    pub execution_time_ms: u64,
}

/// The uniform response envelope for tool, resource, and prompt operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl HostResponse {
    /// Successful response with data and execution metadata.
    pub fn ok(data: serde_json::Value, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: Some(metadata),
        }
    }

    /// Failed response with an error code and message.
    pub fn err(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
                details: None,
            }),
            metadata: None,
        }
    }

    /// Failed response carrying structured detail (e.g. validation errors).
    pub fn err_with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
                details: Some(details),
            }),
            metadata: None,
        }
    }

    /// The error code, if this is a failed response.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
