//! LLM client facade over provider backends.

use crate::backends::{LlmBackend, OpenAiBackend};
use crate::config::ModelConfig;
use crate::conversation::Turn;
use campus_core::{CampusResult, ToolCall};
use campus_host::ToolSpec;

/// Response from the model — plain text, or a request to execute tools.
#[derive(Debug)]
pub enum LlmResponse {
    Text(String),
    ToolUse {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
}

/// Dispatches chat requests to the configured provider backend.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            backend: Box::new(OpenAiBackend::new(config)),
        }
    }

    /// Create from a pre-built backend (custom providers, test doubles).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// One completion request. Attach `tools` to allow tool calls; pass an
    /// empty slice to force a plain-text synthesis.
    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> CampusResult<LlmResponse> {
        self.backend.chat(system_prompt, turns, tools).await
    }
}
