pub mod openai;

pub use openai::OpenAiBackend;

use crate::conversation::Turn;
use crate::llm::LlmResponse;
use campus_core::CampusResult;
use campus_host::ToolSpec;
use async_trait::async_trait;

/// Trait for model provider backends.
///
/// The coordinator only needs one non-streaming completion primitive; a
/// backend translates the conversation turns and tool schemas into the
/// provider's API shape.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> CampusResult<LlmResponse>;
}
