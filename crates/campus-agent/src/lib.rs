//! Model-facing layer of the campus capability host.
//!
//! Ties an OpenAI-compatible chat model to the capability router: the
//! [`ToolLoopCoordinator`] offers the session's authorized tools to the
//! model, executes the calls it emits, and synthesizes a final answer from
//! the results. Conversation history is bounded per conversation.

pub mod backends;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod llm;

pub use config::{LlmProvider, ModelConfig};
pub use conversation::{ConversationStore, Turn, TurnRole};
pub use coordinator::ToolLoopCoordinator;
pub use llm::{LlmClient, LlmResponse};
