//! Per-conversation turn history, bounded by a maximum turn count.
//!
//! Conversations are keyed by an explicit id (defaulting to the session
//! id at the coordinator) and grow as the model loop appends turns; once
//! the bound is reached the oldest turns are evicted first.

use campus_core::ToolCall;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single turn in a tool-calling conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    /// For `tool` turns: the id of the originating call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For `tool` turns: the tool that produced this result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// For `assistant` turns that requested tools: the emitted calls, kept
    /// so the exchange can be replayed to the model verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    /// Assistant turn that requested tool execution.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut turn = Self::new(TurnRole::Assistant, content);
        turn.tool_calls = calls;
        turn
    }

    /// Tool-result turn, tagged with the originating call.
    pub fn tool(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut turn = Self::new(TurnRole::Tool, content);
        turn.tool_call_id = Some(call_id.into());
        turn.tool_name = Some(tool_name.into());
        turn
    }
}

/// In-memory store of conversation histories.
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, Vec<Turn>>>,
    max_turns: usize,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// Append a turn, evicting the oldest when the bound is exceeded.
    pub fn push(&self, conversation_id: &str, turn: Turn) {
        let mut map = self.conversations.lock();
        let turns = map.entry(conversation_id.to_string()).or_default();
        turns.push(turn);
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
    }

    /// A snapshot of the conversation's turns, oldest first.
    pub fn history(&self, conversation_id: &str) -> Vec<Turn> {
        self.conversations
            .lock()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a conversation entirely.
    pub fn clear(&self, conversation_id: &str) -> bool {
        self.conversations.lock().remove(conversation_id).is_some()
    }

    pub fn turn_count(&self, conversation_id: &str) -> usize {
        self.conversations
            .lock()
            .get(conversation_id)
            .map_or(0, Vec::len)
    }
}
