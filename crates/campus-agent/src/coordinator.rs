use crate::conversation::{ConversationStore, Turn};
use crate::llm::{LlmClient, LlmResponse};
use campus_auth::Session;
use campus_core::{CampusResult, ToolResult};
use campus_host::Router;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives the model/tool loop for a single user message.
///
/// The loop runs exactly one tool round: the model is offered the tools the
/// session is authorized to see, any calls it emits are executed in order,
/// and a second completion is issued without tools to synthesize the final
/// answer from the results.
pub struct ToolLoopCoordinator {
    llm: LlmClient,
    router: Arc<Router>,
    store: ConversationStore,
}

impl ToolLoopCoordinator {
    pub fn new(llm: LlmClient, router: Arc<Router>, max_turns: usize) -> Self {
        Self {
            llm,
            router,
            store: ConversationStore::new(max_turns),
        }
    }

    /// Handle one user message inside a conversation.
    ///
    /// When `conversation_id` is not given, the session id keys the
    /// conversation, so repeated calls for the same session share history.
    pub async fn handle_message(
        &self,
        session: &Session,
        conversation_id: Option<&str>,
        user_input: &str,
    ) -> CampusResult<String> {
        let conv_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| session.id.to_string());

        let tools = self.router.list_tools(session).await;
        let system_prompt = build_system_prompt(session, &tools);

        self.store.push(&conv_id, Turn::user(user_input));

        info!(
            conversation = %conv_id,
            user_id = %session.user_id,
            tools = tools.len(),
            "Starting tool loop"
        );

        let history = self.store.history(&conv_id);
        let response = self
            .llm
            .chat(Some(&system_prompt), &history, &tools)
            .await?;

        let (preamble, tool_calls) = match response {
            LlmResponse::Text(text) => {
                self.store.push(&conv_id, Turn::assistant(&text));
                return Ok(text);
            }
            LlmResponse::ToolUse {
                content,
                tool_calls,
            } => (content, tool_calls),
        };

        self.store.push(
            &conv_id,
            Turn::assistant_with_calls(preamble.unwrap_or_default(), tool_calls.clone()),
        );

        for call in &tool_calls {
            debug!(conversation = %conv_id, tool = %call.name, call_id = %call.id, "Executing tool call");
            let response = self
                .router
                .execute_tool(&call.name, call.arguments.clone(), session)
                .await;

            let result = if response.success {
                let data = response
                    .data
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "null".to_string());
                ToolResult::success(&call.id, data)
            } else {
                warn!(
                    conversation = %conv_id,
                    tool = %call.name,
                    "Tool call failed, surfacing error to the model"
                );
                let err = serde_json::json!({ "error": response.error });
                ToolResult::error(&call.id, err.to_string())
            };

            self.store
                .push(&conv_id, Turn::tool(&result.call_id, &call.name, result.content));
        }

        // Synthesis pass with no tools attached.
        let history = self.store.history(&conv_id);
        let final_response = self.llm.chat(Some(&system_prompt), &history, &[]).await?;

        let answer = match final_response {
            LlmResponse::Text(text) => text,
            LlmResponse::ToolUse { content, .. } => {
                warn!(conversation = %conv_id, "Model emitted tool calls during synthesis; taking text content");
                content.unwrap_or_default()
            }
        };

        self.store.push(&conv_id, Turn::assistant(&answer));
        Ok(answer)
    }

    pub fn history(&self, conversation_id: &str) -> Vec<Turn> {
        self.store.history(conversation_id)
    }

    pub fn clear_conversation(&self, conversation_id: &str) -> bool {
        self.store.clear(conversation_id)
    }
}

fn build_system_prompt(session: &Session, tools: &[campus_host::ToolSpec]) -> String {
    let mut prompt = String::from(session.role.persona());
    prompt.push_str("\n\nYou operate on behalf of a single school tenant. ");
    prompt.push_str("Only call the tools listed below.\n");

    if tools.is_empty() {
        prompt.push_str("\nNo tools are available for this user.\n");
    } else {
        prompt.push_str("\nAvailable tools:\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_auth::{IdentityClaims, Role, SessionManager};
    use campus_host::ToolSpec;

    fn session(role: Role, scopes: &[&str]) -> Session {
        SessionManager::new().create_session(IdentityClaims {
            user_id: "u-1".into(),
            tenant_id: "tenant-1".into(),
            role,
            scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
            metadata: Default::default(),
        })
    }

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "test tool".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
            required_scopes: vec![],
        }
    }

    #[test]
    fn test_system_prompt_lists_tools() {
        let session = session(Role::Admin, &["finance:*"]);
        let prompt = build_system_prompt(&session, &[spec("finance:issue_invoice")]);
        assert!(prompt.contains("finance:issue_invoice"));
        assert!(prompt.contains(Role::Admin.persona()));
    }

    #[test]
    fn test_system_prompt_without_tools() {
        let session = session(Role::Guest, &[]);
        let prompt = build_system_prompt(&session, &[]);
        assert!(prompt.contains("No tools are available"));
    }
}
