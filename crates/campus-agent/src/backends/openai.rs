use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::conversation::{Turn, TurnRole};
use crate::llm::LlmResponse;
use campus_core::{CampusError, CampusResult, ToolCall};
use campus_host::ToolSpec;
use async_trait::async_trait;

/// OpenAI-compatible chat-completions backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider exposing
/// the same API surface.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_messages(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
    ) -> Vec<serde_json::Value> {
        let mut api_messages: Vec<serde_json::Value> = Vec::new();
        let mut replayed_call_ids: std::collections::HashSet<&str> = std::collections::HashSet::new();

        if let Some(sys) = system_prompt {
            api_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for turn in turns {
            match turn.role {
                // The system prompt is rebuilt fresh each request.
                TurnRole::System => continue,
                TurnRole::User => api_messages.push(serde_json::json!({
                    "role": "user",
                    "content": turn.content
                })),
                TurnRole::Assistant => {
                    let mut msg = serde_json::json!({
                        "role": "assistant",
                        "content": turn.content
                    });
                    if !turn.tool_calls.is_empty() {
                        replayed_call_ids.extend(turn.tool_calls.iter().map(|c| c.id.as_str()));
                        msg["tool_calls"] = serde_json::json!(turn
                            .tool_calls
                            .iter()
                            .map(|c| serde_json::json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": c.arguments.to_string(),
                                }
                            }))
                            .collect::<Vec<_>>());
                    }
                    api_messages.push(msg);
                }
                TurnRole::Tool => {
                    // Bounded-history eviction can drop the assistant turn
                    // that emitted a call while its result survives; a tool
                    // message without its tool_calls counterpart is rejected
                    // by the API, so orphans are not replayed.
                    let orphaned = turn
                        .tool_call_id
                        .as_deref()
                        .map_or(true, |id| !replayed_call_ids.contains(id));
                    if orphaned {
                        continue;
                    }
                    api_messages.push(serde_json::json!({
                        "role": "tool",
                        "tool_call_id": turn.tool_call_id,
                        "content": turn.content
                    }));
                }
            }
        }

        api_messages
    }

    fn build_tools(&self, tools: &[ToolSpec]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                })
            })
            .collect()
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires attribution headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/campus-platform/campus-host")
                .header("X-Title", "campus-host")
        } else {
            request
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
        tools: &[ToolSpec],
    ) -> CampusResult<LlmResponse> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let api_messages = self.build_messages(system_prompt, turns);

        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": api_messages,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
        }

        let request = self.add_provider_headers(self.http.post(&url));

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| CampusError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CampusError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(CampusError::Http(format!(
                "Model API error {status}: {resp_body}"
            )));
        }

        parse_completion(&resp_body)
    }
}

pub(crate) fn parse_completion(body: &serde_json::Value) -> CampusResult<LlmResponse> {
    let message = &body["choices"][0]["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    if let Some(tool_calls_json) = message["tool_calls"].as_array() {
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .iter()
            .filter_map(|tc| {
                let id = tc["id"].as_str()?.to_string();
                let name = tc["function"]["name"].as_str()?.to_string();
                let arguments: serde_json::Value =
                    serde_json::from_str(tc["function"]["arguments"].as_str()?).unwrap_or_default();
                Some(ToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect();

        Ok(LlmResponse::ToolUse {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls,
        })
    } else {
        Ok(LlmResponse::Text(content))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "All invoices are settled."}}]
        });
        match parse_completion(&body).unwrap() {
            LlmResponse::Text(text) => assert_eq!(text, "All invoices are settled."),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tool_use_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "finance:issue_invoice",
                        "arguments": "{\"booking_id\":\"b-1\"}"
                    }
                }]
            }}]
        });
        match parse_completion(&body).unwrap() {
            LlmResponse::ToolUse { content, tool_calls } => {
                assert!(content.is_none());
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "call_1");
                assert_eq!(tool_calls[0].arguments["booking_id"], "b-1");
            }
            other => panic!("expected tool use, got {other:?}"),
        }
    }

    #[test]
    fn test_orphaned_tool_turn_is_not_replayed() {
        let backend = OpenAiBackend::new(ModelConfig {
            provider: LlmProvider::OpenAi,
            model_id: "gpt-4o".into(),
            api_key: "sk-test".into(),
            api_base_url: None,
            temperature: 0.7,
            max_tokens: 1024,
        });
        // Eviction dropped the assistant turn that emitted call_0; the
        // surviving result must not be sent without its counterpart.
        let turns = vec![
            Turn::tool("call_0", "finance:issue_invoice", "{\"invoice_id\":\"inv-0\"}"),
            Turn::user("and booking b-1?"),
            Turn::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "finance:issue_invoice".into(),
                    arguments: serde_json::json!({"booking_id": "b-1"}),
                }],
            ),
            Turn::tool("call_1", "finance:issue_invoice", "{\"invoice_id\":\"inv-1\"}"),
        ];
        let messages = backend.build_messages(None, &turns);
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m["tool_call_id"] != "call_0"));
        assert_eq!(messages[2]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_assistant_tool_calls_replayed_in_messages() {
        let backend = OpenAiBackend::new(ModelConfig {
            provider: LlmProvider::OpenAi,
            model_id: "gpt-4o".into(),
            api_key: "sk-test".into(),
            api_base_url: None,
            temperature: 0.7,
            max_tokens: 1024,
        });
        let turns = vec![
            Turn::user("issue the invoice"),
            Turn::assistant_with_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "finance:issue_invoice".into(),
                    arguments: serde_json::json!({"booking_id": "b-1"}),
                }],
            ),
            Turn::tool("call_1", "finance:issue_invoice", "{\"invoice_id\":\"inv-1\"}"),
        ];
        let messages = backend.build_messages(Some("system"), &turns);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }
}
