//! Wire-level coverage of the OpenAI-compatible backend against a mock
//! chat-completions endpoint.

use campus_agent::backends::{LlmBackend, OpenAiBackend};
use campus_agent::{LlmProvider, LlmResponse, ModelConfig, Turn};
use campus_host::ToolSpec;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(base_url: &str) -> ModelConfig {
    ModelConfig {
        provider: LlmProvider::OpenAi,
        model_id: "gpt-4o".to_string(),
        api_key: "sk-test".to_string(),
        api_base_url: Some(base_url.to_string()),
        temperature: 0.2,
        max_tokens: 512,
    }
}

#[tokio::test]
async fn text_completion_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({"model": "gpt-4o"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "Enrollment is confirmed."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(config(&server.uri()));
    let response = backend
        .chat(Some("You help school staff."), &[Turn::user("confirm it")], &[])
        .await
        .expect("chat completion");

    match response {
        LlmResponse::Text(text) => assert_eq!(text, "Enrollment is confirmed."),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_calls_are_parsed_and_tools_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "tools": [{"type": "function", "function": {"name": "finance:issue_invoice"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_7",
                    "type": "function",
                    "function": {
                        "name": "finance:issue_invoice",
                        "arguments": "{\"booking_id\":\"b-7\"}"
                    }
                }]
            }}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = vec![ToolSpec {
        name: "finance:issue_invoice".to_string(),
        description: "Issue an invoice".to_string(),
        input_schema: serde_json::json!({"type": "object"}),
        required_scopes: vec!["finance:write".to_string()],
    }];

    let backend = OpenAiBackend::new(config(&server.uri()));
    let response = backend
        .chat(None, &[Turn::user("invoice b-7")], &tools)
        .await
        .expect("chat completion");

    match response {
        LlmResponse::ToolUse { tool_calls, .. } => {
            assert_eq!(tool_calls.len(), 1);
            assert_eq!(tool_calls[0].id, "call_7");
            assert_eq!(tool_calls[0].name, "finance:issue_invoice");
            assert_eq!(tool_calls[0].arguments["booking_id"], "b-7");
        }
        other => panic!("expected tool use, got {other:?}"),
    }
}

#[tokio::test]
async fn api_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "rate limit exceeded"}
        })))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(config(&server.uri()));
    let err = backend
        .chat(None, &[Turn::user("hello")], &[])
        .await
        .expect_err("rate-limited request should fail");
    assert!(err.to_string().contains("429"));
}
