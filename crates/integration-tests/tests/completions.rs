mod harness;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use harness::server::TestServer;
use serde_json::{Value, json};

fn weather_tool() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": "get_weather",
            "description": "Get current weather",
            "parameters": {
                "type": "object",
                "properties": {
                    "city": {"type": "string"}
                }
            }
        }
    })
}

fn body_with_tools() -> Value {
    json!({
        "model": "mock-model",
        "messages": [{"role": "user", "content": "What is the weather in Paris?"}],
        "tools": [weather_tool()]
    })
}

async fn complete(model_output: &str) -> (reqwest::StatusCode, Value) {
    let mock = MockLlm::start(model_output).await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server.chat(&body_with_tools()).await;
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

fn arguments(json: &Value) -> Value {
    let raw = json["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"]
        .as_str()
        .unwrap();
    serde_json::from_str(raw).unwrap()
}

#[tokio::test]
async fn plain_message_becomes_text_reply() {
    let (status, json) = complete("<message>\nIt is sunny in Paris.\n</message>").await;

    assert_eq!(status, 200);
    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["id"], "chatcmpl-mock-1");
    assert_eq!(json["created"], 1_700_000_000);
    let choice = &json["choices"][0];
    assert_eq!(choice["message"]["role"], "assistant");
    assert_eq!(choice["message"]["content"], "It is sunny in Paris.\n");
    assert!(choice["message"]["tool_calls"].is_null());
    assert_eq!(choice["finish_reason"], "stop");
}

#[tokio::test]
async fn usage_passes_through() {
    let (_, json) = complete("hello").await;

    assert_eq!(json["usage"]["prompt_tokens"], 10);
    assert_eq!(json["usage"]["total_tokens"], 15);
    assert_eq!(json["usage"]["total_cost"], 0.0002);
}

#[tokio::test]
async fn xml_block_becomes_tool_call() {
    let (status, json) = complete(
        "I will look that up.\n<tool_call>\n<tool_name>get_weather</tool_name>\n\
         <parameters><city>Paris</city></parameters>\n</tool_call>",
    )
    .await;

    assert_eq!(status, 200);
    let choice = &json["choices"][0];
    assert!(choice["message"]["content"].is_null());
    assert_eq!(choice["finish_reason"], "tool_calls");

    let call = &choice["message"]["tool_calls"][0];
    assert!(call["id"].as_str().unwrap().starts_with("call_"));
    assert_eq!(call["type"], "function");
    assert_eq!(call["function"]["name"], "get_weather");
    assert_eq!(arguments(&json), json!({"city": "Paris"}));
}

#[tokio::test]
async fn fenced_json_becomes_tool_call() {
    let (status, json) = complete(
        "```json\n{\"action\": \"tool_call\", \"action_data\": {\"name\": \"get_weather\", \
         \"arguments\": {\"city\": \"Paris\"}}}\n```",
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(json["choices"][0]["message"]["tool_calls"][0]["function"]["name"], "get_weather");
    assert_eq!(arguments(&json), json!({"city": "Paris"}));
}

#[tokio::test]
async fn bare_json_text_message() {
    let (status, json) =
        complete(r#"{"action": {"type": "TEXT_MESSAGE"}, "action_data": {"message": "<message>Bonjour</message>"}}"#)
            .await;

    assert_eq!(status, 200);
    assert_eq!(json["choices"][0]["message"]["content"], "Bonjour");
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn call_expression_becomes_tool_call() {
    let (status, json) = complete(r#"get_weather({"city": "Paris"})"#).await;

    assert_eq!(status, 200);
    assert_eq!(json["choices"][0]["message"]["tool_calls"][0]["function"]["name"], "get_weather");
    assert_eq!(arguments(&json), json!({"city": "Paris"}));
}

#[tokio::test]
async fn json_answer_without_action_is_content() {
    let (status, json) = complete(r#"{"name": "Bob", "age": 42}"#).await;

    assert_eq!(status, 200);
    assert_eq!(json["choices"][0]["message"]["content"], r#"{"name": "Bob", "age": 42}"#);
    assert_eq!(json["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn broken_block_is_a_gateway_error() {
    let (status, json) = complete("<tool_call><tool_name>get_weather</parameters></tool_call>").await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["type"], "malformed_response_error");
}

#[tokio::test]
async fn unknown_action_is_a_gateway_error() {
    let (status, json) = complete(r#"{"action": "dance", "action_data": {}}"#).await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["type"], "invalid_action_error");
}

#[tokio::test]
async fn tool_call_without_name_is_a_gateway_error() {
    let (status, json) = complete(r#"{"action": "tool_call", "action_data": {"arguments": {}}}"#).await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["type"], "missing_tool_data_error");
}

#[tokio::test]
async fn upstream_gets_instructions_instead_of_tools() {
    let mock = MockLlm::start("hello").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).build();
    let server = TestServer::start(&config).await.unwrap();

    server.chat(&body_with_tools()).await;

    let upstream = mock.last_request();
    assert!(upstream.get("tools").is_none());
    assert!(upstream.get("stream").is_none());
    assert!(upstream.get("stream_options").is_none());
    assert_eq!(upstream["model"], "mock-model");

    let messages = upstream["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "system");

    let instructions = messages[1]["content"].as_str().unwrap();
    assert!(instructions.contains("<tools>"));
    assert!(instructions.contains("get_weather"));
    assert!(!instructions.contains("{{tools}}"));
}

#[tokio::test]
async fn no_tools_renders_sentinel() {
    let mock = MockLlm::start("hello").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).build();
    let server = TestServer::start(&config).await.unwrap();

    server
        .chat(&json!({
            "model": "mock-model",
            "messages": [{"role": "user", "content": "Hi"}]
        }))
        .await;

    let upstream = mock.last_request();
    let instructions = upstream["messages"][1]["content"].as_str().unwrap();
    assert!(instructions.contains("No tools available. Do not call any!"));
    assert!(!instructions.contains("<tools>"));
}

#[tokio::test]
async fn tool_result_is_rewritten_for_upstream() {
    let mock = MockLlm::start("<message>It is 18C.</message>").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server
        .chat(&json!({
            "model": "mock-model",
            "messages": [
                {"role": "user", "content": "What is the weather in Paris?"},
                {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                    }]
                },
                {"role": "tool", "tool_call_id": "call_1", "name": "get_weather", "content": "18C, clear"}
            ],
            "tools": [weather_tool()]
        }))
        .await;
    assert_eq!(resp.status(), 200);

    let upstream = mock.last_request();
    let messages = upstream["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert!(messages.iter().all(|m| m["role"] != "tool"));

    // Instructions go in front of the trailing tool result
    assert_eq!(messages[2]["role"], "system");
    assert!(messages[2]["content"].as_str().unwrap().contains("get_weather"));

    let result = &messages[3];
    assert_eq!(result["role"], "user");
    let content = result["content"].as_str().unwrap();
    assert!(content.starts_with("*SYSTEM MESSAGE*"));
    assert!(content.contains("<tool_response source=\"get_weather\">\n18C, clear\n</tool_response>"));
}

#[tokio::test]
async fn tool_result_role_is_configurable() {
    let mock = MockLlm::start("ok").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url())
        .with_tool_result_role(axon_config::ToolResultRole::System)
        .build();
    let server = TestServer::start(&config).await.unwrap();

    server
        .chat(&json!({
            "model": "mock-model",
            "messages": [
                {"role": "user", "content": "Hi"},
                {"role": "tool", "tool_call_id": "call_9", "content": "done"},
                {"role": "user", "content": "Thanks"}
            ]
        }))
        .await;

    let upstream = mock.last_request();
    let result = &upstream["messages"][1];
    assert_eq!(result["role"], "system");
    assert!(result["content"].as_str().unwrap().contains("source=\"call_9\""));
}

#[tokio::test]
async fn upstream_failure_is_a_gateway_error() {
    let mock = MockLlm::start_failing().await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server.chat(&body_with_tools()).await;

    assert_eq!(resp.status(), 502);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "upstream_error");
}

#[tokio::test]
async fn missing_template_aborts_before_upstream() {
    let mock = MockLlm::start("hello").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url())
        .with_template_path("/nonexistent/axon/instructions.md")
        .build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server.chat(&body_with_tools()).await;

    assert_eq!(resp.status(), 500);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "template_load_error");
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn invalid_body_is_rejected() {
    let mock = MockLlm::start("hello").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server.chat(&json!({"messages": "not a list"})).await;
    assert_eq!(resp.status(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "invalid_request_error");

    let resp = server.chat(&json!({"model": " ", "messages": []})).await;
    assert_eq!(resp.status(), 400);

    assert_eq!(mock.request_count(), 0);
}
