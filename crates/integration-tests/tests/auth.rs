mod harness;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use harness::server::TestServer;

fn body() -> serde_json::Value {
    serde_json::json!({
        "model": "mock-model",
        "messages": [{"role": "user", "content": "Hello"}]
    })
}

#[tokio::test]
async fn missing_key_is_rejected_before_upstream() {
    let mock = MockLlm::start("<message>hi</message>").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).with_auth("secret").build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server.chat(&body()).await;

    assert_eq!(resp.status(), 401);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "authentication_error");
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn wrong_key_is_rejected() {
    let mock = MockLlm::start("<message>hi</message>").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).with_auth("secret").build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-api-key", "not-the-secret")
        .json(&body())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn valid_key_is_accepted() {
    let mock = MockLlm::start("<message>hi</message>").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).with_auth("secret").build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-api-key", "secret")
        .json(&body())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn health_stays_public() {
    let mock = MockLlm::start("unused").await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url()).with_auth("secret").build();
    let server = TestServer::start(&config).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
}
