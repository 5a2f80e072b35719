use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> OllamaConfig {
    let url = Url::parse(&server.uri()).expect("mock server uri is a valid url");
    OllamaConfig {
        host: url.host_str().expect("mock server has a host").to_string(),
        port: url.port().expect("mock server has a port"),
        chat_model: "test-chat".to_string(),
        timeout_secs: 5,
        ..OllamaConfig::default()
    }
}

#[test]
fn client_uses_chat_model() {
    let config = OllamaConfig {
        chat_model: "mistral".to_string(),
        ..OllamaConfig::default()
    };
    let client = OllamaChatClient::new(&config).expect("client should build");

    assert_eq!(LanguageModel::model(&client), "mistral");
    assert_eq!(client.inner.base_url.as_str(), "http://localhost:11434/");
    assert_eq!(client.inner.retry_attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn generate_returns_message_content_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "test-chat",
            "stream": false,
            "messages": [{ "role": "user", "content": "What do you collect for passing Go?" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-chat",
            "message": { "role": "assistant", "content": "  You collect $200.\n" },
            "done": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaChatClient::new(&config_for(&server)).expect("client should build");
    let answer = client
        .generate("What do you collect for passing Go?")
        .await
        .expect("chat should succeed");

    assert_eq!(answer, "  You collect $200.\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaChatClient::new(&config_for(&server)).expect("client should build");
    let result = client.generate("hello").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;

    let client = OllamaChatClient::new(&config_for(&server)).expect("client should build");
    let err = client
        .generate("hello")
        .await
        .expect_err("missing message must fail");

    assert!(format!("{err:#}").contains("Failed to parse chat response"));
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_deadline_can_exceed_embedding_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": { "content": "slow but fine" } }))
                .set_delay(Duration::from_millis(1500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = OllamaConfig {
        timeout_secs: 1,
        ..config_for(&server)
    };
    let client = OllamaChatClient::new(&config)
        .expect("client should build")
        .with_timeout(Duration::from_secs(5));

    let answer = client.generate("hello").await.expect("chat should succeed");
    assert_eq!(answer, "slow but fine");
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_uses_path_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ollama/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "message": { "content": "ok" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = OllamaConfig {
        base_path: "/ollama".to_string(),
        ..config_for(&server)
    };
    let client = OllamaChatClient::new(&config).expect("client should build");

    assert_eq!(client.generate("hello").await.expect("chat should succeed"), "ok");
}
