// tests/inference_http.rs
//
// The inference client against a mock HTTP server, one test per wire dialect,
// plus streaming and the malformed-reply paths.

use ai_news_bot::config::{Dialect, InferenceConfig};
use ai_news_bot::inference::{HttpInference, InferenceClient};
use ai_news_bot::BotError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cfg(server: &MockServer, dialect: Dialect, stream: bool) -> InferenceConfig {
    InferenceConfig {
        base_url: server.uri(),
        dialect,
        stream,
        timeout_secs: 5,
        ..InferenceConfig::default()
    }
}

#[tokio::test]
async fn completions_dialect_reads_choices_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(body_partial_json(json!({"prompt": "hola", "stream": false, "max_tokens": 500})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": [{"text": "  respuesta \n"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Completions, false)).unwrap();
    assert_eq!(client.complete("hola").await.unwrap(), "respuesta");
}

#[tokio::test]
async fn chat_dialect_sends_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"messages": [{"role": "user", "content": "hola"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "hey"}}]
        })))
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Chat, false)).unwrap();
    assert_eq!(client.complete("hola").await.unwrap(), "hey");
}

#[tokio::test]
async fn ollama_dialect_reads_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false, "options": {"num_predict": 500}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "desde ollama"},
            "done": true
        })))
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Ollama, true)).unwrap();
    assert_eq!(client.complete("hola").await.unwrap(), "desde ollama");
}

#[tokio::test]
async fn streamed_chat_deltas_are_concatenated() {
    let server = MockServer::start().await;
    let sse = concat!(
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hola \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"mundo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Chat, true)).unwrap();
    assert_eq!(client.complete("hola").await.unwrap(), "Hola mundo");
}

#[tokio::test]
async fn reply_without_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "error"})))
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Completions, false)).unwrap();
    let err = client.complete("hola").await.unwrap_err();
    assert!(matches!(err, BotError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn blank_completion_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"choices": [{"text": "   "}]})),
        )
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Completions, false)).unwrap();
    assert!(matches!(
        client.complete("hola").await,
        Err(BotError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn server_error_is_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpInference::new(cfg(&server, Dialect::Chat, false)).unwrap();
    let err = client.complete("hola").await.unwrap_err();
    assert_eq!(err.kind(), "network");
}
