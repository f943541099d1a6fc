//! Wire-level tests against a local mock HTTP server.

use std::time::{Duration, Instant};

use hubwright_abstraction::{
    ChatMessage, CompletionRequest, ProviderErrorKind, ProviderKind,
};
use hubwright_models::{FactoryConfig, PollPolicy, ProviderFactory};
use mockito::Matcher;
use serde_json::json;

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::system("You are terse."),
        ChatMessage::user("Summarize this PR."),
    ])
}

fn factory_for(provider: ProviderKind, url: &str) -> ProviderFactory {
    let config = FactoryConfig::default()
        .with_base_url(provider, url)
        .with_poll_policy(PollPolicy { interval: Duration::from_millis(20), max_attempts: 3 });
    ProviderFactory::new(config).unwrap()
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "max_tokens": 1000,
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "Summarize this PR."}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"model":"gpt-4o","choices":[{"message":{"role":"assistant","content":"Done."}}],
                "usage":{"prompt_tokens":12,"completion_tokens":2,"total_tokens":14}}"#,
        )
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::OpenAi, &server.url())
        .create(ProviderKind::OpenAi, "gpt-4o", Some("sk-test"))
        .unwrap();
    let response = adapter.complete(&request()).await.unwrap();

    assert_eq!(response.content, "Done.");
    assert_eq!(response.usage.total_tokens, Some(14));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_error_is_normalized() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body(r#"{"error":{"message":"rate limited","type":"requests"}}"#)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Perplexity, &server.url())
        .create(ProviderKind::Perplexity, "pplx-7b-online", Some("pk"))
        .unwrap();
    let err = adapter.complete(&request()).await.unwrap_err();

    assert_eq!(err.provider, ProviderKind::Perplexity);
    assert_eq!(err.kind, ProviderErrorKind::Status(429));
    assert!(err.to_string().starts_with("perplexity API error: HTTP 429"));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/generate")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("not json")
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Cohere, &server.url())
        .create(ProviderKind::Cohere, "command-r", Some("co"))
        .unwrap();
    let err = adapter.complete(&request()).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::Decode);
}

#[tokio::test]
async fn test_anthropic_uses_system_field_and_version_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .match_header("x-api-key", "ak")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJson(json!({
            "system": "You are terse.",
            "messages": [{"role": "user", "content": "Summarize this PR."}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"content":[{"type":"text","text":"Short."}],
                "usage":{"input_tokens":9,"output_tokens":1}}"#,
        )
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Anthropic, &server.url())
        .create(ProviderKind::Anthropic, "claude-3-opus-20240229", Some("ak"))
        .unwrap();
    let response = adapter.complete(&request()).await.unwrap();

    assert_eq!(response.content, "Short.");
    assert_eq!(response.usage.total_tokens, Some(10));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cohere_sends_last_user_turn() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/generate")
        .match_header("authorization", "Bearer co")
        .match_body(Matcher::PartialJson(json!({"prompt": "Summarize this PR."})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"generations":[{"text":"ok"}],"meta":{"billed_units":{"input_tokens":4,"output_tokens":1}}}"#)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Cohere, &server.url())
        .create(ProviderKind::Cohere, "command-r", Some("co"))
        .unwrap();
    let response = adapter.complete(&request()).await.unwrap();

    assert_eq!(response.content, "ok");
    assert_eq!(response.usage.total_tokens, Some(5));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_huggingface_posts_joined_prompt_to_model_path() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/mistralai/Mistral-7B-Instruct-v0.2")
        .match_body(Matcher::PartialJson(json!({
            "inputs": "You are terse.\nSummarize this PR.",
            "parameters": {"return_full_text": false}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"generated_text":"A summary."}]"#)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::HuggingFace, &server.url())
        .create(ProviderKind::HuggingFace, "mistralai/Mistral-7B-Instruct-v0.2", Some("hf"))
        .unwrap();
    let response = adapter.complete(&request()).await.unwrap();

    assert_eq!(response.content, "A summary.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_local_runtime_gets_chat_markup_prompt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "tinyllama",
            "stream": false,
            "prompt": "<|system|>\nYou are terse.\n<|user|>\nSummarize this PR.\n<|assistant|>\n"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response":"Local answer.","prompt_eval_count":7,"eval_count":3}"#)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Local, &server.url())
        .create(ProviderKind::Local, "tinyllama", None)
        .unwrap();
    let response = adapter.complete(&request()).await.unwrap();

    assert_eq!(response.content, "Local answer.");
    assert_eq!(response.usage.total_tokens, Some(10));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_replicate_polls_until_succeeded() {
    let mut server = mockito::Server::new_async().await;
    let submit = server
        .mock("POST", "/predictions")
        .match_header("authorization", "Token r8")
        .match_body(Matcher::PartialJson(json!({
            "version": "llama-version",
            "input": {"prompt": "<system>\nYou are terse.\n</system>\n<user>\nSummarize this PR.\n</user>"}
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p1","status":"starting"}"#)
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/predictions/p1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p1","status":"succeeded","output":["Hel","lo"]}"#)
        .expect(1)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Replicate, &server.url())
        .create(ProviderKind::Replicate, "llama-version", Some("r8"))
        .unwrap();
    let started = Instant::now();
    let response = adapter.complete(&request()).await.unwrap();

    assert_eq!(response.content, "Hello");
    assert!(started.elapsed() >= Duration::from_millis(20));
    submit.assert_async().await;
    poll.assert_async().await;
}

#[tokio::test]
async fn test_replicate_failed_prediction_surfaces_error() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", "/predictions")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p2","status":"processing"}"#)
        .create_async()
        .await;
    let _poll = server
        .mock("GET", "/predictions/p2")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p2","status":"failed","error":"CUDA out of memory"}"#)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Replicate, &server.url())
        .create(ProviderKind::Replicate, "v", Some("r8"))
        .unwrap();
    let err = adapter.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::Failed);
    assert!(err.message.contains("CUDA out of memory"));
}

#[tokio::test]
async fn test_replicate_stops_after_max_attempts() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", "/predictions")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p3","status":"starting"}"#)
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/predictions/p3")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p3","status":"processing"}"#)
        .expect(3)
        .create_async()
        .await;

    let adapter = factory_for(ProviderKind::Replicate, &server.url())
        .create(ProviderKind::Replicate, "v", Some("r8"))
        .unwrap();
    let started = Instant::now();
    let err = adapter.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(60));
    poll.assert_async().await;
}

#[tokio::test]
async fn test_replicate_polling_honours_cancellation() {
    let mut server = mockito::Server::new_async().await;
    let _submit = server
        .mock("POST", "/predictions")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"p4","status":"starting"}"#)
        .create_async()
        .await;
    let poll = server
        .mock("GET", "/predictions/p4")
        .with_status(200)
        .with_body(r#"{"id":"p4","status":"processing"}"#)
        .expect(0)
        .create_async()
        .await;

    let factory = factory_for(ProviderKind::Replicate, &server.url());
    let adapter = factory.create(ProviderKind::Replicate, "v", Some("r8")).unwrap();
    factory.shutdown();
    let err = adapter.complete(&request()).await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::Cancelled);
    poll.assert_async().await;
}
