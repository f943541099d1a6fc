//! Routing order and the stock command set on an assembled bot.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hubwright_abstraction::ProviderKind;
use hubwright_core::commands::{UNRECOGNIZED_MESSAGE, handler};
use hubwright_core::{CommandRouter, OfflineSourceControl, RepoRef, RequestContext};
use hubwright_models::MockAdapter;
use reqwest::Method;
use serde_json::json;
use tempfile::TempDir;

use common::{MockResolver, assemble_bot, empty_discovery};

#[tokio::test]
async fn test_command_wins_over_matching_intent() {
    let mut router = CommandRouter::new();
    router.register("help", &[], handler(|_, _| async { "command".to_string() }));
    router.register_intent("help_words", &["/help", "help"], handler(|_, _| async { "intent".to_string() }));

    let ctx = RequestContext::new("ana");
    assert_eq!(router.process("/help", ctx.clone()).await, "command");
    assert_eq!(router.process("/HELP", ctx.clone()).await, "command");
    assert_eq!(router.process("help", ctx).await, "intent");
}

#[tokio::test]
async fn test_aliases_share_one_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut router = CommandRouter::new();
    router.register(
        "status",
        &["stat"],
        handler(move |_, _| {
            let counter = counter.clone();
            async move { format!("call {}", counter.fetch_add(1, Ordering::SeqCst) + 1) }
        }),
    );

    let ctx = RequestContext::new("ana");
    assert_eq!(router.process("/status", ctx.clone()).await, "call 1");
    assert_eq!(router.process("/stat", ctx.clone()).await, "call 2");
    assert_eq!(router.process("/Stat extra args", ctx).await, "call 3");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_no_match_without_fallback() {
    let router = CommandRouter::new();
    assert_eq!(router.process("/nothing", RequestContext::new("ana")).await, UNRECOGNIZED_MESSAGE);
    assert_eq!(router.process("", RequestContext::new("ana")).await, UNRECOGNIZED_MESSAGE);
}

#[tokio::test]
async fn test_bot_builtin_commands_and_intents() {
    let dir = TempDir::new().unwrap();
    let resolver = MockResolver::new(MockAdapter::new(ProviderKind::Anthropic, "claude-3-opus"));
    let bot = assemble_bot(
        dir.path(),
        Arc::new(OfflineSourceControl::new()),
        &empty_discovery(dir.path()),
        resolver.clone(),
    )
    .await;

    let ctx = RequestContext::new("octocat");
    assert_eq!(bot.process("/ping", ctx.clone()).await, "pong");
    assert_eq!(bot.process("/pingping", ctx.clone()).await, "pong");
    assert!(bot.process("/help", ctx.clone()).await.contains("/run"));
    assert_eq!(bot.process("thank you", ctx.clone()).await, "You're welcome, @octocat!");

    assert_eq!(bot.router().command_names().len(), 13);
    assert_eq!(
        bot.router().intent_labels(),
        vec!["check_security", "help_with_git", "report_bug", "request_feature", "thanks"]
    );

    // No credential stored: the fallback cannot reach a model.
    assert_eq!(bot.process("what is the meaning of life", ctx).await, UNRECOGNIZED_MESSAGE);
    assert!(resolver.resolved().is_empty());
}

#[tokio::test]
async fn test_bot_fallback_chat_with_credential() {
    let dir = TempDir::new().unwrap();
    let resolver = MockResolver::new(
        MockAdapter::new(ProviderKind::Anthropic, "claude-3-opus").reply("Forty-two."),
    );
    let bot = assemble_bot(
        dir.path(),
        Arc::new(OfflineSourceControl::new()),
        &empty_discovery(dir.path()),
        resolver.clone(),
    )
    .await;
    bot.credentials().set(ProviderKind::Anthropic, "sk-ant").await.unwrap();

    let reply = bot.process("what is the meaning of life", RequestContext::new("octocat")).await;

    assert!(reply.contains("Forty-two."), "{reply}");
    assert!(reply.ends_with("Type /help for available commands."));
    let resolved = resolver.resolved();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].0, "claude-3-opus");
    let prompt = &resolver.adapter.requests()[0];
    assert!(prompt.messages.last().unwrap().content.contains("what is the meaning of life"));
}

#[tokio::test]
async fn test_status_command_reads_repository() {
    let dir = TempDir::new().unwrap();
    let scm = Arc::new(
        OfflineSourceControl::new()
            .respond(
                Method::GET,
                "/repos/octo/hello",
                json!({
                    "full_name": "octo/hello",
                    "description": "Says hello",
                    "stargazers_count": 3,
                    "forks_count": 1,
                    "open_issues_count": 2,
                    "default_branch": "main",
                }),
            )
            .respond(Method::GET, "/repos/octo/hello/actions/runs", json!({ "workflow_runs": [] })),
    );
    let resolver = MockResolver::new(MockAdapter::new(ProviderKind::OpenAi, "gpt-4o"));
    let bot = assemble_bot(dir.path(), scm.clone(), &empty_discovery(dir.path()), resolver).await;

    let outside = bot.process("/status", RequestContext::new("octocat")).await;
    assert!(!outside.contains("octo/hello"));
    assert!(scm.requests().is_empty());

    let ctx = RequestContext::new("octocat").in_repo(RepoRef::new("octo", "hello"));
    let reply = bot.process("/stat", ctx).await;
    assert!(reply.contains("octo/hello"), "{reply}");
    assert!(scm.writes().is_empty());
}
