//! Workflow engine integration tests: critical vs non-critical failures,
//! configuration errors and model selection.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hubwright_abstraction::ProviderKind;
use hubwright_core::workflow::{
    Context, FnStep, StepError, StepHandler, StepOutcome, WorkflowDefinition, WorkflowEngine, WorkflowError,
    WorkflowRegistry, WorkflowStatus, execute_steps,
};
use hubwright_core::{CredentialStore, ModelCatalog, OfflineSourceControl};
use hubwright_models::MockAdapter;
use reqwest::Method;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::RwLock;

use common::{MockResolver, PASSPHRASE, context};

fn emit(key: &'static str, value: &'static str) -> Arc<dyn StepHandler> {
    Arc::new(FnStep(move |_: &Context| {
        let mut out = Context::new();
        out.insert(key.to_string(), json!(value));
        Ok(out)
    }))
}

fn fail(message: &'static str) -> Arc<dyn StepHandler> {
    Arc::new(FnStep(move |_: &Context| Err(StepError::Invalid(message.to_string()))))
}

#[tokio::test]
async fn test_non_critical_failure_is_recorded_and_skipped() {
    let definition = WorkflowDefinition::new("abc")
        .critical_step("a", "first", emit("a", "done"))
        .step("b", "optional", fail("b exploded"))
        .step(
            "c",
            "reads a",
            Arc::new(FnStep(|ctx: &Context| {
                let a = ctx.get("a").and_then(|v| v.as_str()).ok_or_else(|| StepError::MissingContext("a".into()))?;
                Ok(context(json!({ "c": format!("saw {}", a) })))
            })),
        );
    let adapter = MockAdapter::new(ProviderKind::OpenAi, "gpt-4o");

    let result = execute_steps(&definition, Context::new(), "gpt-4o", &adapter).await.unwrap();

    assert_eq!(result.status, WorkflowStatus::Succeeded);
    assert_eq!(result.steps.len(), 3);
    assert_eq!(result.step("b").unwrap().error(), Some("b exploded"));
    assert!(result.step("c").unwrap().is_success());
    assert_eq!(result.context["c"], "saw done");
    assert!(!result.context.contains_key("b"));
}

#[tokio::test]
async fn test_critical_failure_halts_pipeline() {
    let ran_after = Arc::new(AtomicUsize::new(0));
    let counter = ran_after.clone();
    let definition = WorkflowDefinition::new("halts")
        .critical_step("a", "foundational", fail("no data"))
        .step(
            "b",
            "never runs",
            Arc::new(FnStep(move |_: &Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Context::new())
            })),
        );
    let adapter = MockAdapter::new(ProviderKind::OpenAi, "gpt-4o");

    let err = execute_steps(&definition, Context::new(), "gpt-4o", &adapter).await.unwrap_err();

    match err {
        WorkflowError::CriticalStep { step, message, partial, .. } => {
            assert_eq!(step, "a");
            assert_eq!(message, "no data");
            assert_eq!(partial.status, WorkflowStatus::Failed);
            assert_eq!(partial.steps.len(), 1);
            assert!(matches!(partial.steps[0].outcome, StepOutcome::Error { .. }));
            assert_eq!(partial.error.as_deref(), Some("Critical step 'a' failed: no data"));
        }
        other => panic!("expected CriticalStep, got {other:?}"),
    }
    assert_eq!(ran_after.load(Ordering::SeqCst), 0);
}

async fn engine_with(
    dir: &TempDir,
    resolver: Arc<MockResolver>,
    registry: WorkflowRegistry,
) -> (WorkflowEngine, Arc<CredentialStore>) {
    let credentials = Arc::new(CredentialStore::new(dir.path().join("keys.enc"), Some(PASSPHRASE.into())));
    credentials.initialize().await.unwrap();
    let catalog = Arc::new(RwLock::new(ModelCatalog::builtin()));
    let engine = WorkflowEngine::new(catalog, credentials.clone(), resolver, Arc::new(registry));
    (engine, credentials)
}

#[tokio::test]
async fn test_missing_secret_is_configuration_error_before_any_step() {
    let dir = TempDir::new().unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    let definition = WorkflowDefinition::new("counting").critical_step(
        "count",
        "counts",
        Arc::new(FnStep(move |_: &Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Context::new())
        })),
    );
    let resolver = MockResolver::new(MockAdapter::new(ProviderKind::OpenAi, "gpt-4o"));
    let (engine, _) = engine_with(&dir, resolver.clone(), WorkflowRegistry::new()).await;

    let catalog = ModelCatalog::builtin();
    let err = engine.execute(&definition, Context::new(), catalog.get("gpt-4o")).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Configuration(_)), "{err}");

    let err = engine.execute(&definition, Context::new(), None).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Configuration(_)));

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(resolver.resolved().is_empty());
}

#[tokio::test]
async fn test_run_reports_errors_in_result() {
    let dir = TempDir::new().unwrap();
    let resolver = MockResolver::new(MockAdapter::new(ProviderKind::OpenAi, "gpt-4o"));
    let scm = Arc::new(OfflineSourceControl::new());
    let (engine, _) = engine_with(&dir, resolver, WorkflowRegistry::builtin(scm)).await;

    let unknown = engine.run("deploy-prod", Context::new(), None).await;
    assert_eq!(unknown.status, WorkflowStatus::Failed);
    assert_eq!(unknown.error.as_deref(), Some("Unknown workflow: deploy-prod"));

    let no_secret = engine.run("code-review", Context::new(), None).await;
    assert_eq!(no_secret.status, WorkflowStatus::Failed);
    assert!(no_secret.error.unwrap().starts_with("Configuration error"));
    assert!(no_secret.steps.is_empty());
}

#[tokio::test]
async fn test_run_selects_by_capability_and_preference() {
    let dir = TempDir::new().unwrap();
    let files = json!([{ "filename": "src/lib.rs", "status": "modified", "additions": 1, "deletions": 0 }]);
    let scm = Arc::new(
        OfflineSourceControl::new()
            .respond(Method::GET, "/repos/o/r/pulls/9/files", files)
            .respond(Method::GET, "/repos/o/r/pulls/9", json!({ "title": "Tidy", "body": "", "user": { "login": "dev" } }))
            .respond(Method::POST, "/repos/o/r/issues/9/comments", json!({ "html_url": "u" })),
    );
    let resolver = MockResolver::new(
        MockAdapter::new(ProviderKind::OpenAi, "gpt-4o").reply("1. One issue").reply("LGTM"),
    );
    let (engine, credentials) = engine_with(&dir, resolver.clone(), WorkflowRegistry::builtin(scm.clone())).await;
    credentials.set(ProviderKind::OpenAi, "sk-openai-test").await.unwrap();
    credentials.set(ProviderKind::Anthropic, "sk-ant-test").await.unwrap();

    let ctx = context(json!({ "owner": "o", "repo": "r", "pull_number": 9 }));

    // code + reasoning: gpt-4o has the highest performance among covering models.
    let review = engine.run("code-review", ctx.clone(), None).await;
    assert!(review.is_success(), "{:?}", review.error);
    assert_eq!(review.model_name.as_deref(), Some("gpt-4o"));
    assert_eq!(review.context["review"], "LGTM");
    assert_eq!(scm.writes().len(), 1);

    let summary = engine.run("pr-summary", ctx, Some("claude-3-opus")).await;
    assert!(summary.is_success(), "{:?}", summary.error);
    assert_eq!(summary.model_name.as_deref(), Some("claude-3-opus"));

    assert_eq!(
        resolver.resolved(),
        vec![
            ("gpt-4o".to_string(), Some("sk-openai-test".to_string())),
            ("claude-3-opus".to_string(), Some("sk-ant-test".to_string())),
        ]
    );
}
