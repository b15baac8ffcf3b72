//! Tests for fnforge-capabilities: registry, dispatcher guarantees, and the builtin surface

use fnforge_capabilities::{
    builtin_registry, validate_arguments, Capability, CapabilityClass, CapabilityRegistry,
    Dispatcher, DispatcherConfig,
};
use fnforge_core::{
    Dependency, EnvVar, Error, FailureKind, FunctionRecord, GitConfig, MemoryProject,
    ObjectStore, Plan, ProjectContext, ProjectStore, Result, SiteFile, TargetLocks, ToolCall,
};
use fnforge_plan::PlanEngine;
use fnforge_sync::{MemoryRemote, SyncEngine};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    ctx: ProjectContext,
    remote: Arc<MemoryRemote>,
    dispatcher: Dispatcher,
}

fn fixture() -> Fixture {
    fixture_with_config(DispatcherConfig::default())
}

fn fixture_with_config(config: DispatcherConfig) -> Fixture {
    let ctx = ProjectContext::in_memory();
    fixture_with_context(ctx, config)
}

fn fixture_with_context(ctx: ProjectContext, config: DispatcherConfig) -> Fixture {
    let locks = Arc::new(TargetLocks::new());
    let remote = Arc::new(MemoryRemote::new());
    let plans = Arc::new(
        PlanEngine::new(ctx.project.clone(), ctx.compiler.clone())
            .with_target_locks(locks.clone()),
    );
    let sync = Arc::new(SyncEngine::new(ctx.project.clone(), remote.clone()));
    let registry = builtin_registry(ctx.clone(), plans, sync).unwrap();
    Fixture {
        ctx,
        remote,
        dispatcher: Dispatcher::new(Arc::new(registry), config).with_target_locks(locks),
    }
}

fn call(name: &str, args: Value) -> ToolCall {
    ToolCall::new(name, args)
}

// ===========================================================================
// Registry
// ===========================================================================

struct Probe {
    name: &'static str,
    executions: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Capability for Probe {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "test probe"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "value": { "type": "string" } },
            "required": ["value"]
        })
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "ok": true }))
    }
}

#[test]
fn registry_rejects_duplicate_names() {
    let mut registry = CapabilityRegistry::new();
    let executions = Arc::new(AtomicUsize::new(0));
    registry
        .register(Probe {
            name: "probe",
            executions: executions.clone(),
        })
        .unwrap();
    let err = registry
        .register(Probe {
            name: "probe",
            executions,
        })
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateCapability(_)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn registry_definitions_are_sorted() {
    let fixture = fixture();
    let definitions = fixture.dispatcher.registry().definitions();
    let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}

#[test]
fn builtin_registry_covers_every_family() {
    let fixture = fixture();
    let names = fixture.dispatcher.registry().list();
    for expected in [
        "function.create",
        "function.update",
        "function.delete",
        "function.get",
        "function.list",
        "function.decompose",
        "function.merge",
        "plan.confirm",
        "site.write",
        "site.delete",
        "file.upload",
        "file.delete",
        "deps.add",
        "deps.remove",
        "deps.list",
        "env.set",
        "env.unset",
        "env.list",
        "db.get_schema",
        "db.update_schema",
        "db.query",
        "test.run",
        "git.preview_pull",
        "git.pull",
        "git.preview_push",
        "git.push",
    ] {
        assert!(names.contains(&expected), "missing capability {}", expected);
    }
}

// ===========================================================================
// Argument validation
// ===========================================================================

#[test]
fn validation_checks_required_and_types() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "count": { "type": "integer" },
            "mode": { "type": "string", "enum": ["fast", "slow"] }
        },
        "required": ["name"]
    });

    assert!(validate_arguments(&schema, &json!({ "name": "x" })).is_ok());
    assert!(validate_arguments(&schema, &json!({})).is_err());
    assert!(validate_arguments(&schema, &json!({ "name": 7 })).is_err());
    assert!(validate_arguments(&schema, &json!({ "name": "x", "count": "nope" })).is_err());
    assert!(validate_arguments(&schema, &json!({ "name": "x", "mode": "warp" })).is_err());
    // Unknown keys pass through.
    assert!(validate_arguments(&schema, &json!({ "name": "x", "extra": true })).is_ok());
    // Non-object arguments (e.g. malformed model output kept as a string).
    assert!(validate_arguments(&schema, &json!("{oops")).is_err());
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_handler() {
    let executions = Arc::new(AtomicUsize::new(0));
    let mut registry = CapabilityRegistry::new();
    registry
        .register(Probe {
            name: "probe",
            executions: executions.clone(),
        })
        .unwrap();
    let dispatcher = Dispatcher::new(Arc::new(registry), DispatcherConfig::default());

    let result = dispatcher.dispatch(call("probe", json!({ "value": 3 }))).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidArguments));
    assert_eq!(executions.load(Ordering::SeqCst), 0);

    let result = dispatcher
        .dispatch(call("probe", json!({ "value": "ok" })))
        .await;
    assert!(!result.is_failure());
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

// ===========================================================================
// Dispatcher guarantees
// ===========================================================================

#[tokio::test]
async fn unknown_capability_is_a_failure_result() {
    let fixture = fixture();
    let result = fixture
        .dispatcher
        .dispatch(call("nonexistent.op", json!({})))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::UnknownCapability));
}

#[tokio::test]
async fn destructive_capability_requires_confirm() {
    let fixture = fixture();
    fixture.ctx.project.upsert_function("doomed", "code").await;

    let result = fixture
        .dispatcher
        .dispatch(call("function.delete", json!({ "name": "doomed" })))
        .await;
    assert_eq!(
        result.failure_kind(),
        Some(FailureKind::ConfirmationRequired)
    );
    assert!(fixture.ctx.project.get_function("doomed").await.is_some());

    let result = fixture
        .dispatcher
        .dispatch(call(
            "function.delete",
            json!({ "name": "doomed", "confirm": true }),
        ))
        .await;
    assert!(!result.is_failure());
    assert!(fixture.ctx.project.get_function("doomed").await.is_none());
}

#[tokio::test]
async fn confirm_false_is_not_confirmation() {
    let fixture = fixture();
    let result = fixture
        .dispatcher
        .dispatch(call(
            "site.delete",
            json!({ "path": "index.html", "confirm": false }),
        ))
        .await;
    assert_eq!(
        result.failure_kind(),
        Some(FailureKind::ConfirmationRequired)
    );
}

struct Sleeper;

#[async_trait::async_trait]
impl Capability for Sleeper {
    fn name(&self) -> &str {
        "sleeper"
    }
    fn description(&self) -> &str {
        "sleeps past the deadline"
    }
    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(json!({}))
    }
}

#[tokio::test]
async fn slow_handler_times_out_by_class() {
    let mut registry = CapabilityRegistry::new();
    registry.register(Sleeper).unwrap();
    let config = DispatcherConfig {
        edit_timeout: Duration::from_millis(20),
        ..DispatcherConfig::default()
    };
    let dispatcher = Dispatcher::new(Arc::new(registry), config);

    let result = dispatcher.dispatch(call("sleeper", json!({}))).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
}

#[tokio::test]
async fn handler_error_becomes_failure_result() {
    let fixture = fixture();
    // Empty SQL statements are a handler-level failure in the memory engine.
    let result = fixture
        .dispatcher
        .dispatch(call("db.query", json!({ "sql": "  " })))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::HandlerError));
}

// ===========================================================================
// Per-target serialization
// ===========================================================================

struct Overlap {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    key: &'static str,
}

#[async_trait::async_trait]
impl Capability for Overlap {
    fn name(&self) -> &str {
        "overlap"
    }
    fn description(&self) -> &str {
        "tracks concurrent executions per target"
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "target": { "type": "string" } },
            "required": ["target"]
        })
    }
    fn target_keys(&self, args: &Value) -> Vec<String> {
        args.get("target")
            .and_then(Value::as_str)
            .map(|t| vec![format!("{}:{}", self.key, t)])
            .unwrap_or_default()
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({}))
    }
}

#[tokio::test]
async fn same_target_key_serializes_handlers() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut registry = CapabilityRegistry::new();
    registry
        .register(Overlap {
            running: running.clone(),
            peak: peak.clone(),
            key: "function",
        })
        .unwrap();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        DispatcherConfig::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch(call("overlap", json!({ "target": "same" })))
                .await
        }));
    }
    for handle in handles {
        assert!(!handle.await.unwrap().is_failure());
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1, "same-key calls overlapped");
    // Released keys are evicted rather than accumulating.
    assert!(dispatcher.target_locks().is_empty());
}

#[tokio::test]
async fn distinct_target_keys_run_concurrently() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut registry = CapabilityRegistry::new();
    registry
        .register(Overlap {
            running: running.clone(),
            peak: peak.clone(),
            key: "function",
        })
        .unwrap();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        DispatcherConfig::default(),
    ));

    let a = dispatcher.dispatch(call("overlap", json!({ "target": "a" })));
    let b = dispatcher.dispatch(call("overlap", json!({ "target": "b" })));
    let (ra, rb) = tokio::join!(a, b);
    assert!(!ra.is_failure());
    assert!(!rb.is_failure());
    assert!(
        peak.load(Ordering::SeqCst) >= 2,
        "distinct-key calls never overlapped"
    );
}

// ===========================================================================
// Plan confirm vs direct edits
// ===========================================================================

/// Store whose function deletes linger, widening the apply-phase window in
/// which a racing edit could otherwise slip in.
struct SlowDeleteStore {
    inner: MemoryProject,
}

#[async_trait::async_trait]
impl ProjectStore for SlowDeleteStore {
    async fn get_function(&self, name: &str) -> Option<FunctionRecord> {
        self.inner.get_function(name).await
    }
    async fn list_functions(&self) -> Vec<FunctionRecord> {
        self.inner.list_functions().await
    }
    async fn upsert_function(&self, name: &str, code: &str) -> FunctionRecord {
        self.inner.upsert_function(name, code).await
    }
    async fn delete_function(&self, name: &str) -> bool {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.inner.delete_function(name).await
    }
    async fn get_site_file(&self, path: &str) -> Option<SiteFile> {
        self.inner.get_site_file(path).await
    }
    async fn list_site_files(&self) -> Vec<SiteFile> {
        self.inner.list_site_files().await
    }
    async fn upsert_site_file(&self, path: &str, content: &str) -> SiteFile {
        self.inner.upsert_site_file(path, content).await
    }
    async fn delete_site_file(&self, path: &str) -> bool {
        self.inner.delete_site_file(path).await
    }
    async fn dependencies(&self) -> Vec<Dependency> {
        self.inner.dependencies().await
    }
    async fn add_dependency(&self, name: &str, version: &str) {
        self.inner.add_dependency(name, version).await
    }
    async fn remove_dependency(&self, name: &str) -> bool {
        self.inner.remove_dependency(name).await
    }
    async fn env_vars(&self) -> Vec<EnvVar> {
        self.inner.env_vars().await
    }
    async fn set_env_var(&self, name: &str, value: &str) {
        self.inner.set_env_var(name, value).await
    }
    async fn unset_env_var(&self, name: &str) -> bool {
        self.inner.unset_env_var(name).await
    }
    async fn schema(&self) -> Value {
        self.inner.schema().await
    }
    async fn set_schema(&self, schema: Value) {
        self.inner.set_schema(schema).await
    }
    async fn get_plan(&self, id: &str) -> Option<Plan> {
        self.inner.get_plan(id).await
    }
    async fn put_plan(&self, plan: Plan) {
        self.inner.put_plan(plan).await
    }
    async fn delete_plan(&self, id: &str) -> bool {
        self.inner.delete_plan(id).await
    }
    async fn git_config(&self) -> Option<GitConfig> {
        self.inner.git_config().await
    }
    async fn set_git_config(&self, config: GitConfig) {
        self.inner.set_git_config(config).await
    }
}

#[tokio::test]
async fn confirm_excludes_concurrent_edits_of_its_targets() {
    let ctx = ProjectContext {
        project: Arc::new(SlowDeleteStore {
            inner: MemoryProject::new(),
        }),
        ..ProjectContext::in_memory()
    };
    let fixture = Arc::new(fixture_with_context(ctx, DispatcherConfig::default()));
    fixture.ctx.project.upsert_function("orig", "fn orig").await;

    let analyze = fixture
        .dispatcher
        .dispatch(call(
            "function.decompose",
            json!({ "name": "orig", "pieces": [{ "name": "part", "code": "fn part" }] }),
        ))
        .await;
    assert!(!analyze.is_failure());
    let payload: Value = serde_json::from_str(&analyze.observation()).unwrap();
    let plan_id = payload["plan_id"].as_str().unwrap().to_string();

    let confirming = {
        let fixture = fixture.clone();
        tokio::spawn(async move {
            fixture
                .dispatcher
                .dispatch(call("plan.confirm", json!({ "plan_id": plan_id })))
                .await
        })
    };
    // Race an edit into the middle of the apply phase.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let update = fixture
        .dispatcher
        .dispatch(call(
            "function.update",
            json!({ "name": "orig", "code": "concurrent edit" }),
        ))
        .await;
    let confirm = confirming.await.unwrap();

    // Exactly one side can win: an edit accepted first stales the plan,
    // and an applied plan leaves the edit nothing to update.
    assert!(
        confirm.is_failure() || update.is_failure(),
        "a confirm and an edit of the same function both succeeded"
    );
    if !update.is_failure() {
        assert_eq!(
            fixture.ctx.project.get_function("orig").await.unwrap().code,
            "concurrent edit"
        );
    }
    if !confirm.is_failure() {
        assert!(fixture.ctx.project.get_function("orig").await.is_none());
        assert!(fixture.ctx.project.get_function("part").await.is_some());
    }
}

// ===========================================================================
// Builtin flows end to end
// ===========================================================================

#[tokio::test]
async fn function_lifecycle_through_dispatcher() {
    let fixture = fixture();

    let result = fixture
        .dispatcher
        .dispatch(call(
            "function.create",
            json!({ "name": "greet", "code": "export default () => 'hi'" }),
        ))
        .await;
    assert!(!result.is_failure());

    let result = fixture
        .dispatcher
        .dispatch(call("function.get", json!({ "name": "greet" })))
        .await;
    assert!(result.observation().contains("export default"));

    // Updating a function that does not exist is a handler failure.
    let result = fixture
        .dispatcher
        .dispatch(call(
            "function.update",
            json!({ "name": "ghost", "code": "x" }),
        ))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::HandlerError));
}

#[tokio::test]
async fn test_run_reports_compile_failure() {
    let fixture = fixture();
    fixture
        .ctx
        .project
        .upsert_function("broken", "%SYNTAX_ERROR%")
        .await;

    let result = fixture
        .dispatcher
        .dispatch(call("test.run", json!({ "name": "broken" })))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::CompileError));

    let result = fixture
        .dispatcher
        .dispatch(call("test.run", json!({ "name": "missing" })))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::HandlerError));
}

#[tokio::test]
async fn file_upload_rejects_bad_base64() {
    let fixture = fixture();
    let result = fixture
        .dispatcher
        .dispatch(call(
            "file.upload",
            json!({ "key": "logo.png", "content": "!!not-base64!!" }),
        ))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidArguments));

    let result = fixture
        .dispatcher
        .dispatch(call(
            "file.upload",
            json!({ "key": "note.txt", "content": "aGVsbG8=" }),
        ))
        .await;
    assert!(!result.is_failure());
    let (bytes, _) = fixture.ctx.objects.get("note.txt").await.unwrap();
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn decompose_confirm_flow_through_dispatcher() {
    let fixture = fixture();
    fixture
        .ctx
        .project
        .upsert_function("monolith", "fn a\nfn b")
        .await;

    let result = fixture
        .dispatcher
        .dispatch(call(
            "function.decompose",
            json!({
                "name": "monolith",
                "pieces": [
                    { "name": "part_a", "code": "fn a" },
                    { "name": "part_b", "code": "fn b" }
                ]
            }),
        ))
        .await;
    assert!(!result.is_failure());
    let payload: Value = serde_json::from_str(&result.observation()).unwrap();
    let plan_id = payload["plan_id"].as_str().unwrap().to_string();

    // Analysis alone changed nothing.
    assert!(fixture.ctx.project.get_function("part_a").await.is_none());

    let result = fixture
        .dispatcher
        .dispatch(call("plan.confirm", json!({ "plan_id": plan_id })))
        .await;
    assert!(!result.is_failure());
    assert!(fixture.ctx.project.get_function("part_a").await.is_some());
    assert!(fixture.ctx.project.get_function("monolith").await.is_none());
}

#[tokio::test]
async fn git_pull_flow_through_dispatcher() {
    let fixture = fixture();
    fixture
        .ctx
        .project
        .set_git_config(GitConfig::new(
            "https://github.com/acme/site",
            "main",
            "tok",
            "functions",
        ))
        .await;
    fixture.remote.seed("functions/hello.ts", "remote code");

    let result = fixture
        .dispatcher
        .dispatch(call("git.preview_pull", json!({})))
        .await;
    assert!(result.observation().contains("hello"));

    let result = fixture
        .dispatcher
        .dispatch(call("git.pull", json!({ "names": ["hello"] })))
        .await;
    assert!(!result.is_failure());
    assert_eq!(
        fixture.ctx.project.get_function("hello").await.unwrap().code,
        "remote code"
    );

    // Push is destructive and needs confirmation.
    let result = fixture
        .dispatcher
        .dispatch(call("git.push", json!({ "names": ["hello"] })))
        .await;
    assert_eq!(
        result.failure_kind(),
        Some(FailureKind::ConfirmationRequired)
    );
}

#[tokio::test]
async fn git_pull_bad_resolution_value_is_invalid() {
    let fixture = fixture();
    fixture
        .ctx
        .project
        .set_git_config(GitConfig::new(
            "https://github.com/acme/site",
            "main",
            "tok",
            "functions",
        ))
        .await;

    let result = fixture
        .dispatcher
        .dispatch(call(
            "git.pull",
            json!({ "names": ["a"], "resolutions": { "a": "theirs" } }),
        ))
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::InvalidArguments));
}

#[tokio::test]
async fn capability_classes_are_declared() {
    let fixture = fixture();
    let registry = fixture.dispatcher.registry();
    assert_eq!(
        registry.lookup("git.pull").unwrap().class(),
        CapabilityClass::Git
    );
    assert_eq!(
        registry.lookup("db.query").unwrap().class(),
        CapabilityClass::Database
    );
    assert_eq!(
        registry.lookup("test.run").unwrap().class(),
        CapabilityClass::Test
    );
    assert_eq!(
        registry.lookup("function.create").unwrap().class(),
        CapabilityClass::Edit
    );
}
