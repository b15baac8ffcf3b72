//! Tests for fnforge-core: conversation tree, tool results, and the in-memory stores

use fnforge_core::*;
use serde_json::json;

// ===========================================================================
// Conversation tree
// ===========================================================================

#[test]
fn conversation_append_advances_head() {
    let mut conv = Conversation::new();
    let first = conv.append(Role::User, "hello");
    assert_eq!(conv.head(), Some(first));
    let second = conv.append(Role::Assistant, "hi there");
    assert_eq!(conv.head(), Some(second));
    assert_eq!(conv.len(), 2);
}

#[test]
fn active_path_runs_root_to_head() {
    let mut conv = Conversation::new();
    conv.append(Role::User, "one");
    conv.append(Role::Assistant, "two");
    conv.append(Role::User, "three");

    let path: Vec<&str> = conv.active_path().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(path, vec!["one", "two", "three"]);
}

#[test]
fn branching_switches_active_path() {
    let mut conv = Conversation::new();
    let root = conv.append(Role::User, "question");
    conv.append(Role::Assistant, "first answer");

    // Regenerate: branch a sibling answer under the same parent.
    conv.append_child_of(Some(root), Role::Assistant, "second answer");
    let path: Vec<&str> = conv.active_path().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(path, vec!["question", "second answer"]);

    // Both branches remain in the arena.
    assert_eq!(conv.len(), 3);
}

#[test]
fn set_head_moves_to_known_message_only() {
    let mut conv = Conversation::new();
    let first = conv.append(Role::User, "a");
    conv.append(Role::Assistant, "b");

    assert!(conv.set_head(first));
    assert_eq!(conv.head(), Some(first));

    let mut other = Conversation::new();
    let foreign = other.append(Role::User, "x");
    assert!(!conv.set_head(foreign));
    assert_eq!(conv.head(), Some(first));
}

#[test]
fn feedback_attaches_to_message() {
    let mut conv = Conversation::new();
    let id = conv.append(Role::Assistant, "answer");
    assert!(conv.set_feedback(id, "thumbs_up"));
    assert_eq!(conv.get(id).unwrap().feedback.as_deref(), Some("thumbs_up"));
}

#[test]
fn registry_get_or_create_is_shared() {
    let registry = ConversationRegistry::new();
    let a = registry.get_or_create("conv-1");
    let b = registry.get_or_create("conv-1");
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert!(registry.get("conv-2").is_none());
    assert_eq!(registry.list(), vec!["conv-1".to_string()]);
}

#[test]
fn message_serializes_round_trip() {
    let mut conv = Conversation::new();
    let root = conv.append(Role::User, "question");
    let id = conv.append(Role::Assistant, "answer");
    conv.set_feedback(id, "thumbs_up");

    let message = conv.get(id).unwrap().clone();
    let encoded = serde_json::to_string(&message).unwrap();
    let decoded: Message = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.id, id);
    assert_eq!(decoded.parent, Some(root));
    assert_eq!(decoded.content, "answer");
    assert_eq!(decoded.feedback.as_deref(), Some("thumbs_up"));
}

// ===========================================================================
// Target locks
// ===========================================================================

#[tokio::test]
async fn target_locks_evict_released_keys() {
    let locks = std::sync::Arc::new(TargetLocks::new());
    let guards = locks
        .acquire(&["function:a".to_string(), "function:b".to_string()])
        .await;
    assert_eq!(locks.len(), 2);
    drop(guards);
    assert!(locks.is_empty());
}

#[tokio::test]
async fn contended_target_lock_survives_until_last_holder() {
    let locks = std::sync::Arc::new(TargetLocks::new());
    let guards = locks.acquire(&["function:a".to_string()]).await;

    let waiter = {
        let locks = locks.clone();
        tokio::spawn(async move {
            let _guards = locks.acquire(&["function:a".to_string()]).await;
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(locks.len(), 1);

    drop(guards);
    waiter.await.unwrap();
    assert!(locks.is_empty());
}

// ===========================================================================
// ToolResult
// ===========================================================================

#[test]
fn tool_result_success_observation_is_payload() {
    let result = ToolResult::success("call_1", json!({ "name": "greet" }));
    assert!(!result.is_failure());
    assert_eq!(result.failure_kind(), None);
    assert_eq!(result.observation(), r#"{"name":"greet"}"#);
}

#[test]
fn tool_result_failure_observation_names_the_kind() {
    let result = ToolResult::failure("call_1", FailureKind::Timeout, "deadline exceeded");
    assert!(result.is_failure());
    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(result.observation(), "error[timeout]: deadline exceeded");
}

#[test]
fn error_failure_kind_mapping() {
    assert_eq!(
        Error::UnknownCapability("x".into()).failure_kind(),
        FailureKind::UnknownCapability
    );
    assert_eq!(
        Error::handler("boom").failure_kind(),
        FailureKind::HandlerError
    );
    assert_eq!(
        Error::FunctionNotFound("f".into()).failure_kind(),
        FailureKind::HandlerError
    );
    assert_eq!(
        Error::Compile("bad token".into()).failure_kind(),
        FailureKind::CompileError
    );
    assert_eq!(
        Error::PlanStale("p".into()).failure_kind(),
        FailureKind::PlanStale
    );
}

// ===========================================================================
// In-memory stores
// ===========================================================================

#[tokio::test]
async fn memory_project_function_crud() {
    let ctx = ProjectContext::in_memory();
    assert!(ctx.project.get_function("greet").await.is_none());

    ctx.project.upsert_function("greet", "export default () => 'hi'").await;
    let record = ctx.project.get_function("greet").await.unwrap();
    assert_eq!(record.code, "export default () => 'hi'");

    assert!(ctx.project.delete_function("greet").await);
    assert!(!ctx.project.delete_function("greet").await);
}

#[tokio::test]
async fn memory_project_lists_sorted() {
    let ctx = ProjectContext::in_memory();
    ctx.project.upsert_function("zeta", "z").await;
    ctx.project.upsert_function("alpha", "a").await;
    ctx.project.upsert_function("mid", "m").await;

    let names: Vec<String> = ctx
        .project
        .list_functions()
        .await
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn memory_compiler_rejects_marker() {
    let compiler = MemoryCompiler::new();
    assert!(compiler.compile("const x = 1;").await.is_ok());
    let err = compiler.compile("const %SYNTAX_ERROR% = 1;").await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::CompileError);
}

#[tokio::test]
async fn memory_sql_logs_statements() {
    let sql = MemorySql::new();
    sql.execute("SELECT 1").await.unwrap();
    sql.execute("SELECT 2").await.unwrap();
    assert_eq!(sql.executed().await, vec!["SELECT 1", "SELECT 2"]);

    let err = sql.execute("   ").await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::HandlerError);
}

#[tokio::test]
async fn memory_objects_round_trip() {
    let objects = MemoryObjects::new();
    objects.put("logo.png", vec![1, 2, 3], "image/png").await.unwrap();
    let (bytes, content_type) = objects.get("logo.png").await.unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
    assert_eq!(content_type, "image/png");
    assert!(objects.delete("logo.png").await);
    assert!(objects.get("logo.png").await.is_none());
}
