//! Integration tests for context injection
//!
//! Each test builds a throwaway project tree and drives the public API.

use context_injector::{
    config::CacheSettings, filter::calculate_content_relevance, metrics::METRICS,
    validation::audit_project, ContentType, ContextEngine, ContextError, ContextKind,
    ContextUpdate, Settings, TaskInjectionRequest,
};
use serde_json::{json, Map};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A project with every source present
fn full_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        ".asd/context/project.md",
        "---\ncontext_type: project\nproject_name: shop\nconstraints:\n  - no new deps\n  - keep api stable\n---\n# Shop\n",
    );
    write(
        root,
        ".asd/context/specs/FEAT-7-context.md",
        "---\nspec_id: FEAT-7\nstatus: active\npriority: P1\nconstraints: [no new deps]\nresearch_findings: [redis handles 50k ops]\nimplementation_decisions: [use-redis]\nprogress:\n  phase: design\n---\nRate limiting for the public API.\n",
    );
    write(
        root,
        ".asd/context/tasks/T-7-context.md",
        "---\ntask_id: T-7\nspec_id: FEAT-7\nstatus: in_progress\ndecisions_made: [use-redis, sliding window]\nresearch_findings: [redis handles 50k ops]\nprogress:\n  phase: build\nblockers: [load test env]\n---\nImplement the middleware.\n",
    );
    write(
        root,
        ".asd/agents/backend-developer.md",
        "---\nagent_type: backend-developer\ncapabilities: [api, database]\ncontext_requirements: [rate-limiting, redis]\n---\n# Backend developer\n",
    );
    write(
        root,
        ".asd/processes/validation-checklist.md",
        "- [ ] tests pass\n",
    );
    write(
        root,
        ".asd/state/assignments.json",
        r#"{"T-7": {"agent": "backend-developer"}}"#,
    );
    write(root, ".asd/state/progress.json", r#"{"FEAT-7": {"percent": 40}}"#);
    write(
        root,
        ".asd/config/agent-capabilities.json",
        r#"{"context_filtering": {"backend-developer": {"include_patterns": ["redis"], "exclude_patterns": ["frontend*"]}}}"#,
    );
    dir
}

#[tokio::test]
async fn test_bare_project_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ContextEngine::for_project(dir.path());

    let bundle = assert_ok!(engine.inject_context("backend-developer", None, None, true).await);
    let value = serde_json::to_value(&bundle).unwrap();

    for layer in ["critical", "taskSpecific", "agentSpecific", "process"] {
        assert!(value["layers"].get(layer).is_some(), "missing {layer}");
    }
    assert!(value["layers"]["taskSpecific"]["spec"].is_null());
    assert!(value["layers"]["taskSpecific"]["task"].is_null());
    assert_eq!(value["filtering"]["method"], "advanced");
    assert!(bundle.filtering.include_patterns.is_empty());
    assert!(bundle.filtering.exclude_patterns.is_empty());
    assert!(bundle.validation.is_valid, "{:?}", bundle.validation.errors);
    assert!(!bundle
        .validation
        .warnings
        .iter()
        .any(|w| w.contains("Missing context layer")));
}

#[tokio::test]
async fn test_missing_agent_type() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ContextEngine::for_project(dir.path());

    let err = assert_err!(engine.inject_context("", Some("FEAT-1"), None, true).await);
    assert!(matches!(err, ContextError::Injection { .. }));
    assert!(err.to_string().contains("Agent type is required"));
}

#[tokio::test]
async fn test_task_decisions_without_spec() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".asd/context/tasks/T-1-context.md",
        "---\ntask_id: T-1\ndecisions_made: [\"use-redis\"]\n---\n",
    );
    let engine = ContextEngine::for_project(dir.path());

    let bundle = assert_ok!(
        engine
            .inject_context("backend-developer", Some("FEAT-1"), Some("T-1"), false)
            .await
    );
    let decisions: Vec<&String> = bundle
        .inheritance
        .decisions
        .iter()
        .filter(|d| *d == "use-redis")
        .collect();
    assert_eq!(decisions.len(), 1);
    assert!(bundle.inheritance.hierarchy.contains(&"task".to_string()));
    assert!(!bundle.inheritance.hierarchy.contains(&"spec".to_string()));
}

#[test]
fn test_flexible_requirement_match() {
    let score = calculate_content_relevance(
        "We apply rate limiting per client",
        &["rate-limiting".to_string()],
        ContentType::TaskSpecific,
    );
    assert!(score.overall_score > 0.0);
    assert!(score.overall_score < 0.3);
}

#[tokio::test]
async fn test_full_project_bundle() {
    let dir = full_project();
    let engine = ContextEngine::for_project(dir.path());

    let bundle = assert_ok!(
        engine
            .inject_context("backend-developer", Some("FEAT-7"), Some("T-7"), true)
            .await
    );

    let inheritance = &bundle.inheritance;
    assert_eq!(inheritance.hierarchy, vec!["project", "spec", "task"]);
    assert_eq!(
        inheritance.constraints.iter().cloned().collect::<Vec<_>>(),
        vec!["no new deps", "keep api stable"]
    );
    assert_eq!(
        inheritance.decisions.iter().cloned().collect::<Vec<_>>(),
        vec!["use-redis", "sliding window"]
    );
    assert_eq!(inheritance.research_findings.len(), 1);
    assert_eq!(inheritance.progress["phase"], "build");
    assert_eq!(inheritance.blockers, vec!["load test env"]);
    assert_eq!(inheritance.current_assignments.as_ref().unwrap()["agent"], "backend-developer");
    assert_eq!(inheritance.current_progress.as_ref().unwrap()["percent"], 40);

    let layers = &bundle.layers;
    assert_eq!(layers.critical.constraints, vec!["no new deps", "keep api stable"]);
    assert_eq!(layers.agent_specific.context_requirements, vec!["rate-limiting", "redis"]);
    assert_eq!(layers.task_specific.task.as_ref().unwrap().id, "T-7");
    assert!(layers.process.checklists.contains_key("validation-checklist"));

    let filtering = &bundle.filtering;
    assert_eq!(filtering.include_patterns, vec!["redis"]);
    assert!(filtering.relevance_scores["taskSpecific"].overall_score > 0.0);
    assert!(filtering
        .node_matches
        .iter()
        .any(|node| node.matched_includes.contains(&"redis".to_string())));
    for score in filtering.relevance_scores.values() {
        assert!((0.0..=1.0).contains(&score.overall_score));
    }

    assert!(bundle.validation.is_valid, "{:?}", bundle.validation.errors);
    assert!(!bundle
        .validation
        .warnings
        .iter()
        .any(|w| w.starts_with("Inheritance hierarchy")));
    assert!(bundle.metadata.performance.contains_key("total"));
    assert_eq!(engine.cache_stats().valid_entries, 1);
}

#[tokio::test]
async fn test_filter_rules_follow_requested_agent_type() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".asd/agents/backend-developer.md",
        "---\nagent_type: backend\ncapabilities: [api]\ncontext_requirements: [api]\n---\n",
    );
    write(
        dir.path(),
        ".asd/config/agent-capabilities.json",
        r#"{"context_filtering": {"backend-developer": {"include_patterns": ["api"]}}}"#,
    );
    let engine = ContextEngine::for_project(dir.path());

    let bundle = assert_ok!(engine.inject_context("backend-developer", None, None, false).await);
    assert_eq!(bundle.layers.agent_specific.agent_type, "backend-developer");
    assert_eq!(bundle.filtering.agent_type, "backend-developer");
    assert_eq!(bundle.filtering.include_patterns, vec!["api"]);
}

#[tokio::test]
async fn test_cache_entry_expires() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        cache: CacheSettings {
            ttl_ms: 1,
            ..Default::default()
        },
        ..Settings::for_project(dir.path())
    };
    let engine = ContextEngine::new(settings);

    let first = assert_ok!(engine.inject_context("backend-developer", None, None, true).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = assert_ok!(engine.inject_context("backend-developer", None, None, true).await);

    assert_ne!(first.metadata.request_id, second.metadata.request_id);
    assert_eq!(engine.cache_stats().total_entries, 1);
}

#[tokio::test]
async fn test_disabled_cache_never_stores() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        cache: CacheSettings {
            enabled: false,
            ..Default::default()
        },
        ..Settings::for_project(dir.path())
    };
    let engine = ContextEngine::new(settings);

    assert_ok!(engine.inject_context("backend-developer", None, None, true).await);
    assert_eq!(engine.cache_stats().total_entries, 0);
}

#[tokio::test]
async fn test_update_then_inject_sees_new_header() {
    let dir = full_project();
    let engine = ContextEngine::for_project(dir.path());

    let mut header = Map::new();
    header.insert("blockers".to_string(), json!(["waiting on security review"]));
    let updated = engine
        .update_context(
            ContextKind::Task,
            "T-7",
            ContextUpdate {
                header,
                body: None,
            },
        )
        .await;
    assert!(updated);

    let bundle = assert_ok!(
        engine
            .inject_context("backend-developer", Some("FEAT-7"), Some("T-7"), true)
            .await
    );
    assert_eq!(bundle.inheritance.blockers, vec!["waiting on security review"]);

    let task = bundle.layers.task_specific.task.unwrap();
    assert!(task.header.contains_key("last_updated"));
    assert_eq!(task.body, "Implement the middleware.\n");
}

#[tokio::test]
async fn test_update_rejects_path_like_ids() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ContextEngine::for_project(dir.path());
    let updated = engine
        .update_context(ContextKind::Spec, "../escape", ContextUpdate::default())
        .await;
    assert!(!updated);
}

#[tokio::test]
async fn test_task_injection_delegates_when_not_automated() {
    let dir = full_project();
    let engine = ContextEngine::for_project(dir.path());
    let request: TaskInjectionRequest = serde_json::from_value(json!({
        "agentType": "backend-developer",
        "specId": "FEAT-7",
        "taskId": "T-7"
    }))
    .unwrap();

    let bundle = assert_ok!(engine.inject_context_for_task(request).await);
    assert!(bundle.automation.is_none());
    assert_eq!(bundle.metadata.task_id.as_deref(), Some("T-7"));
}

#[tokio::test]
async fn test_audit_full_project() {
    let dir = full_project();
    let report = assert_ok!(audit_project(dir.path()).await);

    // project, spec, task and agent documents plus the checklist
    assert_eq!(report.total, 5);
    assert!(report.failures.is_empty());
    assert!(report.all_valid(), "{:?}", report.results);
}

#[tokio::test]
async fn test_metrics_exported() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ContextEngine::for_project(dir.path());
    assert_ok!(engine.inject_context("backend-developer", None, None, false).await);

    let text = METRICS.export_prometheus();
    assert!(text.contains("context_injections_total"));
}

#[test]
fn test_settings_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("context-injector.toml");
    std::fs::write(
        &path,
        "project_root = \"/srv/project\"\n[cache]\nttl_ms = 1000\nmax_entries = 8\n",
    )
    .unwrap();

    let settings = assert_ok!(Settings::load(Some(&path)));
    assert_eq!(settings.project_root, Path::new("/srv/project"));
    assert_eq!(settings.cache.ttl_ms, 1000);
    assert_eq!(settings.cache.max_entries, 8);
    assert!(settings.cache.enabled);
}

