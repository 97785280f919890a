//! Contracts for the shaping pipeline and validator through the public API.

mod common;

use agentinterface::component::{validate_tree, ComponentRegistry};
use agentinterface::dispatch::{enhance, Agent, AgentOutput, EnhanceOptions, EnhancedResponse};
use agentinterface::error::{InterfaceError, SchemaViolation};
use agentinterface::shaper::{shape, ShapingContext};
use agentinterface::protocol;
use agentinterface::provider::ModelProviderClient;
use common::ScriptedLlm;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn shape_without_llm_is_verbatim_passthrough() {
    let context = ShapingContext::default();
    let result = shape("already prose", &context, None).await.unwrap();
    assert_eq!(result, "already prose");
}

#[tokio::test]
async fn shape_returns_canonical_json_of_fenced_reply() {
    let llm = ScriptedLlm::new(&[
        "Sure!\n```json\n[{\"type\": \"card\", \"data\": {\"title\": \"Revenue\"}}]\n```",
    ]);
    let context = ShapingContext {
        query: "revenue".to_string(),
        components: None,
    };
    let result = shape(
        "Revenue was strong",
        &context,
        Some(&llm as &dyn ModelProviderClient),
    )
    .await
    .unwrap();

    let tree: Value = serde_json::from_str(&result).unwrap();
    assert_eq!(tree[0]["type"], "card");

    // The prompt embeds both the raw text and the protocol instructions
    let prompts = llm.prompts();
    assert!(prompts[0].contains("Revenue was strong"));
    assert!(prompts[0].contains("Return JSON array format only."));
}

#[tokio::test]
async fn shape_whitelist_violation_raises_typed_error() {
    let llm = ScriptedLlm::new(&[r#"[{"type": "table", "data": {}}]"#]);
    let context = ShapingContext {
        query: "q".to_string(),
        components: Some(vec!["card".to_string(), "markdown".to_string()]),
    };
    let err = shape("text", &context, Some(&llm as &dyn ModelProviderClient))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        InterfaceError::Schema(SchemaViolation::TypeNotPermitted(_))
    ));
}

#[tokio::test]
async fn dispatcher_absorbs_whitelist_violation_with_fallback() {
    let llm = Arc::new(ScriptedLlm::new(&[r#"[{"type": "table", "data": {}}]"#]));
    let agent: Arc<dyn Agent> =
        Arc::new(|_args: Vec<Value>| -> Result<AgentOutput, InterfaceError> {
            Ok(AgentOutput::immediate("tabular text"))
        });
    let options = EnhanceOptions {
        components: Some(vec!["card".to_string()]),
        ..EnhanceOptions::default()
    };
    let wrapped = enhance(agent, llm, options);

    let EnhancedResponse::Resolved(future) = wrapped.call(vec![json!("q")]).unwrap() else {
        panic!("expected resolved response");
    };
    let (_, tree) = future.await;
    assert_eq!(
        tree,
        json!([{"type": "markdown", "data": {"content": "tabular text"}}])
    );
}

#[tokio::test]
async fn registry_empty_mode_permits_unknown_types() {
    let llm = ScriptedLlm::new(&[r#"[{"type": "totally-custom", "data": {"x": 1}}]"#]);
    let context = ShapingContext {
        query: "q".to_string(),
        components: None,
    };
    // No ai.json exists above the test cwd, so structural checks only
    let result = shape("text", &context, Some(&llm as &dyn ModelProviderClient))
        .await
        .unwrap();
    let tree: Value = serde_json::from_str(&result).unwrap();
    assert_eq!(tree[0]["type"], "totally-custom");
}

#[test]
fn validated_trees_round_trip_unchanged() {
    let registry = ComponentRegistry::empty();
    let tree = json!([
        {"type": "card", "data": {"title": "Revenue", "value": "$5M"}},
        [
            {"type": "card", "data": {"title": "Q1"}},
            {"type": "card", "data": {"title": "Q2"}}
        ],
        {"type": "markdown", "data": {"content": "Summary"}}
    ]);
    validate_tree(&tree, None, &registry).unwrap();

    let rendered = serde_json::to_string_pretty(&tree).unwrap();
    let reparsed: Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(reparsed, tree);
    validate_tree(&reparsed, None, &registry).unwrap();
}

#[test]
fn protocol_with_shared_empty_registry_degrades_to_markdown() {
    let text = protocol(None);
    assert!(text.contains("markdown: Text content with formatting"));
    assert!(text.ends_with("Return JSON array format only."));
}

#[test]
fn protocol_with_explicit_components_describes_them() {
    let allowed = vec!["card".to_string(), "table".to_string()];
    let text = protocol(Some(&allowed));
    assert!(text.contains("- card: Available component"));
    assert!(text.contains("- table: Available component"));
    assert!(text.contains(r#"- Single: [{"type": "card""#));
}
