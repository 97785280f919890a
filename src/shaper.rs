//! Shaping Pipeline
//!
//! Turns free agent text into a validated component tree: builds a prompt
//! from the protocol instructions and the text, invokes the model, extracts
//! a JSON payload from the reply, parses, and validates. The pipeline
//! raises typed errors; the dispatcher owns the fallback.

use crate::component::registry;
use crate::component::validator::validate_tree;
use crate::component::{protocol_with_registry, ProtocolOptions};
use crate::error::InterfaceError;
use crate::provider::ModelProviderClient;
use serde_json::Value;

/// Per-invocation shaping context; never stored.
#[derive(Debug, Clone, Default)]
pub struct ShapingContext {
    /// The user query that produced the text being shaped
    pub query: String,
    /// Optional whitelist narrowing permitted component types for this call
    pub components: Option<Vec<String>>,
}

/// Shape free text into a serialized component tree.
///
/// Without a model this is a passthrough: the text comes back verbatim and
/// no shaping is attempted. With a model, the result is the canonical
/// pretty-printed JSON of the validated tree.
pub async fn shape(
    response: &str,
    context: &ShapingContext,
    llm: Option<&dyn ModelProviderClient>,
) -> Result<String, InterfaceError> {
    let Some(llm) = llm else {
        return Ok(response.to_string());
    };
    shape_with_registry(response, context, llm, &registry::shared()).await
}

/// Shaping against an explicit registry handle.
pub async fn shape_with_registry(
    response: &str,
    context: &ShapingContext,
    llm: &dyn ModelProviderClient,
    registry: &crate::component::ComponentRegistry,
) -> Result<String, InterfaceError> {
    let instructions = protocol_with_registry(
        context.components.as_deref(),
        registry,
        &ProtocolOptions::default(),
    );

    let prompt = format!(
        "Transform this content into a component JSON array:\n\n{}\n\n{}",
        response, instructions
    );

    let raw = llm
        .generate(&prompt)
        .await
        .map_err(|e| InterfaceError::ShapingFailed(e.to_string()))?;

    let payload = extract_json_block(&raw);
    let components: Value = serde_json::from_str(payload)
        .map_err(|e| InterfaceError::InvalidLlmOutput(e.to_string()))?;

    validate_tree(&components, context.components.as_deref(), registry)?;

    serde_json::to_string_pretty(&components)
        .map_err(|e| InterfaceError::ShapingFailed(e.to_string()))
}

/// Extract the JSON payload from a model reply: a ```json fence wins, then
/// the first fence of any tag, then the raw text.
fn extract_json_block(raw: &str) -> &str {
    if let Some(index) = raw.find("```json") {
        let rest = &raw[index + "```json".len()..];
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some(index) = raw.find("```") {
        let rest = &raw[index + "```".len()..];
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    raw.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::registry::{ComponentSchema, RegistryEntry};
    use crate::component::ComponentRegistry;
    use crate::error::SchemaViolation;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct CannedLlm {
        reply: String,
    }

    #[async_trait]
    impl ModelProviderClient for CannedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String, InterfaceError> {
            Ok(self.reply.clone())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl ModelProviderClient for FailingLlm {
        async fn generate(&self, _prompt: &str) -> Result<String, InterfaceError> {
            Err(InterfaceError::ProviderRequestFailed(
                "connection refused".to_string(),
            ))
        }
    }

    fn context() -> ShapingContext {
        ShapingContext {
            query: "revenue summary".to_string(),
            components: None,
        }
    }

    #[tokio::test]
    async fn test_no_llm_is_passthrough() {
        let result = shape("plain text", &context(), None).await.unwrap();
        assert_eq!(result, "plain text");
    }

    #[tokio::test]
    async fn test_raw_json_reply_is_shaped() {
        let llm = CannedLlm {
            reply: r#"[{"type": "card", "data": {"title": "Revenue"}}]"#.to_string(),
        };
        let result =
            shape_with_registry("Revenue", &context(), &llm, &ComponentRegistry::empty())
                .await
                .unwrap();
        let tree: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(tree[0]["type"], "card");
    }

    #[tokio::test]
    async fn test_json_fence_is_extracted() {
        let llm = CannedLlm {
            reply: "Here you go:\n```json\n[{\"type\": \"card\", \"data\": {}}]\n```\nDone."
                .to_string(),
        };
        let result =
            shape_with_registry("text", &context(), &llm, &ComponentRegistry::empty())
                .await
                .unwrap();
        let tree: Value = serde_json::from_str(&result).unwrap();
        assert!(tree.is_array());
    }

    #[tokio::test]
    async fn test_untagged_fence_is_extracted() {
        let llm = CannedLlm {
            reply: "```\n[{\"type\": \"markdown\", \"data\": {\"content\": \"x\"}}]\n```"
                .to_string(),
        };
        let result =
            shape_with_registry("text", &context(), &llm, &ComponentRegistry::empty())
                .await
                .unwrap();
        assert!(result.contains("markdown"));
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_invalid_llm_output() {
        let llm = CannedLlm {
            reply: "not json {".to_string(),
        };
        let err = shape_with_registry("text", &context(), &llm, &ComponentRegistry::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, InterfaceError::InvalidLlmOutput(_)));
    }

    #[tokio::test]
    async fn test_non_array_reply_is_schema_violation() {
        let llm = CannedLlm {
            reply: r#"{"type": "card", "data": {}}"#.to_string(),
        };
        let err = shape_with_registry("text", &context(), &llm, &ComponentRegistry::empty())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Schema(SchemaViolation::NotAnArray)
        ));
    }

    #[tokio::test]
    async fn test_whitelist_violation_propagates() {
        let llm = CannedLlm {
            reply: r#"[{"type": "table", "data": {}}]"#.to_string(),
        };
        let ctx = ShapingContext {
            query: "q".to_string(),
            components: Some(vec!["card".to_string()]),
        };
        let err = shape_with_registry("text", &ctx, &llm, &ComponentRegistry::empty())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Schema(SchemaViolation::TypeNotPermitted(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_required_fields_propagate() {
        let mut components = HashMap::new();
        components.insert(
            "card".to_string(),
            RegistryEntry {
                schema: ComponentSchema {
                    required: vec!["title".to_string()],
                    ..ComponentSchema::default()
                },
                ..RegistryEntry::default()
            },
        );
        let registry = ComponentRegistry::from_components(components);

        let llm = CannedLlm {
            reply: r#"[{"type": "card", "data": {}}]"#.to_string(),
        };
        let err = shape_with_registry("text", &context(), &llm, &registry)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Schema(SchemaViolation::MissingRequiredFields { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_wraps_as_shaping_failed() {
        let err = shape_with_registry("text", &context(), &FailingLlm, &ComponentRegistry::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, InterfaceError::ShapingFailed(_)));
    }

    #[test]
    fn test_extract_json_block_variants() {
        assert_eq!(extract_json_block("[1, 2]"), "[1, 2]");
        assert_eq!(extract_json_block("```json\n[1]\n```"), "[1]");
        assert_eq!(extract_json_block("```\n[2]\n```"), "[2]");
        // Unclosed fence takes the remainder
        assert_eq!(extract_json_block("```json\n[3]"), "[3]");
        // The tagged fence wins even when a plain fence appears first in tag order
        assert_eq!(extract_json_block("intro ```json\n[4]\n``` outro"), "[4]");
    }
}
