//! LLM-facing component instructions.
//!
//! Produces the instruction block embedded in shaping prompts: the
//! enumerated component list, a composition grammar illustrated with the
//! selected component names, and the JSON-array-only directive.

use crate::component::registry::{self, ComponentRegistry, RegistryEntry};
use tracing::warn;

const MARKDOWN_FALLBACK_SPEC: &str = "markdown: Text content with formatting";

/// Protocol-generation options
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolOptions {
    /// Always include `markdown` in the described component set
    pub force_markdown: bool,
}

/// Generate LLM component instructions from the shared registry.
pub fn protocol(components: Option<&[String]>) -> String {
    protocol_with_registry(components, &registry::shared(), &ProtocolOptions::default())
}

/// Generate LLM component instructions against an explicit registry.
pub fn protocol_with_registry(
    components: Option<&[String]>,
    registry: &ComponentRegistry,
    options: &ProtocolOptions,
) -> String {
    let mut names: Vec<String> = match components {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => registry.type_names(),
    };

    let mut specs: Vec<String> = if names.is_empty() {
        warn!(
            file = registry::REGISTRY_FILE_NAME,
            "empty component registry; describing markdown fallback only"
        );
        names.push("markdown".to_string());
        vec![MARKDOWN_FALLBACK_SPEC.to_string()]
    } else {
        names
            .iter()
            .map(|name| describe(name, registry.get(name)))
            .collect()
    };

    if options.force_markdown && !names.iter().any(|name| name == "markdown") {
        names.push("markdown".to_string());
        specs.push(MARKDOWN_FALLBACK_SPEC.to_string());
    }

    let component_list = specs
        .iter()
        .map(|spec| format!("- {}", spec))
        .collect::<Vec<_>>()
        .join("\n");

    // Examples fall back to the conventional trio when the caller gave no
    // explicit selection
    let example_names: Vec<String> = match components {
        Some(list) if !list.is_empty() => names.clone(),
        _ => vec![
            "card".to_string(),
            "table".to_string(),
            "markdown".to_string(),
        ],
    };
    let first = example_names
        .first()
        .cloned()
        .unwrap_or_else(|| "card".to_string());
    let second = example_names.get(1).cloned().unwrap_or_else(|| first.clone());
    let third = example_names.get(2).cloned().unwrap_or_else(|| first.clone());

    format!(
        r#"Available components:
{component_list}

Composition patterns:
- Single: [{{"type": "{first}", "data": {{"title": "Revenue", "value": "$5M"}}}}]
- Multiple: [{{"type": "{first}", "data": {{...}}}}, {{"type": "{second}", "data": {{...}}}}]
- Horizontal: [[{{"type": "{first}", "data": {{...}}}}, {{"type": "{first}", "data": {{...}}}}]]
- Mixed: [{{"type": "{first}", "data": {{...}}}}, [comp1, comp2], {{"type": "{third}", "data": {{...}}}}]

Return JSON array format only."#
    )
}

/// One enumerated line for a component: registry description plus up to
/// three non-optional property hints, or the generic fallback.
fn describe(name: &str, entry: Option<&RegistryEntry>) -> String {
    let Some(entry) = entry else {
        return format!("{}: Available component", name);
    };
    if entry.description.is_empty() {
        return format!("{}: Available component", name);
    }

    let key_props: Vec<&str> = entry
        .schema
        .properties
        .iter()
        .filter(|(_, spec)| !spec.optional)
        .take(3)
        .map(|(prop, _)| prop.as_str())
        .collect();

    let hint = if key_props.is_empty() {
        String::new()
    } else {
        format!(" (uses: {})", key_props.join(", "))
    };
    format!("{}: {}{}", name, entry.description, hint)
}
