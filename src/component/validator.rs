//! Recursive component-tree validation.
//!
//! A tree is an ordered JSON array whose elements are component nodes
//! (`{type, data}`) or nested arrays (horizontal layout groups), to any
//! depth. Validation is structural plus schema-driven: the whitelist check
//! runs first, then registry existence, then the `data` shape, then
//! required fields.

use crate::component::registry::ComponentRegistry;
use crate::error::SchemaViolation;
use serde_json::Value;
use std::collections::HashSet;

/// Validate a candidate component tree.
///
/// `allowed` narrows permitted type names for this call; an empty slice is
/// treated as "no whitelist". Registry existence is only enforced when the
/// registry is non-empty; required fields only when the entry declares any.
pub fn validate_tree(
    components: &Value,
    allowed: Option<&[String]>,
    registry: &ComponentRegistry,
) -> Result<(), SchemaViolation> {
    let Some(items) = components.as_array() else {
        return Err(SchemaViolation::NotAnArray);
    };

    let allowed_set: Option<HashSet<&str>> = match allowed {
        Some(list) if !list.is_empty() => Some(list.iter().map(String::as_str).collect()),
        _ => None,
    };

    for (index, item) in items.iter().enumerate() {
        validate_node(
            item,
            &format!("components[{}]", index),
            allowed_set.as_ref(),
            registry,
        )?;
    }
    Ok(())
}

fn validate_node(
    node: &Value,
    trail: &str,
    allowed: Option<&HashSet<&str>>,
    registry: &ComponentRegistry,
) -> Result<(), SchemaViolation> {
    // Lists can appear anywhere a node can; recurse with indexed trails
    if let Some(children) = node.as_array() {
        for (index, child) in children.iter().enumerate() {
            validate_node(child, &format!("{}[{}]", trail, index), allowed, registry)?;
        }
        return Ok(());
    }

    let Some(object) = node.as_object() else {
        return Err(SchemaViolation::MalformedComponent {
            trail: trail.to_string(),
            reason: "must be an object".to_string(),
        });
    };

    let component_type = match object.get("type").and_then(Value::as_str) {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(SchemaViolation::MalformedComponent {
                trail: trail.to_string(),
                reason: "missing string 'type'".to_string(),
            })
        }
    };

    if let Some(allowed) = allowed {
        if !allowed.contains(component_type) {
            return Err(SchemaViolation::TypeNotPermitted(component_type.to_string()));
        }
    }

    let entry = registry.get(component_type);
    if entry.is_none() && !registry.is_empty() {
        return Err(SchemaViolation::UnknownType(component_type.to_string()));
    }

    // Absent or null data normalizes to an empty object
    let data = match object.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            return Err(SchemaViolation::MalformedComponent {
                trail: trail.to_string(),
                reason: format!("'{}' data must be an object", component_type),
            })
        }
    };

    if let Some(entry) = entry {
        let mut missing: Vec<&str> = entry
            .schema
            .required
            .iter()
            .filter(|field| match data {
                Some(map) => !map.contains_key(field.as_str()),
                None => true,
            })
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(SchemaViolation::MissingRequiredFields {
                component: component_type.to_string(),
                fields: missing.join(", "),
            });
        }
    }

    Ok(())
}
