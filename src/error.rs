//! Error types for the agentinterface crate.

use std::time::Duration;
use thiserror::Error;

/// Top-level error for agent wrapping, shaping, and callbacks
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// The language model returned text that is not parseable JSON
    #[error("invalid JSON from LLM: {0}")]
    InvalidLlmOutput(String),

    /// The parsed component tree violates structural or schema rules
    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    /// No user interaction arrived before the deadline
    #[error("user interaction timed out after {0:?}")]
    InteractionTimeout(Duration),

    /// The pending interaction can no longer be resolved
    /// (already awaited, or evicted by the staleness sweep)
    #[error("pending interaction unavailable: {0}")]
    InteractionUnavailable(String),

    /// The supplied agent cannot be invoked
    #[error("invalid agent: {0}")]
    InvalidAgent(String),

    /// Component generation failed for a reason outside the JSON/schema taxonomy
    #[error("component generation failed: {0}")]
    ShapingFailed(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Provider exists but is missing required configuration (API key, endpoint)
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// Provider request failed (network, HTTP status, malformed reply)
    #[error("provider request failed: {0}")]
    ProviderRequestFailed(String),
}

/// Structural and schema mismatches found while validating a component tree.
///
/// Each variant is annotated with enough context to locate the offending
/// node: the `trail` strings follow the `components[2][0]` convention.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    /// Top-level LLM output was not a JSON array
    #[error("LLM output must be a JSON array")]
    NotAnArray,

    /// Node is not an object, lacks a string `type`, or carries non-object `data`
    #[error("component at {trail}: {reason}")]
    MalformedComponent { trail: String, reason: String },

    /// Component type is outside the caller-supplied whitelist
    #[error("component type '{0}' not permitted in context")]
    TypeNotPermitted(String),

    /// Component type is absent from a non-empty registry
    #[error("unknown component type '{0}'")]
    UnknownType(String),

    /// Required schema fields missing from `data`; all names at once, sorted
    #[error("component '{component}' missing required data fields: {fields}")]
    MissingRequiredFields { component: String, fields: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violations_render_with_context() {
        let err = SchemaViolation::MalformedComponent {
            trail: "components[2][0]".to_string(),
            reason: "missing string 'type'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "component at components[2][0]: missing string 'type'"
        );

        let err = SchemaViolation::MissingRequiredFields {
            component: "card".to_string(),
            fields: "title, value".to_string(),
        };
        assert!(err.to_string().contains("card"));
        assert!(err.to_string().contains("title, value"));
    }

    #[test]
    fn schema_violation_converts_to_interface_error() {
        let err: InterfaceError = SchemaViolation::NotAnArray.into();
        assert!(matches!(err, InterfaceError::Schema(_)));
        assert_eq!(err.to_string(), "LLM output must be a JSON array");
    }
}
