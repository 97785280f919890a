//! Component registry: schema source of truth for known component types.
//!
//! The registry file is discovered by walking upward from the working
//! directory, the way git discovers `.git`. Every load failure degrades to
//! an empty registry: shaping still works, type-existence checks are simply
//! skipped.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Conventional registry file name
pub const REGISTRY_FILE_NAME: &str = "ai.json";

/// Schema for a single component property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// JSON type of the property ("string", "array", ...)
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Permitted values, when the property is an enumeration
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    /// Marked optional properties are omitted from protocol hints
    #[serde(default)]
    pub optional: bool,
}

/// Schema block of a registry entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    /// Field names that must be present in a node's `data`
    #[serde(default)]
    pub required: Vec<String>,
    /// Per-field specs, ordered by name for deterministic hints
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
}

/// Registry entry for one component type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub schema: ComponentSchema,
}

/// Immutable mapping from component-type name to its schema entry.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, RegistryEntry>,
}

impl ComponentRegistry {
    /// Empty registry: structural checks only, no type-existence checks
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from an explicit component map
    pub fn from_components(components: HashMap<String, RegistryEntry>) -> Self {
        Self { components }
    }

    /// Look up the entry for a component type
    pub fn get(&self, component_type: &str) -> Option<&RegistryEntry> {
        self.components.get(component_type)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// All known type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.keys().cloned().collect();
        names.sort();
        names
    }

    /// Load the registry by searching upward from the current directory.
    /// Never fails: any problem yields an empty registry.
    pub fn load() -> Self {
        match std::env::current_dir() {
            Ok(cwd) => Self::load_from_dir(&cwd),
            Err(e) => {
                warn!(error = %e, "cannot determine working directory; using empty registry");
                Self::empty()
            }
        }
    }

    /// Load the registry by searching `start` and its ancestors for the
    /// registry file. Missing, unreadable, or malformed files all degrade
    /// to the empty registry.
    pub fn load_from_dir(start: &Path) -> Self {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join(REGISTRY_FILE_NAME);
            if candidate.exists() {
                return Self::load_file(&candidate);
            }
            dir = current.parent();
        }
        warn!(
            file = REGISTRY_FILE_NAME,
            "component registry not found; skipping schema validation"
        );
        Self::empty()
    }

    fn load_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read component registry");
                return Self::empty();
            }
        };
        match Self::parse(&content) {
            Some(components) => Self { components },
            None => {
                warn!(path = %path.display(), "failed to load component registry");
                Self::empty()
            }
        }
    }

    fn parse(content: &str) -> Option<HashMap<String, RegistryEntry>> {
        let document: Value = serde_json::from_str(content).ok()?;
        let components = document.get("components")?;
        if !components.is_object() {
            return None;
        }
        serde_json::from_value(components.clone()).ok()
    }
}

static REGISTRY_CACHE: RwLock<Option<Arc<ComponentRegistry>>> = RwLock::new(None);

/// Shared registry, loaded on first use and cached for the process lifetime.
pub fn shared() -> Arc<ComponentRegistry> {
    if let Some(cached) = REGISTRY_CACHE.read().as_ref() {
        return Arc::clone(cached);
    }
    let mut slot = REGISTRY_CACHE.write();
    // Another thread may have filled the slot while we waited
    if let Some(cached) = slot.as_ref() {
        return Arc::clone(cached);
    }
    let loaded = Arc::new(ComponentRegistry::load());
    *slot = Some(Arc::clone(&loaded));
    loaded
}

/// Drop the cached registry so the next `shared()` call reloads from disk.
pub fn invalidate_cache() {
    *REGISTRY_CACHE.write() = None;
}
