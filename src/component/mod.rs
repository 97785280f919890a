//! Component Model
//!
//! The registry is the schema source of truth for known component types;
//! the validator checks candidate trees against it; the protocol generator
//! turns it into LLM-facing instructions.

pub mod protocol;
pub mod registry;
pub mod validator;

pub use protocol::{protocol, protocol_with_registry, ProtocolOptions};
pub use registry::{
    invalidate_cache, ComponentRegistry, ComponentSchema, PropertySpec, RegistryEntry,
    REGISTRY_FILE_NAME,
};
pub use validator::validate_tree;
