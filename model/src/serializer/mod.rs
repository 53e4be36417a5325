//! Serializers for physical schemas.
//!
//! Two layouts are supported:
//! - **JSON document** ([`json`]): the whole schema as one `serde_json::Value`
//! - **Directory** ([`directory`]): one JSON file per resource, grouped by kind

pub mod directory;
pub mod json;
