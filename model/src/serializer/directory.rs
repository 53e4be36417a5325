//! One-file-per-resource directory layout.
//!
//! ```text
//! <dir>/data_models/<space>.json
//! <dir>/containers/<space>.<name>.json
//! <dir>/views/<space>.<name>.<version>.json
//! <dir>/node_types/<space>.<name>.json
//! ```
//!
//! Reading walks the directory in file-name order and decides the resource
//! kind by the parent directory; the file contents carry the identifiers.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::entity::NodeTypeRef;
use crate::schema::{Container, DataModel, Schema, View};

const DATA_MODELS: &str = "data_models";
const CONTAINERS: &str = "containers";
const VIEWS: &str = "views";
const NODE_TYPES: &str = "node_types";

fn write_resource<T: Serialize>(dir: &Path, kind: &str, file: &str, value: &T) -> Result<()> {
    let kind_dir = dir.join(kind);
    fs::create_dir_all(&kind_dir)
        .with_context(|| format!("Failed to create directory: {}", kind_dir.display()))?;
    let path = kind_dir.join(format!("{file}.json"));
    let body = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes every resource of `schema` under `dir`.
///
/// # Errors
///
/// Returns an error if a directory or file cannot be written.
pub fn write_dir(schema: &Schema, dir: &Path) -> Result<()> {
    if let Some(model) = &schema.data_model {
        write_resource(dir, DATA_MODELS, &model.space, model)?;
    }
    for (id, container) in &schema.containers {
        write_resource(dir, CONTAINERS, &format!("{}.{}", id.space, id.name), container)?;
    }
    for (id, view) in &schema.views {
        write_resource(
            dir,
            VIEWS,
            &format!("{}.{}.{}", id.space, id.name, id.version),
            view,
        )?;
    }
    for node in &schema.node_types {
        write_resource(
            dir,
            NODE_TYPES,
            &format!("{}.{}", node.space, node.name),
            &json!({ "space": node.space, "externalId": node.name }),
        )?;
    }
    log::debug!(
        "wrote {} containers, {} views to {}",
        schema.containers.len(),
        schema.views.len(),
        dir.display()
    );
    Ok(())
}

/// Reads a schema written by [`write_dir`].
///
/// # Errors
///
/// Returns an error if `dir` is missing, a file cannot be read or parsed,
/// or more than one data model is present.
pub fn read_dir(dir: &Path) -> Result<Schema> {
    if !dir.is_dir() {
        bail!("Schema directory not found: {}", dir.display());
    }
    let mut schema = Schema::new();
    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
    {
        let path = entry.path();
        let Some(kind) = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
        else {
            continue;
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parse_error = || format!("Failed to parse {}", path.display());
        match kind {
            DATA_MODELS => {
                let model: DataModel = serde_json::from_str(&raw).with_context(parse_error)?;
                if schema.data_model.is_some() {
                    bail!("More than one data model in {}", dir.display());
                }
                schema.data_model = Some(model);
            }
            CONTAINERS => {
                let container: Container = serde_json::from_str(&raw).with_context(parse_error)?;
                schema.containers.insert(container.id.clone(), container);
            }
            VIEWS => {
                let view: View = serde_json::from_str(&raw).with_context(parse_error)?;
                schema.views.insert(view.id.clone(), view);
            }
            NODE_TYPES => {
                let value: Value = serde_json::from_str(&raw).with_context(parse_error)?;
                let field = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default();
                let node = NodeTypeRef::new(field("space"), field("externalId"))
                    .with_context(parse_error)?;
                schema.node_types.insert(node);
            }
            other => log::debug!("skipping {} (unknown kind '{other}')", path.display()),
        }
    }
    Ok(schema)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entity::{ContainerEntity, ViewEntity};

    #[test]
    fn directory_round_trip() {
        let mut schema = Schema::new();
        for name in ["Asset", "GeoPoint"] {
            let id = ContainerEntity::new("power", name).unwrap();
            schema.containers.insert(id.clone(), Container::new(id));
            let view = ViewEntity::new("power", name, "1").unwrap();
            schema.views.insert(view.clone(), View::new(view));
        }
        schema.node_types.insert(NodeTypeRef::new("power", "Marker").unwrap());

        let tmp = tempfile::tempdir().unwrap();
        write_dir(&schema, tmp.path()).unwrap();
        assert!(tmp.path().join("containers/power.Asset.json").is_file());
        assert!(tmp.path().join("views/power.GeoPoint.1.json").is_file());
        assert_eq!(read_dir(tmp.path()).unwrap(), schema);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_dir(&tmp.path().join("absent")).is_err());
    }
}
