//! Single-document JSON serializer.
//!
//! Resources are emitted as arrays in identifier order, which is the shape a
//! deployment client consumes. Overlays are not part of the document.

use serde_json::{json, Value};

use crate::entity::NodeTypeRef;
use crate::schema::{Container, Schema, View};

/// Renders a schema as one JSON document.
///
/// # Errors
///
/// Returns an error only if a resource fails to serialize, which cannot
/// happen for schemas built from this crate's types.
pub fn to_json(schema: &Schema) -> Result<Value, serde_json::Error> {
    let containers = schema
        .containers
        .values()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let views = schema
        .views
        .values()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    let node_types: Vec<Value> = schema
        .node_types
        .iter()
        .map(|n| json!({ "space": n.space, "externalId": n.name }))
        .collect();
    Ok(json!({
        "spaces": schema.spaces(),
        "dataModel": schema.data_model,
        "containers": containers,
        "views": views,
        "nodeTypes": node_types,
    }))
}

/// Rebuilds a schema from a document produced by [`to_json`].
///
/// # Errors
///
/// Returns an error if the document does not have the expected shape.
pub fn from_json(document: &Value) -> Result<Schema, serde_json::Error> {
    let mut schema = Schema::new();
    if let Some(model) = document.get("dataModel").filter(|m| !m.is_null()) {
        schema.data_model = Some(serde_json::from_value(model.clone())?);
    }
    for raw in array(document, "containers") {
        let container: Container = serde_json::from_value(raw.clone())?;
        schema.containers.insert(container.id.clone(), container);
    }
    for raw in array(document, "views") {
        let view: View = serde_json::from_value(raw.clone())?;
        schema.views.insert(view.id.clone(), view);
    }
    for raw in array(document, "nodeTypes") {
        let space = raw.get("space").and_then(Value::as_str).unwrap_or_default();
        let name = raw.get("externalId").and_then(Value::as_str).unwrap_or_default();
        let node = NodeTypeRef::new(space, name)
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        schema.node_types.insert(node);
    }
    Ok(schema)
}

fn array<'v>(document: &'v Value, key: &str) -> impl Iterator<Item = &'v Value> {
    document
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entity::{ContainerEntity, ViewEntity};
    use crate::schema::DataModel;

    #[test]
    fn document_shape_and_reload() {
        let mut schema = Schema::new();
        let id = ContainerEntity::new("power", "Asset").unwrap();
        schema.containers.insert(id.clone(), Container::new(id));
        let view = ViewEntity::new("power", "Asset", "1").unwrap();
        schema.views.insert(view.clone(), View::new(view.clone()));
        schema.node_types.insert(NodeTypeRef::new("power", "Marker").unwrap());
        schema.data_model = Some(DataModel {
            space: "power".into(),
            external_id: "power".into(),
            version: "1".into(),
            name: None,
            description: None,
            views: vec![view],
        });

        let document = to_json(&schema).unwrap();
        assert_eq!(document["spaces"], json!(["power"]));
        assert_eq!(document["containers"][0]["id"], json!("power:Asset"));
        assert_eq!(document["nodeTypes"][0]["externalId"], json!("Marker"));
        assert_eq!(from_json(&document).unwrap(), schema);
    }
}
