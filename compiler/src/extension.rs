//! Extension overlay: carrying the previous version forward.
//!
//! - addition: containers and views of "last" the new model does not
//!   redefine are copied unchanged
//! - reshape: as addition, for containers only
//! - rebuild: nothing is carried over
//!
//! Views are matched by space and name, so a view the new model declares at
//! a newer version supersedes its previous version. Redefined resources are
//! left as the model declares them; `schema/extension` reports what they
//! lost.

use std::collections::BTreeSet;

use dms_model::{ExtensionCategory, Schema};

/// Merges the "last" overlay of `schema` into it according to `category`.
pub fn merge(schema: &mut Schema, category: ExtensionCategory) {
    if category == ExtensionCategory::Rebuild {
        return;
    }
    let Some(last) = schema.last.take() else {
        return;
    };

    for (id, previous) in &last.containers {
        if !schema.containers.contains_key(id) {
            log::debug!("carrying container {id} forward");
            schema.containers.insert(id.clone(), previous.clone());
        }
    }

    if category == ExtensionCategory::Addition {
        let declared: BTreeSet<(String, String)> = schema
            .views
            .keys()
            .map(|id| (id.space.clone(), id.name.clone()))
            .collect();
        let mut carried = Vec::new();
        for (id, previous) in &last.views {
            if declared.contains(&(id.space.clone(), id.name.clone())) {
                continue;
            }
            log::debug!("carrying view {id} forward");
            schema.views.insert(id.clone(), previous.clone());
            carried.push(id.clone());
        }
        if let Some(model) = schema.data_model.as_mut() {
            for id in carried {
                if id.space == model.space && !model.views.contains(&id) {
                    model.views.push(id);
                }
            }
            model.views.sort();
        }
    }

    schema.last = Some(last);
}
