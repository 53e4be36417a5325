//! Physical-schema validators.
//!
//! These read a [`Schema`](dms_model::Schema) with its overlays attached;
//! lookups of implemented views, containers and targets fall through to the
//! "last" and "reference" layers.

pub mod capacity;
pub mod duplicates;
pub mod extension;
pub mod filters;
pub mod references;
pub mod reverse;
