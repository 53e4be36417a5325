//! Conceptual-model validators.

pub mod classes;
pub mod properties;
