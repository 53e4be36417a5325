//! Physical rule-set validators.
//!
//! These run on the row-oriented rules so conflicts can be reported by the
//! row numbers of the conceptual properties that produced them.

pub mod connections;
pub mod containers;
pub mod mapping;
