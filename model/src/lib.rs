//! Typed conceptual models, physical rule sets and physical schemas.
//!
//! The `dms-model` crate holds every value the data-model compiler reads or
//! produces, plus the read-only analysis layer over conceptual models:
//!
//! - [`entity`]: identifiers (`space:name`, `space:name(version=v)`)
//! - [`types`]: primitive data types and conceptual value types
//! - [`conceptual`]: conceptual models, built from drafts via `finalize`
//! - [`analysis`]: inheritance flattening, linkage and generation order
//! - [`physical`]: the row-oriented physical rule set
//! - [`schema`]: the physical schema aggregate with its overlays
//! - [`limits`]: platform capacity limits
//! - [`serializer`]: JSON and directory layouts for schemas
//!
//! # Entry Point
//!
//! ```
//! use dms_model::conceptual::{ClassDraft, ModelDraft, PropertyDraft};
//! use dms_model::analysis::RuleAnalysis;
//!
//! let model = ModelDraft::new("power", "1")
//!     .with_class(ClassDraft::new("Asset"))
//!     .with_property(PropertyDraft::new("Asset", "name", "text"))
//!     .finalize()?;
//! let analysis = RuleAnalysis::new(&model)?;
//! assert!(analysis.dangling_classes().is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod analysis;
pub mod conceptual;
pub mod entity;
pub mod error;
pub mod limits;
pub mod physical;
pub mod schema;
pub mod serializer;
pub mod types;

pub use analysis::{AnalysisError, Linkage, RuleAnalysis, SymmetricPair};
pub use conceptual::{
    Completeness, ConceptualClass, ConceptualModel, ConceptualProperty, ExtensionCategory,
    ModelDraft, ModelKind,
};
pub use entity::{
    ClassEntity, ContainerEntity, NodeTypeRef, ParseError, Reference, ResolutionContext,
    ViewEntity,
};
pub use error::ModelError;
pub use limits::Limits;
pub use physical::PhysicalRules;
pub use schema::Schema;
pub use types::{DataType, ValueType};
