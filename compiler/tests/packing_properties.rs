//! Property-based tests for container packing and value-type reduction.
//!
//! Packing must use the fewest containers the limit allows, and recompiling
//! against the previous version must not move any property.

use std::collections::BTreeSet;

use dms_compiler::mapping::{fold_primitives, reduce, Reduced};
use dms_compiler::{compile, CompileOptions};
use dms_model::conceptual::{ClassDraft, ModelDraft, PropertyDraft};
use dms_model::{DataType, Limits, ValueType};
use proptest::prelude::*;

fn model(count: usize) -> ModelDraft {
    (0..count).fold(
        ModelDraft::new("power", "1").with_class(ClassDraft::new("Asset")),
        |draft, i| {
            draft.with_property(
                PropertyDraft::new("Asset", &format!("p{i}"), "text").with_count(0, Some(1)),
            )
        },
    )
}

fn options(limit: usize) -> CompileOptions {
    CompileOptions {
        limits: Limits::default().with_container_properties(limit),
        ..CompileOptions::default()
    }
}

// =============================================================================
// Packing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// N properties under a limit of L land in ceil(N / L) containers, none
    /// over the limit.
    #[test]
    fn prop_packing_is_tight(count in 1usize..40, limit in 1usize..12) {
        let output = compile(&model(count).finalize().unwrap(), &options(limit)).unwrap();
        let containers = &output.schema.containers;
        prop_assert_eq!(containers.len(), count.div_ceil(limit));
        for container in containers.values() {
            prop_assert!(container.properties.len() <= limit);
        }
        let slots: usize = containers.values().map(|c| c.properties.len()).sum();
        prop_assert_eq!(slots, count);
    }

    /// Recompiling with the previous version as "last" keeps every slot in
    /// its container, even when new properties arrive.
    #[test]
    fn prop_packing_is_stable(count in 1usize..30, extra in 0usize..10, limit in 1usize..8) {
        let previous = model(count);
        let first = compile(&previous.finalize().unwrap(), &options(limit)).unwrap();

        let mut next = model(count + extra);
        next.metadata.version = "2".to_string();
        next.last = Some(Box::new(previous));
        let second = compile(&next.finalize().unwrap(), &options(limit)).unwrap();

        for (id, container) in &first.schema.containers {
            let now = &second.schema.containers[id];
            for slot in container.properties.keys() {
                prop_assert!(now.properties.contains_key(slot), "{slot} left {id}");
            }
        }
    }
}

// =============================================================================
// Value-type reduction
// =============================================================================

fn numeric() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Boolean),
        Just(DataType::Integer),
        Just(DataType::Long),
        Just(DataType::Float),
        Just(DataType::Double),
    ]
}

proptest! {
    /// Folding a numeric union picks its widest member, whatever the order.
    #[test]
    fn prop_numeric_unions_widen(members in prop::collection::vec(numeric(), 1..6)) {
        let folded = fold_primitives(&members);
        prop_assert!(members.contains(&folded));
        let mut reversed = members.clone();
        reversed.reverse();
        prop_assert_eq!(fold_primitives(&reversed), folded);
        let distinct: BTreeSet<DataType> = members.iter().copied().collect();
        if distinct.len() == 1 {
            prop_assert_eq!(folded, members[0]);
        }
    }

    /// Adding text to any union falls back to text.
    #[test]
    fn prop_text_absorbs_unions(members in prop::collection::vec(numeric(), 0..5)) {
        let mut with_text = members;
        with_text.push(DataType::String);
        prop_assert_eq!(
            reduce(&ValueType::Union(with_text.iter().copied().map(ValueType::Primitive).collect())),
            Reduced::Primitive(DataType::String)
        );
    }
}
