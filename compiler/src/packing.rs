//! Container packing under a property-count limit.
//!
//! Each class owns a chain of containers: its own (`Asset`), then bumped
//! names (`Asset2`, `Asset3`, ...). A slot goes to the first container of
//! the chain that already holds it, otherwise to the first with room.
//! Containers count distinct container-property identifiers, so a slot
//! shared by several view properties takes one place.
//!
//! A chain skips containers another class owns, so the overflow of `Asset`
//! never lands in the primary container of a class named `Asset2`.

use std::collections::{BTreeMap, BTreeSet};

use dms_model::schema::Container;
use dms_model::{ClassEntity, ContainerEntity, ParseError};

use crate::mapping::bump_name;

/// Running per-container slot counts.
#[derive(Debug, Clone, Default)]
pub struct Packer {
    limit: usize,
    slots: BTreeMap<ContainerEntity, BTreeSet<String>>,
    owners: BTreeMap<ContainerEntity, ClassEntity>,
    used: BTreeSet<ContainerEntity>,
}

impl Packer {
    /// A packer allowing `limit` slots per container (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            ..Self::default()
        }
    }

    /// Seeds the counts with a container of a previous schema version.
    ///
    /// Seeded containers keep their slots, so a recompile places the same
    /// properties in the same containers.
    pub fn seed(&mut self, container: &Container) {
        self.slots
            .entry(container.id.clone())
            .or_default()
            .extend(container.properties.keys().cloned());
    }

    /// Marks the primary container of `class` as owned by it before any
    /// slot is placed.
    pub fn reserve(&mut self, class: &ClassEntity) {
        self.owners.entry(class.as_container()).or_insert_with(|| class.clone());
    }

    /// Places a slot of `class` in an explicitly named container, ignoring
    /// the limit. The first class to fill a container owns it.
    pub fn place(&mut self, class: &ClassEntity, container: &ContainerEntity, slot: &str) {
        self.slots.entry(container.clone()).or_default().insert(slot.to_string());
        self.claim(container, class);
    }

    /// Places a slot of `class` in its container chain.
    ///
    /// # Errors
    ///
    /// Returns an error if a bumped container name violates the identifier
    /// grammar.
    pub fn assign(&mut self, class: &ClassEntity, slot: &str) -> Result<ContainerEntity, ParseError> {
        let base = class.as_container();

        let mut candidate = base.clone();
        loop {
            if !self.foreign(&candidate, class) {
                match self.slots.get(&candidate) {
                    None => break,
                    Some(held) if held.contains(slot) => {
                        self.claim(&candidate, class);
                        return Ok(candidate);
                    }
                    Some(_) => {}
                }
            }
            candidate = next(&candidate)?;
        }

        let mut candidate = base;
        loop {
            let held = self.slots.get(&candidate).map_or(0, BTreeSet::len);
            if self.foreign(&candidate, class) {
                log::debug!("container {candidate} belongs to another class; skipping");
            } else if held < self.limit {
                self.slots.entry(candidate.clone()).or_default().insert(slot.to_string());
                self.claim(&candidate, class);
                return Ok(candidate);
            } else {
                log::debug!("container {candidate} is full ({held} properties)");
            }
            candidate = next(&candidate)?;
        }
    }

    /// True if `container` belongs to a class other than `class`.
    fn foreign(&self, container: &ContainerEntity, class: &ClassEntity) -> bool {
        self.owners.get(container).is_some_and(|owner| owner != class)
    }

    fn claim(&mut self, container: &ContainerEntity, class: &ClassEntity) {
        self.owners.entry(container.clone()).or_insert_with(|| class.clone());
        self.used.insert(container.clone());
    }

    /// Class whose chain a container belongs to, for packed containers.
    pub fn owner(&self, container: &ContainerEntity) -> Option<&ClassEntity> {
        self.owners.get(container)
    }

    /// Containers that received at least one slot, in identifier order.
    pub fn used(&self) -> impl Iterator<Item = &ContainerEntity> {
        self.used.iter()
    }

    /// True if the container received a slot.
    pub fn is_used(&self, container: &ContainerEntity) -> bool {
        self.used.contains(container)
    }

    /// Number of distinct slots in a container, seeded ones included.
    pub fn count(&self, container: &ContainerEntity) -> usize {
        self.slots.get(container).map_or(0, BTreeSet::len)
    }
}

fn next(container: &ContainerEntity) -> Result<ContainerEntity, ParseError> {
    ContainerEntity::new(&container.space, &bump_name(&container.name))
}
