//! Pending in-memory delta awaiting a durable commit.
//!
//! # Invariants
//! - An id is never both dirty and deleted for the same record kind.
//! - A taken `ChangeSet` carries the record state at take time, so the most
//!   recent values are always what gets written.

use crate::model::item::{Item, ItemId};
use crate::model::location::{Location, LocationId};
use std::collections::{BTreeSet, HashMap};

/// Records to upsert and ids to delete in one durable commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub locations: Vec<Location>,
    pub items: Vec<Item>,
    pub deleted_items: Vec<ItemId>,
    pub deleted_locations: Vec<LocationId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of record writes in this change set.
    pub fn len(&self) -> usize {
        self.locations.len()
            + self.items.len()
            + self.deleted_items.len()
            + self.deleted_locations.len()
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    dirty_items: BTreeSet<ItemId>,
    dirty_locations: BTreeSet<LocationId>,
    deleted_items: BTreeSet<ItemId>,
    deleted_locations: BTreeSet<LocationId>,
}

impl ChangeTracker {
    pub(crate) fn item_written(&mut self, id: ItemId) {
        self.deleted_items.remove(&id);
        self.dirty_items.insert(id);
    }

    pub(crate) fn item_deleted(&mut self, id: ItemId) {
        self.dirty_items.remove(&id);
        self.deleted_items.insert(id);
    }

    pub(crate) fn location_written(&mut self, id: LocationId) {
        self.deleted_locations.remove(&id);
        self.dirty_locations.insert(id);
    }

    pub(crate) fn location_deleted(&mut self, id: LocationId) {
        self.dirty_locations.remove(&id);
        self.deleted_locations.insert(id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.dirty_items.is_empty()
            && self.dirty_locations.is_empty()
            && self.deleted_items.is_empty()
            && self.deleted_locations.is_empty()
    }

    /// Drains the tracker into a change set carrying current record values.
    pub(crate) fn take(
        &mut self,
        items: &HashMap<ItemId, Item>,
        locations: &HashMap<LocationId, Location>,
    ) -> ChangeSet {
        let changes = ChangeSet {
            locations: self
                .dirty_locations
                .iter()
                .filter_map(|id| locations.get(id).cloned())
                .collect(),
            items: self
                .dirty_items
                .iter()
                .filter_map(|id| items.get(id).cloned())
                .collect(),
            deleted_items: self.deleted_items.iter().copied().collect(),
            deleted_locations: self.deleted_locations.iter().copied().collect(),
        };
        *self = Self::default();
        changes
    }

    /// Puts a change set that failed to commit back into the tracker.
    ///
    /// Writes made after the take win: a record deleted since then stays
    /// deleted, and a record re-created since then stays written.
    pub(crate) fn requeue(
        &mut self,
        changes: &ChangeSet,
        items: &HashMap<ItemId, Item>,
        locations: &HashMap<LocationId, Location>,
    ) {
        for location in &changes.locations {
            if locations.contains_key(&location.id) && !self.deleted_locations.contains(&location.id)
            {
                self.dirty_locations.insert(location.id);
            }
        }
        for item in &changes.items {
            if items.contains_key(&item.id) && !self.deleted_items.contains(&item.id) {
                self.dirty_items.insert(item.id);
            }
        }
        for id in &changes.deleted_items {
            if !items.contains_key(id) {
                self.deleted_items.insert(*id);
            }
        }
        for id in &changes.deleted_locations {
            if !locations.contains_key(id) {
                self.deleted_locations.insert(*id);
            }
        }
    }
}
