//! In-memory authoritative entity graph.
//!
//! # Responsibility
//! - Own item and location records and enforce graph invariants.
//! - Expose create/upsert/delete/query entry points.
//! - Track the pending delta for the persistence scheduler.
//! - Route every mutation through the change propagator.
//!
//! # Invariants
//! - Exactly one location carries the sentinel visitation order.
//! - Every item's location resolves to a stored location.
//! - Deleting a user location moves its items to the unknown location before
//!   the location is removed, so the item count is conserved.
//! - Validation happens before any mutation is applied.

use super::change_set::{ChangeSet, ChangeTracker};
use super::error::{InvariantViolation, StoreError, StoreResult};
use super::propagator::{ChangeKind, ChangeNotice, ChangePropagator, SubscriptionId};
use super::GraphSnapshot;
use crate::clock::{system_clock, SharedClock};
use crate::model::draft::{ItemDraft, LocationDraft};
use crate::model::item::{Item, ItemId};
use crate::model::location::{Location, LocationId, UNKNOWN_LOCATION_VISITATION_ORDER};
use crate::model::{EntityRef, ValidationError};
use log::{info, warn};
use std::collections::HashMap;
use uuid::Uuid;

/// Owner of the item/location graph.
pub struct EntityStore {
    items: HashMap<ItemId, Item>,
    locations: HashMap<LocationId, Location>,
    unknown_location: LocationId,
    changes: ChangeTracker,
    propagator: ChangePropagator,
    clock: SharedClock,
}

impl EntityStore {
    /// Creates an empty store holding only the unknown location.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self::load(GraphSnapshot::default(), clock)
    }

    /// Builds a store from persisted records, healing structural damage.
    ///
    /// - Extra sentinel locations collapse into one; their items move over.
    /// - Items pointing at a missing location move to the unknown location.
    /// - Healed records are marked dirty so the next commit persists them.
    pub fn load(snapshot: GraphSnapshot, clock: SharedClock) -> Self {
        let mut locations = HashMap::with_capacity(snapshot.locations.len());
        let mut sentinels = Vec::new();
        for location in snapshot.locations {
            if location.is_unknown() {
                sentinels.push(location.id);
            }
            locations.insert(location.id, location);
        }
        sentinels.sort();

        let mut changes = ChangeTracker::default();
        let unknown_location = match sentinels.first() {
            Some(id) => *id,
            None => {
                let unknown = Location::unknown();
                let id = unknown.id;
                locations.insert(id, unknown);
                changes.location_written(id);
                id
            }
        };
        for duplicate in sentinels.iter().skip(1) {
            locations.remove(duplicate);
            changes.location_deleted(*duplicate);
        }

        let mut items = HashMap::with_capacity(snapshot.items.len());
        let mut healed = 0usize;
        for mut item in snapshot.items {
            if !locations.contains_key(&item.location) {
                item.location = unknown_location;
                changes.item_written(item.id);
                healed += 1;
            }
            items.insert(item.id, item);
        }

        if healed > 0 || sentinels.len() > 1 {
            warn!(
                "event=graph_heal module=store status=ok healed_items={} merged_unknown_locations={}",
                healed,
                sentinels.len().saturating_sub(1)
            );
        }
        info!(
            "event=graph_load module=store status=ok items={} locations={}",
            items.len(),
            locations.len()
        );

        Self {
            items,
            locations,
            unknown_location,
            changes,
            propagator: ChangePropagator::new(),
            clock,
        }
    }

    /// Copies every record out of the store.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            locations: self.query_locations(),
            items: self.all_items(),
        }
    }

    // --- factories -------------------------------------------------------

    /// Returns a draft for a new item with a fresh id and new-item defaults.
    pub fn create_item(&mut self) -> ItemDraft {
        ItemDraft {
            id: Some(Uuid::new_v4()),
            location: Some(self.get_or_create_unknown_location()),
            ..ItemDraft::default()
        }
    }

    /// Returns a draft for a new location, ordered after all user locations.
    pub fn create_location(&self) -> LocationDraft {
        LocationDraft {
            id: Some(Uuid::new_v4()),
            visitation_order: Some(self.next_visitation_order()),
            ..LocationDraft::default()
        }
    }

    /// Returns the unknown location id, creating the record if absent.
    pub fn get_or_create_unknown_location(&mut self) -> LocationId {
        if let Some(location) = self.locations.get(&self.unknown_location) {
            if location.is_unknown() {
                return location.id;
            }
        }
        if let Some(existing) = self.locations.values().find(|location| location.is_unknown()) {
            self.unknown_location = existing.id;
            return existing.id;
        }

        let unknown = Location::unknown();
        let id = unknown.id;
        self.locations.insert(id, unknown);
        self.unknown_location = id;
        self.changes.location_written(id);
        self.propagator
            .notify(EntityRef::Location(id), ChangeKind::Created);
        id
    }

    // --- upserts ---------------------------------------------------------

    /// Updates the item named by `draft.id`, or creates it.
    ///
    /// A new item keeps the draft's id when one is supplied.
    pub fn upsert_item(&mut self, draft: &ItemDraft) -> StoreResult<ItemId> {
        draft.validate()?;
        let target = match draft.location {
            Some(id) if self.locations.contains_key(&id) => id,
            Some(id) => return Err(StoreError::NotFound(EntityRef::Location(id))),
            None => self.get_or_create_unknown_location(),
        };
        let now = self.clock.now_epoch_ms();

        if let Some(item) = draft.id.and_then(|id| self.items.get_mut(&id)) {
            let before = item.clone();
            item.name = draft.name.clone();
            item.quantity = draft.quantity;
            item.is_available = draft.is_available;
            let on_list_changed = item.set_on_list(draft.on_list, now);
            item.location = target;
            if *item == before {
                return Ok(before.id);
            }

            let id = item.id;
            self.changes.item_written(id);
            self.propagator.notify(EntityRef::Item(id), ChangeKind::Updated);
            if before.location != target {
                self.propagator.item_relocated(before.location, target);
            } else if on_list_changed {
                self.propagator
                    .notify(EntityRef::Location(target), ChangeKind::MembershipChanged);
            }
            return Ok(id);
        }

        let mut item = Item::with_id(draft.id.unwrap_or_else(Uuid::new_v4), draft.name.clone(), target);
        item.quantity = draft.quantity;
        item.on_list = draft.on_list;
        item.is_available = draft.is_available;
        let id = item.id;
        self.items.insert(id, item);
        self.changes.item_written(id);
        self.propagator.notify(EntityRef::Item(id), ChangeKind::Created);
        self.propagator
            .notify(EntityRef::Location(target), ChangeKind::MembershipChanged);
        Ok(id)
    }

    /// Updates the location named by `draft.id`, or creates it.
    pub fn upsert_location(&mut self, draft: &LocationDraft) -> StoreResult<LocationId> {
        draft.validate()?;

        if let Some(existing) = draft.id.and_then(|id| self.locations.get(&id)) {
            if existing.is_unknown() {
                if matches!(draft.visitation_order, Some(order) if order != UNKNOWN_LOCATION_VISITATION_ORDER)
                {
                    warn!(
                        "event=invariant_rejected module=store status=skipped reason=reorder_unknown_location"
                    );
                    return Err(InvariantViolation::ReorderUnknownLocation(existing.id).into());
                }
            } else if draft.requests_sentinel_order() {
                return Err(
                    ValidationError::ReservedVisitationOrder(UNKNOWN_LOCATION_VISITATION_ORDER).into(),
                );
            }

            let id = existing.id;
            let mut updated = existing.clone();
            updated.name = draft.name.clone();
            updated.color = draft.color;
            if let Some(order) = draft.visitation_order {
                updated.visitation_order = order;
            }
            if self.locations.get(&id) == Some(&updated) {
                return Ok(id);
            }
            self.locations.insert(id, updated);
            self.changes.location_written(id);
            let attached = self.item_ids_at(id);
            self.propagator.location_fields_changed(id, &attached);
            return Ok(id);
        }

        if draft.requests_sentinel_order() {
            return Err(
                ValidationError::ReservedVisitationOrder(UNKNOWN_LOCATION_VISITATION_ORDER).into(),
            );
        }
        let location = Location {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            name: draft.name.clone(),
            visitation_order: draft
                .visitation_order
                .unwrap_or_else(|| self.next_visitation_order()),
            color: draft.color,
        };
        let id = location.id;
        self.locations.insert(id, location);
        self.changes.location_written(id);
        self.propagator
            .notify(EntityRef::Location(id), ChangeKind::Created);
        Ok(id)
    }

    // --- deletes ---------------------------------------------------------

    /// Removes one item and returns the removed record.
    pub fn delete_item(&mut self, id: ItemId) -> StoreResult<Item> {
        let item = self
            .items
            .remove(&id)
            .ok_or(StoreError::NotFound(EntityRef::Item(id)))?;
        self.changes.item_deleted(id);
        self.propagator.deleted(EntityRef::Item(id));
        self.propagator
            .notify(EntityRef::Location(item.location), ChangeKind::MembershipChanged);
        Ok(item)
    }

    /// Removes one user location after moving its items to the unknown
    /// location. Returns the number of reassigned items.
    ///
    /// The unknown location is never removed; asking for it is rejected with
    /// `InvariantViolation` and changes nothing.
    pub fn delete_location(&mut self, id: LocationId) -> StoreResult<usize> {
        let location = self
            .locations
            .get(&id)
            .ok_or(StoreError::NotFound(EntityRef::Location(id)))?;
        if location.is_unknown() {
            warn!(
                "event=invariant_rejected module=store status=skipped reason=delete_unknown_location"
            );
            return Err(InvariantViolation::DeleteUnknownLocation(id).into());
        }

        let unknown = self.get_or_create_unknown_location();
        let moved = self.item_ids_at(id);
        for item_id in &moved {
            if let Some(item) = self.items.get_mut(item_id) {
                item.location = unknown;
            }
            self.changes.item_written(*item_id);
            self.propagator
                .notify(EntityRef::Item(*item_id), ChangeKind::Updated);
        }
        if !moved.is_empty() {
            self.propagator
                .notify(EntityRef::Location(unknown), ChangeKind::MembershipChanged);
        }

        self.locations.remove(&id);
        self.changes.location_deleted(id);
        self.propagator.deleted(EntityRef::Location(id));
        info!(
            "event=location_delete module=store status=ok reassigned_items={}",
            moved.len()
        );
        Ok(moved.len())
    }

    // --- item state transitions ------------------------------------------

    /// Flips `on_list`, stamping the purchase date when moving off the list.
    /// Returns the new value.
    pub fn toggle_on_list(&mut self, id: ItemId) -> StoreResult<bool> {
        let now = self.clock.now_epoch_ms();
        let item = self
            .items
            .get_mut(&id)
            .ok_or(StoreError::NotFound(EntityRef::Item(id)))?;
        let on_list = !item.on_list;
        item.set_on_list(on_list, now);
        let location = item.location;
        self.item_state_changed(id, location, true);
        Ok(on_list)
    }

    /// Flips `is_available`. Returns the new value.
    pub fn toggle_available(&mut self, id: ItemId) -> StoreResult<bool> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(StoreError::NotFound(EntityRef::Item(id)))?;
        item.is_available = !item.is_available;
        let (available, location) = (item.is_available, item.location);
        self.item_state_changed(id, location, false);
        Ok(available)
    }

    /// Sets `is_available`. Returns whether anything changed.
    pub fn mark_available(&mut self, id: ItemId) -> StoreResult<bool> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(StoreError::NotFound(EntityRef::Item(id)))?;
        if item.is_available {
            return Ok(false);
        }
        item.is_available = true;
        let location = item.location;
        self.item_state_changed(id, location, false);
        Ok(true)
    }

    /// Moves every on-list item off the list. Returns how many moved.
    pub fn move_all_items_off_list(&mut self) -> usize {
        let now = self.clock.now_epoch_ms();
        let mut moved = Vec::new();
        for item in self.items.values_mut().filter(|item| item.on_list) {
            item.set_on_list(false, now);
            moved.push((item.id, item.location));
        }
        for (id, location) in &moved {
            self.item_state_changed(*id, *location, true);
        }
        moved.len()
    }

    // --- lookups and queries ---------------------------------------------

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Looks up an item, failing with `NotFound`.
    pub fn get_item(&self, id: ItemId) -> StoreResult<&Item> {
        self.item(id)
            .ok_or(StoreError::NotFound(EntityRef::Item(id)))
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(&id)
    }

    /// Looks up a location, failing with `NotFound`.
    pub fn get_location(&self, id: LocationId) -> StoreResult<&Location> {
        self.location(id)
            .ok_or(StoreError::NotFound(EntityRef::Location(id)))
    }

    /// The unknown location record.
    pub fn unknown_location(&self) -> Option<&Location> {
        self.locations
            .get(&self.unknown_location)
            .filter(|location| location.is_unknown())
    }

    /// The location an item is attached to.
    ///
    /// Falls back to the unknown location if the reference does not resolve.
    pub fn location_of(&self, item: &Item) -> Option<&Location> {
        self.locations
            .get(&item.location)
            .or_else(|| self.unknown_location())
    }

    /// Items with the given `on_list` flag, ordered by name.
    pub fn query_items(&self, on_list: bool) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .values()
            .filter(|item| item.on_list == on_list)
            .cloned()
            .collect();
        sort_items(&mut items);
        items
    }

    /// Every item, ordered by name.
    pub fn all_items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.values().cloned().collect();
        sort_items(&mut items);
        items
    }

    /// Every location, ordered by visitation order.
    pub fn query_locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self.locations.values().cloned().collect();
        sort_locations(&mut locations);
        locations
    }

    /// Every location except the unknown location, ordered by visitation order.
    pub fn all_user_locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self
            .locations
            .values()
            .filter(|location| !location.is_unknown())
            .cloned()
            .collect();
        sort_locations(&mut locations);
        locations
    }

    /// Items attached to one location, ordered by name.
    pub fn items_at(&self, location: LocationId) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .items
            .values()
            .filter(|item| item.location == location)
            .cloned()
            .collect();
        sort_items(&mut items);
        items
    }

    pub fn item_count(&self, location: LocationId) -> usize {
        self.items
            .values()
            .filter(|item| item.location == location)
            .count()
    }

    pub fn has_items_on_list(&self, location: LocationId) -> bool {
        self.items
            .values()
            .any(|item| item.location == location && item.on_list)
    }

    pub fn count_items(&self) -> usize {
        self.items.len()
    }

    pub fn count_locations(&self) -> usize {
        self.locations.len()
    }

    /// Largest visitation order among user locations, if any exist.
    pub fn max_user_visitation_order(&self) -> Option<i32> {
        self.locations
            .values()
            .filter(|location| !location.is_unknown())
            .map(|location| location.visitation_order)
            .max()
    }

    /// Order that appends a new location after every user location.
    pub fn next_visitation_order(&self) -> i32 {
        let next = self
            .max_user_visitation_order()
            .map_or(1, |max| max.saturating_add(1));
        next.min(UNKNOWN_LOCATION_VISITATION_ORDER - 1)
    }

    // --- change propagation ----------------------------------------------

    /// Observes invalidations for one entity.
    pub fn subscribe(
        &mut self,
        entity: EntityRef,
        observer: impl Fn(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        self.propagator.subscribe(entity, observer)
    }

    /// Observes every invalidation.
    pub fn subscribe_all(
        &mut self,
        observer: impl Fn(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        self.propagator.subscribe_all(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.propagator.unsubscribe(id)
    }

    // --- pending delta ---------------------------------------------------

    /// Whether uncommitted changes exist.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drains the pending delta for a durable commit.
    pub fn take_changes(&mut self) -> ChangeSet {
        self.changes.take(&self.items, &self.locations)
    }

    /// Returns a change set whose commit failed to the pending delta.
    pub fn requeue_changes(&mut self, changes: &ChangeSet) {
        self.changes
            .requeue(changes, &self.items, &self.locations);
    }

    // --- internals -------------------------------------------------------

    fn item_ids_at(&self, location: LocationId) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| item.location == location)
            .map(|item| item.id)
            .collect();
        ids.sort();
        ids
    }

    fn item_state_changed(&mut self, id: ItemId, location: LocationId, membership: bool) {
        self.changes.item_written(id);
        self.propagator.notify(EntityRef::Item(id), ChangeKind::Updated);
        if membership {
            self.propagator
                .notify(EntityRef::Location(location), ChangeKind::MembershipChanged);
        }
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("items", &self.items.len())
            .field("locations", &self.locations.len())
            .field("unknown_location", &self.unknown_location)
            .field("pending_changes", &!self.changes.is_empty())
            .finish()
    }
}

fn sort_items(items: &mut [Item]) {
    items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

fn sort_locations(locations: &mut [Location]) {
    locations.sort_by(|a, b| {
        a.visitation_order
            .cmp(&b.visitation_order)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::EntityStore;
    use crate::clock::ManualClock;
    use crate::model::draft::{ItemDraft, LocationDraft};
    use crate::model::item::Item;
    use crate::model::location::{Location, UNKNOWN_LOCATION_VISITATION_ORDER};
    use crate::store::GraphSnapshot;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn new_store_has_exactly_one_unknown_location() {
        let mut store = EntityStore::new();
        let first = store.get_or_create_unknown_location();
        let second = store.get_or_create_unknown_location();
        assert_eq!(first, second);
        assert_eq!(store.count_locations(), 1);
        assert!(store.has_changes());
    }

    #[test]
    fn load_collapses_duplicate_unknown_locations_and_heals_items() {
        let first = Location::unknown();
        let second = Location::unknown();
        let stray = Item::new("Salt", second.id);
        let orphan = Item::new("Pepper", Uuid::new_v4());
        let snapshot = GraphSnapshot {
            locations: vec![first.clone(), second.clone()],
            items: vec![stray.clone(), orphan.clone()],
        };

        let store = EntityStore::load(snapshot, Arc::new(ManualClock::new()));
        let unknown = store.unknown_location().unwrap().id;
        let sentinels = store
            .query_locations()
            .into_iter()
            .filter(|location| location.visitation_order == UNKNOWN_LOCATION_VISITATION_ORDER)
            .count();
        assert_eq!(sentinels, 1);
        assert_eq!(store.item(stray.id).unwrap().location, unknown);
        assert_eq!(store.item(orphan.id).unwrap().location, unknown);
        assert!(store.has_changes());
    }

    #[test]
    fn next_visitation_order_never_reaches_sentinel() {
        let mut store = EntityStore::new();
        let mut draft = LocationDraft::named("Far");
        draft.visitation_order = Some(UNKNOWN_LOCATION_VISITATION_ORDER - 1);
        store.upsert_location(&draft).unwrap();
        assert_eq!(
            store.next_visitation_order(),
            UNKNOWN_LOCATION_VISITATION_ORDER - 1
        );
    }

    #[test]
    fn unchanged_upsert_records_no_change() {
        let mut store = EntityStore::new();
        let id = store.upsert_item(&ItemDraft::named("Rice")).unwrap();
        store.take_changes();

        let draft = ItemDraft::from_item(store.item(id).unwrap());
        store.upsert_item(&draft).unwrap();
        assert!(!store.has_changes());
    }
}
