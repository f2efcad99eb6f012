//! Explicit invalidation signals for derived views.
//!
//! # Responsibility
//! - Keep an observer registry keyed by entity reference.
//! - Deliver a notice to every entity whose derived state depends on a
//!   mutation, even when that entity's own stored fields did not change.
//!
//! # Invariants
//! - Delivery is synchronous with the mutation that caused it.
//! - Every affected entity is notified at least once per mutation; notices
//!   are not batched or coalesced.
//! - Observers run while the store is mutably borrowed and must not call
//!   back into it.

use crate::model::item::ItemId;
use crate::model::location::LocationId;
use crate::model::EntityRef;
use std::collections::HashMap;

/// Why an entity was notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The record was created.
    Created,
    /// The record's own stored fields changed.
    Updated,
    /// An item's location changed name, colour or visitation order.
    LocationChanged,
    /// A location's attached item set, or the on-list state of one of its
    /// items, changed.
    MembershipChanged,
    /// The record was removed.
    Deleted,
}

/// One invalidation delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeNotice {
    pub entity: EntityRef,
    pub kind: ChangeKind,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Observer callback.
pub type Observer = Box<dyn Fn(&ChangeNotice) + Send>;

struct Subscription {
    id: SubscriptionId,
    observer: Observer,
}

/// Observer registry and notification path.
#[derive(Default)]
pub struct ChangePropagator {
    next_id: u64,
    by_entity: HashMap<EntityRef, Vec<Subscription>>,
    global: Vec<Subscription>,
}

impl ChangePropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes notices about one entity.
    pub fn subscribe(
        &mut self,
        entity: EntityRef,
        observer: impl Fn(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.by_entity.entry(entity).or_default().push(Subscription {
            id,
            observer: Box::new(observer),
        });
        id
    }

    /// Observes every notice.
    pub fn subscribe_all(
        &mut self,
        observer: impl Fn(&ChangeNotice) + Send + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.global.push(Subscription {
            id,
            observer: Box::new(observer),
        });
        id
    }

    /// Removes one subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if let Some(index) = self.global.iter().position(|sub| sub.id == id) {
            self.global.remove(index);
            return true;
        }
        for subscriptions in self.by_entity.values_mut() {
            if let Some(index) = subscriptions.iter().position(|sub| sub.id == id) {
                subscriptions.remove(index);
                return true;
            }
        }
        false
    }

    pub fn subscription_count(&self) -> usize {
        self.global.len() + self.by_entity.values().map(Vec::len).sum::<usize>()
    }

    /// Delivers one notice to entity and global observers.
    pub fn notify(&self, entity: EntityRef, kind: ChangeKind) {
        let notice = ChangeNotice { entity, kind };
        if let Some(subscriptions) = self.by_entity.get(&entity) {
            for subscription in subscriptions {
                (subscription.observer)(&notice);
            }
        }
        for subscription in &self.global {
            (subscription.observer)(&notice);
        }
    }

    /// A location's own fields changed: the location and every attached item
    /// are invalidated.
    pub(crate) fn location_fields_changed(&self, location: LocationId, attached: &[ItemId]) {
        self.notify(EntityRef::Location(location), ChangeKind::Updated);
        for item in attached {
            self.notify(EntityRef::Item(*item), ChangeKind::LocationChanged);
        }
    }

    /// An item moved: both the old and the new location are invalidated.
    pub(crate) fn item_relocated(&self, from: LocationId, to: LocationId) {
        self.notify(EntityRef::Location(from), ChangeKind::MembershipChanged);
        if from != to {
            self.notify(EntityRef::Location(to), ChangeKind::MembershipChanged);
        }
    }

    /// Notifies a deletion and drops subscriptions bound to the removed record.
    pub(crate) fn deleted(&mut self, entity: EntityRef) {
        self.notify(entity, ChangeKind::Deleted);
        self.by_entity.remove(&entity);
    }

    fn allocate_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

impl std::fmt::Debug for ChangePropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePropagator")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeKind, ChangeNotice, ChangePropagator};
    use crate::model::EntityRef;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn recorder() -> (Arc<Mutex<Vec<ChangeNotice>>>, impl Fn(&ChangeNotice) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |notice: &ChangeNotice| {
            sink.lock().unwrap().push(*notice)
        })
    }

    #[test]
    fn entity_observer_only_sees_its_entity() {
        let mut propagator = ChangePropagator::new();
        let watched = EntityRef::Item(Uuid::new_v4());
        let other = EntityRef::Item(Uuid::new_v4());
        let (seen, observer) = recorder();
        propagator.subscribe(watched, observer);

        propagator.notify(other, ChangeKind::Updated);
        propagator.notify(watched, ChangeKind::LocationChanged);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].entity, watched);
        assert_eq!(seen[0].kind, ChangeKind::LocationChanged);
    }

    #[test]
    fn location_change_reaches_every_attached_item() {
        let mut propagator = ChangePropagator::new();
        let (seen, observer) = recorder();
        propagator.subscribe_all(observer);

        let location = Uuid::new_v4();
        let items = [Uuid::new_v4(), Uuid::new_v4()];
        propagator.location_fields_changed(location, &items);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        for item in items {
            assert!(seen.contains(&ChangeNotice {
                entity: EntityRef::Item(item),
                kind: ChangeKind::LocationChanged,
            }));
        }
    }

    #[test]
    fn unsubscribe_and_delete_drop_observers() {
        let mut propagator = ChangePropagator::new();
        let entity = EntityRef::Location(Uuid::new_v4());
        let (_, first) = recorder();
        let (_, second) = recorder();
        let global = propagator.subscribe_all(first);
        propagator.subscribe(entity, second);
        assert_eq!(propagator.subscription_count(), 2);

        assert!(propagator.unsubscribe(global));
        assert!(!propagator.unsubscribe(global));
        propagator.deleted(entity);
        assert_eq!(propagator.subscription_count(), 0);
    }
}
