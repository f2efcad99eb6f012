//! Entity store, change tracking and change propagation.
//!
//! # Responsibility
//! - Hold the authoritative in-memory item/location graph.
//! - Record the pending delta that the persistence scheduler commits.
//! - Signal derived-view invalidations across the item/location relation.
//!
//! # Invariants
//! - All mutations run through one owner; the store does no internal locking.
//! - A read never observes a dangling item location.

pub mod change_set;
pub mod entity_store;
pub mod error;
pub mod propagator;
pub mod sections;

use crate::model::item::Item;
use crate::model::location::Location;

/// Full copy of the graph, as loaded from or written to durable storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    pub locations: Vec<Location>,
    pub items: Vec<Item>,
}
