//! Item domain model.
//!
//! # Responsibility
//! - Define the shopping item record.
//! - Own the purchase-stamping rule for on-list transitions.
//!
//! # Invariants
//! - `name` is non-blank and `quantity >= 1` for every stored item.
//! - `location` always resolves to a stored `Location`; the store heals
//!   dangling references to the unknown location.
//! - Moving an item off the list stamps `date_last_purchased`; moving it back
//!   on the list never clears the stamp.

use super::location::LocationId;
use super::{validate_name, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an item.
pub type ItemId = Uuid;

/// Something to buy, attached to exactly one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub quantity: i32,
    pub on_list: bool,
    pub is_available: bool,
    /// Unix epoch milliseconds of the last on-list to off-list transition.
    pub date_last_purchased: Option<i64>,
    pub location: LocationId,
}

impl Item {
    /// Creates an item with a generated ID and new-item defaults.
    pub fn new(name: impl Into<String>, location: LocationId) -> Self {
        Self::with_id(Uuid::new_v4(), name, location)
    }

    /// Creates an item with a caller-provided ID.
    ///
    /// Used by upsert and import paths where the identity already exists.
    pub fn with_id(id: ItemId, name: impl Into<String>, location: LocationId) -> Self {
        Self {
            id,
            name: name.into(),
            quantity: 1,
            on_list: true,
            is_available: true,
            date_last_purchased: None,
            location,
        }
    }

    pub fn has_been_purchased(&self) -> bool {
        self.date_last_purchased.is_some()
    }

    /// Checks the fields required to persist this record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(EntityKind::Item, &self.name)?;
        validate_quantity(self.quantity)
    }

    /// Applies an on-list change, stamping the purchase time on true -> false.
    ///
    /// Returns whether the flag actually changed.
    pub(crate) fn set_on_list(&mut self, on_list: bool, now_epoch_ms: i64) -> bool {
        if self.on_list == on_list {
            return false;
        }
        if self.on_list && !on_list {
            self.date_last_purchased = Some(now_epoch_ms);
        }
        self.on_list = on_list;
        true
    }
}

pub(crate) fn validate_quantity(quantity: i32) -> Result<(), ValidationError> {
    if quantity < 1 {
        return Err(ValidationError::QuantityOutOfRange(quantity));
    }
    Ok(())
}
