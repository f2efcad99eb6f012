//! Flat field bundles accepted by upsert entry points.
//!
//! A draft carries an optional id: when the id resolves to a stored record
//! the draft updates it in place, otherwise a record is created from it. This
//! lets one edit buffer serve both the "add new" and "modify existing" flows.

use super::item::{validate_quantity, Item, ItemId};
use super::location::{Location, LocationId, Rgba, UNKNOWN_LOCATION_VISITATION_ORDER};
use super::{validate_name, EntityKind, ValidationError};

/// Editable fields of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    /// Target item, or `None` to always create.
    pub id: Option<ItemId>,
    pub name: String,
    pub quantity: i32,
    pub on_list: bool,
    pub is_available: bool,
    /// Target location, or `None` for the unknown location.
    pub location: Option<LocationId>,
}

impl Default for ItemDraft {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            quantity: 1,
            on_list: true,
            is_available: true,
            location: None,
        }
    }
}

impl ItemDraft {
    /// Draft for a new item with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copies every editable field of a stored item.
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: Some(item.id),
            name: item.name.clone(),
            quantity: item.quantity,
            on_list: item.on_list,
            is_available: item.is_available,
            location: Some(item.location),
        }
    }

    pub fn at(mut self, location: LocationId) -> Self {
        self.location = Some(location);
        self
    }

    pub fn can_be_saved(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(EntityKind::Item, &self.name)?;
        validate_quantity(self.quantity)
    }
}

/// Editable fields of a location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationDraft {
    /// Target location, or `None` to always create.
    pub id: Option<LocationId>,
    pub name: String,
    /// `None` keeps the stored order, or appends after all user locations
    /// when creating.
    pub visitation_order: Option<i32>,
    pub color: Rgba,
}

impl Default for LocationDraft {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            visitation_order: None,
            color: Rgba::NEW_LOCATION,
        }
    }
}

impl LocationDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_location(location: &Location) -> Self {
        Self {
            id: Some(location.id),
            name: location.name.clone(),
            visitation_order: Some(location.visitation_order),
            color: location.color,
        }
    }

    pub fn can_be_saved(&self) -> bool {
        self.validate().is_ok()
    }

    /// Checks field-level rules. Whether the sentinel order is acceptable
    /// depends on the target record and is decided by the store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(EntityKind::Location, &self.name)?;
        self.color.validate()
    }

    pub(crate) fn requests_sentinel_order(&self) -> bool {
        self.visitation_order == Some(UNKNOWN_LOCATION_VISITATION_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemDraft, LocationDraft};
    use crate::model::location::Rgba;

    #[test]
    fn item_draft_defaults_match_new_item() {
        let draft = ItemDraft::default();
        assert_eq!(draft.quantity, 1);
        assert!(draft.on_list);
        assert!(draft.is_available);
        assert!(!draft.can_be_saved());
        assert!(ItemDraft::named("Bread").can_be_saved());
    }

    #[test]
    fn location_draft_rejects_invalid_color() {
        let mut draft = LocationDraft::named("Market");
        draft.color = Rgba {
            red: -0.1,
            green: 0.0,
            blue: 0.0,
            opacity: 1.0,
        };
        assert!(!draft.can_be_saved());
    }
}
