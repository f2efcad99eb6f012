//! Location domain model.
//!
//! # Responsibility
//! - Define the shopping location record and its colour.
//! - Own the sentinel constants identifying the unknown location.
//!
//! # Invariants
//! - `visitation_order == UNKNOWN_LOCATION_VISITATION_ORDER` identifies the
//!   unknown location and no other record may carry it.
//! - Colour components are finite and within `[0, 1]`.
//! - The location's item set is derived from item references, never stored.

use super::{validate_name, EntityKind, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a location.
pub type LocationId = Uuid;

/// Visitation order reserved for the unknown location.
pub const UNKNOWN_LOCATION_VISITATION_ORDER: i32 = i32::MAX;

/// Name given to the unknown location when it has to be created.
pub const UNKNOWN_LOCATION_NAME: &str = "Unknown Location";

/// RGBA colour with each component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub opacity: f64,
}

impl Rgba {
    /// Neutral grey used for a freshly created unknown location.
    pub const UNKNOWN_LOCATION: Rgba = Rgba {
        red: 0.5,
        green: 0.5,
        blue: 0.5,
        opacity: 0.5,
    };

    /// Default colour for a new user location.
    pub const NEW_LOCATION: Rgba = Rgba {
        red: 0.0,
        green: 1.0,
        blue: 0.0,
        opacity: 0.5,
    };

    /// Builds a validated colour.
    pub fn new(red: f64, green: f64, blue: f64, opacity: f64) -> Result<Self, ValidationError> {
        let color = Self {
            red,
            green,
            blue,
            opacity,
        };
        color.validate()?;
        Ok(color)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (component, value) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("opacity", self.opacity),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::ColorComponentOutOfRange { component, value });
            }
        }
        Ok(())
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::NEW_LOCATION
    }
}

/// A place where items are bought, sorted by `visitation_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    /// Relative sort key. Not unique, except for the sentinel value.
    pub visitation_order: i32,
    pub color: Rgba,
}

impl Location {
    /// Builds the unknown location with its fixed defaults.
    pub fn unknown() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: UNKNOWN_LOCATION_NAME.to_string(),
            visitation_order: UNKNOWN_LOCATION_VISITATION_ORDER,
            color: Rgba::UNKNOWN_LOCATION,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.visitation_order == UNKNOWN_LOCATION_VISITATION_ORDER
    }

    /// Checks the fields required to persist this record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(EntityKind::Location, &self.name)?;
        self.color.validate()
    }
}
