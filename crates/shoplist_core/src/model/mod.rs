//! Domain model for the shopping list graph.
//!
//! # Responsibility
//! - Define the two persisted record shapes (`Item`, `Location`).
//! - Define the flat field bundles used by upsert entry points.
//! - Keep construction-time validation next to the records it guards.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Exactly one `Location` carries `UNKNOWN_LOCATION_VISITATION_ORDER`.
//! - An `Item` always references exactly one `Location`.

pub mod draft;
pub mod item;
pub mod location;

use std::error::Error;
use std::fmt::{Display, Formatter};

use item::ItemId;
use location::LocationId;

/// Record kind, used in diagnostics and validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Item,
    Location,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Item => write!(f, "item"),
            Self::Location => write!(f, "location"),
        }
    }
}

/// Typed reference to one record in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Item(ItemId),
    Location(LocationId),
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Item(_) => EntityKind::Item,
            Self::Location(_) => EntityKind::Location,
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Item(id) => write!(f, "item {id}"),
            Self::Location(id) => write!(f, "location {id}"),
        }
    }
}

/// Field-level validation failure, raised before any mutation is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name is empty or whitespace only.
    EmptyName(EntityKind),
    /// Item quantity must be at least 1.
    QuantityOutOfRange(i32),
    /// Colour components must be finite and within `[0, 1]`.
    ColorComponentOutOfRange { component: &'static str, value: f64 },
    /// The sentinel visitation order is reserved for the unknown location.
    ReservedVisitationOrder(i32),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName(kind) => write!(f, "{kind} name must not be empty"),
            Self::QuantityOutOfRange(value) => {
                write!(f, "item quantity must be >= 1, got {value}")
            }
            Self::ColorComponentOutOfRange { component, value } => write!(
                f,
                "color component `{component}` must be within [0, 1], got {value}"
            ),
            Self::ReservedVisitationOrder(value) => write!(
                f,
                "visitation order {value} is reserved for the unknown location"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn validate_name(kind: EntityKind, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName(kind));
    }
    Ok(())
}
