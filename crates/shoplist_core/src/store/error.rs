//! Error types for entity store operations.

use crate::model::location::LocationId;
use crate::model::{EntityRef, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// A mutation that would break a structural invariant. Rejected as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The unknown location can never be deleted.
    DeleteUnknownLocation(LocationId),
    /// The unknown location must keep the sentinel visitation order.
    ReorderUnknownLocation(LocationId),
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeleteUnknownLocation(id) => {
                write!(f, "the unknown location {id} cannot be deleted")
            }
            Self::ReorderUnknownLocation(id) => write!(
                f,
                "the unknown location {id} must keep its reserved visitation order"
            ),
        }
    }
}

/// Error returned by entity store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Validation(ValidationError),
    NotFound(EntityRef),
    InvariantViolation(InvariantViolation),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::InvariantViolation(violation) => write!(f, "{violation}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvariantViolation(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<InvariantViolation> for StoreError {
    fn from(value: InvariantViolation) -> Self {
        Self::InvariantViolation(value)
    }
}
