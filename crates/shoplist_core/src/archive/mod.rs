//! Snapshot export and merge-import of the whole entity graph.
//!
//! # Responsibility
//! - Serialize every location, unknown location included, with its items.
//! - Merge a snapshot into the store without touching known records.
//!
//! # Invariants
//! - Import is idempotent: re-importing an unchanged snapshot creates nothing
//!   and changes nothing.
//! - An invalid snapshot is rejected before any mutation.
//! - The codec works on the entity store directly and never commits.

pub mod codec;
pub mod format;

use std::error::Error;
use std::fmt::{Display, Formatter};

pub use codec::{export_archive, export_to_path, import_archive, import_from_path, ImportReport};
pub use format::{ItemRecord, LocationRecord};

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug)]
pub enum ArchiveError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A record failed validation; nothing was imported.
    Invalid(String),
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "archive io error: {err}"),
            Self::Json(err) => write!(f, "archive format error: {err}"),
            Self::Invalid(message) => write!(f, "invalid archive: {message}"),
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
