//! Use-case entry points for embedding hosts.
//!
//! # Responsibility
//! - Route every mutation through the entity store, then the scheduler.
//! - Pick the commit mode per operation: debounced for routine edits,
//!   immediate for deletes.
//! - Consume the host's background/foreground hooks.

pub mod lifecycle;
pub mod shopping_service;
