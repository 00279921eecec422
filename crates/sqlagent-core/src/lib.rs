//! sqlagent-core
//!
//! Pure domain types and backend path conventions.
//! No HTTP dependency — this is the shared vocabulary of the explorer.

pub mod endpoints;
pub mod models;
