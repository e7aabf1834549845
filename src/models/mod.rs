//! Core data models.
//!
//! These entities map to database tables via `sqlx::FromRow` and serialize
//! as JSON via `serde`.

pub mod class;
pub mod exam;
pub mod path_entry;
