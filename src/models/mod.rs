//! Core data models for the media management console.
//!
//! These entities describe catalog entries, signed-in users and the
//! outcome reports produced by batch operations. They map cleanly to
//! database rows via `sqlx::FromRow` and serialize naturally as JSON
//! via `serde`.

pub mod entry;
pub mod report;
pub mod user;
