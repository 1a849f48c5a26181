//! Backend service for a browser media management console.
//!
//! Users sign in, upload video/audio/image files in batches, browse and
//! edit a catalog, and move entries through a recycle bin before they
//! are purged for good. Records live in SQLite, payloads on local disk.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
