//! HTTP handlers for the media console's REST surface.
//!
//! Split by concern: session management, catalog browsing and editing,
//! batch uploads, the recycle-bin lifecycle, and operational probes.

pub mod auth_handlers;
pub mod entry_handlers;
pub mod health_handlers;
pub mod lifecycle_handlers;
pub mod upload_handlers;
