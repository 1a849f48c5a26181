//! Service layer: storage ports and the domain logic composed on top of
//! them. The catalog, blob store, probe and identity modules each expose
//! a trait plus its local adapter; the uploader and lifecycle modules
//! drive those ports.

pub mod blob_store;
pub mod catalog;
pub mod export;
pub mod identity;
pub mod lifecycle;
pub mod probe;
pub mod uploader;
pub mod view;
