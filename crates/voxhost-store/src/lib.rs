//! Persisted room state for Voxhost.
//!
//! [`RoomStore`] owns the in-memory room collections and rotation
//! settings and writes each one to a [`KeyValueStore`] as a versioned
//! JSON entry (`{"version": 1, "data": ...}`). Two backends ship here:
//! [`MemoryStore`] for tests and embedded use, and [`FileStore`] for a
//! state directory on disk.

mod backend;
mod error;
mod store;

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use error::StoreError;
pub use store::{RoomStore, SCHEMA_VERSION, keys};
