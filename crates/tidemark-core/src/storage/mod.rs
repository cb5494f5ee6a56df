//! # Storage Backends
//!
//! Persistent implementations of [`SensorValueStore`](crate::store::SensorValueStore).

mod redb_store;

pub use redb_store::RedbStore;
