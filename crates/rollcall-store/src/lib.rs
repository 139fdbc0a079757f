//! # rollcall-store
//!
//! Adapters for the [`AttendanceStore`] boundary: a PostgREST-style HTTP
//! client for production and a process-local store for tests and offline
//! runs.

pub mod memory;
pub mod rest;

use std::sync::Arc;

use rollcall_core::config::store::{StoreBackend, StoreConfig};
use rollcall_core::result::AppResult;
use rollcall_core::traits::AttendanceStore;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Build the store adapter selected by configuration.
pub fn build_store(config: &StoreConfig) -> AppResult<Arc<dyn AttendanceStore>> {
    match config.backend {
        StoreBackend::Rest => {
            let store = RestStore::new(config)?;
            tracing::info!(url = %config.url, "Using REST attendance store");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory attendance store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
