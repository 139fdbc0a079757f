//! # rollcall-worker
//!
//! Durability writes (session metadata, accepted submissions) never block
//! or fail a request. They are pushed onto a bounded [`SyncQueue`] and
//! applied to the store in order by a single [`SyncRunner`], which retries
//! transient failures a bounded number of times and logs the rest.

pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;

pub use executor::{JobExecutionError, SyncExecutor};
pub use jobs::SyncJob;
pub use queue::SyncQueue;
pub use runner::{DrainReport, SyncRunner};
