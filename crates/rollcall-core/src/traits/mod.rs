//! Traits defined in `rollcall-core` and implemented by other crates.

pub mod store;

pub use store::AttendanceStore;
