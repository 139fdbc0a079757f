//! # rollcall-core
//!
//! Core crate for Rollcall. Contains configuration schemas, typed
//! identifiers, the records exchanged with the remote attendance store,
//! pagination types, the [`traits::AttendanceStore`] boundary, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other Rollcall crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
