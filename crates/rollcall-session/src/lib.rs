//! # rollcall-session
//!
//! The in-process authority for live attendance state.
//!
//! - [`SessionRegistry`]: concurrent map of session id to [`Session`]
//! - [`Session`]: one group's center, window, ledger, and audit log behind
//!   its own reader/writer lock
//! - [`window`]: the Idle / Active / Closed state machine with lazy expiry
//! - [`timer::WindowTimer`]: forced expiry independent of request traffic
//! - [`geo`]: haversine distance and present/absent classification
//! - [`audit::AuditLog`]: append-only CSV trail, flushed on every write

pub mod audit;
pub mod clock;
pub mod geo;
pub mod ledger;
pub mod registry;
pub mod session;
pub mod timer;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{SubmissionLedger, SubmissionRecord};
pub use registry::SessionRegistry;
pub use session::{
    CenterInfo, MembershipProof, Rejection, Session, SessionRuntime, SubmissionAttempt,
    WindowStarted, WindowStatus,
};
pub use window::WindowPhase;
