//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! supervisor.rs:
//!     Apply registrations → Bind → Serve → await StopTrigger → ShutdownRace
//!
//! signals.rs:
//!     caller future, or first of SIGINT/SIGQUIT/SIGTERM → StopTrigger
//!
//! shutdown.rs:
//!     drain ──┐
//!             ├─ race.rs (first to finish wins) → Graceful | ForcedAfterTimeout
//!     timer ──┘
//! ```
//!
//! # Design Decisions
//! - Ordered startup: registrations first, then bind, then serve
//! - Ordered shutdown: stop accepting, drain, sever whatever is left at the deadline
//! - The server is owned by one run and moves linearly through it; no locks

pub mod race;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use shutdown::{Drain, GracePeriod, ShutdownOutcome, ShutdownRace};
pub use signals::{StopReason, StopTrigger, TerminationSignal};
pub use supervisor::{ServerSupervisor, SupervisorState};
