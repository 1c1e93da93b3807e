//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenSpec (wildcard host + port)
//!     → listener.rs (bind, report assigned port, bounded accept)
//!     → connection.rs (connection IDs, open-connection count)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - A bind failure is terminal for the run and never retried here
//! - Bounded accept prevents resource exhaustion
//! - Plaintext only; there is no TLS handshake stage

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ListenSpec, Listener, ListenerError, WILDCARD_HOST};
