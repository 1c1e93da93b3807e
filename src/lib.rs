//! Bounded graceful-shutdown supervisor for a long-running HTTP server.
//!
//! A [`ServerSupervisor`] applies service registrations, binds a plaintext
//! listener on the wildcard host, serves until a [`StopTrigger`] fires, and
//! then races an orderly drain against a grace period before severing
//! whatever is still in flight.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use http::{ServiceRegistrar, ServiceRegistry};
pub use lifecycle::{GracePeriod, ServerSupervisor, ShutdownOutcome, StopTrigger, SupervisorState};
