//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceRegistry (caller callbacks)
//!     → registry.rs (apply in order → ServiceRegistrar → Router)
//!     → server.rs (middleware, serve connections, drain / sever)
//! ```

pub mod registry;
pub mod server;

pub use registry::{Registration, ServiceRegistrar, ServiceRegistry};
pub use server::{RunningServer, ServeReport, Server};
