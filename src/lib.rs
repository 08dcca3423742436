//! Sequencer router library.
//!
//! Routes client traffic for a sequencer cluster: writes and readiness
//! probes to the single leader, reads to a follower (falling back to the
//! leader), against a registry snapshot that is swapped atomically as
//! membership changes.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod registry;
pub mod routing;

// Membership
pub mod bootstrap;
pub mod discovery;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use registry::{Registry, RegistryHandle};
