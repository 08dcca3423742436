//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS termination, PEM files from disk)
//!     → Hand off to HTTP layer
//! ```

pub mod tls;

pub use tls::load_tls_config;
