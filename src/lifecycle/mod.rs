//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → Bootstrap leader (fatal) → Snapshot load/watch
//!     → Embedded discovery → Admin API → Listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Stop loops → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Bootstrap failure is the only fatal runtime condition
//! - Listeners start last (traffic only when a leader is known)
//! - Background loops observe the same shutdown signal as the server

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{run, StartupError};
