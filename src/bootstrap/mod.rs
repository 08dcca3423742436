//! Startup leader resolution.
//!
//! # Data Flow
//! ```text
//! proxy start
//!     → fleet.rs (instances tagged role=primary for the stack)
//!     → resolver.rs (fixed-interval retries, bounded attempts)
//!     → registry seeded with {leader: host:port}, generation 0
//! ```
//!
//! # Design Decisions
//! - Runs exactly once, before the discovery updater has produced data
//! - Exhausting the retry budget is fatal; the proxy never serves
//!   traffic without a known leader
//! - Kept apart from discovery: that path degrades, this one fails fast

pub mod fleet;
pub mod resolver;

pub use fleet::{FleetApi, FleetError, HttpFleetApi, TagFilter};
pub use resolver::{resolve_initial_leader, seed_registry, BootstrapError, RetryBudget};
