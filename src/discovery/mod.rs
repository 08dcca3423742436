//! Discovery updater subsystem.
//!
//! # Data Flow
//! ```text
//! every poll_interval:
//!     store.rs (membership query, bounded by query_timeout)
//!     → entries_from_rows (role/address rows → RegistryEntry)
//!     → Registry::from_entries (single-leader check)
//!     → sink.rs (RegistryHandle in-process, or snapshot file)
//!
//! on failure:
//!     log warn → keep last-known-good → next tick
//! ```
//!
//! # Design Decisions
//! - Decoupled from the request path; a slow database only delays refreshes
//! - Unchanged memberships are not republished
//! - An empty membership is suspicious and never replaces a snapshot

pub mod sink;
pub mod store;
pub mod updater;

pub use sink::{RegistrySink, SnapshotFileSink};
pub use store::{entries_from_rows, MemberRow, MembershipStore, PgMembershipStore};
pub use updater::{DiscoveryError, DiscoveryUpdater, RefreshOutcome};
