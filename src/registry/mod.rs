//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! Bootstrap resolver ──(once, generation 0)──┐
//!                                             ▼
//! Discovery updater ──▶ snapshot file ──▶ watcher.rs ──▶ handle.rs (ArcSwap<Registry>)
//!        │                                                   ▲
//!        └───────────── embedded mode ───────────────────────┘
//!
//! Request workers ──▶ handle.load() ──▶ Arc<Registry> (immutable snapshot)
//! ```
//!
//! # Design Decisions
//! - A snapshot is never mutated after construction; writers build a new
//!   `Registry` and swap the pointer
//! - Empty addresses are equivalent to absent entries
//! - Staleness of one polling interval is tolerated

pub mod file;
pub mod handle;
pub mod snapshot;
pub mod watcher;

pub use file::{last_generation, read_snapshot, write_snapshot, SnapshotError};
pub use handle::RegistryHandle;
pub use snapshot::{Registry, RegistryEntry, RegistryError, Role, FOLLOWER_PREFIX, LEADER_KEY};
pub use watcher::SnapshotWatcher;
