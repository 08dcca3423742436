//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers, [body])
//!     → classifier.rs (leader or follower?)
//!         → body.rs (bounded buffer + replay, POST /rpc only)
//!         → rpc.rs (write-method sniffing)
//!     → selector.rs (ClassificationResult + Registry snapshot)
//!     → Return: RouteDecision (backend address or unavailable)
//! ```
//!
//! # Design Decisions
//! - Classification and selection are pure functions of their inputs
//! - Writes never fall back to a follower
//! - Body read failures degrade to read routing, never to client errors

pub mod body;
pub mod classifier;
pub mod rpc;
pub mod selector;

pub use classifier::{ClassificationResult, ClassificationRule, Classifier};
pub use rpc::MethodMatch;
pub use selector::{route, select, RouteDecision, RouteReason};
