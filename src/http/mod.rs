//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, dispatcher)
//!     → request.rs (request ID)
//!     → [routing layer classifies and selects a backend]
//!     → forward.rs (plain HTTP) or websocket.rs (upgrade bridge)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod server;
pub mod websocket;

pub use forward::{ForwardError, UpstreamClient};
pub use request::{request_id_of, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
