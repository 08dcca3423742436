//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared by value/Arc with all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; backend addresses live in the
//!   registry, not here, so they can change without a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BootstrapConfig, ClassifierConfig, DiscoveryConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ProxyConfig, RegistryConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
