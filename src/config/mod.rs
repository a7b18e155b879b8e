//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or defaults
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! process environment
//!     → env.rs (snapshot taken once at startup)
//!     → EnvVars handed to the mirroring subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use env::EnvVars;
pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    BindingKind, GatewayConfig, ListenerConfig, MirrorSettings, ObservabilityConfig, RatesConfig,
    TimeoutConfig,
};
