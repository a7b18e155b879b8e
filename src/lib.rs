//! Currency conversion API with request mirroring.
//!
//! Serves a handful of JSON endpoints backed by a USD exchange-rate table and
//! copies every request/response pair to a downstream service in the
//! background.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mirror;
pub mod observability;
pub mod rates;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
