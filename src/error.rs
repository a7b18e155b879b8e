//! Top-level error type for starting and running the gateway.

use thiserror::Error;

use crate::config::ConfigError;
use crate::mirror::MirrorError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("mirror binding error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
