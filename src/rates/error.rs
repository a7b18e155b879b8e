use thiserror::Error;

/// Errors produced by rate lookups and conversions.
///
/// The display strings are part of the public API; they are returned to
/// clients verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("Invalid source currency code: {0}")]
    InvalidSource(String),

    #[error("Invalid target currency code: {0}")]
    InvalidTarget(String),

    #[error("Only conversions involving USD are supported. USD must be either source or target currency.")]
    UsdRequired,

    #[error("Amount must be a positive number greater than 0")]
    InvalidAmount,

    #[error("Failed to load exchange rates: {0}")]
    Load(String),
}

impl RateError {
    /// True for errors caused by the caller's input rather than the table.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RateError::Load(_))
    }
}
