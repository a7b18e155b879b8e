//! Exchange rates.
//!
//! # Data Flow
//! ```text
//! data/rates.csv (embedded) or rates.path
//!     → table.rs (parse, lookup, convert)
//!     → service.rs (shared snapshot, reload)
//!     → watcher.rs (notify → reload)
//! ```

pub mod error;
pub mod service;
pub mod table;
pub mod watcher;

pub use error::RateError;
pub use service::{RateService, RateSource};
pub use table::{serialize_number, Conversion, CurrencyInfo, ExchangeRate, RateTable, BASE_CURRENCY};
pub use watcher::RatesWatcher;
