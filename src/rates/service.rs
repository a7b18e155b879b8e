//! Shared, reloadable access to the rate table.
//!
//! # Design Decisions
//! - The current table sits behind an `ArcSwap`, so request handlers read a
//!   consistent snapshot without locking while a reload swaps in a new one
//! - A table that failed to load is kept as an error value; every lookup then
//!   reports the load failure until a reload succeeds
//! - A failed reload never replaces a good table

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::RatesConfig;
use crate::observability::metrics;
use crate::rates::error::RateError;
use crate::rates::table::{Conversion, CurrencyInfo, RateTable};

/// Where rate data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateSource {
    /// The table compiled into the binary.
    Embedded,
    File(PathBuf),
}

impl RateSource {
    pub fn load(&self) -> Result<RateTable, RateError> {
        match self {
            RateSource::Embedded => RateTable::embedded(),
            RateSource::File(path) => RateTable::load_file(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            RateSource::Embedded => None,
            RateSource::File(path) => Some(path),
        }
    }
}

type Loaded = Result<RateTable, RateError>;

pub struct RateService {
    source: RateSource,
    current: ArcSwap<Loaded>,
}

impl RateService {
    /// Load `source` now; a failure is remembered rather than returned.
    pub fn new(source: RateSource) -> Self {
        let loaded = source.load();
        match &loaded {
            Ok(table) => tracing::info!(source = ?source, currencies = table.len(), "Exchange rates loaded"),
            Err(e) => tracing::error!(source = ?source, error = %e, "Failed to load exchange rates"),
        }

        Self {
            source,
            current: ArcSwap::from_pointee(loaded),
        }
    }

    pub fn from_config(config: &RatesConfig) -> Self {
        let source = match &config.path {
            Some(path) => RateSource::File(PathBuf::from(path)),
            None => RateSource::Embedded,
        };
        Self::new(source)
    }

    /// Service over an already parsed table.
    pub fn from_table(table: RateTable) -> Self {
        Self {
            source: RateSource::Embedded,
            current: ArcSwap::from_pointee(Ok(table)),
        }
    }

    pub fn source(&self) -> &RateSource {
        &self.source
    }

    /// Current table, or the error it failed to load with.
    pub fn snapshot(&self) -> Arc<Loaded> {
        self.current.load_full()
    }

    /// Re-read the source and swap the table in.
    pub fn reload(&self) -> Result<(), RateError> {
        match self.source.load() {
            Ok(table) => {
                tracing::info!(source = ?self.source, currencies = table.len(), "Exchange rates reloaded");
                self.current.store(Arc::new(Ok(table)));
                metrics::record_rates_reload("success");
                Ok(())
            }
            Err(e) => {
                let keeping = self.current.load().is_ok();
                tracing::error!(
                    source = ?self.source,
                    error = %e,
                    keeping_current = keeping,
                    "Failed to reload exchange rates"
                );
                if !keeping {
                    self.current.store(Arc::new(Err(e.clone())));
                }
                metrics::record_rates_reload("failure");
                Err(e)
            }
        }
    }

    fn with_table<T>(&self, f: impl FnOnce(&RateTable) -> Result<T, RateError>) -> Result<T, RateError> {
        match &**self.current.load() {
            Ok(table) => f(table),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn get_rate(&self, from: &str, to: &str) -> Result<f64, RateError> {
        self.with_table(|table| table.get_rate(from, to))
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, RateError> {
        self.with_table(|table| table.convert(amount, from, to))
    }

    pub fn list_currencies(&self) -> Result<Vec<CurrencyInfo>, RateError> {
        self.with_table(|table| Ok(table.currencies().to_vec()))
    }

    pub fn is_valid_currency(&self, code: &str) -> Result<bool, RateError> {
        self.with_table(|table| Ok(table.is_valid_currency(code)))
    }
}

impl std::fmt::Debug for RateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateService")
            .field("source", &self.source)
            .field("loaded", &self.current.load().is_ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Record Date,Country - Currency Description,Exchange Rate,Effective Date,ISO code";

    fn write_rates(path: &Path, rows: &[&str]) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fx-gateway-{}-{name}.csv", std::process::id()))
    }

    #[test]
    fn test_embedded_service() {
        let service = RateService::from_config(&RatesConfig::default());
        assert_eq!(service.source(), &RateSource::Embedded);
        assert_eq!(service.get_rate("USD", "GBP").unwrap(), 0.743);
        assert!(service.is_valid_currency("jpy").unwrap());
        assert_eq!(service.list_currencies().unwrap()[0].iso_code, "USD");
    }

    #[test]
    fn test_missing_file_reports_load_error() {
        let service = RateService::new(RateSource::File(temp_path("does-not-exist")));
        assert!(matches!(service.convert(1.0, "USD", "EUR"), Err(RateError::Load(_))));
        assert!(matches!(service.list_currencies(), Err(RateError::Load(_))));
    }

    #[test]
    fn test_reload_swaps_and_keeps_good_table() {
        let path = temp_path("reload");
        write_rates(&path, &["2025-12-31,Euro Zone-Euro,0.851,2025-12-31,EUR"]);

        let service = RateService::new(RateSource::File(path.clone()));
        assert_eq!(service.get_rate("USD", "EUR").unwrap(), 0.851);

        write_rates(&path, &["2026-01-31,Euro Zone-Euro,0.9,2026-01-31,EUR"]);
        service.reload().unwrap();
        assert_eq!(service.get_rate("USD", "EUR").unwrap(), 0.9);

        write_rates(&path, &["2026-02-28,Euro Zone-Euro,oops,2026-02-28,EUR"]);
        assert!(service.reload().is_err());
        assert_eq!(service.get_rate("USD", "EUR").unwrap(), 0.9);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reload_recovers_from_failed_load() {
        let path = temp_path("recover");
        let _ = std::fs::remove_file(&path);

        let service = RateService::new(RateSource::File(path.clone()));
        assert!(service.snapshot().is_err());

        write_rates(&path, &["2025-12-31,Japan-Yen,156.61,2025-12-31,JPY"]);
        service.reload().unwrap();
        assert_eq!(service.get_rate("USD", "JPY").unwrap(), 156.61);

        std::fs::remove_file(&path).unwrap();
    }
}
