//! Exchange rate table parsed from Treasury-format CSV.
//!
//! # Format
//! ```text
//! Record Date,Country - Currency Description,Exchange Rate,Effective Date,ISO code
//! 2025-12-31,Euro Zone-Euro,0.851,2025-12-31,EUR
//! ```
//! Rates are units of foreign currency per one US dollar. USD itself is
//! always present with a rate of 1.
//!
//! # Design Decisions
//! - Lookups key on the uppercased ISO code; the last row for a code wins
//! - The currency list keeps the first row for each code, in file order,
//!   with USD first
//! - Any malformed row rejects the whole table

use std::collections::HashMap;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::rates::error::RateError;

/// Base currency every conversion must involve.
pub const BASE_CURRENCY: &str = "USD";

const BASE_DATE: &str = "2025-12-31";
const BASE_DESCRIPTION: &str = "United States-Dollar";

const COL_RECORD_DATE: &str = "Record Date";
const COL_DESCRIPTION: &str = "Country - Currency Description";
const COL_RATE: &str = "Exchange Rate";
const COL_EFFECTIVE_DATE: &str = "Effective Date";
const COL_ISO_CODE: &str = "ISO code";

static EMBEDDED_RATES: &str = include_str!("../../data/rates.csv");

/// One row of the rate file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub record_date: String,
    pub country_currency_description: String,
    #[serde(serialize_with = "serialize_number")]
    pub exchange_rate: f64,
    pub effective_date: String,
    pub iso_code: String,
}

/// Public listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyInfo {
    pub iso_code: String,
    pub description: String,
    #[serde(serialize_with = "serialize_number")]
    pub exchange_rate: f64,
}

impl From<&ExchangeRate> for CurrencyInfo {
    fn from(rate: &ExchangeRate) -> Self {
        Self {
            iso_code: rate.iso_code.clone(),
            description: rate.country_currency_description.clone(),
            exchange_rate: rate.exchange_rate,
        }
    }
}

/// Result of a conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub rate: f64,
    pub converted: f64,
}

/// Serialize a float the way JSON clients expect: integral values without a
/// fractional part, non-finite values as `null`.
pub fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if !value.is_finite() {
        serializer.serialize_none()
    } else if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[derive(Debug, Clone)]
pub struct RateTable {
    rates: HashMap<String, ExchangeRate>,
    currencies: Vec<CurrencyInfo>,
}

impl RateTable {
    /// Table holding only the base currency.
    fn base() -> Self {
        let usd = ExchangeRate {
            record_date: BASE_DATE.to_string(),
            country_currency_description: BASE_DESCRIPTION.to_string(),
            exchange_rate: 1.0,
            effective_date: BASE_DATE.to_string(),
            iso_code: BASE_CURRENCY.to_string(),
        };
        let mut table = Self {
            rates: HashMap::new(),
            currencies: Vec::new(),
        };
        table.insert(usd);
        table
    }

    fn insert(&mut self, rate: ExchangeRate) {
        let key = rate.iso_code.to_uppercase();
        if !self.rates.contains_key(&key) {
            self.currencies.push(CurrencyInfo::from(&rate));
        }
        self.rates.insert(key, rate);
    }

    /// Parse CSV text.
    pub fn parse(csv: &str) -> Result<Self, RateError> {
        let mut lines = csv
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| RateError::Load("rate data is empty".to_string()))?;
        let header = split_record(header).map_err(|e| RateError::Load(format!("header: {e}")))?;
        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| RateError::Load(format!("missing column `{name}`")))
        };

        let record_date = column(COL_RECORD_DATE)?;
        let description = column(COL_DESCRIPTION)?;
        let rate = column(COL_RATE)?;
        let effective_date = column(COL_EFFECTIVE_DATE)?;
        let iso_code = column(COL_ISO_CODE)?;

        let mut table = Self::base();
        for (line_no, line) in lines {
            let mut fields = split_record(line).map_err(|e| RateError::Load(format!("line {line_no}: {e}")))?;
            if fields.len() != header.len() {
                return Err(RateError::Load(format!(
                    "line {line_no}: expected {} fields, found {}",
                    header.len(),
                    fields.len()
                )));
            }

            let raw_rate = fields[rate].trim();
            let exchange_rate = raw_rate
                .parse::<f64>()
                .ok()
                .filter(|r| r.is_finite())
                .ok_or_else(|| RateError::Load(format!("line {line_no}: invalid exchange rate `{raw_rate}`")))?;

            table.insert(ExchangeRate {
                record_date: std::mem::take(&mut fields[record_date]),
                country_currency_description: std::mem::take(&mut fields[description]),
                exchange_rate,
                effective_date: std::mem::take(&mut fields[effective_date]),
                iso_code: std::mem::take(&mut fields[iso_code]),
            });
        }

        Ok(table)
    }

    /// The table compiled into the binary.
    pub fn embedded() -> Result<Self, RateError> {
        Self::parse(EMBEDDED_RATES)
    }

    pub fn load_file(path: &Path) -> Result<Self, RateError> {
        let csv = std::fs::read_to_string(path)
            .map_err(|e| RateError::Load(format!("{}: {e}", path.display())))?;
        Self::parse(&csv)
    }

    /// Rate to multiply an amount in `from` by to obtain `to`.
    pub fn get_rate(&self, from: &str, to: &str) -> Result<f64, RateError> {
        let from_upper = from.to_uppercase();
        let to_upper = to.to_uppercase();

        let from_rate = self
            .rates
            .get(&from_upper)
            .ok_or_else(|| RateError::InvalidSource(from.to_string()))?;
        let to_rate = self
            .rates
            .get(&to_upper)
            .ok_or_else(|| RateError::InvalidTarget(to.to_string()))?;

        if from_upper != BASE_CURRENCY && to_upper != BASE_CURRENCY {
            return Err(RateError::UsdRequired);
        }

        if from_upper == BASE_CURRENCY {
            Ok(to_rate.exchange_rate)
        } else {
            Ok(1.0 / from_rate.exchange_rate)
        }
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, RateError> {
        if amount.is_nan() || amount <= 0.0 {
            return Err(RateError::InvalidAmount);
        }

        let rate = self.get_rate(from, to)?;
        Ok(Conversion {
            rate,
            converted: amount * rate,
        })
    }

    pub fn currencies(&self) -> &[CurrencyInfo] {
        &self.currencies
    }

    pub fn is_valid_currency(&self, code: &str) -> bool {
        self.rates.contains_key(&code.to_uppercase())
    }

    pub fn get(&self, code: &str) -> Option<&ExchangeRate> {
        self.rates.get(&code.to_uppercase())
    }

    /// Number of distinct currencies, USD included.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Split one CSV record, honouring double-quoted fields.
fn split_record(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_RATES: &str = "Record Date,Country - Currency Description,Exchange Rate,Effective Date,ISO code
2025-12-31,Euro Zone-Euro,0.851,2025-12-31,EUR
2025-12-31,Japan-Yen,156.61,2025-12-31,JPY
2025-12-31,United Kingdom-Pound,0.743,2025-12-31,GBP
2025-12-31,Canada-Dollar,1.369,2025-12-31,CAD";

    fn table() -> RateTable {
        RateTable::parse(TEST_RATES).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_parse_builds_map_with_usd() {
        let table = table();
        assert_eq!(table.len(), 5);
        for code in ["USD", "EUR", "JPY", "GBP", "CAD"] {
            assert!(table.is_valid_currency(code), "{code}");
        }

        let usd = table.get("USD").unwrap();
        assert_eq!(usd.exchange_rate, 1.0);
        assert_eq!(usd.country_currency_description, "United States-Dollar");
        assert_eq!(table.get("EUR").unwrap().exchange_rate, 0.851);
        assert_eq!(table.get("JPY").unwrap().exchange_rate, 156.61);
    }

    #[test]
    fn test_currency_list_order() {
        let codes: Vec<_> = table().currencies().iter().map(|c| c.iso_code.clone()).collect();
        assert_eq!(codes, ["USD", "EUR", "JPY", "GBP", "CAD"]);
    }

    #[test]
    fn test_duplicate_rows() {
        let csv = format!("{TEST_RATES}\n2026-01-31,Euro Zone-Euro (revised),0.9,2026-01-31,eur\n");
        let table = RateTable::parse(&csv).unwrap();

        // lookups see the last row, the listing keeps the first
        assert_eq!(table.get_rate("USD", "EUR").unwrap(), 0.9);
        assert_eq!(table.currencies().len(), 5);
        assert_eq!(table.currencies()[1].description, "Euro Zone-Euro");
        assert_eq!(table.currencies()[1].exchange_rate, 0.851);
    }

    #[test]
    fn test_get_rate() {
        let table = table();
        assert_eq!(table.get_rate("USD", "EUR").unwrap(), 0.851);
        assert_eq!(table.get_rate("USD", "JPY").unwrap(), 156.61);
        assert_eq!(table.get_rate("USD", "GBP").unwrap(), 0.743);
        assert_eq!(table.get_rate("USD", "CAD").unwrap(), 1.369);

        assert!(close(table.get_rate("EUR", "USD").unwrap(), 1.0 / 0.851));
        assert!(close(table.get_rate("JPY", "USD").unwrap(), 1.0 / 156.61));
        assert_eq!(table.get_rate("USD", "USD").unwrap(), 1.0);
    }

    #[test]
    fn test_get_rate_is_case_insensitive() {
        let table = table();
        assert_eq!(table.get_rate("usd", "eur").unwrap(), 0.851);
        assert_eq!(table.get_rate("USD", "Eur").unwrap(), 0.851);
        assert!(close(table.get_rate("Eur", "usd").unwrap(), 1.0 / 0.851));
    }

    #[test]
    fn test_get_rate_errors() {
        let table = table();
        let err = table.get_rate("XYZ", "USD").unwrap_err();
        assert_eq!(err.to_string(), "Invalid source currency code: XYZ");

        let err = table.get_rate("USD", "xyz").unwrap_err();
        assert_eq!(err.to_string(), "Invalid target currency code: xyz");

        // both unknown reports the source first
        assert_eq!(table.get_rate("AAA", "BBB").unwrap_err(), RateError::InvalidSource("AAA".into()));

        assert_eq!(table.get_rate("EUR", "JPY").unwrap_err(), RateError::UsdRequired);
        assert!(RateError::UsdRequired
            .to_string()
            .starts_with("Only conversions involving USD are supported"));
    }

    #[test]
    fn test_convert() {
        let table = table();
        let result = table.convert(100.0, "USD", "EUR").unwrap();
        assert_eq!(result.rate, 0.851);
        assert!(close(result.converted, 85.1));

        let result = table.convert(100.0, "EUR", "USD").unwrap();
        assert!(close(result.converted, 100.0 / 0.851));
    }

    #[test]
    fn test_convert_rejects_bad_amounts() {
        let table = table();
        for amount in [0.0, -5.0, f64::NAN] {
            assert_eq!(table.convert(amount, "USD", "EUR").unwrap_err(), RateError::InvalidAmount);
        }
        // amount is checked before the currencies
        assert_eq!(table.convert(0.0, "XYZ", "USD").unwrap_err(), RateError::InvalidAmount);
        assert_eq!(
            table.convert(100.0, "XYZ", "USD").unwrap_err(),
            RateError::InvalidSource("XYZ".into())
        );
    }

    #[test]
    fn test_is_valid_currency() {
        let table = table();
        assert!(table.is_valid_currency("eur"));
        assert!(!table.is_valid_currency("XYZ"));
        assert!(!table.is_valid_currency(""));
        assert!(!table.is_valid_currency("US"));
    }

    #[test]
    fn test_malformed_input_rejected() {
        assert!(matches!(RateTable::parse(""), Err(RateError::Load(_))));

        let missing_column = "Record Date,Exchange Rate,ISO code\n2025-12-31,0.851,EUR";
        assert!(matches!(RateTable::parse(missing_column), Err(RateError::Load(_))));

        let short_row = format!("{TEST_RATES}\n2025-12-31,Broken,1.0");
        let err = RateTable::parse(&short_row).unwrap_err();
        assert!(err.to_string().contains("line 6"), "{err}");

        let bad_rate = format!("{TEST_RATES}\n2025-12-31,Broken,n/a,2025-12-31,BRK");
        assert!(matches!(RateTable::parse(&bad_rate), Err(RateError::Load(_))));
    }

    #[test]
    fn test_quoted_fields_and_blank_lines() {
        let csv = "Record Date,Country - Currency Description,Exchange Rate,Effective Date,ISO code\r\n\
                   \r\n\
                   2025-12-31,\"Korea, South-Won\",1441.5,2025-12-31,KRW\r\n";
        let table = RateTable::parse(csv).unwrap();
        assert_eq!(table.currencies()[1].description, "Korea, South-Won");
        assert_eq!(table.get_rate("USD", "KRW").unwrap(), 1441.5);
    }

    #[test]
    fn test_embedded_table() {
        let table = RateTable::embedded().unwrap();
        assert_eq!(table.currencies()[0].iso_code, "USD");
        assert!(table.len() > 20);
        assert_eq!(table.get_rate("USD", "EUR").unwrap(), 0.851);
    }

    #[test]
    fn test_number_serialization() {
        let info = CurrencyInfo {
            iso_code: "USD".into(),
            description: "United States-Dollar".into(),
            exchange_rate: 1.0,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"isoCode":"USD","description":"United States-Dollar","exchangeRate":1}"#);

        let info = CurrencyInfo {
            exchange_rate: 0.851,
            ..info
        };
        assert!(serde_json::to_string(&info).unwrap().contains(r#""exchangeRate":0.851"#));
    }
}
