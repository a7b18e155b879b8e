//! API handlers.
//!
//! # Routes
//! - `GET /` greeting
//! - `GET /hello` greeting
//! - `GET /health` liveness
//! - `GET /convert?amount=&from=&to=` conversion to or from USD
//! - `GET /currencies` supported currencies
//!
//! `OPTIONS` on any path answers a CORS preflight; every other method other
//! than `GET` is rejected by [`method_guard`] before routing.

use std::sync::Arc;

use axum::extract::{RawQuery, Request, State};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;

use crate::http::response::{error_response, iso_timestamp, json_response, preflight};
use crate::rates::{serialize_number, CurrencyInfo, RateError, RateService};

pub const SERVICE_NAME: &str = "currency-converter-api";

const INVALID_PARAMS: &str = "Missing or invalid parameters. Required: amount (positive number), from (3-letter ISO code), to (3-letter ISO code)";

/// State shared by the API handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub rates: Arc<RateService>,
}

#[derive(Serialize)]
struct Greeting {
    message: &'static str,
    timestamp: String,
    path: &'static str,
    method: &'static str,
}

#[derive(Serialize)]
struct HelloBody {
    message: &'static str,
    endpoint: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: String,
    service: &'static str,
}

#[derive(Serialize)]
struct ConversionBody {
    #[serde(serialize_with = "serialize_number")]
    amount: f64,
    from: String,
    to: String,
    #[serde(serialize_with = "serialize_number")]
    rate: f64,
    #[serde(serialize_with = "serialize_number")]
    converted: f64,
    timestamp: String,
}

#[derive(Serialize)]
struct CurrencyList {
    currencies: Vec<CurrencyInfo>,
    count: usize,
    timestamp: String,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    error: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct NotFoundBody<'a> {
    error: &'a str,
    message: &'a str,
    path: &'a str,
}

/// Validated `/convert` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionParams {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

impl ConversionParams {
    /// Extract parameters from a raw query string.
    ///
    /// The first occurrence of each key wins. `amount` accepts a leading
    /// numeric prefix (`"10abc"` is 10); currency codes must be exactly
    /// three characters.
    pub fn from_query(query: Option<&str>) -> Option<Self> {
        let query = query.unwrap_or_default();
        let param = |key: &str| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };

        let amount = parse_float_prefix(&param("amount")?);
        let from = param("from")?;
        let to = param("to")?;

        if amount.is_nan() || amount <= 0.0 {
            return None;
        }
        if from.encode_utf16().count() != 3 || to.encode_utf16().count() != 3 {
            return None;
        }

        Some(Self { amount, from, to })
    }
}

/// Parse the longest leading decimal number, `NaN` if there is none.
pub fn parse_float_prefix(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let digits_in = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let integer = digits_in(end);
    end += integer;
    let mut digits = integer;

    if bytes.get(end) == Some(&b'.') {
        let fraction = digits_in(end + 1);
        if integer + fraction > 0 {
            end += 1 + fraction;
            digits += fraction;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_in(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// Answer preflights and reject everything but `GET`.
pub async fn method_guard(request: Request, next: Next) -> Response {
    match *request.method() {
        Method::GET => next.run(request).await,
        Method::OPTIONS => preflight(),
        _ => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &MessageBody {
                error: "Method Not Allowed",
                message: "Only GET requests are supported",
            },
        ),
    }
}

pub async fn root() -> Response {
    json_response(
        StatusCode::OK,
        &Greeting {
            message: "Hello World!",
            timestamp: iso_timestamp(),
            path: "/",
            method: "GET",
        },
    )
}

pub async fn hello() -> Response {
    json_response(
        StatusCode::OK,
        &HelloBody {
            message: "Hello from the API!",
            endpoint: "/hello",
            timestamp: iso_timestamp(),
        },
    )
}

pub async fn health() -> Response {
    json_response(
        StatusCode::OK,
        &HealthBody {
            status: "OK",
            timestamp: iso_timestamp(),
            service: SERVICE_NAME,
        },
    )
}

pub async fn convert(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let Some(params) = ConversionParams::from_query(query.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request", INVALID_PARAMS);
    };

    match state.rates.convert(params.amount, &params.from, &params.to) {
        Ok(conversion) => json_response(
            StatusCode::OK,
            &ConversionBody {
                amount: params.amount,
                from: params.from.to_uppercase(),
                to: params.to.to_uppercase(),
                rate: conversion.rate,
                converted: conversion.converted,
                timestamp: iso_timestamp(),
            },
        ),
        Err(e) => conversion_error(&e),
    }
}

fn conversion_error(error: &RateError) -> Response {
    let message = error.to_string();
    match error {
        RateError::InvalidSource(_) | RateError::InvalidTarget(_) => {
            error_response(StatusCode::NOT_FOUND, "Currency not found", &message)
        }
        RateError::UsdRequired | RateError::InvalidAmount => {
            error_response(StatusCode::BAD_REQUEST, "Invalid request", &message)
        }
        RateError::Load(_) => {
            tracing::error!(error = %error, "Conversion failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "Failed to perform conversion",
            )
        }
    }
}

pub async fn currencies(State(state): State<AppState>) -> Response {
    match state.rates.list_currencies() {
        Ok(currencies) => json_response(
            StatusCode::OK,
            &CurrencyList {
                count: currencies.len(),
                currencies,
                timestamp: iso_timestamp(),
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list currencies");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "Failed to load currency list",
            )
        }
    }
}

pub async fn not_found(uri: Uri) -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        &NotFoundBody {
            error: "Not Found",
            message: "Route not found",
            path: uri.path(),
        },
    )
}
