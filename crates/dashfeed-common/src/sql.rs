//! SQL literal helpers
//!
//! The writers build plain SQL text (one `DELETE`, chunked multi-row `INSERT`s
//! and a tracking `UPDATE`), so every value has to be rendered as a literal.
//! These helpers keep that rendering in one place.

use crate::error::{CommonError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format every timestamp column is written with
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Written in place of a missing or unparsable timestamp
pub const EPOCH_SENTINEL: &str = "1970-01-01 00:00:00";

/// Written in place of a missing or unparsable number
pub const NUMERIC_SENTINEL: f64 = -9999.0;

/// How apostrophes inside text values are made safe for a single-quoted literal
///
/// Each destination table uses exactly one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuotePolicy {
    /// `'` becomes `''`
    #[default]
    Double,
    /// `'` becomes `_`
    Underscore,
}

impl QuotePolicy {
    /// The value as it will be stored: doubled apostrophes survive as a
    /// single `'`, underscored ones do not.
    pub fn sanitize(self, value: &str) -> String {
        match self {
            QuotePolicy::Double => value.to_string(),
            QuotePolicy::Underscore => value.replace('\'', "_"),
        }
    }
}

/// Quote a table or column name as a Postgres identifier
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() || name.chars().any(|c| c.is_control() || c == '"') {
        return Err(CommonError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

/// Render an already-sanitized value as a single-quoted literal
///
/// Any apostrophe left in `value` is doubled so the statement stays well formed.
pub fn text_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a timestamp in [`DB_TIMESTAMP_FORMAT`]
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Render a float without a trailing `.0` for whole values
pub fn number_literal(value: f64) -> String {
    if !value.is_finite() {
        return number_literal(NUMERIC_SENTINEL);
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
