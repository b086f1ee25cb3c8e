//! Dashfeed Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the dashfeed ingestion tasks.
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **SQL literals**: identifier quoting, apostrophe policies and the
//!   timestamp format every destination table expects
//!
//! # Example
//!
//! ```no_run
//! use dashfeed_common::sql::{quote_identifier, text_literal, QuotePolicy};
//!
//! let table = quote_identifier("RealTime_HospitalStatus").unwrap();
//! let name = text_literal(&QuotePolicy::Double.sanitize("St. Mary's"));
//! assert_eq!(table, "\"RealTime_HospitalStatus\"");
//! assert_eq!(name, "'St. Mary''s'");
//! ```

pub mod error;
pub mod logging;
pub mod sql;

pub use error::{CommonError, Result};
