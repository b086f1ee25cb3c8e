//! Dashfeed Ingest Library
//!
//! Scheduled ingestion tasks for the emergency-management dashboard. Every
//! task runs the same pipeline once:
//!
//! fetch (with retry) -> extract -> normalize -> replace the destination table
//!
//! # Supported Sources
//!
//! - **Hospital status**: county hospital alert pages (HTML table)
//! - **CAP alerts**: NOAA Atom alert feeds per county
//! - **USGS stream gauges**: instantaneous values JSON per state
//! - **RITIS bottlenecks**: partner traffic bottleneck features
//! - **WebEOC shelters**: partner SOAP shelter board
//! - **River gauges**: NOAA AHPS observed river gauges
//!
//! # Example
//!
//! ```no_run
//! use dashfeed_ingest::config::TaskConfig;
//! use dashfeed_ingest::pipeline::Pipeline;
//! use dashfeed_ingest::sources::Task;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let descriptor = Task::CapAlerts.descriptor();
//!     let config = TaskConfig::load(descriptor.name, None, descriptor.defaults.clone())?;
//!     let report = Pipeline::new(descriptor, config)?.run().await?;
//!     println!("{} rows written to {}", report.rows_written, report.table);
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod retry;
pub mod sink;
pub mod sources;
pub mod writer;

pub use error::{IngestError, Result};
pub use pipeline::{Pipeline, RunReport, SourceDescriptor};
