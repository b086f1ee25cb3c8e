// USGS instantaneous values, one request per state
//
// Every time series carries a single variable: discharge (00060) or gage
// height (00065). The other column of the row takes the numeric sentinel.

use super::require_areas;
use crate::config::SourceConfig;
use crate::error::ConfigError;
use crate::extract::FeatureExtractor;
use crate::fetch::RequestSpec;
use crate::normalize::{ColumnSpec, FieldRule, TableSchema};
use crate::pipeline::SourceDescriptor;
use crate::record::RunMetadata;

pub const TABLE: &str = "RealTime_USGSStreamGages";

/// Recomputes `Status` from the fresh readings
pub const STATUS_PROCEDURE: &str = r#"CALL "RealTime_UpdateUSGSStreamGagesStatus"()"#;

const DEFAULT_URL: &str = "http://waterservices.usgs.gov/nwis/iv/";
const STATES: [&str; 8] = ["md", "dc", "de", "pa", "wv", "va", "nc", "sc"];

const DISCHARGE: &str = "00060";
const GAGE_HEIGHT: &str = "00065";

fn requests(source: &SourceConfig, _run: &RunMetadata) -> Result<Vec<RequestSpec>, ConfigError> {
    let endpoint = source.endpoint()?;
    let headers = source.parsed_headers()?;

    Ok(require_areas(source, "usgs-stream-gauges")?
        .iter()
        .map(|state| {
            RequestSpec::get(endpoint.clone())
                .param("format", "json")
                .param("stateCd", state.trim())
                .param("parameterCd", format!("{},{}", DISCHARGE, GAGE_HEIGHT))
                .param("siteStatus", "active")
                .headers(headers.clone())
        })
        .collect())
}

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new("value.timeSeries")
        .field("siteCode", "sourceInfo.siteCode[0].value")
        .field("siteName", "sourceInfo.siteName")
        .field("variableCode", "variable.variableCode[0].value")
        .field("reading", "values[0].value[0].value")
        .field("collectedDate", "values[0].value[0].dateTime")
        .document_field("dataGenerated", "value.queryInfo.note[3].value")
        .key_field("siteCode")
}

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE)
        .column(ColumnSpec::new("SiteNumber", FieldRule::text("siteCode")))
        .column(ColumnSpec::new(
            "Discharge",
            FieldRule::guarded_number("reading", "variableCode", GAGE_HEIGHT),
        ))
        .column(ColumnSpec::new(
            "GageHeight",
            FieldRule::guarded_number("reading", "variableCode", DISCHARGE),
        ))
        .column(ColumnSpec::new("Status", FieldRule::Null))
        .column(ColumnSpec::new("collectedDate", FieldRule::datetime("collectedDate")))
        .column(ColumnSpec::new("DataGenerated", FieldRule::datetime("dataGenerated")))
}

pub fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new("usgs-stream-gauges", extractor(), schema(), requests)
        .tracking_name("USGSStreamGages")
        .generated_from("dataGenerated")
        .post_commit(STATUS_PROCEDURE)
        .default_url(DEFAULT_URL)
        .default_areas(None, &STATES)
}
