// NOAA CAP alert feeds, one Atom feed per county
//
// Counties are configured as FIPS codes; the feed is addressed by the area
// prefix plus the last three FIPS digits (24031 -> MDC031).

use super::require_areas;
use crate::config::SourceConfig;
use crate::error::ConfigError;
use crate::extract::{FeedExtractor, FeedField};
use crate::fetch::RequestSpec;
use crate::normalize::{ColumnSpec, FieldRule, TableSchema};
use crate::pipeline::SourceDescriptor;
use crate::record::RunMetadata;

pub const TABLE: &str = "RealTime_NOAACapAlerts";

pub const NO_ALERTS_TITLE: &str = "There are no active watches, warnings or advisories";

const DEFAULT_URL: &str = "http://alerts.weather.gov/cap/wwaatmget.php";
const DEFAULT_PREFIX: &str = "MDC";
const MARYLAND_FIPS: [&str; 24] = [
    "24001", "24003", "24005", "24510", "24009", "24011", "24013", "24015", "24017", "24019",
    "24021", "24023", "24025", "24027", "24029", "24031", "24033", "24035", "24037", "24039",
    "24041", "24043", "24045", "24047",
];

const FEED_UPDATED: &str = "feedUpdated";

/// Zone code for a FIPS code: prefix plus its last three digits
pub fn area_code(prefix: &str, fips: &str) -> Result<String, ConfigError> {
    let fips = fips.trim();
    if fips.len() < 3 || !fips.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::Invalid(format!(
            "'{}' is not a FIPS code",
            fips
        )));
    }
    Ok(format!("{}{}", prefix, &fips[fips.len() - 3..]))
}

fn requests(source: &SourceConfig, _run: &RunMetadata) -> Result<Vec<RequestSpec>, ConfigError> {
    let endpoint = source.endpoint()?;
    let prefix = source.area_prefix.as_deref().unwrap_or(DEFAULT_PREFIX);
    let headers = source.parsed_headers()?;

    require_areas(source, "cap-alerts")?
        .iter()
        .map(|fips| {
            Ok(RequestSpec::get(endpoint.clone())
                .param("x", area_code(prefix, fips)?)
                .param("y", "0")
                .headers(headers.clone())
                .context("FIPS", fips.trim()))
        })
        .collect()
}

fn extractor() -> FeedExtractor {
    [
        FeedField::text("title"),
        FeedField::child_attribute("link", "link", "href"),
        FeedField::text("published"),
        FeedField::text("updated"),
        FeedField::text("summary"),
        FeedField::text("event"),
        FeedField::text("effective"),
        FeedField::text("expires"),
        FeedField::text("status"),
        FeedField::text("msgType"),
        FeedField::text("urgency"),
        FeedField::text("severity"),
        FeedField::text("certainty"),
        FeedField::text("areaDesc"),
        FeedField::text("polygon"),
    ]
    .into_iter()
    .fold(FeedExtractor::new("entry"), FeedExtractor::field)
    .document_field(FEED_UPDATED, &["updated"])
    .sentinel("title", NO_ALERTS_TITLE)
}

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE)
        .column(ColumnSpec::new("FIPS", FieldRule::text("FIPS")))
        .column(ColumnSpec::new("Title", FieldRule::text("title")))
        .column(ColumnSpec::new("Link", FieldRule::text("link")))
        .column(ColumnSpec::new("Published", FieldRule::datetime("published")))
        .column(ColumnSpec::new("Updated", FieldRule::datetime("updated")))
        .column(ColumnSpec::new("Summary", FieldRule::text("summary")))
        .column(ColumnSpec::new("Event", FieldRule::text("event")))
        .column(ColumnSpec::new("Effective", FieldRule::datetime("effective")))
        .column(ColumnSpec::new("Expires", FieldRule::datetime("expires")))
        .column(ColumnSpec::new("Status", FieldRule::text("status")))
        .column(ColumnSpec::new("MsgType", FieldRule::text("msgType")))
        .column(ColumnSpec::new("Urgency", FieldRule::text("urgency")))
        .column(ColumnSpec::new("Severity", FieldRule::text("severity")))
        .column(ColumnSpec::new("Certainty", FieldRule::text("certainty")))
        .column(ColumnSpec::new("AreaDesc", FieldRule::text("areaDesc")))
        .column(ColumnSpec::new("Polygon", FieldRule::polygon_pairs("polygon")))
        .column(ColumnSpec::new("DataGenerated", FieldRule::datetime(FEED_UPDATED)))
}

pub fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new("cap-alerts", extractor(), schema(), requests)
        .tracking_name("NOAACapAlerts")
        .generated_from(FEED_UPDATED)
        .default_url(DEFAULT_URL)
        .default_areas(Some(DEFAULT_PREFIX), &MARYLAND_FIPS)
        .retry(3, 5)
}
