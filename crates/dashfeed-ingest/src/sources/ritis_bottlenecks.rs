// RITIS bottleneck features from the partner API
//
// The endpoint, POST body and headers all come from configuration. An empty
// feature list is a normal answer (no congestion) and clears the table.

use super::post_body;
use crate::extract::FeatureExtractor;
use crate::normalize::{ColumnSpec, FieldRule, TableSchema};
use crate::pipeline::SourceDescriptor;
use crate::record::SqlValue;

pub const TABLE: &str = "RealTime_RITISBottleNecks";

/// Maryland's state FIPS code; the feed is filtered to Maryland upstream
const STATE_ID: i64 = 24;

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new("features")
        .field("id", "id")
        .field("geometryType", "geometry.type")
        .field("coordinates", "geometry.coordinates")
        .field("length", "properties[0].length")
        .field("startTimestamp", "properties[0].startTimestamp")
        .field("closedTimestamp", "properties[0].closedTimestamp")
        .field("description", "properties[0].location.description")
        .field("city", "properties[0].location.city")
        .field("zipcode", "properties[0].location.zipcode")
        .field("countyFips", "properties[0].location.county[0].fips")
        .document_field("timestamp", "header.timestamp")
        .key_field("id")
        .allow_empty()
}

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE)
        .column(ColumnSpec::new("ID", FieldRule::text("id")))
        .column(ColumnSpec::new("starttime", FieldRule::datetime("startTimestamp")))
        .column(ColumnSpec::new("closedtime", FieldRule::datetime("closedTimestamp")))
        .column(ColumnSpec::new("length", FieldRule::number("length")))
        .column(ColumnSpec::new("description", FieldRule::text("description")))
        .column(ColumnSpec::new("city", FieldRule::text("city")))
        .column(ColumnSpec::new("zipcode", FieldRule::text("zipcode")))
        .column(ColumnSpec::new(
            "stateID",
            FieldRule::Constant(SqlValue::Integer(STATE_ID)),
        ))
        .column(ColumnSpec::new("countyID", FieldRule::text("countyFips")))
        .column(ColumnSpec::new(
            "geometry",
            FieldRule::coordinates("geometryType", "coordinates"),
        ))
        .column(ColumnSpec::new("DataGenerated", FieldRule::datetime("timestamp")))
}

pub fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new("ritis-bottlenecks", extractor(), schema(), post_body)
        .tracking_name("RITISBottleNecks")
        .generated_from("timestamp")
}
