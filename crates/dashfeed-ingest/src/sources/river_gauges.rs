// NOAA AHPS observed river gauges (ArcGIS feature query)

use crate::config::SourceConfig;
use crate::error::ConfigError;
use crate::extract::FeatureExtractor;
use crate::fetch::RequestSpec;
use crate::normalize::{ColumnSpec, FieldRule, TableSchema};
use crate::pipeline::SourceDescriptor;
use crate::record::RunMetadata;

pub const TABLE: &str = "RealTime_NOAAObservedRiverGauges";

const DEFAULT_URL: &str =
    "https://idpgis.ncep.noaa.gov/arcgis/rest/services/NWS_Observations/ahps_riv_gauges/MapServer/0/query";
const DEFAULT_STATE: &str = "MD";
const OUT_FIELDS: &str = "gaugelid,state,location,observed,obstime,status,flood,moderate,major";

fn requests(source: &SourceConfig, _run: &RunMetadata) -> Result<Vec<RequestSpec>, ConfigError> {
    let state = source
        .areas
        .first()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STATE);

    Ok(vec![RequestSpec::get(source.endpoint()?)
        .param("where", format!("state = '{}'", state))
        .param("outFields", OUT_FIELDS)
        .param("returnGeometry", "true")
        .param("outSR", "4326")
        .param("f", "pjson")
        .headers(source.parsed_headers()?)])
}

fn extractor() -> FeatureExtractor {
    FeatureExtractor::new("features")
        .field("gaugelid", "attributes.gaugelid")
        .field("location", "attributes.location")
        .field("status", "attributes.status")
        .field("observed", "attributes.observed")
        .field("flood", "attributes.flood")
        .field("moderate", "attributes.moderate")
        .field("major", "attributes.major")
        .field("obstime", "attributes.obstime")
        .field("x", "geometry.x")
        .field("y", "geometry.y")
        .key_field("gaugelid")
}

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE)
        .column(ColumnSpec::new("GaugeLID", FieldRule::text("gaugelid")))
        .column(ColumnSpec::new("Location", FieldRule::text("location")))
        .column(ColumnSpec::new("Status", FieldRule::text("status")))
        .column(ColumnSpec::new("Observed", FieldRule::number("observed")))
        .column(ColumnSpec::new("FloodStage", FieldRule::number("flood")))
        .column(ColumnSpec::new("ModerateStage", FieldRule::number("moderate")))
        .column(ColumnSpec::new("MajorStage", FieldRule::number("major")))
        .column(ColumnSpec::new("Geometry", FieldRule::point("x", "y")))
        .column(ColumnSpec::new("DataGenerated", FieldRule::datetime("obstime")))
}

pub fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new("river-gauges", extractor(), schema(), requests)
        .tracking_name("NOAAObservedRiverGauges")
        .generated_from("obstime")
        .default_url(DEFAULT_URL)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extract::RecordExtractor;
    use crate::normalize::normalize_batch;
    use crate::record::SqlValue;

    const RESPONSE: &str = r#"{
      "features": [
        {
          "attributes": {
            "gaugelid": "PTXM2", "state": "MD", "location": "Potomac River at Point of Rocks",
            "observed": "4.31", "obstime": "2024-03-05 18:45:00", "status": "no_flooding",
            "flood": "16", "moderate": "24", "major": "30"
          },
          "geometry": {"x": -77.5433, "y": 39.2739}
        },
        {
          "attributes": {
            "gaugelid": "HNKM2", "location": "Hancock", "observed": "", "obstime": "N/A",
            "status": "obs_not_current", "flood": "30", "moderate": null, "major": "40"
          }
        }
      ]
    }"#;

    #[test]
    fn test_request_parameters() {
        let descriptor = descriptor();
        let run = RunMetadata::start("river-gauges");
        let requests = (descriptor.requests)(&descriptor.defaults.source, &run).unwrap();

        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .params
            .contains(&("where".to_string(), "state = 'MD'".to_string())));
        assert!(requests[0].params.contains(&("outSR".to_string(), "4326".to_string())));
    }

    #[test]
    fn test_gauge_rows() {
        let descriptor = descriptor();
        let records = descriptor.extractor.extract(RESPONSE).unwrap();
        let run = RunMetadata::start("river-gauges");
        let batch = normalize_batch(&records, &descriptor.schema, &run);

        let row = &batch.records[0];
        assert_eq!(row.get("GaugeLID").unwrap().to_sql(), "'PTXM2'");
        assert_eq!(row.get("Observed"), Some(&SqlValue::Number(4.31)));
        assert_eq!(row.get("MajorStage").unwrap().to_sql(), "30");
        assert_eq!(
            row.get("Geometry").unwrap().to_sql(),
            "ST_GeomFromText('POINT(-77.5433 39.2739)', 4326)"
        );
        assert_eq!(row.get("DataGenerated").unwrap().to_sql(), "'2024-03-05 18:45:00'");

        let stale = &batch.records[1];
        assert_eq!(stale.get("Observed"), Some(&SqlValue::Number(-9999.0)));
        assert_eq!(stale.get("ModerateStage"), Some(&SqlValue::Number(-9999.0)));
        assert_eq!(stale.get("Geometry"), Some(&SqlValue::Null));
        assert_eq!(stale.get("DataGenerated").unwrap().to_sql(), "'1970-01-01 00:00:00'");
    }
}
