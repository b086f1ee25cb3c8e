// County hospital status pages
//
// Each configured page holds a `tblHospitals` table whose alert columns carry a
// time when the alert is active, and a `lblTime` label with the page's
// generation time. The table intermittently comes back empty, hence the retry.

use super::get_each_endpoint;
use crate::extract::TableExtractor;
use crate::normalize::{ColumnSpec, FieldRule, StatusPolicy, TableSchema};
use crate::pipeline::SourceDescriptor;

pub const TABLE: &str = "RealTime_HospitalStatus";

const GENERATED_LABEL: &str = "lblTime";

/// Derived hospital status; earlier levels take precedence
pub fn status_policy() -> StatusPolicy {
    StatusPolicy::new("normal")
        .level("red", &["Red Alert"])
        .level("yellow", &["Yellow Alert", "ReRoute"])
        .level("t_bypass", &["Trauma ByPass"])
        .level("mini", &["Mini Disaster"])
}

pub fn schema() -> TableSchema {
    TableSchema::new(TABLE)
        .column(ColumnSpec::new("Linkname", FieldRule::text("Hospital")))
        .column(ColumnSpec::new("Status", FieldRule::Status(status_policy())))
        .column(ColumnSpec::new("Yellow", FieldRule::text("Yellow Alert")))
        .column(ColumnSpec::new("Red", FieldRule::text("Red Alert")))
        .column(ColumnSpec::new("Mini", FieldRule::text("Mini Disaster")))
        .column(ColumnSpec::new("ReRoute", FieldRule::text("ReRoute")))
        .column(ColumnSpec::new("t_bypass", FieldRule::text("Trauma ByPass")))
        .column(ColumnSpec::new("DataGenerated", FieldRule::RunTimestamp))
}

pub fn descriptor() -> SourceDescriptor {
    let extractor = TableExtractor::new("tblHospitals").with_label(GENERATED_LABEL, GENERATED_LABEL);

    SourceDescriptor::new("hospital-status", extractor, schema(), get_each_endpoint)
        .tracking_name("HospitalStatus")
        .generated_from(GENERATED_LABEL)
        .retry(4, 10)
}
