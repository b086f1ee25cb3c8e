// WebEOC shelter board
//
// A SOAP call whose `GetDataResult` element holds an escaped XML document of
// `record` elements; every column lives in a record attribute. Text in this
// table has apostrophes replaced by underscores, and oversized values are
// truncated rather than failing the run.

use super::post_body;
use crate::extract::{FeedExtractor, FeedField};
use crate::normalize::{ColumnSpec, FieldRule, TableSchema};
use crate::pipeline::SourceDescriptor;
use crate::writer::OversizePolicy;
use dashfeed_common::sql::QuotePolicy;

pub const TABLE: &str = "RealTime_WebEOCShelters";

pub const MISSING_USER: &str = "User Account No Longer Exists";

const NAME_LEN: usize = 255;
const NOTE_LEN: usize = 100;

/// (attribute, column, max length) of the plain text columns, in table order
const TEXT_COLUMNS: &[(&str, &str, usize)] = &[
    ("shelterTier", "ShelterTier", NOTE_LEN),
    ("shelterType", "ShelterType", NOTE_LEN),
    ("name", "ShelterName", NAME_LEN),
    ("address", "ShelterAddress", NAME_LEN),
    ("ownertitle", "OwnerTitle", NOTE_LEN),
    ("ownercontact", "OwnerContact", NOTE_LEN),
    ("ownercontactnumber", "OwnerContactNumber", NOTE_LEN),
    ("fac_contact_title", "FacContactTitle", NOTE_LEN),
    ("fac_contactname", "FacContactName", NOTE_LEN),
    ("fac_contactnumber", "FacContactNumber", NOTE_LEN),
    ("county", "County", NOTE_LEN),
    ("status", "ShelterStatus", NOTE_LEN),
    ("eva_capacity", "Capacity", NOTE_LEN),
    ("eva_occupancy", "Occupancy", NOTE_LEN),
    ("arc", "Arc", NOTE_LEN),
    ("specialneeds", "SpecialNeeds", NOTE_LEN),
    ("petfriendly", "PetFriendly", NOTE_LEN),
    ("Generator", "Generator", NOTE_LEN),
    ("fuel_source", "FuelSource", NOTE_LEN),
    ("exoticpet", "ExoticPet", NOTE_LEN),
    ("indoorhouse", "IndoorHouse", NOTE_LEN),
];

fn extractor() -> FeedExtractor {
    FeedExtractor::new("record")
        .envelope(&["Body", "GetDataResponse", "GetDataResult"])
        .field(FeedField::AllAttributes)
}

pub fn schema() -> TableSchema {
    let head = TableSchema::new(TABLE)
        .quote_policy(QuotePolicy::Underscore)
        .oversize(OversizePolicy::Truncate)
        .column(ColumnSpec::new("TableName", FieldRule::text("tablename")).max_len(NOTE_LEN))
        .column(ColumnSpec::new("DataID", FieldRule::integer("dataid")))
        .column(
            ColumnSpec::new("UserName", FieldRule::text_blank_as("username", MISSING_USER))
                .max_len(NOTE_LEN),
        )
        .column(ColumnSpec::new("PositionName", FieldRule::text("positionname")).max_len(NOTE_LEN))
        .column(ColumnSpec::new("EntryDate", FieldRule::datetime("entrydate")));

    TEXT_COLUMNS
        .iter()
        .fold(head, |schema, (attribute, column, max_len)| {
            schema.column(ColumnSpec::new(*column, FieldRule::text(*attribute)).max_len(*max_len))
        })
        .column(ColumnSpec::new("Geometry", FieldRule::polygon_pairs("theGeometry")))
        .column(ColumnSpec::new("DataGenerated", FieldRule::RunTimestamp))
        .column(ColumnSpec::new("remove", FieldRule::text("remove")).max_len(NOTE_LEN))
}

pub fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new("webeoc-shelters", extractor(), schema(), post_body)
        .tracking_name("WebEOCShelters")
}
