// Record normalization
//
// Maps a RawRecord onto a destination schema. Every column is always
// produced; values that are missing or unusable take the column's sentinel
// (epoch for timestamps, -9999 for numbers, NULL for text and geometry).

pub mod datetime;
pub mod geometry;
pub mod status;

pub use datetime::{normalize_date, parse_datetime};
pub use status::StatusPolicy;

use crate::record::{Batch, NormalizedRecord, RawRecord, RawValue, RunMetadata, SqlText, SqlValue};
use crate::writer::OversizePolicy;
use dashfeed_common::sql::{QuotePolicy, NUMERIC_SENTINEL};
use tracing::{debug, warn};

/// How one destination column is produced from a raw record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    /// Trimmed text; blank becomes `when_blank` when set, missing is always NULL
    Text {
        field: String,
        when_blank: Option<String>,
    },
    /// Permissive timestamp; epoch when missing or unparsable
    DateTime { field: String },
    /// Float; -9999 when missing or unparsable
    Number { field: String },
    /// Whole number; -9999 when missing, unparsable or fractional
    Integer { field: String },
    /// Number that is only meaningful when `code_field` is not `excluded_code`
    GuardedNumber {
        field: String,
        code_field: String,
        excluded_code: String,
    },
    /// `"lat,lon lat,lon"` text into a swapped-pair polygon
    PolygonPairs { field: String },
    /// Geometry type plus coordinate array
    Coordinates {
        type_field: String,
        coordinates_field: String,
    },
    /// x/y fields into a point
    Point { x_field: String, y_field: String },
    /// First status level with a present field
    Status(StatusPolicy),
    /// The run's start time
    RunTimestamp,
    Constant(SqlValue),
    Null,
}

impl FieldRule {
    pub fn text(field: impl Into<String>) -> Self {
        FieldRule::Text {
            field: field.into(),
            when_blank: None,
        }
    }

    /// Text whose present-but-blank values are replaced by `replacement`
    pub fn text_blank_as(field: impl Into<String>, replacement: impl Into<String>) -> Self {
        FieldRule::Text {
            field: field.into(),
            when_blank: Some(replacement.into()),
        }
    }

    pub fn datetime(field: impl Into<String>) -> Self {
        FieldRule::DateTime {
            field: field.into(),
        }
    }

    pub fn number(field: impl Into<String>) -> Self {
        FieldRule::Number {
            field: field.into(),
        }
    }

    pub fn integer(field: impl Into<String>) -> Self {
        FieldRule::Integer {
            field: field.into(),
        }
    }

    pub fn guarded_number(
        field: impl Into<String>,
        code_field: impl Into<String>,
        excluded_code: impl Into<String>,
    ) -> Self {
        FieldRule::GuardedNumber {
            field: field.into(),
            code_field: code_field.into(),
            excluded_code: excluded_code.into(),
        }
    }

    pub fn polygon_pairs(field: impl Into<String>) -> Self {
        FieldRule::PolygonPairs {
            field: field.into(),
        }
    }

    pub fn coordinates(type_field: impl Into<String>, coordinates_field: impl Into<String>) -> Self {
        FieldRule::Coordinates {
            type_field: type_field.into(),
            coordinates_field: coordinates_field.into(),
        }
    }

    pub fn point(x_field: impl Into<String>, y_field: impl Into<String>) -> Self {
        FieldRule::Point {
            x_field: x_field.into(),
            y_field: y_field.into(),
        }
    }

    fn apply(
        &self,
        record: &RawRecord,
        policy: QuotePolicy,
        run: &RunMetadata,
        notes: &mut Vec<String>,
    ) -> SqlValue {
        match self {
            FieldRule::Text { field, when_blank } => match record.field(field).as_text() {
                Some(text) if !text.is_empty() => SqlValue::Text(SqlText::new(&text, policy)),
                Some(_) => when_blank
                    .as_deref()
                    .map(|r| SqlValue::Text(SqlText::new(r, policy)))
                    .unwrap_or(SqlValue::Null),
                None => SqlValue::Null,
            },
            FieldRule::DateTime { field } => {
                let raw = record.field(field);
                let parsed = datetime::parse_raw(raw);
                if parsed.is_none() && raw.is_present() {
                    notes.push(format!("unparsable date in '{}': {:?}", field, raw));
                }
                SqlValue::Timestamp(parsed.unwrap_or_else(datetime::epoch))
            },
            FieldRule::Number { field } => {
                SqlValue::Number(number_or_sentinel(record.field(field), field, notes))
            },
            FieldRule::Integer { field } => {
                let raw = record.field(field);
                match raw.as_number() {
                    Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                        SqlValue::Integer(n as i64)
                    },
                    _ => {
                        if raw.is_present() {
                            notes.push(format!("non-integer value in '{}': {:?}", field, raw));
                        }
                        SqlValue::Integer(NUMERIC_SENTINEL as i64)
                    },
                }
            },
            FieldRule::GuardedNumber {
                field,
                code_field,
                excluded_code,
            } => {
                let code = record.field(code_field).as_text();
                if code.as_deref() == Some(excluded_code.as_str()) {
                    SqlValue::Number(NUMERIC_SENTINEL)
                } else {
                    SqlValue::Number(number_or_sentinel(record.field(field), field, notes))
                }
            },
            FieldRule::PolygonPairs { field } => {
                let raw = record.field(field);
                let geometry = raw.as_text().and_then(|t| geometry::polygon_from_pairs(&t));
                geometry_or_null(geometry, raw.is_present(), field, notes)
            },
            FieldRule::Coordinates {
                type_field,
                coordinates_field,
            } => {
                let coordinates = record.field(coordinates_field);
                let geometry = record
                    .field(type_field)
                    .as_text()
                    .and_then(|kind| geometry::from_coordinates(&kind, coordinates));
                geometry_or_null(geometry, coordinates.is_present(), coordinates_field, notes)
            },
            FieldRule::Point { x_field, y_field } => {
                let (x, y) = (record.field(x_field), record.field(y_field));
                let geometry = geometry::point(x, y);
                geometry_or_null(geometry, x.is_present() || y.is_present(), x_field, notes)
            },
            FieldRule::Status(status) => {
                SqlValue::Text(SqlText::new(status.evaluate(record), policy))
            },
            FieldRule::RunTimestamp => SqlValue::Timestamp(run.started_at),
            FieldRule::Constant(value) => value.clone(),
            FieldRule::Null => SqlValue::Null,
        }
    }
}

fn number_or_sentinel(raw: &RawValue, field: &str, notes: &mut Vec<String>) -> f64 {
    match raw.as_number() {
        Some(n) => n,
        None => {
            if raw.is_present() {
                notes.push(format!("non-numeric value in '{}': {:?}", field, raw));
            }
            NUMERIC_SENTINEL
        },
    }
}

fn geometry_or_null(
    geometry: Option<String>,
    present: bool,
    field: &str,
    notes: &mut Vec<String>,
) -> SqlValue {
    match geometry {
        Some(expr) => SqlValue::Geometry(expr),
        None => {
            if present {
                notes.push(format!("unusable geometry in '{}'", field));
            }
            SqlValue::Null
        },
    }
}

/// One destination column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub column: String,
    pub rule: FieldRule,
    /// Maximum stored length for text values
    pub max_len: Option<usize>,
}

impl ColumnSpec {
    pub fn new(column: impl Into<String>, rule: FieldRule) -> Self {
        Self {
            column: column.into(),
            rule,
            max_len: None,
        }
    }

    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

/// Destination table layout and its per-table policies
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub quote_policy: QuotePolicy,
    pub oversize: OversizePolicy,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            quote_policy: QuotePolicy::Double,
            oversize: OversizePolicy::Fail,
        }
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }

    pub fn oversize(mut self, policy: OversizePolicy) -> Self {
        self.oversize = policy;
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.column.clone()).collect()
    }
}

fn normalize_with_notes(
    record: &RawRecord,
    schema: &TableSchema,
    run: &RunMetadata,
) -> (NormalizedRecord, Vec<String>) {
    let mut notes = Vec::new();
    let mut normalized = NormalizedRecord::new();
    for spec in &schema.columns {
        let value = spec.rule.apply(record, schema.quote_policy, run, &mut notes);
        normalized.push(spec.column.clone(), value);
    }
    (normalized, notes)
}

/// Map one record onto the schema. Never fails.
pub fn normalize(record: &RawRecord, schema: &TableSchema, run: &RunMetadata) -> NormalizedRecord {
    normalize_with_notes(record, schema, run).0
}

/// Normalize every record into a batch for the schema's table
pub fn normalize_batch(records: &[RawRecord], schema: &TableSchema, run: &RunMetadata) -> Batch {
    let mut degraded = 0usize;
    let rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let (normalized, notes) = normalize_with_notes(record, schema, run);
            if !record.diagnostics().is_empty() || !notes.is_empty() {
                degraded += 1;
                debug!(
                    index,
                    extraction = ?record.diagnostics(),
                    normalization = ?notes,
                    "Record degraded"
                );
            }
            normalized
        })
        .collect();

    if degraded > 0 {
        warn!(
            table = %schema.table,
            degraded,
            total = records.len(),
            "Some records were degraded during extraction or normalization"
        );
    }

    Batch {
        table: schema.table.clone(),
        columns: schema.column_names(),
        records: rows,
    }
}
