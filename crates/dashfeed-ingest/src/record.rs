// Record types flowing through the pipeline

use chrono::{NaiveDateTime, Timelike};
use dashfeed_common::sql::{format_timestamp, number_literal, text_literal, QuotePolicy};
use serde_json::Value;
use uuid::Uuid;

/// Untyped scalar pulled out of a source document
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Text(String),
    Number(f64),
    List(Vec<RawValue>),
}

static MISSING: RawValue = RawValue::Missing;

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    /// Non-missing and non-empty after trimming
    pub fn is_present(&self) -> bool {
        match self {
            RawValue::Missing => false,
            RawValue::Text(s) => !s.trim().is_empty(),
            RawValue::Number(n) => n.is_finite(),
            RawValue::List(items) => !items.is_empty(),
        }
    }

    /// Trimmed text form of a scalar. Lists have no text form.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Number(n) if n.is_finite() => Some(number_literal(*n)),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RawValue]> {
        match self {
            RawValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawValue::Missing,
            Value::Bool(b) => RawValue::Text(b.to_string()),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Missing),
            Value::String(s) => RawValue::Text(s.clone()),
            Value::Array(items) => RawValue::List(items.iter().map(RawValue::from).collect()),
            Value::Object(_) => RawValue::Text(value.to_string()),
        }
    }
}

/// Ordered source-field mapping for one extracted item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
    diagnostics: Vec<String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an earlier value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: RawValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Field value, or `Missing` when the record has no such field
    pub fn field(&self, name: &str) -> &RawValue {
        self.get(name).unwrap_or(&MISSING)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }
}

/// Text that is safe to place inside a single-quoted literal
///
/// Only constructible through a [`QuotePolicy`], so every text value a
/// writer sees has been through the table's apostrophe policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlText(String);

impl SqlText {
    pub fn new(raw: &str, policy: QuotePolicy) -> Self {
        SqlText(policy.sanitize(raw.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn truncated(&self, max_chars: usize) -> Self {
        SqlText(self.0.chars().take(max_chars).collect())
    }
}

/// Typed, SQL-ready value for one destination column
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(SqlText),
    Number(f64),
    Integer(i64),
    Timestamp(NaiveDateTime),
    /// A geometry constructor expression such as `ST_GeomFromText('POINT(1 2)', 4326)`
    Geometry(String),
    Null,
}

impl SqlValue {
    pub fn to_sql(&self) -> String {
        match self {
            SqlValue::Text(text) => text_literal(text.as_str()),
            SqlValue::Number(n) => number_literal(*n),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Timestamp(ts) => text_literal(&format_timestamp(ts)),
            SqlValue::Geometry(expr) => expr.clone(),
            SqlValue::Null => "NULL".to_string(),
        }
    }
}

/// Destination column -> value, in schema order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    values: Vec<(String, SqlValue)>,
}

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: SqlValue) {
        self.values.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.values.iter().map(|(_, v)| v)
    }
}

/// All rows for one destination table within one run
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub table: String,
    pub columns: Vec<String>,
    pub records: Vec<NormalizedRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Identity and timing of a single run
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub task_name: String,
    pub started_at: NaiveDateTime,
    /// Latest generation time the source claims, or `started_at`
    pub generated_at: NaiveDateTime,
}

impl RunMetadata {
    pub fn start(task_name: impl Into<String>) -> Self {
        Self::start_at(task_name, chrono::Local::now().naive_local())
    }

    pub fn start_at(task_name: impl Into<String>, started_at: NaiveDateTime) -> Self {
        let started_at = started_at.with_nanosecond(0).unwrap_or(started_at);
        Self {
            run_id: Uuid::new_v4(),
            task_name: task_name.into(),
            started_at,
            generated_at: started_at,
        }
    }

    /// Raise `generated_at` to the latest source-claimed timestamp
    pub fn claim_generated(&mut self, claimed: impl IntoIterator<Item = NaiveDateTime>) {
        if let Some(latest) = claimed.into_iter().max() {
            self.generated_at = latest;
        }
    }
}
