// Status precedence over a set of alert fields

use crate::record::RawRecord;

#[derive(Debug, Clone, PartialEq)]
struct StatusLevel {
    label: String,
    fields: Vec<String>,
}

/// Ordered status levels; the first level with any present field wins
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPolicy {
    levels: Vec<StatusLevel>,
    fallback: String,
}

impl StatusPolicy {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            levels: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Add the next (lower precedence) level
    pub fn level(mut self, label: impl Into<String>, fields: &[&str]) -> Self {
        self.levels.push(StatusLevel {
            label: label.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn evaluate(&self, record: &RawRecord) -> &str {
        self.levels
            .iter()
            .find(|level| level.fields.iter().any(|f| record.field(f).is_present()))
            .map(|level| level.label.as_str())
            .unwrap_or(&self.fallback)
    }
}
