// JSON feature extraction

use super::RecordExtractor;
use crate::error::ExtractionError;
use crate::record::{RawRecord, RawValue};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Fixed key path into a JSON document, e.g. `values[0].value[0].dateTime`
///
/// Resolution never fails: a missing key, an out-of-range index or a type
/// mismatch anywhere along the path resolves to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn new(path: &str) -> Self {
        let mut segments = Vec::new();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let (name, indexes) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };

            let parsed: Option<Vec<usize>> = indexes
                .split(']')
                .filter(|s| !s.is_empty())
                .map(|s| s.strip_prefix('[').and_then(|n| n.parse().ok()))
                .collect();

            match parsed {
                Some(indexes) => {
                    if !name.is_empty() {
                        segments.push(Segment::Key(name.to_string()));
                    }
                    segments.extend(indexes.into_iter().map(Segment::Index));
                },
                // Not an index expression; treat the whole part as a key
                None => segments.push(Segment::Key(part.to_string())),
            }
        }
        Self { segments }
    }

    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(value, |current, segment| match segment {
            Segment::Key(key) => current.get(key.as_str()),
            Segment::Index(index) => current.get(*index),
        })
    }
}

impl From<&str> for JsonPath {
    fn from(path: &str) -> Self {
        JsonPath::new(path)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{}", key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Extracts one record per element of a JSON feature array
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    features: JsonPath,
    fields: Vec<(String, JsonPath)>,
    document_fields: Vec<(String, JsonPath)>,
    key_field: Option<String>,
    allow_empty: bool,
}

impl FeatureExtractor {
    pub fn new(features: &str) -> Self {
        Self {
            features: JsonPath::new(features),
            fields: Vec::new(),
            document_fields: Vec::new(),
            key_field: None,
            allow_empty: false,
        }
    }

    /// Field resolved relative to each feature
    pub fn field(mut self, name: impl Into<String>, path: &str) -> Self {
        self.fields.push((name.into(), JsonPath::new(path)));
        self
    }

    /// Field resolved relative to the document root, copied into every record
    pub fn document_field(mut self, name: impl Into<String>, path: &str) -> Self {
        self.document_fields.push((name.into(), JsonPath::new(path)));
        self
    }

    /// Field that identifies a feature; a degraded record keeps only this
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = Some(name.into());
        self
    }

    /// Treat an empty feature array as a valid, empty result
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    fn resolve(path: &JsonPath, value: &Value) -> RawValue {
        path.resolve(value).map(RawValue::from).unwrap_or(RawValue::Missing)
    }

    fn degraded(&self, index: usize, feature: &Value) -> RawRecord {
        let key = self.key_field.as_deref().unwrap_or("_key");
        let mut record = RawRecord::new().with(key, RawValue::Text(format!("#{}", index)));
        record.push_diagnostic(format!(
            "feature {} is {} rather than an object",
            index,
            json_type(feature)
        ));
        record
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl RecordExtractor for FeatureExtractor {
    fn extract(&self, body: &str) -> Result<Vec<RawRecord>, ExtractionError> {
        let document: Value = serde_json::from_str(body)
            .map_err(|e| ExtractionError::Malformed(format!("invalid JSON: {}", e)))?;

        let features = self
            .features
            .resolve(&document)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExtractionError::NoSourceFound(format!("no feature array at '{}'", self.features))
            })?;

        if features.is_empty() && !self.allow_empty {
            return Err(ExtractionError::EmptySource(format!(
                "feature array at '{}' is empty",
                self.features
            )));
        }

        let document_values: Vec<(String, RawValue)> = self
            .document_fields
            .iter()
            .map(|(name, path)| (name.clone(), Self::resolve(path, &document)))
            .collect();

        let records = features
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let mut record = if feature.is_object() {
                    let mut record = RawRecord::new();
                    for (name, path) in &self.fields {
                        record.insert(name.clone(), Self::resolve(path, feature));
                    }
                    record
                } else {
                    self.degraded(index, feature)
                };
                for (name, value) in &document_values {
                    record.insert(name.clone(), value.clone());
                }
                record
            })
            .collect();

        Ok(records)
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_parsing() {
        let path = JsonPath::new("values[0].value[0].dateTime");
        assert_eq!(path.to_string(), "values[0].value[0].dateTime");

        let doc = json!({"values": [{"value": [{"dateTime": "2024-03-05T14:00:00.000-05:00"}]}]});
        assert_eq!(
            path.resolve(&doc),
            Some(&json!("2024-03-05T14:00:00.000-05:00"))
        );
    }

    #[test]
    fn test_missing_anywhere_is_none() {
        let doc = json!({"values": []});
        assert!(JsonPath::new("values[0].value[0].dateTime").resolve(&doc).is_none());
        assert!(JsonPath::new("nope.deeper").resolve(&doc).is_none());
        assert!(JsonPath::new("values.key").resolve(&doc).is_none());
    }

    #[test]
    fn test_features_with_document_fields() {
        let body = r#"{
            "header": {"timestamp": "2024-03-05T14:07:09Z"},
            "features": [
                {"id": "b-1", "properties": [{"length": 2.5}]},
                {"id": "b-2"}
            ]
        }"#;

        let extractor = FeatureExtractor::new("features")
            .field("id", "id")
            .field("length", "properties[0].length")
            .document_field("generated", "header.timestamp");
        let records = extractor.extract(body).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("length"), &RawValue::Number(2.5));
        assert_eq!(records[1].field("length"), &RawValue::Missing);
        assert_eq!(
            records[1].field("generated"),
            &RawValue::text("2024-03-05T14:07:09Z")
        );
    }

    #[test]
    fn test_non_object_feature_degrades() {
        let extractor = FeatureExtractor::new("features").field("id", "id").key_field("id");
        let records = extractor.extract(r#"{"features": [{"id": "a"}, 7]}"#).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].field("id"), &RawValue::text("#1"));
        assert_eq!(records[1].diagnostics().len(), 1);
    }

    #[test]
    fn test_missing_and_empty_arrays() {
        let extractor = FeatureExtractor::new("value.timeSeries");
        assert!(matches!(
            extractor.extract(r#"{"value": {}}"#),
            Err(ExtractionError::NoSourceFound(_))
        ));
        assert!(matches!(
            extractor.extract(r#"{"value": {"timeSeries": []}}"#),
            Err(ExtractionError::EmptySource(_))
        ));
        assert!(matches!(
            extractor.extract("<html>"),
            Err(ExtractionError::Malformed(_))
        ));

        let lenient = FeatureExtractor::new("features").allow_empty();
        assert!(lenient.extract(r#"{"features": []}"#).unwrap().is_empty());
    }
}
