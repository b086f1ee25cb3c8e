// XML feed extraction (Atom alerts, SOAP-wrapped record sets)

use super::{RecordExtractor, XmlNode};
use crate::error::ExtractionError;
use crate::record::{RawRecord, RawValue};

/// Where a field's value lives relative to an entry element
#[derive(Debug, Clone, PartialEq)]
pub enum FeedField {
    /// Text of the first child with this local name
    ChildText { field: String, child: String },
    /// Attribute of the first child with this local name
    ChildAttribute {
        field: String,
        child: String,
        attribute: String,
    },
    /// Attribute of the entry element itself
    Attribute { field: String, attribute: String },
    /// Every attribute of the entry, each under its own name
    AllAttributes,
}

impl FeedField {
    pub fn text(field: impl Into<String>) -> Self {
        let field = field.into();
        FeedField::ChildText {
            child: field.clone(),
            field,
        }
    }

    pub fn child_text(field: impl Into<String>, child: impl Into<String>) -> Self {
        FeedField::ChildText {
            field: field.into(),
            child: child.into(),
        }
    }

    pub fn child_attribute(
        field: impl Into<String>,
        child: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        FeedField::ChildAttribute {
            field: field.into(),
            child: child.into(),
            attribute: attribute.into(),
        }
    }

    fn apply(&self, entry: &XmlNode, record: &mut RawRecord) {
        match self {
            FeedField::ChildText { field, child } => {
                let value = entry
                    .child(child)
                    .map(|c| RawValue::Text(c.text.clone()))
                    .unwrap_or(RawValue::Missing);
                record.insert(field.clone(), value);
            },
            FeedField::ChildAttribute {
                field,
                child,
                attribute,
            } => {
                let value = entry
                    .child(child)
                    .and_then(|c| c.attribute(attribute))
                    .map(RawValue::text)
                    .unwrap_or(RawValue::Missing);
                record.insert(field.clone(), value);
            },
            FeedField::Attribute { field, attribute } => {
                let value = entry
                    .attribute(attribute)
                    .map(RawValue::text)
                    .unwrap_or(RawValue::Missing);
                record.insert(field.clone(), value);
            },
            FeedField::AllAttributes => {
                for (name, value) in &entry.attributes {
                    record.insert(name.clone(), RawValue::text(value.trim()));
                }
            },
        }
    }
}

/// Extracts one record per entry element of an XML document
#[derive(Debug, Clone)]
pub struct FeedExtractor {
    envelope: Option<Vec<String>>,
    entry: String,
    fields: Vec<FeedField>,
    document_fields: Vec<(String, Vec<String>)>,
    sentinel: Option<(String, String)>,
}

impl FeedExtractor {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            envelope: None,
            entry: entry.into(),
            fields: Vec::new(),
            document_fields: Vec::new(),
            sentinel: None,
        }
    }

    /// Path from the root to an element whose text is itself an XML document
    pub fn envelope(mut self, path: &[&str]) -> Self {
        self.envelope = Some(path.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn field(mut self, field: FeedField) -> Self {
        self.fields.push(field);
        self
    }

    /// Text at `path` below the document root, copied into every record
    pub fn document_field(mut self, field: impl Into<String>, path: &[&str]) -> Self {
        self.document_fields
            .push((field.into(), path.iter().map(|s| s.to_string()).collect()));
        self
    }

    /// An entry whose `child` text equals `text` carries no data
    ///
    /// Such an entry yields a record holding only the document fields and the
    /// sentinel text itself.
    pub fn sentinel(mut self, child: impl Into<String>, text: impl Into<String>) -> Self {
        self.sentinel = Some((child.into(), text.into()));
        self
    }

    fn document(&self, root: &XmlNode) -> Result<Option<XmlNode>, ExtractionError> {
        let Some(path) = &self.envelope else {
            return Ok(None);
        };

        let holder = root.path(path.as_slice()).ok_or_else(|| {
            ExtractionError::NoSourceFound(format!("envelope path '{}' not found", path.join("/")))
        })?;

        if holder.text.trim().is_empty() {
            return Err(ExtractionError::EmptySource(format!(
                "envelope '{}' is empty",
                path.join("/")
            )));
        }

        XmlNode::parse(&holder.text).map(Some)
    }

    fn is_sentinel(&self, entry: &XmlNode) -> Option<(String, String)> {
        let (child, text) = self.sentinel.as_ref()?;
        let found = entry.child(child)?;
        (found.text.trim() == text.as_str()).then(|| (child.clone(), text.clone()))
    }
}

impl RecordExtractor for FeedExtractor {
    fn extract(&self, body: &str) -> Result<Vec<RawRecord>, ExtractionError> {
        let outer = XmlNode::parse(body)?;
        let inner = self.document(&outer)?;
        let root = inner.as_ref().unwrap_or(&outer);

        let document_values: Vec<(String, RawValue)> = self
            .document_fields
            .iter()
            .map(|(field, path)| {
                let value = root
                    .path(path.as_slice())
                    .map(|n| RawValue::Text(n.text.clone()))
                    .unwrap_or(RawValue::Missing);
                (field.clone(), value)
            })
            .collect();

        let entries = root.find_all(&self.entry);
        if entries.is_empty() {
            return Err(ExtractionError::NoSourceFound(format!(
                "no '{}' elements in document",
                self.entry
            )));
        }

        let records = entries
            .into_iter()
            .map(|entry| {
                let mut record = RawRecord::new();
                match self.is_sentinel(entry) {
                    Some((child, text)) => record.insert(child, RawValue::Text(text)),
                    None => {
                        for field in &self.fields {
                            field.apply(entry, &mut record);
                        }
                    },
                }
                for (field, value) in &document_values {
                    record.insert(field.clone(), value.clone());
                }
                record
            })
            .collect();

        Ok(records)
    }

    fn file_extension(&self) -> &'static str {
        "xml"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NO_ALERTS: &str = "There are no active watches, warnings or advisories";

    fn cap_extractor() -> FeedExtractor {
        FeedExtractor::new("entry")
            .field(FeedField::text("title"))
            .field(FeedField::child_attribute("link", "link", "href"))
            .field(FeedField::text("event"))
            .field(FeedField::text("polygon"))
            .document_field("feed_updated", &["updated"])
            .sentinel("title", NO_ALERTS)
    }

    #[test]
    fn test_atom_entries() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom" xmlns:cap="urn:oasis:names:tc:emergency:cap:1.1">
          <updated>2024-03-05T14:07:09-05:00</updated>
          <entry>
            <title>Flood Warning issued March 5</title>
            <link href="https://alerts.weather.gov/cap/wwacapget.php?x=1"/>
            <cap:event>Flood Warning</cap:event>
            <cap:polygon>37.23,-89.59 37.25,-89.41</cap:polygon>
          </entry>
          <entry>
            <title>Wind Advisory</title>
            <cap:event>Wind Advisory</cap:event>
          </entry>
        </feed>"#;

        let records = cap_extractor().extract(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("event"), &RawValue::text("Flood Warning"));
        assert_eq!(
            records[0].field("link"),
            &RawValue::text("https://alerts.weather.gov/cap/wwacapget.php?x=1")
        );
        assert_eq!(
            records[1].field("feed_updated"),
            &RawValue::text("2024-03-05T14:07:09-05:00")
        );
        assert_eq!(records[1].field("polygon"), &RawValue::Missing);
    }

    #[test]
    fn test_sentinel_entry_short_circuits() {
        let xml = format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><updated>2024-03-05T14:07:09-05:00</updated>
               <entry><title>{}</title><cap:event xmlns:cap="urn:x">ignored</cap:event></entry></feed>"#,
            NO_ALERTS
        );

        let records = cap_extractor().extract(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("title"), &RawValue::text(NO_ALERTS));
        assert_eq!(records[0].field("event"), &RawValue::Missing);
        assert!(records[0].field("feed_updated").is_present());
    }

    #[test]
    fn test_no_entries() {
        let err = cap_extractor()
            .extract("<feed><updated>x</updated></feed>")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NoSourceFound(_)));
    }

    #[test]
    fn test_envelope_is_reparsed() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
          <soap:Body><GetDataResponse xmlns="http://tempuri.org/"><GetDataResult>
            &lt;data&gt;&lt;record dataid=" 17 " name="Hope Center " /&gt;&lt;record dataid="18"/&gt;&lt;/data&gt;
          </GetDataResult></GetDataResponse></soap:Body></soap:Envelope>"#;

        let extractor = FeedExtractor::new("record")
            .envelope(&["Body", "GetDataResponse", "GetDataResult"])
            .field(FeedField::AllAttributes);
        let records = extractor.extract(xml).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("dataid"), &RawValue::text("17"));
        assert_eq!(records[0].field("name"), &RawValue::text("Hope Center"));
        assert_eq!(records[1].field("name"), &RawValue::Missing);
    }

    #[test]
    fn test_missing_envelope() {
        let extractor = FeedExtractor::new("record").envelope(&["Body", "GetDataResponse"]);
        let err = extractor.extract("<Envelope><Body/></Envelope>").unwrap_err();
        assert!(matches!(err, ExtractionError::NoSourceFound(_)));
    }
}
