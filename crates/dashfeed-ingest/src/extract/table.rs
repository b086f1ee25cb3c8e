// HTML table extraction

use super::RecordExtractor;
use crate::error::ExtractionError;
use crate::record::{RawRecord, RawValue};
use scraper::{ElementRef, Html, Selector};

/// Reads one `<table>` located by element id
///
/// The first row supplies the field names; every later row becomes a record.
#[derive(Debug, Clone)]
pub struct TableExtractor {
    table_id: String,
    /// (element id, field name) of a label copied into every record
    label: Option<(String, String)>,
}

impl TableExtractor {
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            label: None,
        }
    }

    /// Capture the text of another element (e.g. a "last updated" label)
    pub fn with_label(mut self, element_id: impl Into<String>, field: impl Into<String>) -> Self {
        self.label = Some((element_id.into(), field.into()));
        self
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css)
        .map_err(|e| ExtractionError::Malformed(format!("invalid selector '{}': {}", css, e)))
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

/// Rows owned by `table` itself; rows of tables nested in a cell are skipped
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in child_elements(table) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => {
                rows.extend(child_elements(child).filter(|el| el.value().name() == "tr"))
            },
            _ => {},
        }
    }
    rows
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    child_elements(row)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .map(cell_text)
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl RecordExtractor for TableExtractor {
    fn extract(&self, body: &str) -> Result<Vec<RawRecord>, ExtractionError> {
        let document = Html::parse_document(body);
        let table_selector = selector(&format!("table[id=\"{}\"]", self.table_id))?;

        let table = document.select(&table_selector).next().ok_or_else(|| {
            ExtractionError::NoSourceFound(format!("no table found with id '{}'", self.table_id))
        })?;

        let mut rows = table_rows(table).into_iter();
        let headers: Vec<String> = rows.next().map(row_cells).unwrap_or_default();

        let label = match &self.label {
            Some((id, field)) => {
                let label_selector = selector(&format!("[id=\"{}\"]", id))?;
                let value = document
                    .select(&label_selector)
                    .next()
                    .map(|el| RawValue::Text(cell_text(el)))
                    .unwrap_or(RawValue::Missing);
                Some((field.clone(), value))
            },
            None => None,
        };

        let mut records = Vec::new();
        for (index, row) in rows.enumerate() {
            let cells = row_cells(row);
            let mut record = RawRecord::new();

            if cells.len() != headers.len() {
                record.push_diagnostic(format!(
                    "row {} has {} cells, header has {}",
                    index + 1,
                    cells.len(),
                    headers.len()
                ));
            }

            for (header, cell) in headers.iter().zip(cells) {
                record.insert(header.clone(), RawValue::Text(cell));
            }

            if let Some((field, value)) = &label {
                record.insert(field.clone(), value.clone());
            }

            records.push(record);
        }

        if records.is_empty() {
            return Err(ExtractionError::EmptySource(format!(
                "empty table '{}'",
                self.table_id
            )));
        }

        Ok(records)
    }

    fn file_extension(&self) -> &'static str {
        "html"
    }
}
