// Record extraction
//
// Each extractor turns one response body into an ordered list of RawRecords.
// The variant is chosen by the source descriptor, never by sniffing the body.

pub mod feature;
pub mod feed;
pub mod table;
pub mod xml_tree;

pub use feature::{FeatureExtractor, JsonPath};
pub use feed::{FeedExtractor, FeedField};
pub use table::TableExtractor;
pub use xml_tree::XmlNode;

use crate::error::ExtractionError;
use crate::record::RawRecord;

/// Turns a raw response body into records
///
/// A single malformed item never fails the call: it becomes a minimal record
/// with an identifying key and a diagnostic. Only document-level problems
/// (nothing to extract from, nothing extracted) are errors.
pub trait RecordExtractor {
    fn extract(&self, body: &str) -> Result<Vec<RawRecord>, ExtractionError>;

    /// Extension used when dumping raw bodies to disk
    fn file_extension(&self) -> &'static str;
}

/// The extractor a source is configured with
#[derive(Debug, Clone)]
pub enum Extractor {
    Table(TableExtractor),
    Feed(FeedExtractor),
    Feature(FeatureExtractor),
}

impl RecordExtractor for Extractor {
    fn extract(&self, body: &str) -> Result<Vec<RawRecord>, ExtractionError> {
        match self {
            Extractor::Table(e) => e.extract(body),
            Extractor::Feed(e) => e.extract(body),
            Extractor::Feature(e) => e.extract(body),
        }
    }

    fn file_extension(&self) -> &'static str {
        match self {
            Extractor::Table(e) => e.file_extension(),
            Extractor::Feed(e) => e.file_extension(),
            Extractor::Feature(e) => e.file_extension(),
        }
    }
}

impl From<TableExtractor> for Extractor {
    fn from(e: TableExtractor) -> Self {
        Extractor::Table(e)
    }
}

impl From<FeedExtractor> for Extractor {
    fn from(e: FeedExtractor) -> Self {
        Extractor::Feed(e)
    }
}

impl From<FeatureExtractor> for Extractor {
    fn from(e: FeatureExtractor) -> Self {
        Extractor::Feature(e)
    }
}
