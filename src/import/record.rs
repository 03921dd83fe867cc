//! Output records and their line encoding

use serde::Serialize;

use super::source::{ImportError, PageUnit};

/// One output record, written as a single JSON line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record<'a> {
    pub title: &'a str,
    #[serde(rename = "raw_text")]
    pub raw_body: &'a str,
}

impl<'a> From<&'a PageUnit> for Record<'a> {
    fn from(page: &'a PageUnit) -> Self {
        Self {
            title: &page.title,
            raw_body: &page.body,
        }
    }
}

/// Turns an accepted page into one self-contained output line (without the terminator).
///
/// Failures are per-item: the caller drops the page and carries on.
pub trait RecordEncoder: Send + Sync {
    fn encode(&self, page: &PageUnit) -> Result<String, ImportError>;
}

/// `{"title": ..., "raw_text": ...}` with non-ASCII text kept verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesEncoder;

impl RecordEncoder for JsonLinesEncoder {
    fn encode(&self, page: &PageUnit) -> Result<String, ImportError> {
        let line = serde_json::to_string(&Record::from(page)).map_err(|e| ImportError::Encode {
            title: page.title.clone(),
            reason: e.to_string(),
        })?;
        Ok(line)
    }
}
