//! Full document payloads: bill texts, amendments and supplements.
//!
//! Each carries the same metadata as its stub on the bill plus the parent
//! bill id and an optional base64 `doc` body.

use serde::Deserialize;

use super::bill::{AmendmentRef, SupplementRef, TextRef};
use super::lenient;

/// MIME type ids mapped to the extension used in the document cache.
const MIME_EXTENSIONS: [(i64, &str); 6] = [(1, "html"), (2, "pdf"), (3, "wpd"), (4, "doc"), (5, "rtf"), (6, "docx")];

/// Extension for a MIME type id; unknown ids fall back to `bin`.
pub fn mime_extension(mime_id: i64) -> &'static str {
    MIME_EXTENSIONS
        .iter()
        .find(|(id, _)| *id == mime_id)
        .map_or("bin", |(_, ext)| *ext)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillText {
    #[serde(flatten)]
    pub meta: TextRef,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bill_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub doc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Amendment {
    #[serde(flatten)]
    pub meta: AmendmentRef,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bill_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub doc: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Supplement {
    #[serde(flatten)]
    pub meta: SupplementRef,
    #[serde(default, deserialize_with = "lenient::int")]
    pub bill_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub doc: String,
}

pub(crate) fn validate_document(kind: &str, id: i64, bill_id: i64) -> Result<(), String> {
    if id <= 0 {
        return Err(format!("{kind} id must be positive, got {id}"));
    }
    if bill_id <= 0 {
        return Err(format!("{kind} {id} has no bill"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_extension_table() {
        assert_eq!(mime_extension(1), "html");
        assert_eq!(mime_extension(2), "pdf");
        assert_eq!(mime_extension(6), "docx");
        assert_eq!(mime_extension(99), "bin");
    }
}
