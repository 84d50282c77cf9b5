//! Downloaded-artifact integrity check
//!
//! A heuristic for "not a truncated download or an HTML error page": the
//! file must parse as a PDF and expose document metadata, either an
//! `/Info` dictionary in the trailer or an XMP `/Metadata` stream in the
//! catalog. Not a structural validator.

use std::fmt;
use std::path::Path;

use lopdf::{Dictionary, Document, Object};

#[derive(Debug)]
pub enum IntegrityError {
    /// File could not be parsed as a PDF
    Unreadable(String),
    /// Parsed, but carries no document metadata
    NoMetadata,
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(e) => write!(f, "unreadable PDF: {e}"),
            Self::NoMetadata => write!(f, "PDF has no document metadata"),
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Check that `path` is a PDF with readable document metadata.
pub fn verify_pdf(path: &Path) -> Result<(), IntegrityError> {
    let doc = Document::load(path).map_err(|e| IntegrityError::Unreadable(e.to_string()))?;

    if info_dictionary(&doc).is_some() || has_xmp_metadata(&doc) {
        Ok(())
    } else {
        Err(IntegrityError::NoMetadata)
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn has_xmp_metadata(doc: &Document) -> bool {
    doc.catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"Metadata").ok())
        .and_then(|obj| obj.as_reference().ok())
        .is_some_and(|id| doc.get_object(id).is_ok())
}
