//! Control-key derivation
//!
//! A control key identifies a record across runs. In metadata mode it is
//! also the artifact's on-disk name prefixed by its folder, so the status
//! map and the output tree share one namespace:
//!
//! ```text
//! {output_root}/{document_type}/{sanitized(year.title)}.pdf
//!                 └──────── key: "{document_type}.{sanitized(year.title)}.pdf"
//! ```
//!
//! In DOI mode the key is the DOI itself and the file name is its
//! percent-encoding, so distinct DOIs never share a file.

use std::path::{Path, PathBuf};

use crate::record::{KeyMode, Record};

/// Stands in for a missing year.
pub const NO_YEAR: &str = "NoYear";

/// Folder for records without a document type.
pub const DEFAULT_DOCUMENT_TYPE: &str = "Unknown Type";

/// Folder holding every artifact of a DOI-list batch.
pub const DOI_FOLDER: &str = "Papers";

/// Longest sanitized `year.title`, in characters.
pub const MAX_NAME_CHARS: usize = 200;

/// Longest encoded DOI kept verbatim in a file name, in bytes.
pub const MAX_DOI_NAME_BYTES: usize = 200;

/// Characters replaced by a space during sanitization.
const UNSAFE_CHARS: &[char] = &[
    '/', '\\', ':', '*', '?', '"', '“', '”', '<', '>', '|', '@', '°', '\'', '‘', '’', '®', '•',
    '·', '—', '–', '(', ')',
];

/// Make `text` safe to use as a file name.
///
/// Drops everything from the first `[`, blanks out [`UNSAFE_CHARS`],
/// collapses whitespace runs and caps the result at [`MAX_NAME_CHARS`].
/// Idempotent.
pub fn sanitize(text: &str) -> String {
    let head = match text.find('[') {
        Some(pos) => &text[..pos],
        None => text,
    };
    let blanked: String = head
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    let collapsed = blanked.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Folder name for a document type.
///
/// Sanitized like a title and stripped of leading dots, so the folder is
/// always a single plain path component under the output root.
pub fn document_folder(document_type: Option<&str>) -> String {
    let folder = sanitize(document_type.unwrap_or_default());
    match folder.trim_start_matches(|c: char| c == '.' || c.is_whitespace()) {
        "" => DEFAULT_DOCUMENT_TYPE.to_string(),
        name => name.to_string(),
    }
}

/// Artifact file name for a DOI-list record: `{percent-encoded doi}.pdf`.
///
/// Encoding is one-to-one. Names past [`MAX_DOI_NAME_BYTES`] are cut and
/// suffixed with a blake3 digest of the full DOI; the suffix makes them
/// longer than any uncut name, so the two forms never meet.
pub fn doi_filename(doi: &str) -> String {
    let encoded = urlencoding::encode(doi);
    if encoded.len() <= MAX_DOI_NAME_BYTES {
        return format!("{encoded}.pdf");
    }
    let digest = blake3::hash(doi.as_bytes()).to_hex();
    format!("{}~{}.pdf", &encoded[..MAX_DOI_NAME_BYTES], &digest[..16])
}

/// Artifact file name for a metadata record: `{sanitized(year.title)}.pdf`.
pub fn artifact_filename(year: Option<i32>, title: Option<&str>) -> String {
    let year = year.map_or_else(|| NO_YEAR.to_string(), |y| y.to_string());
    let year_title = format!("{year}.{}", title.unwrap_or_default());
    format!("{}.pdf", sanitize(&year_title))
}

/// Metadata-mode control key: `{document_type}.{sanitized(year.title)}.pdf`.
pub fn derive(document_type: Option<&str>, year: Option<i32>, title: Option<&str>) -> String {
    metadata_key(&document_folder(document_type), &artifact_filename(year, title))
}

/// Join a folder and file name into the control key they stand for.
pub fn metadata_key(folder: &str, filename: &str) -> String {
    format!("{folder}.{filename}")
}

/// Control key plus the on-disk location of a record's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub key: String,
    pub folder: String,
    pub filename: String,
}

impl ArtifactKey {
    pub fn for_record(record: &Record, mode: KeyMode) -> Self {
        match mode {
            KeyMode::Metadata => {
                let folder = document_folder(record.document_type.as_deref());
                let filename = artifact_filename(record.year, record.title.as_deref());
                Self {
                    key: metadata_key(&folder, &filename),
                    folder,
                    filename,
                }
            }
            KeyMode::Doi => {
                // A missing DOI maps to the empty key, never fetched
                let doi = record.doi().unwrap_or_default();
                Self {
                    key: doi.to_string(),
                    folder: DOI_FOLDER.to_string(),
                    filename: doi_filename(doi),
                }
            }
        }
    }

    /// Where the artifact lives under `output_root`.
    pub fn path(&self, output_root: &Path) -> PathBuf {
        output_root.join(&self.folder).join(&self.filename)
    }
}
