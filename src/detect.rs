//! Document format detection and validation.

use std::io::Cursor;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source document formats a template can be extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Portable Document Format
    Pdf,
    /// Office Open XML word-processing document
    Docx,
}

impl SourceFormat {
    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Docx => "docx",
        }
    }

    /// MIME type of the format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "application/pdf",
            SourceFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// Parse an extension such as `"pdf"`, `".DOCX"`.
    ///
    /// Returns `Err(Error::UnsupportedFormat)` for anything else.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(SourceFormat::Pdf),
            "docx" => Ok(SourceFormat::Docx),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown file type '{}'",
                other
            ))),
        }
    }

    /// Infer the format from a file name's extension, if it has a known one.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::from_extension(e).ok())
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
/// ZIP local file header magic.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// Main part every word-processing package carries.
const DOCX_MAIN_PART: &str = "word/document.xml";

/// Detect the document format from its content.
///
/// # Returns
/// * `Ok(SourceFormat::Pdf)` for data starting with `%PDF-`
/// * `Ok(SourceFormat::Docx)` for ZIP packages containing `word/document.xml`,
///   and for ZIP data too damaged to list (the reader reports the corruption)
/// * `Err(Error::UnsupportedFormat)` for anything else
pub fn detect_format_from_bytes(data: &[u8]) -> Result<SourceFormat> {
    if data.starts_with(PDF_MAGIC) {
        return Ok(SourceFormat::Pdf);
    }

    if data.starts_with(ZIP_MAGIC) {
        return match zip::ZipArchive::new(Cursor::new(data)) {
            Ok(archive) => {
                if archive.file_names().any(|n| n == DOCX_MAIN_PART) {
                    Ok(SourceFormat::Docx)
                } else {
                    Err(Error::UnsupportedFormat(
                        "ZIP package is not a word-processing document".to_string(),
                    ))
                }
            }
            Err(e) => {
                log::debug!("ZIP directory unreadable, assuming DOCX: {}", e);
                Ok(SourceFormat::Docx)
            }
        };
    }

    Err(Error::UnsupportedFormat(
        "content is neither PDF nor DOCX".to_string(),
    ))
}

/// Decide which reader should handle an upload.
///
/// `declared` is the format claimed by the caller (explicitly or through a
/// file extension); the content always has the final word.
pub fn resolve_format(data: &[u8], declared: Option<SourceFormat>) -> Result<SourceFormat> {
    if data.is_empty() {
        return Err(Error::CorruptFile("empty input".to_string()));
    }

    match (declared, detect_format_from_bytes(data)) {
        (Some(declared), Ok(detected)) if declared != detected => {
            Err(Error::UnsupportedFormat(format!(
                "file declared as {} but content is {}",
                declared, detected
            )))
        }
        (_, Ok(detected)) => Ok(detected),
        (Some(declared), Err(_)) => Err(Error::CorruptFile(format!(
            "content is not a readable {} document",
            declared
        ))),
        (None, Err(e)) => Err(e),
    }
}
