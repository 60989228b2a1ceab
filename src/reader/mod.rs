//! Format readers.
//!
//! A reader parses one binary document and reports what it sees as a
//! [`RawStructure`]. Everything after this point is format-agnostic, so a
//! new input format only needs a new [`FormatReader`].

mod backend;
mod docx;
mod layout;
mod options;
mod pdf;
mod table_detector;

pub use docx::DocxReader;
pub use options::ReadOptions;
pub use pdf::PdfReader;

use crate::detect::SourceFormat;
use crate::error::{Error, Result};
use crate::model::RawStructure;

/// Parses one document format into raw structural facts.
pub trait FormatReader: Send + Sync {
    /// Format this reader understands.
    fn format(&self) -> SourceFormat;

    /// Read a document. Malformed input fails with `CorruptFile`.
    fn read(&self, data: &[u8]) -> Result<RawStructure>;
}

/// Get the reader for a format.
pub fn reader_for(format: SourceFormat, options: ReadOptions) -> Box<dyn FormatReader> {
    match format {
        SourceFormat::Pdf => Box::new(PdfReader::new(options)),
        SourceFormat::Docx => Box::new(DocxReader::new()),
    }
}

/// Read the structure of a document with default options.
///
/// The content must match `format`: a DOCX passed as PDF (or the other way
/// round) fails with `UnsupportedFormat`, empty input with `CorruptFile`.
pub fn extract_structure(data: &[u8], format: SourceFormat) -> Result<RawStructure> {
    extract_structure_with_options(data, format, &ReadOptions::default())
}

/// Read the structure of a document.
pub fn extract_structure_with_options(
    data: &[u8],
    format: SourceFormat,
    options: &ReadOptions,
) -> Result<RawStructure> {
    if data.is_empty() {
        return Err(Error::CorruptFile("input is empty".to_string()));
    }
    crate::detect::resolve_format(data, Some(format))?;

    log::debug!("Reading {} bytes as {}", data.len(), format);
    let structure = reader_for(format, options.clone()).read(data)?;
    log::debug!(
        "Read {} pages, {} runs, {} tables",
        structure.page_count(),
        structure.runs.len(),
        structure.tables.len()
    );
    Ok(structure)
}
