//! Error types for the docstencil library.

use std::io;
use thiserror::Error;

/// Result type alias for docstencil operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting, storing, or generating templates.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading input files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input bytes could not be parsed as the declared document format.
    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    /// The file type is unknown or does not match its content.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// No template with this name exists in the requested scope.
    #[error("Template '{name}' not found in scope {scope}")]
    NotFound {
        /// Template name
        name: String,
        /// Scope that was searched
        scope: String,
    },

    /// Generation could not produce any output.
    #[error("Rendering error: {0}")]
    Render(String),

    /// The template store could not read or write its files.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A caller-supplied value was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse error category, for callers that map errors to user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unparseable input bytes
    CorruptFile,
    /// Wrong or unknown file type
    UnsupportedFormat,
    /// Unknown template name/scope
    NotFound,
    /// Generation produced no output
    RenderError,
    /// Template store I/O failure
    StorageError,
    /// Rejected argument
    InvalidInput,
}

impl Error {
    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CorruptFile(_) => ErrorKind::CorruptFile,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Render(_) => ErrorKind::RenderError,
            Error::Storage(_) | Error::Io(_) => ErrorKind::StorageError,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    pub(crate) fn storage(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Error::Storage(format!("{}: {}", context, err))
    }

    pub(crate) fn not_found(name: &str, scope: impl std::fmt::Display) -> Self {
        Error::NotFound {
            name: name.to_string(),
            scope: scope.to_string(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::Decryption(_) => Error::CorruptFile("document is encrypted".to_string()),
            _ => Error::CorruptFile(format!("PDF: {}", err)),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::CorruptFile(format!("DOCX package: {}", err))
    }
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::CorruptFile(format!("DOCX XML: {}", err))
    }
}
