//! # docstencil
//!
//! Template extraction and document generation for PDF and DOCX.
//!
//! An uploaded document is reduced to a [`NormalizedTemplateModel`] (page
//! geometry, fonts, style rules per role, running header/footer, table
//! schemas). New markdown-like content is then rendered into a document
//! that follows the template.
//!
//! ## Quick Start
//!
//! ```no_run
//! use docstencil::{TemplateScope, TemplateService};
//!
//! fn main() -> docstencil::Result<()> {
//!     let service = TemplateService::open("./templates")?;
//!     let bytes = std::fs::read("letterhead.docx")?;
//!     service.upload_template("letterhead", &bytes, None, &TemplateScope::Global)?;
//!
//!     let doc = service.generate(
//!         "letterhead",
//!         &TemplateScope::Global,
//!         "# Quarterly report\n\nRevenue grew.",
//!         docstencil::OutputFormat::Pdf,
//!     )?;
//!     std::fs::write("report.pdf", &doc.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - [`reader`]: PDF/DOCX bytes to a [`RawStructure`]
//! - [`extract`]: raw structure to a normalized model
//! - [`store`]: durable templates per scope
//! - [`content`]: text to content blocks
//! - [`generate`]: model plus blocks to PDF or DOCX

pub mod content;
pub mod detect;
pub mod error;
pub mod extract;
pub mod fonts;
pub mod generate;
pub mod model;
pub mod reader;
pub mod store;

pub use content::{parse_content, ContentParser};
pub use detect::{detect_format_from_bytes, resolve_format, SourceFormat};
pub use error::{Error, ErrorKind, Result};
pub use extract::{ExtractOptions, Extraction, TemplateExtractor};
pub use generate::{
    generate_document, DocumentGenerator, GenerateOptions, GeneratedDocument, OutputFormat,
};
pub use model::{
    BlockSequence, ContentBlock, ModelSummary, NormalizedTemplateModel, RawStructure, StyleRole,
    StyleRule,
};
pub use reader::{extract_structure, extract_structure_with_options, ReadOptions};
pub use store::{TemplateRecord, TemplateScope, TemplateStore, TemplateSummary};

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read and extract a template from bytes in one step.
///
/// # Example
///
/// ```no_run
/// use docstencil::{extract_template, SourceFormat};
///
/// let data = std::fs::read("template.pdf").unwrap();
/// let extraction = extract_template(&data, SourceFormat::Pdf).unwrap();
/// println!("{:?}", extraction.model.summary());
/// ```
pub fn extract_template(data: &[u8], format: SourceFormat) -> Result<Extraction> {
    let raw = extract_structure(data, format)?;
    Ok(TemplateExtractor::default().extract_with_warnings(&raw))
}

/// Read and extract a template file, detecting its format.
pub fn extract_template_file<P: AsRef<Path>>(path: P) -> Result<Extraction> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let declared = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(SourceFormat::from_file_name);
    let format = resolve_format(&data, declared)?;
    extract_template(&data, format)
}

/// Options for every stage the service runs.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    /// Reader tuning
    pub read: ReadOptions,

    /// Role classification thresholds
    pub extract: ExtractOptions,

    /// Output defaults (the format is chosen per call)
    pub generate: GenerateOptions,
}

impl ServiceOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set reader options.
    pub fn with_read_options(mut self, options: ReadOptions) -> Self {
        self.read = options;
        self
    }

    /// Set extraction options.
    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extract = options;
        self
    }

    /// Set generation options.
    pub fn with_generate_options(mut self, options: GenerateOptions) -> Self {
        self.generate = options;
        self
    }
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Id of the stored version
    pub template_id: String,
    /// Format the upload was read as
    pub source_format: SourceFormat,
    /// Extraction degradations
    pub warnings: Vec<String>,
}

/// Metadata of a stored template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Template name
    pub name: String,
    /// Scope the template was found in
    pub scope: TemplateScope,
    /// Id of the stored version
    pub template_id: String,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Format of the original upload
    pub source_format: SourceFormat,
    /// Model summary
    pub summary: ModelSummary,
}

/// Generated document prepared for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Standard base64 of the document bytes
    pub document_base64: String,
    /// Length of the decoded document
    pub byte_len: usize,
    /// Format actually produced
    pub format: OutputFormat,
    /// DOCX was requested but PDF was produced
    pub degraded: bool,
    /// Degradations reported during generation
    pub warnings: Vec<String>,
}

impl GenerateResponse {
    fn from_document(doc: GeneratedDocument) -> Self {
        Self {
            document_base64: BASE64.encode(&doc.bytes),
            byte_len: doc.bytes.len(),
            format: doc.format,
            degraded: doc.degraded,
            warnings: doc.warnings,
        }
    }

    /// Decode the document bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.document_base64)
            .map_err(|e| Error::InvalidInput(format!("invalid base64: {}", e)))
    }
}

/// Upload, list, inspect, generate and delete templates.
///
/// This is the surface the host integration layer talks to; every call is
/// synchronous and safe to share between threads.
#[derive(Debug)]
pub struct TemplateService {
    store: TemplateStore,
    options: ServiceOptions,
}

impl TemplateService {
    /// Open a service on a store directory with default options.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(dir, ServiceOptions::default())
    }

    /// Open a service on a store directory.
    pub fn open_with_options(dir: impl AsRef<Path>, options: ServiceOptions) -> Result<Self> {
        Ok(Self {
            store: TemplateStore::open(dir)?,
            options,
        })
    }

    /// The underlying store.
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Service options.
    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Extract a template from an upload and store it.
    ///
    /// `format` is the declared type; without one, a `.pdf`/`.docx` suffix
    /// on `name` declares it. The content decides when nothing is declared.
    pub fn upload_template(
        &self,
        name: &str,
        bytes: &[u8],
        format: Option<SourceFormat>,
        scope: &TemplateScope,
    ) -> Result<UploadResult> {
        let declared = format.or_else(|| SourceFormat::from_file_name(name));
        let source_format = resolve_format(bytes, declared)?;

        let raw = extract_structure_with_options(bytes, source_format, &self.options.read)?;
        let extraction = TemplateExtractor::new(self.options.extract.clone())
            .extract_with_warnings(&raw);

        let template_id = self
            .store
            .save(name, scope, &extraction.model, bytes, source_format)?;
        log::info!(
            "Uploaded '{}' ({}) from {} with {} warning(s)",
            name.trim(),
            scope,
            source_format,
            extraction.warnings.len()
        );

        Ok(UploadResult {
            template_id,
            source_format,
            warnings: extraction.warnings,
        })
    }

    /// Upload base64-encoded bytes; a `data:<mime>;base64,` prefix is allowed.
    pub fn upload_template_base64(
        &self,
        name: &str,
        encoded: &str,
        format: Option<SourceFormat>,
        scope: &TemplateScope,
    ) -> Result<UploadResult> {
        let bytes = decode_base64_payload(encoded)?;
        self.upload_template(name, &bytes, format, scope)
    }

    /// Templates visible from a scope.
    pub fn list_templates(&self, scope: &TemplateScope) -> Result<Vec<TemplateSummary>> {
        self.store.list(scope)
    }

    /// Metadata of a template (user scope first, then global).
    pub fn get_template_info(&self, name: &str, scope: &TemplateScope) -> Result<TemplateInfo> {
        let record = self.store.resolve(name, scope)?;
        Ok(TemplateInfo {
            summary: record.model.summary(),
            name: record.name,
            scope: record.scope,
            template_id: record.template_id,
            created_at: record.created_at,
            source_format: record.source_format,
        })
    }

    /// Render content as PDF for transport.
    pub fn generate_pdf(
        &self,
        name: &str,
        scope: &TemplateScope,
        content: &str,
    ) -> Result<GenerateResponse> {
        let doc = self.generate(name, scope, content, OutputFormat::Pdf)?;
        Ok(GenerateResponse::from_document(doc))
    }

    /// Render content in a requested format. DOCX degrades to PDF, which is
    /// reported on the result.
    pub fn generate(
        &self,
        name: &str,
        scope: &TemplateScope,
        content: &str,
        format: OutputFormat,
    ) -> Result<GeneratedDocument> {
        let record = self.store.resolve(name, scope)?;
        let blocks = parse_content(content);
        let options = self.options.generate.clone().with_format(format);
        DocumentGenerator::new(options).generate(&record.model, blocks)
    }

    /// Delete a template from exactly this scope.
    pub fn delete_template(&self, name: &str, scope: &TemplateScope) -> Result<()> {
        self.store.delete(name, scope)
    }
}

/// Decode standard base64, allowing a data-URL prefix and line breaks.
pub fn decode_base64_payload(encoded: &str) -> Result<Vec<u8>> {
    let trimmed = encoded.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| Error::InvalidInput("data URL without payload".to_string()))?,
        None => trimmed,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("invalid base64: {}", e)))
}
