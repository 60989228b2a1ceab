//! Document generation from a template model and parsed content.
//!
//! Each block picks the style rule of its role (falling back through
//! [`resolve::fallback_chain`]), is laid out on pages of the template's
//! geometry and written by a [`DocumentWriter`].
//!
//! # Example
//!
//! ```no_run
//! use docstencil::content::parse_content;
//! use docstencil::generate::{DocumentGenerator, GenerateOptions, OutputFormat};
//! use docstencil::model::{NormalizedTemplateModel, PageSetup};
//!
//! fn main() -> docstencil::Result<()> {
//!     let model = NormalizedTemplateModel::new(PageSetup::a4());
//!     let generator = DocumentGenerator::new(GenerateOptions::new().with_format(OutputFormat::Pdf));
//!     let doc = generator.generate(&model, parse_content("# Title\n\nHello."))?;
//!     std::fs::write("out.pdf", &doc.bytes)?;
//!     Ok(())
//! }
//! ```

mod docx;
pub mod layout;
mod pdf;
pub mod resolve;

pub use docx::DocxWriter;
pub use layout::{Layout, LaidOutPage};
pub use pdf::{parse_hex_color, PdfWriter};
pub use resolve::{fallback_chain, RuleSource, StyleSheet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    BlockSequence, ContentBlock, Margins, NormalizedTemplateModel, StyleRole,
};

/// Output format of a generated document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PDF
    #[default]
    Pdf,

    /// DOCX (best effort; degrades to PDF)
    Docx,
}

impl OutputFormat {
    /// File extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
        }
    }

    /// MIME type of the output.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(OutputFormat::Pdf),
            "docx" => Ok(OutputFormat::Docx),
            other => Err(Error::InvalidInput(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Options for document generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Requested output format
    pub format: OutputFormat,

    /// Compress PDF content streams
    pub compress: bool,

    /// Document title written to the metadata
    pub title: Option<String>,

    /// Line height as a multiple of the font size
    pub line_spacing: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pdf,
            compress: true,
            title: None,
            line_spacing: 1.2,
        }
    }
}

impl GenerateOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable stream compression.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the line spacing (at least 1.0).
    pub fn with_line_spacing(mut self, spacing: f32) -> Self {
        self.line_spacing = if spacing.is_finite() {
            spacing.max(1.0)
        } else {
            1.2
        };
        self
    }
}

/// A generated document.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// Encoded document
    pub bytes: Vec<u8>,

    /// Format actually produced
    pub format: OutputFormat,

    /// Number of pages (as laid out)
    pub page_count: usize,

    /// DOCX was requested but PDF was produced
    pub degraded: bool,

    /// Degradations, in the order they occurred
    pub warnings: Vec<String>,
}

impl GeneratedDocument {
    /// Size of the document in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the document has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type of the produced format.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Everything a writer needs for one document.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// Template model (geometry, header/footer, table schemas)
    pub model: &'a NormalizedTemplateModel,
    /// Resolved style rules
    pub styles: &'a StyleSheet,
    /// Content in input order
    pub blocks: &'a [ContentBlock],
    /// Pages as laid out
    pub layout: &'a Layout,
    /// Generation options
    pub options: &'a GenerateOptions,
}

/// Trait for output writers.
pub trait DocumentWriter: Send + Sync {
    /// Format this writer produces.
    fn format(&self) -> OutputFormat;

    /// Encode one document.
    fn write(&self, job: &RenderJob<'_>) -> Result<Vec<u8>>;
}

/// Renders content into documents that follow a template model.
#[derive(Debug, Clone, Default)]
pub struct DocumentGenerator {
    options: GenerateOptions,
}

impl DocumentGenerator {
    /// Create a generator.
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    /// Generation options.
    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Render a block sequence. The sequence is consumed.
    pub fn generate(
        &self,
        model: &NormalizedTemplateModel,
        blocks: BlockSequence,
    ) -> Result<GeneratedDocument> {
        let mut warnings = Vec::new();
        let model = usable_model(model, &mut warnings)?;

        let styles = StyleSheet::from_model(&model);
        for role in roles_needed(blocks.as_slice()) {
            if let Some(message) = styles.describe_fallback(role) {
                log::warn!("{}", message);
                warnings.push(message);
            }
        }

        let layout = layout::layout(&model, &styles, blocks.as_slice(), self.options.line_spacing);
        warnings.extend(layout.warnings.iter().cloned());

        let job = RenderJob {
            model: &model,
            styles: &styles,
            blocks: blocks.as_slice(),
            layout: &layout,
            options: &self.options,
        };

        let (bytes, format, degraded) = match self.options.format {
            OutputFormat::Pdf => (PdfWriter::new().write(&job)?, OutputFormat::Pdf, false),
            OutputFormat::Docx => match DocxWriter::new().write(&job) {
                Ok(bytes) => (bytes, OutputFormat::Docx, false),
                Err(e) => {
                    let message = format!("DOCX output failed ({}); produced PDF instead", e);
                    log::warn!("{}", message);
                    warnings.push(message);
                    (PdfWriter::new().write(&job)?, OutputFormat::Pdf, true)
                }
            },
        };

        log::debug!(
            "Generated {} ({} blocks, {} pages, {} bytes)",
            format,
            blocks.len(),
            layout.pages.len(),
            bytes.len()
        );

        Ok(GeneratedDocument {
            bytes,
            format,
            page_count: layout.pages.len(),
            degraded,
            warnings,
        })
    }
}

/// The model with unusable margins replaced. Fails only when the page
/// itself has no usable size.
fn usable_model(
    model: &NormalizedTemplateModel,
    warnings: &mut Vec<String>,
) -> Result<NormalizedTemplateModel> {
    let page = &model.page;
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !(usable(page.width) && usable(page.height)) {
        return Err(Error::Render(format!(
            "invalid page size {}x{}",
            page.width, page.height
        )));
    }

    let mut model = model.clone();
    let problems = model.page.check();
    if !problems.is_empty() {
        let (w, h) = (model.page.width * 0.1, model.page.height * 0.1);
        model.page.margins = Margins {
            top: h,
            bottom: h,
            left: w,
            right: w,
        };
        let message = format!("margins replaced with 10% of the page: {}", problems.join("; "));
        log::warn!("{}", message);
        warnings.push(message);
    }
    Ok(model)
}

/// Roles the blocks will ask the style sheet for, in first-use order.
fn roles_needed(blocks: &[ContentBlock]) -> Vec<StyleRole> {
    let mut roles = Vec::new();
    let mut push = |role: StyleRole| {
        if !roles.contains(&role) {
            roles.push(role);
        }
    };
    for block in blocks {
        match block {
            ContentBlock::TableRow { .. } => {
                push(StyleRole::TableHeader);
                push(StyleRole::TableCell);
            }
            other => {
                if let Some(role) = other.role() {
                    push(role);
                }
            }
        }
    }
    roles
}

/// Render blocks with default options (PDF).
pub fn generate_document(
    model: &NormalizedTemplateModel,
    blocks: BlockSequence,
) -> Result<GeneratedDocument> {
    DocumentGenerator::default().generate(model, blocks)
}
