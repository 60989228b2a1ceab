//! Low-level structural facts produced by the format readers.
//!
//! Everything downstream of a reader works from [`RawStructure`] only, so a
//! new input format needs nothing but a reader that fills it in.

use serde::{Deserialize, Serialize};

use super::template::{Alignment, BorderStyle, Margins};
use crate::detect::SourceFormat;

/// Structural facts read from one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStructure {
    /// Format the facts were read from
    pub format: Option<SourceFormat>,
    /// Page geometry, one entry per page (DOCX: one entry per section)
    pub pages: Vec<RawPage>,
    /// Page count stated by the document when `pages` is not one per page
    #[serde(default)]
    pub declared_page_count: Option<u32>,
    /// Text runs in reading order
    pub runs: Vec<RawRun>,
    /// Tables in document order
    pub tables: Vec<RawTable>,
    /// Running header found by the reader
    pub header: Option<RawHeaderFooter>,
    /// Running footer found by the reader
    pub footer: Option<RawHeaderFooter>,
    /// Margins stated by the document itself (DOCX sections)
    pub margins: Option<Margins>,
    /// Page break positions
    pub page_breaks: Vec<u32>,
    /// Non-fatal problems met while reading
    pub warnings: Vec<String>,
}

impl RawStructure {
    /// Create an empty structure for a format.
    pub fn new(format: SourceFormat) -> Self {
        Self {
            format: Some(format),
            ..Default::default()
        }
    }

    /// Number of pages: the declared count, else one per page read.
    pub fn page_count(&self) -> u32 {
        self.declared_page_count.unwrap_or(self.pages.len() as u32)
    }

    /// Record a non-fatal problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    /// Page number (1-indexed)
    pub number: u32,
    /// Width in points
    pub width: f32,
    /// Height in points
    pub height: f32,
    /// Landscape flag stated by the document, if any
    pub landscape: Option<bool>,
}

impl RawPage {
    /// Create a page.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            landscape: None,
        }
    }
}

/// Axis-aligned box in PDF user space (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f32,
    /// Bottom edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
}

impl BoundingBox {
    /// Create a box from two corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Box width.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Where on the page a run sits, as decided by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Main text flow
    #[default]
    Body,
    /// Confirmed running header
    Header,
    /// Confirmed running footer
    Footer,
}

/// A run of text with uniform formatting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRun {
    /// Text content
    pub text: String,
    /// Font name as found in the document (may carry subset prefix or weight suffix)
    pub font_name: Option<String>,
    /// Font size in points
    pub font_size: Option<f32>,
    /// Bold weight
    pub bold: bool,
    /// Italic style
    pub italic: bool,
    /// Text color as `#RRGGBB`
    pub color: Option<String>,
    /// Paragraph alignment
    pub alignment: Option<Alignment>,
    /// Paragraph style name (DOCX), e.g. "Heading 1"
    pub style_name: Option<String>,
    /// Paragraph belongs to a numbered/bulleted list (DOCX numbering)
    pub numbered: bool,
    /// Page number (1-indexed)
    pub page: u32,
    /// Position on the page (PDF only)
    pub bbox: Option<BoundingBox>,
    /// Page region
    pub region: Region,
    /// Table membership: (table index, row index)
    pub table_cell: Option<(usize, usize)>,
    /// Paragraph or line index the run belongs to
    pub paragraph: usize,
    /// Space before the paragraph, in points
    pub space_before: Option<f32>,
    /// Space after the paragraph, in points
    pub space_after: Option<f32>,
}

impl RawRun {
    /// Create a run with text, font and size.
    pub fn new(text: impl Into<String>, font_name: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_name: Some(font_name.into()),
            font_size: Some(font_size),
            page: 1,
            ..Default::default()
        }
    }

    /// Set the paragraph style name.
    pub fn with_style_name(mut self, name: impl Into<String>) -> Self {
        self.style_name = Some(name.into());
        self
    }

    /// Set bold/italic.
    pub fn with_weight(mut self, bold: bool, italic: bool) -> Self {
        self.bold = bold;
        self.italic = italic;
        self
    }

    /// Set the page number.
    pub fn on_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the bounding box.
    pub fn at(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Set the region.
    pub fn in_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Mark the run as part of a table row.
    pub fn in_table(mut self, table: usize, row: usize) -> Self {
        self.table_cell = Some((table, row));
        self
    }
}

/// A table as found in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Row count
    pub rows: usize,
    /// Column count
    pub columns: usize,
    /// Whether row 0 looks like a header row
    pub has_header_row: bool,
    /// Border drawing
    pub border: BorderStyle,
    /// Page the table starts on
    pub page: u32,
}

/// A running header or footer found by a reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHeaderFooter {
    /// Text with `{page}`/`{pages}` placeholders where numbers vary
    pub text: String,
    /// Alignment on the page
    pub alignment: Alignment,
    /// Baseline distance from the nearest page edge, in points
    pub offset: f32,
    /// Representative run (font, size, weight)
    pub run: RawRun,
    /// Whether the text carries a page number
    pub page_number: bool,
}
