//! Data model shared by the readers, extractor, store and generator.
//!
//! - [`RawStructure`] is what a format reader sees in a file.
//! - [`NormalizedTemplateModel`] is the format-independent template summary.
//! - [`ContentBlock`] is one unit of parsed input text.

mod content;
mod raw;
mod template;

pub use content::{BlockSequence, ContentBlock};
pub use raw::{BoundingBox, RawHeaderFooter, RawPage, RawRun, RawStructure, RawTable, Region};
pub use template::{
    Alignment, BorderStyle, FontUsage, HeaderFooter, Margins, ModelSummary,
    NormalizedTemplateModel, Orientation, PageBreaks, PageSetup, Placement, StyleRole, StyleRule,
    TableSchema, PAGES_PLACEHOLDER, PAGE_PLACEHOLDER,
};
