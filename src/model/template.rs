//! The normalized template model.
//!
//! A [`NormalizedTemplateModel`] is the format-independent summary of a
//! template's page geometry, fonts, per-role style rules, running
//! header/footer and table schemas. Readers and the extractor produce it;
//! the store persists it; the generator consumes it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the current page number.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Placeholder substituted with the total page count.
pub const PAGES_PLACEHOLDER: &str = "{pages}";

/// Format-independent structural and style summary of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTemplateModel {
    /// Page geometry
    pub page: PageSetup,

    /// Distinct font families with their observed size ranges, sorted by family
    pub fonts: Vec<FontUsage>,

    /// Style rule per role
    pub styles: BTreeMap<StyleRole, StyleRule>,

    /// Running header, if the template has one
    pub header: Option<HeaderFooter>,

    /// Running footer, if the template has one
    pub footer: Option<HeaderFooter>,

    /// Table schemas in document order
    pub tables: Vec<TableSchema>,

    /// Observed page breaks (informational)
    pub page_breaks: PageBreaks,

    /// Number of pages in the source document
    pub page_count: u32,
}

impl NormalizedTemplateModel {
    /// Create a model with the given page setup and nothing else.
    pub fn new(page: PageSetup) -> Self {
        Self {
            page,
            fonts: Vec::new(),
            styles: BTreeMap::new(),
            header: None,
            footer: None,
            tables: Vec::new(),
            page_breaks: PageBreaks::default(),
            page_count: 1,
        }
    }

    /// Get the style rule for a role, if the template defines one.
    pub fn style(&self, role: StyleRole) -> Option<&StyleRule> {
        self.styles.get(&role)
    }

    /// Set the style rule for a role, replacing any previous rule.
    pub fn set_style(&mut self, role: StyleRole, rule: StyleRule) {
        self.styles.insert(role, rule);
    }

    /// Look up a font family (case-insensitive).
    pub fn font(&self, family: &str) -> Option<&FontUsage> {
        self.fonts
            .iter()
            .find(|f| f.family.eq_ignore_ascii_case(family))
    }

    /// Record that a font family is used at a size.
    pub fn observe_font(&mut self, family: &str, size: f32) {
        match self
            .fonts
            .iter_mut()
            .find(|f| f.family.eq_ignore_ascii_case(family))
        {
            Some(usage) => usage.observe(size),
            None => {
                self.fonts.push(FontUsage::new(family, size));
                self.fonts.sort_by(|a, b| a.family.cmp(&b.family));
            }
        }
    }

    /// List violated model invariants. An empty list means the model is valid.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = self.page.check();

        let mut check_family = |what: &str, rule: &StyleRule| {
            if self.font(&rule.font_family).is_none() {
                problems.push(format!(
                    "{} uses font '{}' which is not in the font list",
                    what, rule.font_family
                ));
            }
        };

        for (i, table) in self.tables.iter().enumerate() {
            if let Some(rule) = self.styles.get(&table.cell_style) {
                check_family(&format!("table {} cell style", i), rule);
            }
            if let Some(rule) = self.styles.get(&table.header_style) {
                check_family(&format!("table {} header style", i), rule);
            }
        }
        if let Some(header) = &self.header {
            check_family("header", &header.style);
        }
        if let Some(footer) = &self.footer {
            check_family("footer", &footer.style);
        }

        let mut rules: Vec<(&str, &StyleRule)> = self
            .styles
            .iter()
            .map(|(role, rule)| (role.as_str(), rule))
            .collect();
        if let Some(header) = &self.header {
            rules.push(("header", &header.style));
        }
        if let Some(footer) = &self.footer {
            rules.push(("footer", &footer.style));
        }
        for (what, rule) in rules {
            if !(rule.size.is_finite() && rule.size > 0.0) {
                problems.push(format!("{} has invalid size {}", what, rule.size));
            }
            for (side, points) in [("before", rule.space_before), ("after", rule.space_after)] {
                if !(points.is_finite() && points >= 0.0) {
                    problems.push(format!("{} has invalid space {} {}", what, side, points));
                }
            }
        }

        for font in &self.fonts {
            let sizes_ok = [font.min_size, font.max_size]
                .iter()
                .all(|s| s.is_finite() && *s > 0.0);
            if !sizes_ok || font.min_size > font.max_size {
                problems.push(format!(
                    "font '{}' has invalid size range {}..{}",
                    font.family, font.min_size, font.max_size
                ));
            }
        }

        problems
    }

    /// Check whether all invariants hold.
    pub fn is_valid(&self) -> bool {
        self.check_invariants().is_empty()
    }

    /// Build a compact summary for listings and info requests.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            page_width: self.page.width,
            page_height: self.page.height,
            orientation: self.page.orientation,
            margins: self.page.margins,
            fonts: self.fonts.iter().map(|f| f.family.clone()).collect(),
            roles: self.styles.keys().copied().collect(),
            has_header: self.header.is_some(),
            has_footer: self.footer.is_some(),
            table_count: self.tables.len(),
            page_count: self.page_count,
            page_break_count: self.page_breaks.count,
        }
    }
}

/// Page size, orientation and margins, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
    /// Orientation (derived from width/height unless stated by the source)
    pub orientation: Orientation,
    /// Page margins
    pub margins: Margins,
}

impl PageSetup {
    /// Create a page setup; orientation follows the dimensions.
    pub fn new(width: f32, height: f32, margins: Margins) -> Self {
        Self {
            width,
            height,
            orientation: Orientation::from_dimensions(width, height),
            margins,
        }
    }

    /// US Letter with one-inch margins.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0, Margins::uniform(72.0))
    }

    /// A4 with one-inch margins.
    pub fn a4() -> Self {
        Self::new(595.0, 842.0, Margins::uniform(72.0))
    }

    /// Width available for content.
    pub fn content_width(&self) -> f32 {
        self.width - self.margins.left - self.margins.right
    }

    /// Height available for content.
    pub fn content_height(&self) -> f32 {
        self.height - self.margins.top - self.margins.bottom
    }

    /// Check geometry invariants.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let m = &self.margins;

        if !(self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0)
        {
            problems.push(format!("invalid page size {}x{}", self.width, self.height));
            return problems;
        }
        if [m.top, m.bottom, m.left, m.right]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            problems.push("margins must be non-negative".to_string());
        }
        if m.left + m.right >= self.width {
            problems.push(format!(
                "left+right margins ({}) must be less than page width ({})",
                m.left + m.right,
                self.width
            ));
        }
        if m.top + m.bottom >= self.height {
            problems.push(format!(
                "top+bottom margins ({}) must be less than page height ({})",
                m.top + m.bottom,
                self.height
            ));
        }
        problems
    }

    /// Check whether the geometry is valid.
    pub fn is_valid(&self) -> bool {
        self.check().is_empty()
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::letter()
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Taller than wide
    #[default]
    Portrait,
    /// Wider than tall
    Landscape,
}

impl Orientation {
    /// Derive orientation from page dimensions.
    pub fn from_dimensions(width: f32, height: f32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Margins {
    /// Top margin
    pub top: f32,
    /// Bottom margin
    pub bottom: f32,
    /// Left margin
    pub left: f32,
    /// Right margin
    pub right: f32,
}

impl Margins {
    /// Same margin on all four sides.
    pub fn uniform(value: f32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }
}

/// A font family observed in the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontUsage {
    /// Family name (e.g. "Helvetica", "Calibri")
    pub family: String,
    /// Smallest observed size in points
    pub min_size: f32,
    /// Largest observed size in points
    pub max_size: f32,
    /// Number of text runs using this family
    pub occurrences: u32,
}

impl FontUsage {
    /// Create a usage record from a first observation.
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            min_size: size,
            max_size: size,
            occurrences: 1,
        }
    }

    /// Add an observation.
    pub fn observe(&mut self, size: f32) {
        self.min_size = self.min_size.min(size);
        self.max_size = self.max_size.max(size);
        self.occurrences += 1;
    }
}

/// Semantic style category, independent of the source format.
///
/// The declaration order is the order roles appear in serialized models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleRole {
    /// Top-level heading
    Heading1,
    /// Second-level heading
    Heading2,
    /// Third-level (and deeper) heading
    Heading3,
    /// Body text
    Body,
    /// Bulleted or numbered list item
    ListItem,
    /// Table body cell
    TableCell,
    /// Table header cell
    TableHeader,
}

impl StyleRole {
    /// All roles, in order.
    pub const ALL: [StyleRole; 7] = [
        StyleRole::Heading1,
        StyleRole::Heading2,
        StyleRole::Heading3,
        StyleRole::Body,
        StyleRole::ListItem,
        StyleRole::TableCell,
        StyleRole::TableHeader,
    ];

    /// Role for a heading level; levels deeper than 3 share `Heading3`.
    pub fn heading(level: u8) -> Self {
        match level {
            0 | 1 => StyleRole::Heading1,
            2 => StyleRole::Heading2,
            _ => StyleRole::Heading3,
        }
    }

    /// Stable name used in serialized models.
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleRole::Heading1 => "heading1",
            StyleRole::Heading2 => "heading2",
            StyleRole::Heading3 => "heading3",
            StyleRole::Body => "body",
            StyleRole::ListItem => "list_item",
            StyleRole::TableCell => "table_cell",
            StyleRole::TableHeader => "table_header",
        }
    }
}

impl std::fmt::Display for StyleRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Left-aligned (default)
    #[default]
    Left,
    /// Centered
    Center,
    /// Right-aligned
    Right,
    /// Justified
    Justify,
}

/// How text of one role is styled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    /// Font family name
    pub font_family: String,
    /// Font size in points
    pub size: f32,
    /// Bold weight
    pub bold: bool,
    /// Italic style
    pub italic: bool,
    /// Text color as `#RRGGBB`; `None` means the renderer default (black)
    pub color: Option<String>,
    /// Paragraph alignment
    pub alignment: Alignment,
    /// Space before the paragraph, in points
    pub space_before: f32,
    /// Space after the paragraph, in points
    pub space_after: f32,
}

impl StyleRule {
    /// Create a plain rule for a family and size.
    pub fn new(font_family: impl Into<String>, size: f32) -> Self {
        Self {
            font_family: font_family.into(),
            size,
            bold: false,
            italic: false,
            color: None,
            alignment: Alignment::Left,
            space_before: 0.0,
            space_after: 0.0,
        }
    }

    /// Set bold.
    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Set italic.
    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    /// Set alignment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set paragraph spacing.
    pub fn with_spacing(mut self, before: f32, after: f32) -> Self {
        self.space_before = before;
        self.space_after = after;
        self
    }

    /// The rule used when neither the role nor any fallback role is defined:
    /// 12pt regular Times New Roman.
    pub fn hard_default() -> Self {
        Self::new("Times New Roman", 12.0).with_spacing(0.0, 6.0)
    }
}

/// Where a running header or footer sits on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Horizontal alignment within the content width
    pub alignment: Alignment,
    /// Distance of the text baseline from the nearest page edge (top for
    /// headers, bottom for footers), in points
    pub offset: f32,
}

/// Running header or footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooter {
    /// Text, possibly containing `{page}` / `{pages}` placeholders
    pub text: String,
    /// Position on the page
    pub position: Placement,
    /// Text style
    pub style: StyleRule,
    /// Whether the text carries a page number placeholder
    pub page_number: bool,
}

impl HeaderFooter {
    /// Create a header/footer; the page-number flag follows the text.
    pub fn new(text: impl Into<String>, position: Placement, style: StyleRule) -> Self {
        let text = text.into();
        let page_number = text.contains(PAGE_PLACEHOLDER) || text.contains(PAGES_PLACEHOLDER);
        Self {
            text,
            position,
            style,
            page_number,
        }
    }

    /// Text for a given page with placeholders substituted.
    pub fn render(&self, page: u32, total: u32) -> String {
        self.text
            .replace(PAGE_PLACEHOLDER, &page.to_string())
            .replace(PAGES_PLACEHOLDER, &total.to_string())
    }
}

/// Border drawing of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderStyle {
    /// No ruling
    None,
    /// Single lines around every cell
    #[default]
    Single,
}

/// Shape and styling of one template table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Number of columns
    pub columns: usize,
    /// Number of rows observed in the template (informational)
    pub rows: usize,
    /// Whether row 0 is a header row
    pub has_header_row: bool,
    /// Border drawing
    pub border: BorderStyle,
    /// Style role for body cells
    pub cell_style: StyleRole,
    /// Style role for header cells
    pub header_style: StyleRole,
}

impl TableSchema {
    /// Create a schema with default cell roles.
    pub fn new(columns: usize, rows: usize, has_header_row: bool, border: BorderStyle) -> Self {
        Self {
            columns,
            rows,
            has_header_row,
            border,
            cell_style: StyleRole::TableCell,
            header_style: StyleRole::TableHeader,
        }
    }
}

/// Page breaks observed in the template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageBreaks {
    /// Number of breaks
    pub count: usize,
    /// Break positions: page numbers a break follows (PDF) or paragraph
    /// indices a break precedes (DOCX)
    pub positions: Vec<u32>,
}

impl PageBreaks {
    /// Build from positions.
    pub fn from_positions(positions: Vec<u32>) -> Self {
        Self {
            count: positions.len(),
            positions,
        }
    }
}

/// Compact description of a stored model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Page width in points
    pub page_width: f32,
    /// Page height in points
    pub page_height: f32,
    /// Orientation
    pub orientation: Orientation,
    /// Margins
    pub margins: Margins,
    /// Font family names
    pub fonts: Vec<String>,
    /// Roles with a style rule
    pub roles: Vec<StyleRole>,
    /// Whether a header is present
    pub has_header: bool,
    /// Whether a footer is present
    pub has_footer: bool,
    /// Number of table schemas
    pub table_count: usize,
    /// Source page count
    pub page_count: u32,
    /// Observed page breaks
    pub page_break_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> NormalizedTemplateModel {
        let mut model = NormalizedTemplateModel::new(PageSetup::a4());
        model.observe_font("Helvetica", 12.0);
        model.observe_font("Helvetica", 24.0);
        model.set_style(StyleRole::Body, StyleRule::new("Helvetica", 12.0));
        model.set_style(StyleRole::Heading1, StyleRule::new("Helvetica", 24.0).bold(true));
        model
    }

    #[test]
    fn test_page_setup_orientation() {
        assert_eq!(PageSetup::letter().orientation, Orientation::Portrait);
        let landscape = PageSetup::new(842.0, 595.0, Margins::uniform(36.0));
        assert_eq!(landscape.orientation, Orientation::Landscape);
    }

    #[test]
    fn test_margin_invariants() {
        let ok = PageSetup::letter();
        assert!(ok.is_valid());

        let mut wide = PageSetup::letter();
        wide.margins.left = 400.0;
        wide.margins.right = 300.0;
        assert!(!wide.is_valid());

        let mut negative = PageSetup::letter();
        negative.margins.top = -1.0;
        assert!(!negative.is_valid());
    }

    #[test]
    fn test_font_usage_range() {
        let model = sample_model();
        let font = model.font("helvetica").unwrap();
        assert_eq!(font.min_size, 12.0);
        assert_eq!(font.max_size, 24.0);
        assert_eq!(font.occurrences, 2);
    }

    #[test]
    fn test_header_family_must_be_known() {
        let mut model = sample_model();
        assert!(model.is_valid());

        model.header = Some(HeaderFooter::new(
            "ACME Corp",
            Placement {
                alignment: Alignment::Center,
                offset: 36.0,
            },
            StyleRule::new("Courier", 9.0),
        ));
        let problems = model.check_invariants();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("Courier"));
    }

    #[test]
    fn test_spacing_and_font_ranges_checked() {
        let mut model = sample_model();
        model.set_style(
            StyleRole::Body,
            StyleRule::new("Helvetica", 12.0).with_spacing(-2.0, f32::NAN),
        );
        if let Some(font) = model.fonts.iter_mut().find(|f| f.family.eq_ignore_ascii_case("helvetica")) {
            font.min_size = 0.0;
        }

        let problems = model.check_invariants();
        assert!(problems.iter().any(|p| p.contains("invalid space")), "{:?}", problems);
        assert!(problems.iter().any(|p| p.contains("invalid size range")), "{:?}", problems);

        let mut footer_model = sample_model();
        footer_model.footer = Some(HeaderFooter::new(
            "x",
            Placement {
                alignment: Alignment::Left,
                offset: 20.0,
            },
            StyleRule::new("Helvetica", f32::INFINITY),
        ));
        let problems = footer_model.check_invariants();
        assert!(problems.iter().any(|p| p.starts_with("footer has invalid size")));
    }

    #[test]
    fn test_header_footer_render() {
        let footer = HeaderFooter::new(
            "Page {page} of {pages}",
            Placement {
                alignment: Alignment::Center,
                offset: 30.0,
            },
            StyleRule::new("Helvetica", 9.0),
        );
        assert!(footer.page_number);
        assert_eq!(footer.render(2, 5), "Page 2 of 5");
    }

    #[test]
    fn test_role_serialization_names() {
        let json = serde_json::to_string(&StyleRole::ListItem).unwrap();
        assert_eq!(json, "\"list_item\"");
        let model = sample_model();
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"heading1\""));
        let back: NormalizedTemplateModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_heading_role_clamp() {
        assert_eq!(StyleRole::heading(1), StyleRole::Heading1);
        assert_eq!(StyleRole::heading(3), StyleRole::Heading3);
        assert_eq!(StyleRole::heading(6), StyleRole::Heading3);
    }
}
