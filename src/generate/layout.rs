//! Page layout for generated documents.
//!
//! A single pass over the blocks places wrapped lines on pages. The only
//! running state is the vertical cursor of the current page and the table
//! being filled. Running headers and footers are added once the page count
//! is known.

use super::resolve::StyleSheet;
use crate::fonts::{self, StandardFamily};
use crate::model::{
    Alignment, BorderStyle, ContentBlock, HeaderFooter, NormalizedTemplateModel, PageSetup,
    StyleRole, StyleRule, TableSchema,
};

/// Horizontal space reserved for list markers.
pub const LIST_INDENT: f32 = 18.0;

/// Padding inside table cells.
pub const CELL_PADDING: f32 = 4.0;

/// Standard font a text item is set in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontRef {
    /// Standard family
    pub family: StandardFamily,
    /// Bold face
    pub bold: bool,
    /// Italic face
    pub italic: bool,
}

impl FontRef {
    /// Standard font closest to a rule's family and weight.
    pub fn for_rule(rule: &StyleRule) -> Self {
        Self {
            family: StandardFamily::for_family(&rule.font_family),
            bold: rule.bold,
            italic: rule.italic,
        }
    }

    /// PostScript base font name.
    pub fn base_font(&self) -> &'static str {
        self.family.base_font(self.bold, self.italic)
    }

    /// Estimated width of text in this font.
    pub fn width(&self, text: &str, size: f32) -> f32 {
        fonts::text_width(text, self.family, self.bold, size)
    }
}

/// A line of text placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    /// Left edge
    pub x: f32,
    /// Baseline
    pub y: f32,
    /// Text
    pub text: String,
    /// Font
    pub font: FontRef,
    /// Size in points
    pub size: f32,
    /// Fill color as `#RRGGBB`
    pub color: Option<String>,
    /// Extra space added to each space character (justified lines)
    pub word_spacing: f32,
}

/// A stroked straight line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleItem {
    /// Start x
    pub x0: f32,
    /// Start y
    pub y0: f32,
    /// End x
    pub x1: f32,
    /// End y
    pub y1: f32,
}

/// One laid-out page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutPage {
    /// Page number (1-indexed)
    pub number: u32,
    /// Text lines
    pub texts: Vec<TextItem>,
    /// Ruled lines
    pub rules: Vec<RuleItem>,
}

impl LaidOutPage {
    fn new(number: u32) -> Self {
        Self {
            number,
            ..Default::default()
        }
    }

    /// Check if nothing is placed on the page.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty() && self.rules.is_empty()
    }
}

/// Result of laying out a block sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Pages, at least one
    pub pages: Vec<LaidOutPage>,
    /// Degradations (padded table rows and the like)
    pub warnings: Vec<String>,
}

/// Lay out blocks on the model's pages.
pub fn layout(
    model: &NormalizedTemplateModel,
    styles: &StyleSheet,
    blocks: &[ContentBlock],
    line_spacing: f32,
) -> Layout {
    let mut engine = LayoutEngine::new(model.page, styles, &model.tables, line_spacing);

    let mut i = 0;
    while i < blocks.len() {
        if blocks[i].is_table_row() {
            let start = i;
            while i < blocks.len() && blocks[i].is_table_row() {
                i += 1;
            }
            engine.ordered = 0;
            engine.table(&blocks[start..i]);
            continue;
        }
        engine.block(&blocks[i]);
        i += 1;
    }

    let mut pages = engine.pages;
    let total = pages.len() as u32;
    for page in &mut pages {
        if let Some(header) = &model.header {
            place_running(page, header, &model.page, total, true);
        }
        if let Some(footer) = &model.footer {
            place_running(page, footer, &model.page, total, false);
        }
    }

    Layout {
        pages,
        warnings: engine.warnings,
    }
}

struct LayoutEngine<'a> {
    page: PageSetup,
    styles: &'a StyleSheet,
    tables: &'a [TableSchema],
    line_spacing: f32,
    pages: Vec<LaidOutPage>,
    cursor: f32,
    table_index: usize,
    ordered: u32,
    warnings: Vec<String>,
}

impl<'a> LayoutEngine<'a> {
    fn new(
        page: PageSetup,
        styles: &'a StyleSheet,
        tables: &'a [TableSchema],
        line_spacing: f32,
    ) -> Self {
        Self {
            page,
            styles,
            tables,
            line_spacing: line_spacing.max(1.0),
            pages: vec![LaidOutPage::new(1)],
            cursor: page.height - page.margins.top,
            table_index: 0,
            ordered: 0,
            warnings: Vec::new(),
        }
    }

    fn left(&self) -> f32 {
        self.page.margins.left
    }

    fn right(&self) -> f32 {
        self.page.width - self.page.margins.right
    }

    fn top(&self) -> f32 {
        self.page.height - self.page.margins.top
    }

    fn bottom(&self) -> f32 {
        self.page.margins.bottom
    }

    fn current(&mut self) -> &mut LaidOutPage {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn at_page_top(&self) -> bool {
        self.pages.last().map_or(true, |p| p.is_empty())
    }

    fn new_page(&mut self) {
        let number = self.pages.len() as u32 + 1;
        self.pages.push(LaidOutPage::new(number));
        self.cursor = self.top();
    }

    /// Start a new page unless `height` still fits. A fresh page always
    /// takes the content, even if it overflows.
    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height < self.bottom() && !self.at_page_top() {
            self.new_page();
        }
    }

    fn block(&mut self, block: &ContentBlock) {
        match block {
            ContentBlock::Heading { level, text } => {
                self.ordered = 0;
                self.text_block(text, StyleRole::heading(*level), None);
            }
            ContentBlock::Paragraph { text } => {
                self.ordered = 0;
                self.text_block(text, StyleRole::Body, None);
            }
            ContentBlock::ListItem { ordered, text } => {
                let marker = if *ordered {
                    self.ordered += 1;
                    format!("{}.", self.ordered)
                } else {
                    self.ordered = 0;
                    "\u{2022}".to_string()
                };
                self.text_block(text, StyleRole::ListItem, Some(marker));
            }
            ContentBlock::PageBreak => {
                self.ordered = 0;
                if !self.at_page_top() {
                    self.new_page();
                }
            }
            ContentBlock::TableRow { .. } => self.table(std::slice::from_ref(block)),
        }
    }

    fn text_block(&mut self, text: &str, role: StyleRole, marker: Option<String>) {
        let rule = self.styles.rule(role).clone();
        let font = FontRef::for_rule(&rule);
        let size = rule.size.max(1.0);
        let line_height = size * self.line_spacing;
        let indent = if marker.is_some() { LIST_INDENT } else { 0.0 };
        let left = self.left() + indent;
        let width = (self.right() - left).max(size);

        if !self.at_page_top() {
            self.cursor -= rule.space_before;
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let lines = wrap(&text, font, size, width);
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            self.ensure_space(line_height);
            let baseline = self.cursor - size;
            let line_width = font.width(line, size);

            let (x, word_spacing) = match rule.alignment {
                Alignment::Left => (left, 0.0),
                Alignment::Center => (left + (width - line_width).max(0.0) / 2.0, 0.0),
                Alignment::Right => (left + (width - line_width).max(0.0), 0.0),
                Alignment::Justify => {
                    let spaces = line.matches(' ').count();
                    if i < last && spaces > 0 {
                        (left, ((width - line_width) / spaces as f32).clamp(0.0, size))
                    } else {
                        (left, 0.0)
                    }
                }
            };

            if i == 0 {
                if let Some(marker) = &marker {
                    let marker_x = (left - font.width(marker, size) - 4.0).max(self.left());
                    self.push_text(marker_x, baseline, marker.clone(), font, size, &rule, 0.0);
                }
            }
            self.push_text(x, baseline, line.clone(), font, size, &rule, word_spacing);
            self.cursor -= line_height;
        }
        self.cursor -= rule.space_after;
    }

    #[allow(clippy::too_many_arguments)]
    fn push_text(
        &mut self,
        x: f32,
        y: f32,
        text: String,
        font: FontRef,
        size: f32,
        rule: &StyleRule,
        word_spacing: f32,
    ) {
        let color = rule.color.clone();
        self.current().texts.push(TextItem {
            x,
            y,
            text,
            font,
            size,
            color,
            word_spacing,
        });
    }

    fn table(&mut self, rows: &[ContentBlock]) {
        let number = self.table_index;
        self.table_index += 1;
        let schema = self.tables.get(number).or(self.tables.last()).cloned();

        let first_width = rows.first().map(row_len).unwrap_or(0);
        let columns = schema
            .as_ref()
            .map(|s| s.columns)
            .filter(|c| *c > 0)
            .unwrap_or(first_width)
            .max(1);
        let has_header = schema.as_ref().map_or(true, |s| s.has_header_row);
        let border = schema.as_ref().map_or(BorderStyle::Single, |s| s.border);
        let header_role = schema.as_ref().map_or(StyleRole::TableHeader, |s| s.header_style);
        let cell_role = schema.as_ref().map_or(StyleRole::TableCell, |s| s.cell_style);

        let mismatched = rows.iter().filter(|r| row_len(r) != columns).count();
        if mismatched > 0 {
            let message = format!(
                "table {}: {} row(s) padded or truncated to {} columns",
                number + 1,
                mismatched,
                columns
            );
            log::warn!("{}", message);
            self.warnings.push(message);
        }

        let column_width = (self.right() - self.left()) / columns as f32;
        let text_width = (column_width - 2.0 * CELL_PADDING).max(1.0);

        for (r, row) in rows.iter().enumerate() {
            let role = if r == 0 && has_header { header_role } else { cell_role };
            let rule = self.styles.rule(role).clone();
            let font = FontRef::for_rule(&rule);
            let size = rule.size.max(1.0);
            let line_height = size * self.line_spacing;

            let cells: &[String] = match row {
                ContentBlock::TableRow { cells } => cells,
                _ => &[],
            };
            let wrapped: Vec<Vec<String>> = (0..columns)
                .map(|c| {
                    let text = cells.get(c).map(String::as_str).unwrap_or("");
                    wrap(text, font, size, text_width)
                })
                .collect();
            let max_lines = wrapped.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let row_height = max_lines as f32 * line_height + 2.0 * CELL_PADDING;

            self.ensure_space(row_height);
            let top = self.cursor;
            for (c, lines) in wrapped.iter().enumerate() {
                let cell_left = self.left() + c as f32 * column_width + CELL_PADDING;
                for (i, line) in lines.iter().enumerate() {
                    let line_width = font.width(line, size);
                    let x = match rule.alignment {
                        Alignment::Center => cell_left + (text_width - line_width).max(0.0) / 2.0,
                        Alignment::Right => cell_left + (text_width - line_width).max(0.0),
                        Alignment::Left | Alignment::Justify => cell_left,
                    };
                    let baseline = top - CELL_PADDING - size - i as f32 * line_height;
                    self.push_text(x, baseline, line.clone(), font, size, &rule, 0.0);
                }
            }

            if border == BorderStyle::Single {
                let (left, right, bottom) = (self.left(), self.right(), top - row_height);
                let page = self.current();
                page.rules.push(RuleItem { x0: left, y0: top, x1: right, y1: top });
                page.rules.push(RuleItem { x0: left, y0: bottom, x1: right, y1: bottom });
                for c in 0..=columns {
                    let x = left + c as f32 * column_width;
                    page.rules.push(RuleItem { x0: x, y0: top, x1: x, y1: bottom });
                }
            }
            self.cursor = top - row_height;
        }

        self.cursor -= self.styles.rule(StyleRole::Body).space_after;
    }
}

fn row_len(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::TableRow { cells } => cells.len(),
        _ => 0,
    }
}

/// Place a running header (`top`) or footer on a page.
fn place_running(page: &mut LaidOutPage, running: &HeaderFooter, setup: &PageSetup, total: u32, top: bool) {
    let text = running.render(page.number, total);
    if text.trim().is_empty() {
        return;
    }
    let rule = &running.style;
    let font = FontRef::for_rule(rule);
    let size = rule.size.max(1.0);

    let edge_margin = if top { setup.margins.top } else { setup.margins.bottom };
    let offset = if running.position.offset > 0.0 {
        running.position.offset
    } else {
        edge_margin / 2.0
    };
    let baseline = if top {
        setup.height - offset.max(size)
    } else {
        offset.max(size * 0.25)
    };

    let left = setup.margins.left;
    let width = setup.content_width();
    let text_width = font.width(&text, size);
    let x = match running.position.alignment {
        Alignment::Left | Alignment::Justify => left,
        Alignment::Center => left + (width - text_width).max(0.0) / 2.0,
        Alignment::Right => left + (width - text_width).max(0.0),
    };

    page.texts.push(TextItem {
        x,
        y: baseline,
        text,
        font,
        size,
        color: rule.color.clone(),
        word_spacing: 0.0,
    });
}

/// Greedy word wrap. Words wider than a line are split between characters.
/// Empty text gives no lines.
pub fn wrap(text: &str, font: FontRef, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if font.width(&candidate, size) <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if font.width(word, size) <= max_width {
            current = word.to_string();
            continue;
        }

        for c in word.chars() {
            current.push(c);
            if font.width(&current, size) > max_width && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
