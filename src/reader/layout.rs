//! Positioned text on a PDF page: spans, lines and ruled lines.

use crate::fonts::{self, StandardFamily};
use crate::model::BoundingBox;

/// A text span with position and style information.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Estimated width of the text
    pub width: f32,
    /// Font size in points (after text and graphics scaling)
    pub font_size: f32,
    /// Base font name (e.g. "ABCDEF+Helvetica-Bold")
    pub font_name: String,
    /// Whether the font appears to be bold
    pub is_bold: bool,
    /// Whether the font appears to be italic
    pub is_italic: bool,
    /// Fill color as `#RRGGBB`, `None` for black
    pub color: Option<String>,
}

impl TextSpan {
    /// Create a span; weight and width are derived from the font name.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        let name = fonts::parse_font_name(&font_name);
        let width = fonts::text_width(
            &text,
            StandardFamily::for_family(&name.family),
            name.bold,
            font_size,
        );
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_name,
            is_bold: name.bold,
            is_italic: name.italic,
            color: None,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Approximate bottom (descender).
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    /// Approximate top (ascender).
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    /// Bounding box.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.bottom(), self.right(), self.top())
    }

    /// Same font, size, weight and color.
    pub fn same_style(&self, other: &TextSpan) -> bool {
        self.font_name == other.font_name
            && (self.font_size - other.font_size).abs() < 0.05
            && self.is_bold == other.is_bold
            && self.is_italic == other.is_italic
            && self.color == other.color
    }
}

/// Spans sharing a baseline, sorted left to right.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line
    pub spans: Vec<TextSpan>,
    /// Baseline
    pub y: f32,
    /// Dominant font size (weighted by text length)
    pub font_size: f32,
}

impl TextLine {
    /// Build a line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.total_cmp(&b.x));

        let total_chars: usize = spans.iter().map(|s| s.text.len()).sum();
        let weighted: f32 = spans
            .iter()
            .map(|s| s.font_size * s.text.len() as f32)
            .sum();
        let font_size = if total_chars > 0 {
            weighted / total_chars as f32
        } else {
            spans.first().map(|s| s.font_size).unwrap_or(0.0)
        };
        let y = spans.first().map(|s| s.y).unwrap_or(0.0);

        Self {
            spans,
            y,
            font_size,
        }
    }

    /// Left edge.
    pub fn left(&self) -> f32 {
        self.spans.first().map(|s| s.x).unwrap_or(0.0)
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.spans.iter().map(|s| s.right()).fold(f32::MIN, f32::max)
    }

    /// Highest ascender.
    pub fn top(&self) -> f32 {
        self.spans.iter().map(|s| s.top()).fold(f32::MIN, f32::max)
    }

    /// Lowest descender.
    pub fn bottom(&self) -> f32 {
        self.spans.iter().map(|s| s.bottom()).fold(f32::MAX, f32::min)
    }

    /// Bounding box of the whole line.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.left(), self.bottom(), self.right(), self.top())
    }

    /// Combined text with gap-based spacing.
    pub fn text(&self) -> String {
        join_spans(self.spans.iter())
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold_chars: usize = self
            .spans
            .iter()
            .filter(|s| s.is_bold)
            .map(|s| s.text.len())
            .sum();
        let total_chars: usize = self.spans.iter().map(|s| s.text.len()).sum();
        total_chars > 0 && bold_chars as f32 / total_chars as f32 > 0.5
    }

    /// Split the line into cells at gaps of at least `min_gap` points.
    /// Each cell is a range of span indices.
    pub fn cells(&self, min_gap: f32) -> Vec<std::ops::Range<usize>> {
        let mut cells = Vec::new();
        let mut start = 0;
        for i in 1..self.spans.len() {
            if self.spans[i].x - self.spans[i - 1].right() >= min_gap {
                cells.push(start..i);
                start = i;
            }
        }
        if !self.spans.is_empty() {
            cells.push(start..self.spans.len());
        }
        cells
    }
}

/// Join spans into text, inserting a space where the gap between two spans
/// is wider than a fraction of a character. Scripts written without word
/// spaces never get one inserted.
pub fn join_spans<'a>(spans: impl IntoIterator<Item = &'a TextSpan>) -> String {
    let mut result = String::new();
    let mut prev: Option<&TextSpan> = None;

    for span in spans {
        if let Some(prev_span) = prev {
            let gap = span.x - prev_span.right();
            let char_count = span.text.chars().count();
            let avg_char_width = if char_count > 0 && span.width > 0.0 {
                span.width / char_count as f32
            } else {
                span.font_size * 0.5
            };

            let both_spaceless = prev_span
                .text
                .chars()
                .last()
                .map(is_spaceless_script_char)
                .unwrap_or(false)
                && span
                    .text
                    .chars()
                    .next()
                    .map(is_spaceless_script_char)
                    .unwrap_or(false);
            let has_space = prev_span.text.ends_with([' ', '\u{00A0}'])
                || span.text.starts_with([' ', '\u{00A0}']);

            if gap > avg_char_width * 0.2 && !both_spaceless && !has_space {
                result.push(' ');
            }
        }
        result.push_str(&span.text);
        prev = Some(span);
    }

    result
}

/// Group spans into lines by baseline, top to bottom.
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in spans {
        let tolerance = span.font_size * 0.3;
        match current_y {
            Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                }
                current_y = Some(span.y);
                current.push(span);
            }
        }
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }

    lines
}

/// A straight ruled line drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    /// Extent of the line
    pub bbox: BoundingBox,
}

impl Rule {
    /// Rules thinner than this are lines; anything thicker is an area fill.
    const MAX_THICKNESS: f32 = 2.5;

    /// Create a rule if the box is thin enough to be a line.
    pub fn from_box(bbox: BoundingBox) -> Option<Self> {
        let height = bbox.y1 - bbox.y0;
        if bbox.width() <= Self::MAX_THICKNESS || height <= Self::MAX_THICKNESS {
            Some(Self { bbox })
        } else {
            None
        }
    }

    /// Check if the rule runs horizontally.
    pub fn is_horizontal(&self) -> bool {
        self.bbox.width() > self.bbox.y1 - self.bbox.y0
    }
}

/// Check if a character comes from a script that doesn't use word spaces
/// (Chinese, Japanese). Hangul is excluded: Korean uses spaces.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x309F).contains(&code)
        || (0x30A0..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text.to_string(), x, y, 12.0, "Helvetica".to_string())
    }

    #[test]
    fn test_span_weight_from_font_name() {
        let s = TextSpan::new("A".into(), 0.0, 0.0, 12.0, "ABCDEF+Arial-BoldItalic".into());
        assert!(s.is_bold);
        assert!(s.is_italic);
        assert!(s.width > 0.0);
    }

    #[test]
    fn test_group_into_lines() {
        let lines = group_spans_into_lines(vec![
            span("world", 60.0, 700.0),
            span("second", 10.0, 680.0),
            span("Hello", 10.0, 700.5),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello world");
        assert_eq!(lines[1].text(), "second");
    }

    #[test]
    fn test_join_adjacent_spans_without_space() {
        let a = span("Hel", 10.0, 700.0);
        let b = span("lo", a.right(), 700.0);
        assert_eq!(join_spans([&a, &b]), "Hello");
    }

    #[test]
    fn test_line_cells() {
        let line = TextLine::from_spans(vec![
            span("Name", 72.0, 500.0),
            span("Qty", 250.0, 500.0),
            span("Price", 400.0, 500.0),
        ]);
        let cells = line.cells(15.0);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[1], 1..2);
    }

    #[test]
    fn test_rule_from_box() {
        assert!(Rule::from_box(BoundingBox::new(72.0, 500.0, 540.0, 500.5)).is_some());
        assert!(Rule::from_box(BoundingBox::new(72.0, 500.0, 540.0, 600.0)).is_none());
        let rule = Rule::from_box(BoundingBox::new(72.0, 500.0, 540.0, 501.0)).unwrap();
        assert!(rule.is_horizontal());
    }
}
