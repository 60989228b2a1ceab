//! Table detection from text positions.
//!
//! A table is a run of consecutive lines that each split into at least two
//! gap-separated cells, where every cell of a following row falls under a
//! column established by the first row.

use super::layout::TextLine;

/// A detected table region.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    /// Index of the first line of the table
    pub first_line: usize,
    /// Index one past the last line of the table
    pub end_line: usize,
    /// Column extents (left, right), left to right
    pub columns: Vec<(f32, f32)>,
    /// Whether row 0 is styled differently from the rows below it
    pub has_header_row: bool,
    /// Top of the first row
    pub top: f32,
    /// Bottom of the last row
    pub bottom: f32,
}

impl DetectedTable {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.end_line - self.first_line
    }

    /// Check if a line index belongs to the table.
    pub fn contains_line(&self, index: usize) -> bool {
        (self.first_line..self.end_line).contains(&index)
    }

    /// Left edge of the first column.
    pub fn left(&self) -> f32 {
        self.columns.first().map(|c| c.0).unwrap_or(0.0)
    }

    /// Right edge of the last column.
    pub fn right(&self) -> f32 {
        self.columns.last().map(|c| c.1).unwrap_or(0.0)
    }
}

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
    /// Largest vertical gap between rows, in multiples of the font size
    pub max_row_gap: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 12,
            min_column_gap: 15.0,
            max_row_gap: 2.5,
        }
    }
}

/// Detects tables in the lines of one page.
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a detector with a custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables in lines sorted top to bottom.
    pub fn detect(&self, lines: &[TextLine]) -> Vec<DetectedTable> {
        let extents: Vec<Vec<(f32, f32)>> = lines
            .iter()
            .map(|line| {
                line.cells(self.config.min_column_gap)
                    .into_iter()
                    .map(|range| {
                        let spans = &line.spans[range];
                        let left = spans.first().map(|s| s.x).unwrap_or(0.0);
                        let right = spans.iter().map(|s| s.right()).fold(left, f32::max);
                        (left, right)
                    })
                    .collect()
            })
            .collect();

        let mut tables = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if extents[i].len() < self.config.min_columns {
                i += 1;
                continue;
            }

            let mut columns = extents[i].clone();
            let mut j = i + 1;
            while j < lines.len() && self.continues(&lines[j - 1], &lines[j], &extents[j], &columns) {
                merge_columns(&mut columns, &extents[j]);
                j += 1;
            }

            let rows = j - i;
            if rows >= self.config.min_rows
                && columns.len() <= self.config.max_columns
                && !is_list_pattern(&lines[i..j], self.config.min_column_gap)
            {
                log::debug!(
                    "TableDetector: {} rows x {} columns at lines {}..{}",
                    rows,
                    columns.len(),
                    i,
                    j
                );
                tables.push(DetectedTable {
                    first_line: i,
                    end_line: j,
                    has_header_row: rows > 1 && header_row_differs(&lines[i], &lines[i + 1]),
                    top: lines[i].top(),
                    bottom: lines[j - 1].bottom(),
                    columns,
                });
                i = j;
            } else {
                i += 1;
            }
        }

        tables
    }

    fn continues(
        &self,
        prev: &TextLine,
        line: &TextLine,
        cells: &[(f32, f32)],
        columns: &[(f32, f32)],
    ) -> bool {
        if cells.len() < self.config.min_columns || cells.len() > columns.len() {
            return false;
        }
        let gap = prev.bottom() - line.top();
        if gap > prev.font_size.max(line.font_size) * self.config.max_row_gap {
            return false;
        }
        let slack = self.config.min_column_gap / 2.0;
        cells.iter().all(|(left, right)| {
            columns
                .iter()
                .any(|(c_left, c_right)| *left <= c_right + slack && *right >= c_left - slack)
        })
    }
}

impl Default for TableDetector {
    fn default() -> Self {
        Self::with_config(TableDetectorConfig::default())
    }
}

/// Widen each column to cover the matching cells of a new row.
fn merge_columns(columns: &mut [(f32, f32)], cells: &[(f32, f32)]) {
    for (left, right) in cells {
        if let Some(column) = columns
            .iter_mut()
            .find(|(c_left, c_right)| *left <= *c_right && *right >= *c_left)
        {
            column.0 = column.0.min(*left);
            column.1 = column.1.max(*right);
        }
    }
}

/// Row 0 is a header row when its weight, size or font differs from row 1.
fn header_row_differs(first: &TextLine, second: &TextLine) -> bool {
    if first.is_bold() != second.is_bold() {
        return first.is_bold();
    }
    if (first.font_size - second.font_size).abs() > 0.5 {
        return true;
    }
    match (first.spans.first(), second.spans.first()) {
        (Some(a), Some(b)) => a.font_name != b.font_name,
        _ => false,
    }
}

/// A numbered or bulleted list often splits into "marker | text" cells.
fn is_list_pattern(lines: &[TextLine], min_gap: f32) -> bool {
    let marked = lines
        .iter()
        .filter(|line| {
            line.cells(min_gap)
                .first()
                .map(|range| {
                    let text = super::layout::join_spans(&line.spans[range.clone()]);
                    is_bullet_marker(&text) || is_number_marker(&text)
                })
                .unwrap_or(false)
        })
        .count();
    marked * 2 >= lines.len()
}

/// Check if text is a bullet marker (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "□" | "◆" | "▶" | "➤"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    let mut chars = cleaned.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(letter), Some('.' | ')'), None) if letter.is_alphabetic()
    )
}

#[cfg(test)]
mod tests {
    use super::super::layout::TextSpan;
    use super::*;

    fn line(cells: &[(&str, f32)], y: f32, font: &str) -> TextLine {
        TextLine::from_spans(
            cells
                .iter()
                .map(|(text, x)| TextSpan::new(text.to_string(), *x, y, 10.0, font.to_string()))
                .collect(),
        )
    }

    fn grid() -> Vec<TextLine> {
        vec![
            line(&[("Introduction paragraph text", 72.0)], 640.0, "Helvetica"),
            line(&[("Item", 72.0), ("Qty", 250.0), ("Price", 400.0)], 600.0, "Helvetica-Bold"),
            line(&[("Apples", 72.0), ("3", 250.0), ("1.20", 400.0)], 586.0, "Helvetica"),
            line(&[("Pears", 72.0), ("10", 250.0), ("0.80", 400.0)], 572.0, "Helvetica"),
            line(&[("Closing remarks", 72.0)], 540.0, "Helvetica"),
        ]
    }

    #[test]
    fn test_detect_simple_table() {
        let tables = TableDetector::default().detect(&grid());
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.first_line, 1);
        assert_eq!(table.rows(), 3);
        assert_eq!(table.columns.len(), 3);
        assert!(table.has_header_row);
        assert!(table.contains_line(3));
        assert!(!table.contains_line(4));
    }

    #[test]
    fn test_no_table_single_column() {
        let lines = vec![
            line(&[("One", 72.0)], 600.0, "Helvetica"),
            line(&[("Two", 72.0)], 586.0, "Helvetica"),
        ];
        assert!(TableDetector::default().detect(&lines).is_empty());
    }

    #[test]
    fn test_rows_far_apart_are_not_one_table() {
        let lines = vec![
            line(&[("A", 72.0), ("B", 300.0)], 600.0, "Helvetica"),
            line(&[("C", 72.0), ("D", 300.0)], 400.0, "Helvetica"),
        ];
        assert!(TableDetector::default().detect(&lines).is_empty());
    }

    #[test]
    fn test_numbered_list_not_detected_as_table() {
        let lines = vec![
            line(&[("1.", 72.0), ("First item", 100.0)], 600.0, "Helvetica"),
            line(&[("2.", 72.0), ("Second item", 100.0)], 586.0, "Helvetica"),
        ];
        assert!(TableDetector::default().detect(&lines).is_empty());
    }

    #[test]
    fn test_list_markers() {
        assert!(is_bullet_marker("•"));
        assert!(is_number_marker("12."));
        assert!(is_number_marker("a)"));
        assert!(!is_number_marker("Total"));
    }
}
