//! Reader options and configuration.

/// Options for reading template documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Fraction of the page height, from the top, searched for running headers
    pub header_band: f32,

    /// Fraction of the page height, from the bottom, searched for running footers
    pub footer_band: f32,

    /// Pages a line must repeat on to count as a header/footer
    pub min_repeat_pages: usize,

    /// Minimum horizontal gap between table columns (points)
    pub min_column_gap: f32,

    /// Minimum rows for a text grid to count as a table
    pub min_table_rows: usize,

    /// Whether to scan PDF pages in parallel
    pub parallel: bool,
}

impl ReadOptions {
    /// Create new read options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header band (fraction of page height).
    pub fn with_header_band(mut self, band: f32) -> Self {
        self.header_band = band.clamp(0.0, 0.5);
        self
    }

    /// Set the footer band (fraction of page height).
    pub fn with_footer_band(mut self, band: f32) -> Self {
        self.footer_band = band.clamp(0.0, 0.5);
        self
    }

    /// Set how many pages a header/footer line must repeat on.
    pub fn with_min_repeat_pages(mut self, pages: usize) -> Self {
        self.min_repeat_pages = pages.max(1);
        self
    }

    /// Set the minimum column gap for table detection.
    pub fn with_min_column_gap(mut self, gap: f32) -> Self {
        self.min_column_gap = gap;
        self
    }

    /// Set the minimum table row count.
    pub fn with_min_table_rows(mut self, rows: usize) -> Self {
        self.min_table_rows = rows.max(1);
        self
    }

    /// Enable or disable parallel page scanning.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel page scanning.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            header_band: 0.10,
            footer_band: 0.10,
            min_repeat_pages: 2,
            min_column_gap: 15.0,
            min_table_rows: 2,
            parallel: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_options_builder() {
        let options = ReadOptions::new()
            .with_header_band(0.15)
            .with_footer_band(0.9)
            .with_min_repeat_pages(0)
            .sequential();

        assert_eq!(options.header_band, 0.15);
        assert_eq!(options.footer_band, 0.5);
        assert_eq!(options.min_repeat_pages, 1);
        assert!(!options.parallel);
    }

    #[test]
    fn test_default_options() {
        let options = ReadOptions::default();
        assert_eq!(options.header_band, 0.10);
        assert_eq!(options.min_table_rows, 2);
        assert!(options.parallel);
    }
}
