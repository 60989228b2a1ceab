//! Extraction options.

/// Tunable thresholds for role inference and page geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Size ratio to the body size from which a run is a level-1 heading
    pub heading1_ratio: f32,

    /// Size ratio to the body size from which a run is a level-2 heading
    pub heading2_ratio: f32,

    /// Points above the body size from which a run is a level-3 heading
    pub heading3_min_delta: f32,

    /// Margin used when the source states none or states impossible ones
    pub default_margin: f32,
}

impl ExtractOptions {
    /// Create new extraction options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level-1 heading ratio.
    pub fn with_heading1_ratio(mut self, ratio: f32) -> Self {
        self.heading1_ratio = ratio.max(1.0);
        self
    }

    /// Set the level-2 heading ratio.
    pub fn with_heading2_ratio(mut self, ratio: f32) -> Self {
        self.heading2_ratio = ratio.max(1.0);
        self
    }

    /// Set the level-3 heading delta in points.
    pub fn with_heading3_min_delta(mut self, delta: f32) -> Self {
        self.heading3_min_delta = delta.max(0.0);
        self
    }

    /// Set the fallback margin in points.
    pub fn with_default_margin(mut self, margin: f32) -> Self {
        self.default_margin = margin.max(0.0);
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            heading1_ratio: 1.3,
            heading2_ratio: 1.15,
            heading3_min_delta: 0.5,
            default_margin: 72.0,
        }
    }
}
