//! Role classification.
//!
//! Each [`RoleClassifier`] either assigns a role to a run or has no opinion.
//! The [`ClassifierChain`] asks them in priority order and the first
//! opinion wins; runs nobody claims are body text.

use std::sync::OnceLock;

use regex::Regex;

use super::options::ExtractOptions;
use super::stats::FontStatistics;
use crate::model::{RawRun, RawTable, Region, StyleRole};

/// Outcome of one classifier for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The run has this role
    Assign(StyleRole),
    /// The run takes no part in role styling (running header/footer text)
    Exclude,
    /// Let the next classifier decide
    NoOpinion,
}

/// Document-wide facts the classifiers may consult.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Body size statistics
    pub stats: &'a FontStatistics,
    /// Thresholds
    pub options: &'a ExtractOptions,
    /// Tables of the document, indexed by `RawRun::table_cell`
    pub tables: &'a [RawTable],
    /// Index of the last body-sized run of the main text flow
    pub last_body_run: Option<usize>,
}

/// One heuristic of the classifier chain.
pub trait RoleClassifier: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Classify the run at `index`.
    fn classify(&self, index: usize, run: &RawRun, ctx: &ClassifyContext<'_>) -> Verdict;
}

/// Named paragraph styles ("Heading 1", "Title", "List Bullet").
#[derive(Debug, Default)]
pub struct StyleNameClassifier;

fn heading_style_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^heading\s*(\d)$").expect("valid heading style regex"))
}

impl RoleClassifier for StyleNameClassifier {
    fn name(&self) -> &'static str {
        "style-name"
    }

    fn classify(&self, _index: usize, run: &RawRun, _ctx: &ClassifyContext<'_>) -> Verdict {
        let Some(name) = run.style_name.as_deref().map(str::trim) else {
            return Verdict::NoOpinion;
        };
        if let Some(level) = heading_style_regex()
            .captures(name)
            .and_then(|c| c[1].parse::<u8>().ok())
        {
            return Verdict::Assign(StyleRole::heading(level));
        }

        let lower = name.to_lowercase();
        match lower.as_str() {
            "title" => Verdict::Assign(StyleRole::Heading1),
            "subtitle" => Verdict::Assign(StyleRole::Heading2),
            "normal" | "body text" | "default paragraph font" => Verdict::Assign(StyleRole::Body),
            _ if lower.starts_with("list") || lower.contains("bullet") => {
                Verdict::Assign(StyleRole::ListItem)
            }
            _ => Verdict::NoOpinion,
        }
    }
}

/// Runs inside tables: header row or body cell.
#[derive(Debug, Default)]
pub struct TableRegionClassifier;

impl RoleClassifier for TableRegionClassifier {
    fn name(&self) -> &'static str {
        "table"
    }

    fn classify(&self, _index: usize, run: &RawRun, ctx: &ClassifyContext<'_>) -> Verdict {
        match run.table_cell {
            Some((table, 0)) if ctx.tables.get(table).map_or(false, |t| t.has_header_row) => {
                Verdict::Assign(StyleRole::TableHeader)
            }
            Some(_) => Verdict::Assign(StyleRole::TableCell),
            None => Verdict::NoOpinion,
        }
    }
}

/// Text noticeably larger than body text, placed before body text.
#[derive(Debug, Default)]
pub struct SizeClassifier;

impl RoleClassifier for SizeClassifier {
    fn name(&self) -> &'static str {
        "size"
    }

    fn classify(&self, index: usize, run: &RawRun, ctx: &ClassifyContext<'_>) -> Verdict {
        let Some(size) = run.font_size else {
            return Verdict::NoOpinion;
        };
        if run.region != Region::Body || ctx.last_body_run.map_or(true, |last| index >= last) {
            return Verdict::NoOpinion;
        }

        let body = ctx.stats.body_size;
        let options = ctx.options;
        if size >= body * options.heading1_ratio {
            Verdict::Assign(StyleRole::Heading1)
        } else if size >= body * options.heading2_ratio {
            Verdict::Assign(StyleRole::Heading2)
        } else if size > body + options.heading3_min_delta {
            Verdict::Assign(StyleRole::Heading3)
        } else {
            Verdict::NoOpinion
        }
    }
}

/// Runs the reader placed in a running header or footer.
#[derive(Debug, Default)]
pub struct PositionClassifier;

impl RoleClassifier for PositionClassifier {
    fn name(&self) -> &'static str {
        "position"
    }

    fn classify(&self, _index: usize, run: &RawRun, _ctx: &ClassifyContext<'_>) -> Verdict {
        match run.region {
            Region::Header | Region::Footer => Verdict::Exclude,
            Region::Body => Verdict::NoOpinion,
        }
    }
}

/// Numbered paragraphs and lines opening with a list marker.
#[derive(Debug, Default)]
pub struct ListMarkerClassifier;

fn list_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[•·▪◦‣○●■□►▸\-*+–]|\d{1,3}[.)]|[a-zA-Z][.)])\s+\S")
            .expect("valid list marker regex")
    })
}

impl RoleClassifier for ListMarkerClassifier {
    fn name(&self) -> &'static str {
        "list-marker"
    }

    fn classify(&self, _index: usize, run: &RawRun, _ctx: &ClassifyContext<'_>) -> Verdict {
        if run.numbered || list_marker_regex().is_match(&run.text) {
            Verdict::Assign(StyleRole::ListItem)
        } else {
            Verdict::NoOpinion
        }
    }
}

/// Ordered list of classifiers.
pub struct ClassifierChain {
    classifiers: Vec<Box<dyn RoleClassifier>>,
}

impl ClassifierChain {
    /// An empty chain: every run is body text.
    pub fn empty() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }

    /// Append a classifier with the lowest priority so far.
    pub fn with(mut self, classifier: impl RoleClassifier + 'static) -> Self {
        self.classifiers.push(Box::new(classifier));
        self
    }

    /// Names of the classifiers, in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.classifiers.iter().map(|c| c.name()).collect()
    }

    /// Classify a run. `None` means the run is excluded from role styling.
    pub fn classify(&self, index: usize, run: &RawRun, ctx: &ClassifyContext<'_>) -> Option<StyleRole> {
        for classifier in &self.classifiers {
            match classifier.classify(index, run, ctx) {
                Verdict::Assign(role) => {
                    log::trace!("run {} -> {} ({})", index, role, classifier.name());
                    return Some(role);
                }
                Verdict::Exclude => return None,
                Verdict::NoOpinion => {}
            }
        }
        Some(StyleRole::Body)
    }
}

impl Default for ClassifierChain {
    fn default() -> Self {
        Self::empty()
            .with(StyleNameClassifier)
            .with(TableRegionClassifier)
            .with(SizeClassifier)
            .with(PositionClassifier)
            .with(ListMarkerClassifier)
    }
}

impl std::fmt::Debug for ClassifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
