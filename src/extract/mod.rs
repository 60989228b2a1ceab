//! Template extraction: fold a [`RawStructure`] into a
//! [`NormalizedTemplateModel`].
//!
//! Extraction is deterministic. Gaps in the source (no header, no stated
//! margins, an unreadable table) never fail; they leave the field absent or
//! defaulted and add a warning.

mod classify;
mod options;
mod stats;

pub use classify::{
    ClassifierChain, ClassifyContext, ListMarkerClassifier, PositionClassifier, RoleClassifier,
    SizeClassifier, StyleNameClassifier, TableRegionClassifier, Verdict,
};
pub use options::ExtractOptions;
pub use stats::{FontStatistics, StyleVotes};

use std::collections::BTreeMap;

use crate::model::{
    HeaderFooter, Margins, NormalizedTemplateModel, Orientation, PageBreaks, PageSetup, Placement,
    RawHeaderFooter, RawRun, RawStructure, Region, StyleRole, StyleRule, TableSchema,
};

/// A model together with the degradations met while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The extracted model
    pub model: NormalizedTemplateModel,
    /// Non-fatal problems, reader warnings first
    pub warnings: Vec<String>,
}

/// Builds normalized models from raw structure.
#[derive(Debug)]
pub struct TemplateExtractor {
    options: ExtractOptions,
    chain: ClassifierChain,
}

impl TemplateExtractor {
    /// Create an extractor with the default classifier chain.
    pub fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            chain: ClassifierChain::default(),
        }
    }

    /// Replace the classifier chain.
    pub fn with_chain(mut self, chain: ClassifierChain) -> Self {
        self.chain = chain;
        self
    }

    /// Extraction options in use.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract a model, discarding warnings.
    pub fn extract(&self, raw: &RawStructure) -> NormalizedTemplateModel {
        self.extract_with_warnings(raw).model
    }

    /// Extract a model and report what had to be guessed.
    pub fn extract_with_warnings(&self, raw: &RawStructure) -> Extraction {
        let mut warnings = raw.warnings.clone();
        let mut warn = |message: String| {
            log::warn!("{}", message);
            warnings.push(message);
        };

        let mut model = NormalizedTemplateModel::new(self.page_setup(raw, &mut warn));
        model.page_count = raw.page_count().max(1);
        model.page_breaks = PageBreaks::from_positions(raw.page_breaks.clone());

        let unusable = raw
            .runs
            .iter()
            .filter(|r| r.font_size.is_some() && stats::run_size(r).is_none())
            .count();
        if unusable > 0 {
            warn(format!(
                "{} run(s) with an unusable font size were ignored",
                unusable
            ));
        }

        for run in &raw.runs {
            if let (Some((family, _, _)), Some(size)) = (stats::run_family(run), stats::run_size(run)) {
                model.observe_font(&family, size);
            }
        }

        let mut stats = FontStatistics::default();
        for run in raw.runs.iter().filter(|r| is_main_flow(r)) {
            if let Some(size) = stats::run_size(run) {
                stats.add_size(size);
            }
        }
        stats.analyze();
        log::debug!(
            "Body size {}pt from {} runs, larger sizes {:?}",
            stats.body_size,
            stats.observations(),
            stats.heading_sizes
        );

        let last_body_run = raw
            .runs
            .iter()
            .rposition(|r| is_main_flow(r) && stats::run_size(r).map_or(false, |s| stats.is_body_size(s)));
        let ctx = ClassifyContext {
            stats: &stats,
            options: &self.options,
            tables: &raw.tables,
            last_body_run,
        };

        let mut votes: BTreeMap<StyleRole, StyleVotes> = BTreeMap::new();
        for (index, run) in raw.runs.iter().enumerate() {
            if run.text.trim().is_empty() {
                continue;
            }
            if let Some(role) = self.chain.classify(index, run, &ctx) {
                votes.entry(role).or_default().add(run);
            }
        }
        for (role, ballot) in &votes {
            if let Some(rule) = ballot.winner() {
                log::debug!(
                    "{}: {} {}pt bold={} ({} runs)",
                    role,
                    rule.font_family,
                    rule.size,
                    rule.bold,
                    ballot.total()
                );
                model.set_style(*role, rule);
            }
        }

        model.header = self.running(&mut model, raw.header.as_ref(), "header", &mut warn);
        model.footer = self.running(&mut model, raw.footer.as_ref(), "footer", &mut warn);

        for (i, table) in raw.tables.iter().enumerate() {
            if table.columns == 0 || table.rows == 0 {
                warn(format!("table {} has no readable grid and was skipped", i));
                continue;
            }
            model.tables.push(TableSchema::new(
                table.columns,
                table.rows,
                table.has_header_row,
                table.border,
            ));
        }

        for problem in model.check_invariants() {
            warn(format!("model check: {}", problem));
        }

        Extraction { model, warnings }
    }

    fn page_setup(&self, raw: &RawStructure, warn: &mut impl FnMut(String)) -> PageSetup {
        let (width, height, landscape) = match raw.pages.first() {
            Some(page) if page.width > 0.0 && page.height > 0.0 => {
                (page.width, page.height, page.landscape)
            }
            _ => {
                warn("no page geometry found; assuming US Letter".to_string());
                (612.0, 792.0, None)
            }
        };

        let margins = match raw.margins.or_else(|| text_margins(raw, width, height)) {
            Some(margins) => margins,
            None => {
                warn(format!(
                    "no margins found; using {}pt",
                    self.options.default_margin
                ));
                Margins::uniform(self.options.default_margin)
            }
        };

        let mut page = PageSetup::new(width, height, margins);
        if let Some(landscape) = landscape {
            page.orientation = if landscape {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            };
        }

        let problems = page.check();
        if !problems.is_empty() {
            let fallback = Margins::uniform(self.options.default_margin);
            page.margins = if PageSetup::new(width, height, fallback).is_valid() {
                fallback
            } else {
                Margins {
                    top: height * 0.1,
                    bottom: height * 0.1,
                    left: width * 0.1,
                    right: width * 0.1,
                }
            };
            warn(format!(
                "margins clamped ({}); using {}/{}/{}/{}pt",
                problems.join("; "),
                page.margins.top,
                page.margins.bottom,
                page.margins.left,
                page.margins.right
            ));
        }
        page
    }

    fn running(
        &self,
        model: &mut NormalizedTemplateModel,
        raw: Option<&RawHeaderFooter>,
        what: &str,
        warn: &mut impl FnMut(String),
    ) -> Option<HeaderFooter> {
        let Some(raw) = raw else {
            warn(format!("no running {} detected", what));
            return None;
        };
        let style = rule_for_run(&raw.run);
        if model.font(&style.font_family).is_none() {
            model.observe_font(&style.font_family, style.size);
        }

        let mut running = HeaderFooter::new(
            raw.text.clone(),
            Placement {
                alignment: raw.alignment,
                offset: raw.offset.max(0.0),
            },
            style,
        );
        running.page_number |= raw.page_number;
        Some(running)
    }
}

impl Default for TemplateExtractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}

/// Body-region text outside tables.
fn is_main_flow(run: &RawRun) -> bool {
    run.region == Region::Body && run.table_cell.is_none() && !run.text.trim().is_empty()
}

/// Style of a single run, with hard defaults for what it lacks.
fn rule_for_run(run: &RawRun) -> StyleRule {
    let fallback = StyleRule::hard_default();
    let (family, bold, italic) =
        stats::run_family(run).unwrap_or((fallback.font_family.clone(), run.bold, run.italic));
    let mut rule = StyleRule::new(family, stats::run_size(run).unwrap_or(fallback.size))
        .bold(bold)
        .italic(italic)
        .with_alignment(run.alignment.unwrap_or_default());
    rule.color = run.color.clone();
    rule
}

/// Margins implied by the extent of body text on positioned pages.
fn text_margins(raw: &RawStructure, width: f32, height: f32) -> Option<Margins> {
    let extent = raw
        .runs
        .iter()
        .filter(|r| r.region == Region::Body)
        .filter_map(|r| r.bbox)
        .reduce(|a, b| a.union(&b))?;
    Some(Margins {
        top: (height - extent.y1).max(0.0),
        bottom: extent.y0.max(0.0),
        left: extent.x0.max(0.0),
        right: (width - extent.x1).max(0.0),
    })
}

/// Extract a model with default options.
pub fn extract(raw: &RawStructure) -> NormalizedTemplateModel {
    TemplateExtractor::default().extract(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::SourceFormat;
    use crate::model::{Alignment, BorderStyle, BoundingBox, RawPage, RawTable};

    fn pdf_structure(runs: Vec<RawRun>) -> RawStructure {
        let mut raw = RawStructure::new(SourceFormat::Pdf);
        raw.pages.push(RawPage::new(1, 612.0, 792.0));
        raw.runs = runs;
        raw
    }

    fn title_and_body() -> RawStructure {
        let mut runs = vec![RawRun::new("Title", "Helvetica-Bold", 24.0)
            .at(BoundingBox::new(72.0, 700.0, 300.0, 724.0))];
        for i in 0..50 {
            let y = 680.0 - i as f32 * 12.0;
            runs.push(
                RawRun::new("body text", "Helvetica", 12.0)
                    .at(BoundingBox::new(72.0, y, 520.0, y + 12.0)),
            );
        }
        pdf_structure(runs)
    }

    #[test]
    fn test_majority_vote_title_and_body() {
        let model = extract(&title_and_body());
        let h1 = model.style(StyleRole::Heading1).unwrap();
        assert_eq!(h1.size, 24.0);
        assert!(h1.bold);
        assert_eq!(model.style(StyleRole::Body).unwrap().size, 12.0);
        assert!(model.style(StyleRole::Heading2).is_none());
        assert_eq!(model.fonts.len(), 1);
        assert_eq!(model.fonts[0].family, "Helvetica");
        assert_eq!(model.fonts[0].max_size, 24.0);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let raw = title_and_body();
        let extractor = TemplateExtractor::default();
        assert_eq!(extractor.extract(&raw), extractor.extract(&raw));
    }

    #[test]
    fn test_margins_from_text_extent() {
        let model = extract(&title_and_body());
        assert_eq!(model.page.margins.left, 72.0);
        assert_eq!(model.page.margins.right, 92.0);
        assert_eq!(model.page.margins.top, 68.0);
        assert!(model.page.is_valid());
    }

    #[test]
    fn test_impossible_margins_clamped() {
        let mut raw = title_and_body();
        raw.margins = Some(Margins {
            top: 10.0,
            bottom: 10.0,
            left: 400.0,
            right: 400.0,
        });
        let extraction = TemplateExtractor::default().extract_with_warnings(&raw);
        assert_eq!(extraction.model.page.margins, Margins::uniform(72.0));
        assert!(extraction.warnings.iter().any(|w| w.contains("margins clamped")));
    }

    #[test]
    fn test_missing_geometry_defaults() {
        let extraction = TemplateExtractor::default().extract_with_warnings(&RawStructure::default());
        let model = extraction.model;
        assert_eq!(model.page.width, 612.0);
        assert_eq!(model.page.margins, Margins::uniform(72.0));
        assert!(model.styles.is_empty());
        assert_eq!(model.page_count, 1);
        assert!(extraction.warnings.iter().any(|w| w.contains("US Letter")));
        assert!(extraction.warnings.iter().any(|w| w.contains("no running header")));
    }

    #[test]
    fn test_header_footer_and_tables() {
        let mut raw = title_and_body();
        raw.footer = Some(RawHeaderFooter {
            text: "Page {page}".to_string(),
            alignment: Alignment::Center,
            offset: 30.0,
            run: RawRun::new("Page 1", "Courier", 8.0).in_region(Region::Footer),
            page_number: true,
        });
        raw.tables.push(RawTable {
            rows: 3,
            columns: 4,
            has_header_row: true,
            border: BorderStyle::Single,
            page: 1,
        });
        raw.tables.push(RawTable {
            rows: 0,
            columns: 0,
            has_header_row: false,
            border: BorderStyle::None,
            page: 1,
        });

        let extraction = TemplateExtractor::default().extract_with_warnings(&raw);
        let model = &extraction.model;
        let footer = model.footer.as_ref().unwrap();
        assert_eq!(footer.render(3, 9), "Page 3");
        assert_eq!(footer.position.offset, 30.0);
        assert!(model.font("Courier").is_some());
        assert!(model.is_valid());

        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.tables[0].columns, 4);
        assert_eq!(model.tables[0].header_style, StyleRole::TableHeader);
        assert!(extraction.warnings.iter().any(|w| w.contains("table 1")));
    }

    #[test]
    fn test_docx_style_names_and_lists() {
        let mut raw = RawStructure::new(SourceFormat::Docx);
        raw.pages.push(RawPage::new(1, 595.0, 842.0));
        raw.margins = Some(Margins::uniform(56.7));
        raw.runs = vec![
            RawRun::new("Intro", "Cambria", 16.0)
                .with_style_name("heading 1")
                .with_weight(true, false),
            RawRun::new("Details", "Cambria", 13.0).with_style_name("heading 2"),
            RawRun::new("Some words", "Calibri", 11.0).with_style_name("Normal"),
            RawRun::new("More words", "Calibri", 11.0).with_style_name("Normal"),
            RawRun {
                numbered: true,
                ..RawRun::new("point", "Calibri", 11.0).with_style_name("List Paragraph")
            },
        ];
        let model = extract(&raw);
        assert_eq!(model.style(StyleRole::Heading1).unwrap().font_family, "Cambria");
        assert_eq!(model.style(StyleRole::Heading2).unwrap().size, 13.0);
        assert_eq!(model.style(StyleRole::Body).unwrap().font_family, "Calibri");
        assert!(model.style(StyleRole::ListItem).is_some());
        assert_eq!(model.page.margins.left, 56.7);
    }

    #[test]
    fn test_zero_and_nan_sizes_do_not_win() {
        let mut raw = title_and_body();
        for size in [0.0, 0.0, f32::NAN, -3.0] {
            raw.runs.push(RawRun::new("invisible", "Helvetica", size));
        }
        for _ in 0..60 {
            raw.runs.push(RawRun::new("ghost", "Courier", 0.0));
        }

        let extraction = TemplateExtractor::default().extract_with_warnings(&raw);
        let model = extraction.model;
        assert!(model.is_valid(), "{:?}", model.check_invariants());
        assert_eq!(model.style(StyleRole::Body).unwrap().size, 12.0);
        assert!(model.font("Courier").is_none());
        assert!(extraction
            .warnings
            .iter()
            .any(|w| w.starts_with("64 run(s) with an unusable font size")));
    }
}
