//! PDF reader.
//!
//! Walks each page's content stream, tracking the text and graphics
//! matrices, and records positioned text spans plus ruled lines. Lines that
//! repeat in the top/bottom band of several pages become the running
//! header/footer; aligned multi-cell lines become tables.

use std::collections::HashMap;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::backend::{ContentOp, LopdfBackend, PageId, PdfBackend, PdfValue, TextDecoder};
use super::layout::{group_spans_into_lines, join_spans, Rule, TextLine, TextSpan};
use super::table_detector::{DetectedTable, TableDetector, TableDetectorConfig};
use super::{FormatReader, ReadOptions};
use crate::detect::SourceFormat;
use crate::error::Result;
use crate::model::{
    Alignment, BorderStyle, BoundingBox, RawHeaderFooter, RawPage, RawRun, RawStructure,
    RawTable, Region, PAGES_PLACEHOLDER, PAGE_PLACEHOLDER,
};

/// Reads PDF templates.
#[derive(Debug, Clone, Default)]
pub struct PdfReader {
    options: ReadOptions,
}

impl PdfReader {
    /// Create a reader.
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    /// Read through an already loaded backend.
    fn read_backend(&self, backend: &dyn PdfBackend) -> Result<RawStructure> {
        let mut structure = RawStructure::new(SourceFormat::Pdf);

        let pages: Vec<(u32, PageId)> = backend.pages().into_iter().collect();
        if pages.is_empty() {
            structure.warn("PDF has no pages");
            return Ok(structure);
        }

        let scans: Vec<PageScan> = if self.options.parallel && pages.len() > 1 {
            pages
                .par_iter()
                .map(|(number, id)| scan_page(backend, *number, *id))
                .collect()
        } else {
            pages
                .iter()
                .map(|(number, id)| scan_page(backend, *number, *id))
                .collect()
        };

        for scan in &scans {
            structure.pages.push(scan.page);
            for warning in &scan.warnings {
                structure.warn(warning.clone());
            }
        }

        let running = RunningLines::detect(&scans, &self.options);
        structure.header = running.header;
        structure.footer = running.footer;

        let detector = TableDetector::with_config(TableDetectorConfig {
            min_rows: self.options.min_table_rows,
            min_column_gap: self.options.min_column_gap,
            ..Default::default()
        });

        let mut paragraph = 0;
        for (page_idx, scan) in scans.iter().enumerate() {
            let body: Vec<usize> = (0..scan.lines.len())
                .filter(|li| !running.regions.contains_key(&(page_idx, *li)))
                .collect();
            let body_lines: Vec<TextLine> = body.iter().map(|li| scan.lines[*li].clone()).collect();
            let tables = detector.detect(&body_lines);

            // Original line index -> (global table index, row)
            let mut table_rows: HashMap<usize, (usize, usize)> = HashMap::new();
            for table in &tables {
                let table_index = structure.tables.len();
                for body_idx in table.first_line..table.end_line {
                    table_rows.insert(body[body_idx], (table_index, body_idx - table.first_line));
                }
                structure.tables.push(RawTable {
                    rows: table.rows(),
                    columns: table.columns.len(),
                    has_header_row: table.has_header_row,
                    border: border_for(table, &scan.rules),
                    page: scan.page.number,
                });
            }

            let mut prev_body_bottom: Option<f32> = None;
            for (li, line) in scan.lines.iter().enumerate() {
                let region = running
                    .regions
                    .get(&(page_idx, li))
                    .copied()
                    .unwrap_or(Region::Body);

                let space_before = if region == Region::Body {
                    let gap = prev_body_bottom.map(|bottom| (bottom - line.top()).max(0.0));
                    prev_body_bottom = Some(line.bottom());
                    gap
                } else {
                    None
                };

                let alignment = line_alignment(line, scan.page.width);
                let mut runs: Vec<RawRun> = match table_rows.get(&li) {
                    Some(&(table, row)) => cell_runs(line, self.options.min_column_gap)
                        .into_iter()
                        .map(|run| run.in_table(table, row))
                        .collect(),
                    None => style_runs(line),
                };

                for (i, run) in runs.iter_mut().enumerate() {
                    run.page = scan.page.number;
                    run.region = region;
                    run.paragraph = paragraph;
                    run.alignment = Some(alignment);
                    if i == 0 {
                        run.space_before = space_before;
                    }
                }
                structure.runs.extend(runs);
                paragraph += 1;
            }
        }

        structure.page_breaks = (1..structure.page_count()).collect();

        if structure.runs.is_empty() {
            structure.warn("PDF contains no extractable text");
        }
        Ok(structure)
    }
}

impl FormatReader for PdfReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Pdf
    }

    fn read(&self, data: &[u8]) -> Result<RawStructure> {
        let backend = LopdfBackend::load_bytes(data)?;
        log::debug!("PDF version {}", backend.version());
        self.read_backend(&backend)
    }
}

/// What one page contributed.
struct PageScan {
    page: RawPage,
    lines: Vec<TextLine>,
    rules: Vec<Rule>,
    warnings: Vec<String>,
}

fn scan_page(backend: &dyn PdfBackend, number: u32, id: PageId) -> PageScan {
    let mut warnings = Vec::new();
    let (width, height) = backend.page_size(id).unwrap_or_else(|| {
        warnings.push(format!("page {}: no media box, assuming Letter", number));
        (612.0, 792.0)
    });

    let mut scan = PageScan {
        page: RawPage::new(number, width, height),
        lines: Vec::new(),
        rules: Vec::new(),
        warnings,
    };

    let ops = match backend
        .page_content(id)
        .and_then(|content| backend.decode_content(&content))
    {
        Ok(ops) => ops,
        Err(e) => {
            scan.warnings
                .push(format!("page {}: content unreadable: {}", number, e));
            return scan;
        }
    };

    let fonts: HashMap<Vec<u8>, String> = match backend.page_fonts(id) {
        Ok(fonts) => fonts.into_iter().map(|f| (f.name, f.base_font)).collect(),
        Err(e) => {
            scan.warnings
                .push(format!("page {}: font resources unreadable: {}", number, e));
            HashMap::new()
        }
    };

    let decoder = backend.text_decoder(id);
    let mut scanner = ContentScanner::new(&fonts, decoder.as_ref());
    for op in &ops {
        scanner.apply(op);
    }

    log::debug!(
        "page {}: {} spans, {} rules",
        number,
        scanner.spans.len(),
        scanner.rules.len()
    );
    scan.lines = group_spans_into_lines(scanner.spans);
    scan.rules = scanner.rules;
    scan
}

/// 2D affine transform `[a b c d e f]`, row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_slice(v: &[f32]) -> Self {
        Self {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        }
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`
    fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit y vector.
    fn scale_y(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Option<String>,
}

enum PathItem {
    Rect(BoundingBox),
    Segment(BoundingBox),
}

/// Interprets the operators of one content stream.
struct ContentScanner<'a> {
    fonts: &'a HashMap<Vec<u8>, String>,
    decoder: &'a dyn TextDecoder,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    leading: f32,
    path: Vec<PathItem>,
    current_point: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    spans: Vec<TextSpan>,
    rules: Vec<Rule>,
}

impl<'a> ContentScanner<'a> {
    fn new(fonts: &'a HashMap<Vec<u8>, String>, decoder: &'a dyn TextDecoder) -> Self {
        Self {
            fonts,
            decoder,
            state: GraphicsState {
                ctm: Matrix::IDENTITY,
                fill: None,
            },
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
            path: Vec::new(),
            current_point: None,
            subpath_start: None,
            spans: Vec::new(),
            rules: Vec::new(),
        }
    }

    fn apply(&mut self, op: &ContentOp) {
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            "cm" => {
                if let Some(v) = op.numbers(6) {
                    self.state.ctm = Matrix::from_slice(&v).multiply(&self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(PdfValue::Name(key)) = op.operands.first() {
                    self.font_name = self
                        .fonts
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());
                    self.font_key = key.clone();
                }
                if let Some(size) = op.number(1) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = op.number(0) {
                    self.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let Some(v) = op.numbers(2) {
                    if op.operator == "TD" {
                        self.leading = -v[1];
                    }
                    self.move_line(v[0], v[1]);
                }
            }
            "Tm" => {
                if let Some(v) = op.numbers(6) {
                    self.line_matrix = Matrix::from_slice(&v);
                    self.text_matrix = self.line_matrix;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    let text = self.decoder.decode(&self.font_key, bytes);
                    self.show(&[Shown::Text(text)]);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    let parts: Vec<Shown> = items
                        .iter()
                        .filter_map(|item| match item {
                            PdfValue::Str(bytes) => {
                                Some(Shown::Text(self.decoder.decode(&self.font_key, bytes)))
                            }
                            PdfValue::Integer(n) => Some(Shown::Adjust(*n as f32)),
                            PdfValue::Real(n) => Some(Shown::Adjust(*n)),
                            _ => None,
                        })
                        .collect();
                    self.show(&parts);
                }
            }
            "'" | "\"" => {
                self.move_line(0.0, -self.leading);
                let index = if op.operator == "\"" { 2 } else { 0 };
                if let Some(PdfValue::Str(bytes)) = op.operands.get(index) {
                    let text = self.decoder.decode(&self.font_key, bytes);
                    self.show(&[Shown::Text(text)]);
                }
            }
            "rg" | "sc" | "scn" if op.operands.len() == 3 => {
                if let Some(v) = op.numbers(3) {
                    self.state.fill = rgb_color(v[0], v[1], v[2]);
                }
            }
            "g" | "sc" | "scn" if op.operands.len() == 1 => {
                if let Some(v) = op.number(0) {
                    self.state.fill = rgb_color(v, v, v);
                }
            }
            "k" => {
                if let Some(v) = op.numbers(4) {
                    let k = 1.0 - v[3];
                    self.state.fill = rgb_color((1.0 - v[0]) * k, (1.0 - v[1]) * k, (1.0 - v[2]) * k);
                }
            }
            "re" => {
                if let Some(v) = op.numbers(4) {
                    let (x0, y0) = self.state.ctm.apply(v[0], v[1]);
                    let (x1, y1) = self.state.ctm.apply(v[0] + v[2], v[1] + v[3]);
                    self.path.push(PathItem::Rect(BoundingBox::new(x0, y0, x1, y1)));
                    self.current_point = Some((v[0], v[1]));
                    self.subpath_start = Some((v[0], v[1]));
                }
            }
            "m" => {
                if let Some(v) = op.numbers(2) {
                    self.current_point = Some((v[0], v[1]));
                    self.subpath_start = Some((v[0], v[1]));
                }
            }
            "l" => {
                if let Some(v) = op.numbers(2) {
                    self.line_to(v[0], v[1]);
                }
            }
            "h" => {
                if let Some((x, y)) = self.subpath_start {
                    self.line_to(x, y);
                }
            }
            "S" | "s" | "B" | "B*" | "b" | "b*" => self.paint(true),
            "f" | "F" | "f*" => self.paint(false),
            "n" => self.path.clear(),
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        if let Some((cx, cy)) = self.current_point {
            let (x0, y0) = self.state.ctm.apply(cx, cy);
            let (x1, y1) = self.state.ctm.apply(x, y);
            self.path
                .push(PathItem::Segment(BoundingBox::new(x0, y0, x1, y1)));
        }
        self.current_point = Some((x, y));
    }

    fn paint(&mut self, stroke: bool) {
        for item in self.path.drain(..) {
            match item {
                PathItem::Rect(b) if stroke => {
                    for edge in [
                        BoundingBox::new(b.x0, b.y0, b.x1, b.y0),
                        BoundingBox::new(b.x0, b.y1, b.x1, b.y1),
                        BoundingBox::new(b.x0, b.y0, b.x0, b.y1),
                        BoundingBox::new(b.x1, b.y0, b.x1, b.y1),
                    ] {
                        self.rules.extend(Rule::from_box(edge));
                    }
                }
                PathItem::Rect(b) => self.rules.extend(Rule::from_box(b)),
                PathItem::Segment(b) if stroke => self.rules.extend(Rule::from_box(b)),
                PathItem::Segment(_) => {}
            }
        }
        self.current_point = None;
        self.subpath_start = None;
    }

    /// Show text and advance the text matrix by its estimated width.
    fn show(&mut self, parts: &[Shown]) {
        let name = crate::fonts::parse_font_name(&self.font_name);
        let family = crate::fonts::StandardFamily::for_family(&name.family);

        let mut text = String::new();
        let mut advance = 0.0;
        for part in parts {
            match part {
                Shown::Text(s) => {
                    advance += crate::fonts::text_width(s, family, name.bold, self.font_size);
                    text.push_str(s);
                }
                Shown::Adjust(n) => {
                    advance -= n / 1000.0 * self.font_size;
                    // Large negative adjustments stand in for word spaces
                    if -n > 200.0 && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }

        let trm = self.text_matrix.multiply(&self.state.ctm);
        let text: String = text.nfc().collect();
        if !text.trim().is_empty() {
            let (x, y) = trm.apply(0.0, 0.0);
            let size = self.font_size * trm.scale_y();
            let mut span = TextSpan::new(text, x, y, size, self.font_name.clone());
            span.color = self.state.fill.clone();
            self.spans.push(span);
        }

        self.text_matrix = Matrix::translate(advance, 0.0).multiply(&self.text_matrix);
    }
}

enum Shown {
    Text(String),
    Adjust(f32),
}

/// Convert color components in 0..1 to `#RRGGBB`; black is `None`.
fn rgb_color(r: f32, g: f32, b: f32) -> Option<String> {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let (r, g, b) = (to_byte(r), to_byte(g), to_byte(b));
    if r == 0 && g == 0 && b == 0 {
        None
    } else {
        Some(format!("#{:02X}{:02X}{:02X}", r, g, b))
    }
}

/// Alignment of a line relative to the page.
fn line_alignment(line: &TextLine, page_width: f32) -> Alignment {
    let bbox = line.bbox();
    let offset = bbox.center_x() - page_width / 2.0;
    if offset.abs() <= page_width * 0.03 && bbox.width() < page_width * 0.75 {
        Alignment::Center
    } else if bbox.x0 > page_width / 2.0 {
        Alignment::Right
    } else {
        Alignment::Left
    }
}

fn run_from_spans(spans: &[TextSpan]) -> RawRun {
    let first = &spans[0];
    let bbox = spans
        .iter()
        .skip(1)
        .fold(first.bbox(), |acc, s| acc.union(&s.bbox()));
    RawRun {
        text: join_spans(spans),
        font_name: Some(first.font_name.clone()),
        font_size: Some(first.font_size),
        bold: first.is_bold,
        italic: first.is_italic,
        color: first.color.clone(),
        bbox: Some(bbox),
        ..Default::default()
    }
}

/// One run per stretch of identically styled spans.
fn style_runs(line: &TextLine) -> Vec<RawRun> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=line.spans.len() {
        if i == line.spans.len() || !line.spans[i].same_style(&line.spans[start]) {
            runs.push(run_from_spans(&line.spans[start..i]));
            start = i;
        }
    }
    runs
}

/// One run per table cell.
fn cell_runs(line: &TextLine, min_gap: f32) -> Vec<RawRun> {
    line.cells(min_gap)
        .into_iter()
        .filter(|range| !range.is_empty())
        .map(|range| run_from_spans(&line.spans[range]))
        .collect()
}

/// A table is bordered when ruled lines run along it.
fn border_for(table: &DetectedTable, rules: &[Rule]) -> BorderStyle {
    let (left, right) = (table.left(), table.right());
    let (top, bottom) = (table.top + 6.0, table.bottom - 6.0);
    let along = rules
        .iter()
        .filter(|rule| {
            let b = &rule.bbox;
            b.x0 < right && b.x1 > left && b.y0 <= top && b.y1 >= bottom
        })
        .count();
    if along >= 2 {
        BorderStyle::Single
    } else {
        BorderStyle::None
    }
}

fn digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

/// Text with numbers masked, used to match repeating lines across pages.
fn repetition_key(text: &str) -> String {
    let masked = digits_regex().replace_all(text, "#");
    masked.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace numbers that track the page number (or equal the page count) in
/// every occurrence with placeholders. `occurrences` is (text, page number).
fn placeholder_text(occurrences: &[(String, u32)], total: u32) -> String {
    let Some((first, _)) = occurrences.first() else {
        return String::new();
    };
    let numbers: Vec<Vec<Option<u32>>> = occurrences
        .iter()
        .map(|(text, _)| {
            digits_regex()
                .find_iter(text)
                .map(|m| m.as_str().parse().ok())
                .collect()
        })
        .collect();
    let count = numbers[0].len();
    if numbers.iter().any(|n| n.len() != count) {
        return first.clone();
    }

    let mut out = String::with_capacity(first.len());
    let mut last = 0;
    for (k, m) in digits_regex().find_iter(first).enumerate() {
        out.push_str(&first[last..m.start()]);
        let is_page = occurrences
            .iter()
            .zip(&numbers)
            .all(|((_, page), nums)| nums[k] == Some(*page));
        let is_total = numbers.iter().all(|nums| nums[k] == Some(total));
        if is_page {
            out.push_str(PAGE_PLACEHOLDER);
        } else if is_total {
            out.push_str(PAGES_PLACEHOLDER);
        } else {
            out.push_str(m.as_str());
        }
        last = m.end();
    }
    out.push_str(&first[last..]);
    out
}

/// Header/footer lines confirmed by repetition.
struct RunningLines {
    header: Option<RawHeaderFooter>,
    footer: Option<RawHeaderFooter>,
    /// (page index, line index) -> region of every confirmed line
    regions: HashMap<(usize, usize), Region>,
}

struct Candidate {
    region: Region,
    key: String,
    /// (page index, line index), at most one per page
    lines: Vec<(usize, usize)>,
}

impl RunningLines {
    fn detect(scans: &[PageScan], options: &ReadOptions) -> Self {
        let mut candidates: Vec<Candidate> = Vec::new();

        for (pi, scan) in scans.iter().enumerate() {
            let height = scan.page.height;
            for (li, line) in scan.lines.iter().enumerate() {
                let region = if line.bottom() >= height * (1.0 - options.header_band) {
                    Region::Header
                } else if line.top() <= height * options.footer_band {
                    Region::Footer
                } else {
                    continue;
                };
                let key = repetition_key(&line.text());
                if key.is_empty() {
                    continue;
                }
                match candidates
                    .iter_mut()
                    .find(|c| c.region == region && c.key == key)
                {
                    Some(c) => {
                        if !c.lines.iter().any(|(p, _)| *p == pi) {
                            c.lines.push((pi, li));
                        }
                    }
                    None => candidates.push(Candidate {
                        region,
                        key,
                        lines: vec![(pi, li)],
                    }),
                }
            }
        }

        let confirmed: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.lines.len() >= options.min_repeat_pages)
            .collect();

        let mut regions = HashMap::new();
        for c in &confirmed {
            for line in &c.lines {
                regions.insert(*line, c.region);
            }
        }

        let pick = |region: Region| -> Option<RawHeaderFooter> {
            let best = confirmed
                .iter()
                .filter(|c| c.region == region)
                .fold(None::<&&Candidate>, |best, c| match best {
                    Some(b) if b.lines.len() >= c.lines.len() => Some(b),
                    _ => Some(c),
                })?;
            Some(build_running(best, scans))
        };

        let header = pick(Region::Header);
        let footer = pick(Region::Footer);
        if header.is_none() {
            log::debug!("No repeating header lines found");
        }
        if footer.is_none() {
            log::debug!("No repeating footer lines found");
        }

        Self {
            header,
            footer,
            regions,
        }
    }
}

fn build_running(candidate: &Candidate, scans: &[PageScan]) -> RawHeaderFooter {
    let total = scans.len() as u32;
    let occurrences: Vec<(String, u32)> = candidate
        .lines
        .iter()
        .map(|(pi, li)| (scans[*pi].lines[*li].text(), scans[*pi].page.number))
        .collect();
    let text = placeholder_text(&occurrences, total);

    let (pi, li) = candidate.lines[0];
    let scan = &scans[pi];
    let line = &scan.lines[li];
    let alignment = match line_alignment(line, scan.page.width) {
        Alignment::Justify => Alignment::Left,
        other => other,
    };
    let offset = match candidate.region {
        Region::Header => scan.page.height - line.y,
        _ => line.y,
    };

    let mut run = run_from_spans(&line.spans);
    run.text = line.text();
    run.page = scan.page.number;
    run.region = candidate.region;

    RawHeaderFooter {
        page_number: text.contains(PAGE_PLACEHOLDER) || text.contains(PAGES_PLACEHOLDER),
        text,
        alignment,
        offset,
        run,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    type Line = (&'static str, f32, f32, f32, String);

    fn text(font: &'static str, size: f32, x: f32, y: f32, s: &str) -> Line {
        (font, size, x, y, s.to_string())
    }

    fn build_pdf(pages: &[Vec<Line>], extra_ops: &[Operation]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica"
        });
        let bold = doc.add_object(dictionary! {
            "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica-Bold"
        });
        let resources = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold }
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut ops = extra_ops.to_vec();
            for (font, size, x, y, s) in lines {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.as_bytes().to_vec()), Object::Real(*size)],
                ));
                ops.push(Operation::new("Td", vec![Object::Real(*x), Object::Real(*y)]));
                ops.push(Operation::new("Tj", vec![Object::string_literal(s.as_str())]));
                ops.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations: ops };
            let content_id =
                doc.add_object(Stream::new(lopdf::Dictionary::new(), content.encode().unwrap()));
            let media_box: Vec<Object> = [0, 0, 612, 792].iter().map(|v| Object::Integer(*v)).collect();
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
                "MediaBox" => media_box
            });
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn page(n: u32) -> Vec<Line> {
        vec![
            text("F1", 9.0, 72.0, 750.0, "ACME Quarterly Report"),
            text("F2", 20.0, 72.0, 640.0, "Overview"),
            text("F1", 11.0, 72.0, 600.0, "Body text line one."),
            text("F1", 11.0, 72.0, 586.0, "Body text line two."),
            text("F1", 9.0, 280.0, 40.0, &format!("Page {} of 2", n)),
        ]
    }

    #[test]
    fn test_matrix_multiply() {
        let scale = Matrix::from_slice(&[2.0, 0.0, 0.0, 2.0, 5.0, 5.0]);
        let m = Matrix::translate(10.0, 20.0).multiply(&scale);
        assert_eq!(m.apply(0.0, 0.0), (25.0, 45.0));
        assert_eq!(m.scale_y(), 2.0);
    }

    #[test]
    fn test_placeholder_text() {
        let occ = vec![("Page 1 of 3".to_string(), 1), ("Page 2 of 3".to_string(), 2)];
        assert_eq!(placeholder_text(&occ, 3), "Page {page} of {pages}");

        let fixed = vec![("Report 2024".to_string(), 1), ("Report 2024".to_string(), 2)];
        assert_eq!(placeholder_text(&fixed, 2), "Report 2024");
    }

    #[test]
    fn test_repetition_key() {
        assert_eq!(repetition_key("Page  12 of 30 "), "Page # of #");
    }

    #[test]
    fn test_rgb_color() {
        assert_eq!(rgb_color(0.0, 0.0, 0.0), None);
        assert_eq!(rgb_color(1.0, 0.0, 0.0).as_deref(), Some("#FF0000"));
    }

    #[test]
    fn test_read_header_footer_and_runs() {
        let data = build_pdf(&[page(1), page(2)], &[]);
        let raw = PdfReader::default().read(&data).unwrap();

        assert_eq!(raw.page_count(), 2);
        assert_eq!(raw.pages[0].width, 612.0);
        assert_eq!(raw.page_breaks, vec![1]);

        let header = raw.header.as_ref().unwrap();
        assert_eq!(header.text, "ACME Quarterly Report");
        let footer = raw.footer.as_ref().unwrap();
        assert_eq!(footer.text, "Page {page} of {pages}");
        assert!(footer.page_number);

        let heading = raw.runs.iter().find(|r| r.text == "Overview").unwrap();
        assert_eq!(heading.font_size, Some(20.0));
        assert!(heading.bold);
        assert_eq!(heading.region, Region::Body);

        let header_runs = raw.runs.iter().filter(|r| r.region == Region::Header).count();
        assert_eq!(header_runs, 2);
    }

    #[test]
    fn test_read_bordered_table() {
        let lines: Vec<Line> = vec![
            text("F2", 10.0, 72.0, 500.0, "Item"),
            text("F2", 10.0, 300.0, 500.0, "Amount"),
            text("F1", 10.0, 72.0, 486.0, "Widgets"),
            text("F1", 10.0, 300.0, 486.0, "12"),
            text("F1", 10.0, 72.0, 472.0, "Gadgets"),
            text("F1", 10.0, 300.0, 472.0, "7"),
        ];
        let rect = [70.0, 468.0, 400.0, 44.0].iter().map(|v| Object::Real(*v)).collect();
        let border = [Operation::new("re", rect), Operation::new("S", vec![])];
        let data = build_pdf(&[lines], &border);
        let raw = PdfReader::new(ReadOptions::default().sequential())
            .read(&data)
            .unwrap();

        assert_eq!(raw.tables.len(), 1);
        let table = &raw.tables[0];
        assert_eq!(table.rows, 3);
        assert_eq!(table.columns, 2);
        assert!(table.has_header_row);
        assert_eq!(table.border, BorderStyle::Single);

        let cells: Vec<_> = raw.runs.iter().filter(|r| r.table_cell.is_some()).collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].table_cell, Some((0, 0)));
        assert_eq!(cells[5].table_cell, Some((0, 2)));
    }

    #[test]
    fn test_read_not_a_pdf() {
        let err = PdfReader::default().read(b"%PDF-1.4\ngarbage").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFile);
    }
}
