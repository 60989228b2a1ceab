//! DOCX reader.
//!
//! WordprocessingML states most of what the extractor needs directly:
//! paragraph style names, run formatting, table grids, section geometry and
//! header/footer parts. Formatting a run leaves unset is filled in from the
//! style chain (`basedOn`), `w:docDefaults` and the theme fonts, in that
//! order.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use roxmltree::{Document, Node};
use unicode_normalization::UnicodeNormalization;
use zip::ZipArchive;

use super::FormatReader;
use crate::detect::SourceFormat;
use crate::error::{Error, Result};
use crate::model::{
    Alignment, BorderStyle, Margins, RawHeaderFooter, RawPage, RawRun, RawStructure, RawTable,
    Region, PAGES_PLACEHOLDER, PAGE_PLACEHOLDER,
};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// Word's size when neither the run, its styles nor the defaults set one.
const DEFAULT_FONT_SIZE: f32 = 11.0;

/// Header/footer distance when the section omits it (0.5 inch).
const DEFAULT_RUNNING_OFFSET: f32 = 36.0;

/// Limit on `basedOn` chains; real documents stay far below it.
const MAX_STYLE_DEPTH: usize = 16;

/// Largest `<Pages>` value taken from `docProps/app.xml`.
const MAX_DECLARED_PAGES: u32 = 10_000;

/// Reads DOCX packages.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxReader;

impl DocxReader {
    /// Create a DOCX reader.
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for DocxReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Docx
    }

    fn read(&self, data: &[u8]) -> Result<RawStructure> {
        let mut package = Package::open(data)?;

        let document_xml = package
            .text("word/document.xml")
            .ok_or_else(|| Error::CorruptFile("word/document.xml is missing or unreadable".into()))?;

        let theme = package
            .first_part("word/theme/")
            .and_then(|name| package.text(&name))
            .map(|xml| ThemeFonts::parse(&xml))
            .unwrap_or_default();
        let styles = package
            .text("word/styles.xml")
            .and_then(|xml| Styles::parse(&xml, &theme))
            .unwrap_or_else(|| Styles::empty(&theme));
        let rels = package
            .text("word/_rels/document.xml.rels")
            .map(|xml| parse_relationships(&xml))
            .unwrap_or_default();

        let xml = Document::parse(&document_xml)?;
        let body = wml(xml.root_element(), "body")
            .ok_or_else(|| Error::CorruptFile("document has no body".into()))?;

        let mut walker = BodyWalker::new(&styles, &theme);
        walker.walk(body, None);
        let unusable_sizes = styles.unusable_sizes + walker.unusable_sizes;
        let mut structure = walker.structure;
        if unusable_sizes > 0 {
            structure.warn(format!(
                "{} font size(s) are not positive numbers and were ignored",
                unusable_sizes
            ));
        }

        let sect = wml(body, "sectPr");
        let section = Section::parse(sect);

        let counted = structure.page_breaks.len() as u32 + 1;
        let page_count = match package
            .text("docProps/app.xml")
            .and_then(|xml| parse_page_count(&xml))
        {
            Some(declared) if declared > MAX_DECLARED_PAGES => {
                structure.warn(format!(
                    "app.xml claims {} pages; using {} from page breaks",
                    declared, counted
                ));
                counted
            }
            Some(declared) => declared.max(counted),
            None => counted,
        };
        structure.pages = vec![RawPage {
            number: 1,
            width: section.width,
            height: section.height,
            landscape: section.landscape,
        }];
        structure.declared_page_count = Some(page_count);
        structure.margins = Some(section.margins);

        if let Some(sect) = sect {
            for (kind, region, offset) in [
                ("headerReference", Region::Header, section.header_offset),
                ("footerReference", Region::Footer, section.footer_offset),
            ] {
                let running = reference_target(sect, kind, &rels)
                    .and_then(|part| package.text(&part))
                    .and_then(|xml| read_running_part(&xml, &styles, &theme, region, offset));
                match region {
                    Region::Footer => structure.footer = running,
                    _ => structure.header = running,
                }
            }
        }
        if structure.header.is_none() {
            log::debug!("DOCX has no default header");
        }
        if structure.footer.is_none() {
            log::debug!("DOCX has no default footer");
        }

        log::debug!(
            "DOCX: {} paragraphs, {} runs, {} tables, {} page breaks",
            walker.paragraph,
            structure.runs.len(),
            structure.tables.len(),
            structure.page_breaks.len()
        );
        Ok(structure)
    }
}

/// In-memory OOXML package.
struct Package<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    fn open(data: &'a [u8]) -> Result<Self> {
        Ok(Self {
            zip: ZipArchive::new(Cursor::new(data))?,
        })
    }

    /// Read a part as text; `None` if it is absent or undecodable.
    fn text(&mut self, name: &str) -> Option<String> {
        let mut file = self.zip.by_name(name).ok()?;
        let mut content = String::new();
        match file.read_to_string(&mut content) {
            Ok(_) => Some(content),
            Err(e) => {
                log::warn!("DOCX part {} unreadable: {}", name, e);
                None
            }
        }
    }

    /// First XML part under a directory, in name order.
    fn first_part(&self, prefix: &str) -> Option<String> {
        let mut names: Vec<&str> = self
            .zip
            .file_names()
            .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
            .collect();
        names.sort_unstable();
        names.first().map(|n| n.to_string())
    }
}

// ---------------------------------------------------------------------------
// XML helpers
// ---------------------------------------------------------------------------

fn is_wml(node: &Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn wml<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_wml(n, name))
}

fn wml_attr<'a>(node: Node<'a, '_>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

/// Toggle property: present without `w:val`, or with a truthy value.
fn wml_bool(node: Node, child: &str) -> Option<bool> {
    wml(node, child).map(|n| {
        !matches!(
            n.attribute((WML_NS, "val")),
            Some("false") | Some("0") | Some("off") | Some("none")
        )
    })
}

/// A twentieths-of-a-point attribute, in points. Non-numeric and
/// non-finite values read as absent.
fn twips_attr(node: Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v / 20.0)
}

/// Paragraph spacing in points; negative values read as absent.
fn spacing_attr(node: Node, attr: &str) -> Option<f32> {
    twips_attr(node, attr).filter(|v| *v >= 0.0)
}

/// `w:sz` is present on a run property set but cannot be used.
fn has_unusable_size(rpr: &Node) -> bool {
    wml_attr(*rpr, "sz").map_or(false, |v| half_points(v).is_none())
}

/// A `w:sz` half-point value in points, when it is a positive number.
fn half_points(val: &str) -> Option<f32> {
    val.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v / 2.0)
}

fn parse_alignment(val: &str) -> Option<Alignment> {
    match val {
        "left" | "start" => Some(Alignment::Left),
        "center" => Some(Alignment::Center),
        "right" | "end" => Some(Alignment::Right),
        "both" | "distribute" => Some(Alignment::Justify),
        _ => None,
    }
}

/// `w:color` value as `#RRGGBB`; `auto` and black mean the default color.
fn parse_color(val: &str) -> Option<String> {
    if val.len() != 6 || !val.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let upper = val.to_ascii_uppercase();
    if upper == "000000" {
        None
    } else {
        Some(format!("#{}", upper))
    }
}

// ---------------------------------------------------------------------------
// Theme and styles
// ---------------------------------------------------------------------------

/// Major (headings) and minor (body) Latin theme fonts.
#[derive(Debug, Clone)]
struct ThemeFonts {
    major: String,
    minor: String,
}

impl Default for ThemeFonts {
    fn default() -> Self {
        Self {
            major: "Calibri Light".to_string(),
            minor: "Calibri".to_string(),
        }
    }
}

impl ThemeFonts {
    fn parse(xml: &str) -> Self {
        let mut fonts = Self::default();
        let Ok(doc) = Document::parse(xml) else {
            return fonts;
        };
        for node in doc.descendants() {
            if node.tag_name().namespace() != Some(DML_NS) {
                continue;
            }
            let slot = match node.tag_name().name() {
                "majorFont" => &mut fonts.major,
                "minorFont" => &mut fonts.minor,
                _ => continue,
            };
            if let Some(face) = node
                .children()
                .find(|n| n.tag_name().name() == "latin")
                .and_then(|n| n.attribute("typeface"))
                .filter(|f| !f.is_empty())
            {
                *slot = face.to_string();
            }
        }
        fonts
    }

    fn resolve(&self, theme_ref: &str) -> &str {
        if theme_ref.starts_with("major") {
            &self.major
        } else {
            &self.minor
        }
    }
}

/// Run formatting; `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq)]
struct RunProps {
    font: Option<String>,
    size: Option<f32>,
    bold: Option<bool>,
    italic: Option<bool>,
    color: Option<String>,
}

impl RunProps {
    fn parse(rpr: Node, theme: &ThemeFonts) -> Self {
        let font = wml(rpr, "rFonts").and_then(|fonts| {
            fonts
                .attribute((WML_NS, "ascii"))
                .or_else(|| fonts.attribute((WML_NS, "hAnsi")))
                .map(str::to_string)
                .or_else(|| {
                    fonts
                        .attribute((WML_NS, "asciiTheme"))
                        .map(|t| theme.resolve(t).to_string())
                })
        });
        Self {
            font,
            size: wml_attr(rpr, "sz").and_then(half_points),
            bold: wml_bool(rpr, "b"),
            italic: wml_bool(rpr, "i"),
            color: wml(rpr, "color")
                .and_then(|n| n.attribute((WML_NS, "val")))
                .map(parse_color)
                .map(|c| c.unwrap_or_default()),
        }
    }

    /// Layer `self` on top of `base`.
    fn over(&self, base: &RunProps) -> RunProps {
        RunProps {
            font: self.font.clone().or_else(|| base.font.clone()),
            size: self.size.or(base.size),
            bold: self.bold.or(base.bold),
            italic: self.italic.or(base.italic),
            color: self.color.clone().or_else(|| base.color.clone()),
        }
    }

    fn color(&self) -> Option<String> {
        self.color.clone().filter(|c| !c.is_empty())
    }
}

/// One entry of `styles.xml`.
#[derive(Debug, Clone, Default)]
struct StyleDef {
    name: String,
    based_on: Option<String>,
    run: RunProps,
    alignment: Option<Alignment>,
    space_before: Option<f32>,
    space_after: Option<f32>,
    numbered: bool,
    bordered: bool,
}

/// A paragraph style with its whole `basedOn` chain applied.
#[derive(Debug, Clone, Default)]
struct ResolvedStyle {
    name: Option<String>,
    run: RunProps,
    alignment: Option<Alignment>,
    space_before: Option<f32>,
    space_after: Option<f32>,
    numbered: bool,
    bordered: bool,
}

#[derive(Debug, Clone)]
struct Styles {
    run_defaults: RunProps,
    space_after_default: Option<f32>,
    defs: HashMap<String, StyleDef>,
    default_paragraph: Option<String>,
    /// Run property sets whose `w:sz` was dropped
    unusable_sizes: usize,
}

impl Styles {
    fn empty(theme: &ThemeFonts) -> Self {
        Self {
            run_defaults: RunProps {
                font: Some(theme.minor.clone()),
                ..Default::default()
            },
            space_after_default: None,
            defs: HashMap::new(),
            default_paragraph: None,
            unusable_sizes: 0,
        }
    }

    fn parse(xml: &str, theme: &ThemeFonts) -> Option<Self> {
        let doc = match Document::parse(xml) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("styles.xml unreadable, using defaults: {}", e);
                return None;
            }
        };
        let root = doc.root_element();
        let mut styles = Self::empty(theme);
        styles.unusable_sizes = root
            .descendants()
            .filter(|n| is_wml(n, "rPr") && has_unusable_size(n))
            .count();

        if let Some(defaults) = wml(root, "docDefaults") {
            if let Some(rpr) = wml(defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
                styles.run_defaults = RunProps::parse(rpr, theme).over(&styles.run_defaults);
            }
            styles.space_after_default = wml(defaults, "pPrDefault")
                .and_then(|n| wml(n, "pPr"))
                .and_then(|n| wml(n, "spacing"))
                .and_then(|n| spacing_attr(n, "after"));
        }

        for node in root.children().filter(|n| is_wml(n, "style")) {
            let Some(id) = node.attribute((WML_NS, "styleId")) else {
                continue;
            };
            let kind = node.attribute((WML_NS, "type")).unwrap_or("paragraph");
            if kind == "paragraph" && node.attribute((WML_NS, "default")) == Some("1") {
                styles.default_paragraph = Some(id.to_string());
            }

            let name = wml_attr(node, "name").unwrap_or(id).to_string();
            let ppr = wml(node, "pPr");
            let spacing = ppr.and_then(|n| wml(n, "spacing"));
            let lowered = name.to_lowercase();
            let def = StyleDef {
                numbered: ppr.and_then(|n| wml(n, "numPr")).is_some()
                    || lowered.starts_with("list")
                    || lowered.contains("bullet")
                    || lowered.contains("number"),
                bordered: wml(node, "tblPr")
                    .and_then(|n| wml(n, "tblBorders"))
                    .map(has_visible_border)
                    .unwrap_or(false),
                name,
                based_on: wml_attr(node, "basedOn").map(str::to_string),
                run: wml(node, "rPr")
                    .map(|n| RunProps::parse(n, theme))
                    .unwrap_or_default(),
                alignment: ppr.and_then(|n| wml_attr(n, "jc")).and_then(parse_alignment),
                space_before: spacing.and_then(|n| spacing_attr(n, "before")),
                space_after: spacing.and_then(|n| spacing_attr(n, "after")),
            };
            styles.defs.insert(id.to_string(), def);
        }

        log::debug!("styles.xml: {} style definitions", styles.defs.len());
        Some(styles)
    }

    /// Resolve a paragraph style (or the default paragraph style).
    fn resolve(&self, id: Option<&str>) -> ResolvedStyle {
        let mut chain: Vec<&StyleDef> = Vec::new();
        let mut next = id.or(self.default_paragraph.as_deref());
        while let Some(current) = next {
            let Some(def) = self.defs.get(current) else {
                break;
            };
            if chain.len() >= MAX_STYLE_DEPTH || chain.iter().any(|d| std::ptr::eq(*d, def)) {
                break;
            }
            chain.push(def);
            next = def.based_on.as_deref();
        }

        let mut resolved = ResolvedStyle {
            name: chain.first().map(|d| d.name.clone()),
            run: self.run_defaults.clone(),
            space_after: self.space_after_default,
            ..Default::default()
        };
        for def in chain.iter().rev() {
            resolved.run = def.run.over(&resolved.run);
            resolved.alignment = def.alignment.or(resolved.alignment);
            resolved.space_before = def.space_before.or(resolved.space_before);
            resolved.space_after = def.space_after.or(resolved.space_after);
            resolved.numbered |= def.numbered;
            resolved.bordered |= def.bordered;
        }
        resolved
    }
}

fn has_visible_border(borders: Node) -> bool {
    borders.children().filter(|n| n.is_element()).any(|edge| {
        !matches!(
            edge.attribute((WML_NS, "val")),
            None | Some("none") | Some("nil")
        )
    })
}

fn parse_relationships(xml: &str) -> HashMap<String, String> {
    let Ok(doc) = Document::parse(xml) else {
        log::warn!("document relationships unreadable");
        return HashMap::new();
    };
    doc.root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect()
}

/// `<Pages>` from the extended properties, as last saved by Word.
fn parse_page_count(xml: &str) -> Option<u32> {
    let doc = Document::parse(xml).ok()?;
    doc.descendants()
        .find(|n| n.tag_name().name() == "Pages")
        .and_then(|n| n.text())
        .and_then(|t| t.trim().parse().ok())
}

// ---------------------------------------------------------------------------
// Section geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Section {
    width: f32,
    height: f32,
    landscape: Option<bool>,
    margins: Margins,
    header_offset: f32,
    footer_offset: f32,
}

impl Section {
    fn parse(sect: Option<Node>) -> Self {
        let mut section = Section {
            width: 612.0,
            height: 792.0,
            landscape: None,
            margins: Margins::uniform(72.0),
            header_offset: DEFAULT_RUNNING_OFFSET,
            footer_offset: DEFAULT_RUNNING_OFFSET,
        };
        let Some(sect) = sect else {
            return section;
        };

        if let Some(size) = wml(sect, "pgSz") {
            let positive = |attr: &str| twips_attr(size, attr).filter(|v| *v > 0.0);
            section.width = positive("w").unwrap_or(section.width);
            section.height = positive("h").unwrap_or(section.height);
            section.landscape = size
                .attribute((WML_NS, "orient"))
                .map(|o| o == "landscape");
        }
        if let Some(margin) = wml(sect, "pgMar") {
            // Negative top/bottom margins mean "do not move text"; the
            // distance is what matters here.
            let side = |attr: &str, fallback: f32| twips_attr(margin, attr).map(f32::abs).unwrap_or(fallback);
            section.margins = Margins {
                top: side("top", 72.0),
                bottom: side("bottom", 72.0),
                left: side("left", 72.0),
                right: side("right", 72.0),
            };
            section.header_offset = side("header", DEFAULT_RUNNING_OFFSET);
            section.footer_offset = side("footer", DEFAULT_RUNNING_OFFSET);
        }
        section
    }
}

/// Package path of the default (or first) header/footer of a section.
fn reference_target(sect: Node, kind: &str, rels: &HashMap<String, String>) -> Option<String> {
    let refs: Vec<Node> = sect.children().filter(|n| is_wml(n, kind)).collect();
    let chosen = refs
        .iter()
        .find(|n| n.attribute((WML_NS, "type")).unwrap_or("default") == "default")
        .or_else(|| refs.first())?;
    let target = rels.get(chosen.attribute((REL_NS, "id"))?)?;
    Some(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    })
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

struct BodyWalker<'s> {
    styles: &'s Styles,
    theme: &'s ThemeFonts,
    structure: RawStructure,
    paragraph: usize,
    page: u32,
    unusable_sizes: usize,
}

impl<'s> BodyWalker<'s> {
    fn new(styles: &'s Styles, theme: &'s ThemeFonts) -> Self {
        Self {
            styles,
            theme,
            structure: RawStructure::new(SourceFormat::Docx),
            paragraph: 0,
            page: 1,
            unusable_sizes: 0,
        }
    }

    fn walk(&mut self, parent: Node, cell: Option<(usize, usize)>) {
        for node in parent.children().filter(|n| n.tag_name().namespace() == Some(WML_NS)) {
            match node.tag_name().name() {
                "p" => self.read_paragraph(node, cell),
                "tbl" => self.read_table(node),
                "sdt" => {
                    if let Some(content) = wml(node, "sdtContent") {
                        self.walk(content, cell);
                    }
                }
                "customXml" | "ins" | "smartTag" => self.walk(node, cell),
                _ => {}
            }
        }
    }

    fn page_break(&mut self, before_paragraph: usize) {
        self.structure.page_breaks.push(before_paragraph as u32);
        self.page += 1;
    }

    fn read_paragraph(&mut self, p: Node, cell: Option<(usize, usize)>) {
        let ppr = wml(p, "pPr");
        let style = self
            .styles
            .resolve(ppr.and_then(|n| wml_attr(n, "pStyle")));
        let alignment = ppr
            .and_then(|n| wml_attr(n, "jc"))
            .and_then(parse_alignment)
            .or(style.alignment);
        let spacing = ppr.and_then(|n| wml(n, "spacing"));
        let space_before = spacing
            .and_then(|n| spacing_attr(n, "before"))
            .or(style.space_before);
        let space_after = spacing
            .and_then(|n| spacing_attr(n, "after"))
            .or(style.space_after);
        let numbered = style.numbered || ppr.and_then(|n| wml(n, "numPr")).is_some();

        if self.paragraph > 0 && ppr.and_then(|n| wml_bool(n, "pageBreakBefore")) == Some(true) {
            self.page_break(self.paragraph);
        }

        let mut break_after = false;
        for run in p.descendants().filter(|n| is_wml(n, "r")) {
            let mut props = style.run.clone();
            let rpr = wml(run, "rPr");
            if let Some(char_style) = rpr
                .and_then(|n| wml_attr(n, "rStyle"))
                .and_then(|id| self.styles.defs.get(id))
            {
                props = char_style.run.over(&props);
            }
            if let Some(rpr) = rpr {
                if has_unusable_size(&rpr) {
                    self.unusable_sizes += 1;
                }
                props = RunProps::parse(rpr, self.theme).over(&props);
            }

            let mut text = String::new();
            for piece in run.children().filter(|n| n.tag_name().namespace() == Some(WML_NS)) {
                match piece.tag_name().name() {
                    "t" => text.push_str(piece.text().unwrap_or("")),
                    "tab" => text.push('\t'),
                    "br" if piece.attribute((WML_NS, "type")) == Some("page") => break_after = true,
                    "br" | "cr" => text.push('\n'),
                    "noBreakHyphen" => text.push('-'),
                    _ => {}
                }
            }
            if text.is_empty() {
                continue;
            }

            self.structure.runs.push(RawRun {
                text: text.nfc().collect(),
                font_name: Some(props.font.clone().unwrap_or_else(|| self.theme.minor.clone())),
                font_size: Some(props.size.unwrap_or(DEFAULT_FONT_SIZE)),
                bold: props.bold.unwrap_or(false),
                italic: props.italic.unwrap_or(false),
                color: props.color(),
                alignment,
                style_name: style.name.clone(),
                numbered,
                page: self.page,
                bbox: None,
                region: Region::Body,
                table_cell: cell,
                paragraph: self.paragraph,
                space_before,
                space_after,
            });
        }

        self.paragraph += 1;
        if break_after {
            self.page_break(self.paragraph);
        }
    }

    fn read_table(&mut self, tbl: Node) {
        let rows: Vec<Node> = tbl.children().filter(|n| is_wml(n, "tr")).collect();
        if rows.is_empty() {
            self.structure.warn("DOCX table without rows skipped");
            return;
        }

        let index = self.structure.tables.len();
        let tbl_pr = wml(tbl, "tblPr");
        let bordered = tbl_pr
            .and_then(|n| wml(n, "tblBorders"))
            .map(has_visible_border)
            .or_else(|| {
                tbl_pr
                    .and_then(|n| wml_attr(n, "tblStyle"))
                    .map(|id| self.styles.resolve(Some(id)).bordered)
            })
            .unwrap_or(false);
        let page = self.page;
        self.structure.tables.push(RawTable {
            rows: rows.len(),
            columns: 0,
            has_header_row: false,
            border: if bordered { BorderStyle::Single } else { BorderStyle::None },
            page,
        });

        let grid_columns = wml(tbl, "tblGrid")
            .map(|g| g.children().filter(|n| is_wml(n, "gridCol")).count())
            .unwrap_or(0);
        let mut widest_row = 0;
        let mut header_marked = false;
        let first_run = self.structure.runs.len();

        for (r, tr) in rows.iter().enumerate() {
            if r == 0 {
                header_marked = wml(*tr, "trPr")
                    .and_then(|n| wml_bool(n, "tblHeader"))
                    .unwrap_or(false);
            }
            let mut span_total = 0;
            for tc in tr.children().filter(|n| is_wml(n, "tc")) {
                span_total += wml(tc, "tcPr")
                    .and_then(|n| wml_attr(n, "gridSpan"))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(1);
                self.walk(tc, Some((index, r)));
            }
            widest_row = widest_row.max(span_total);
        }

        let columns = if grid_columns > 0 { grid_columns } else { widest_row };
        let has_header_row =
            header_marked || bold_first_row(&self.structure.runs[first_run..], index);
        let table = &mut self.structure.tables[index];
        table.columns = columns;
        table.has_header_row = has_header_row;
    }
}

/// Row 0 is all bold while row 1 is not.
fn bold_first_row(runs: &[RawRun], table: usize) -> bool {
    let row = |r: usize| runs.iter().filter(move |run| run.table_cell == Some((table, r)));
    let first_bold = row(0).next().is_some() && row(0).all(|run| run.bold);
    first_bold && row(1).any(|run| !run.bold)
}

// ---------------------------------------------------------------------------
// Header and footer parts
// ---------------------------------------------------------------------------

/// Complex-field state while collecting header/footer text.
#[derive(Default)]
struct FieldState {
    instr: String,
    in_instr: bool,
    suppress: bool,
    placed: bool,
}

fn field_placeholder(instr: &str) -> Option<&'static str> {
    match instr.split_whitespace().next()?.to_ascii_uppercase().as_str() {
        "PAGE" => Some(PAGE_PLACEHOLDER),
        "NUMPAGES" | "SECTIONPAGES" => Some(PAGES_PLACEHOLDER),
        _ => None,
    }
}

/// Collect paragraph text, turning page-number fields into placeholders.
fn collect_text(node: Node, state: &mut FieldState, out: &mut String) {
    for child in node.children().filter(|n| n.tag_name().namespace() == Some(WML_NS)) {
        match child.tag_name().name() {
            "fldSimple" => {
                match child
                    .attribute((WML_NS, "instr"))
                    .and_then(field_placeholder)
                {
                    Some(placeholder) => out.push_str(placeholder),
                    None => collect_text(child, state, out),
                }
            }
            "r" => {
                for piece in child.children().filter(|n| n.tag_name().namespace() == Some(WML_NS)) {
                    match piece.tag_name().name() {
                        "fldChar" => match piece.attribute((WML_NS, "fldCharType")) {
                            Some("begin") => {
                                *state = FieldState {
                                    in_instr: true,
                                    ..Default::default()
                                };
                            }
                            Some("separate") => {
                                state.in_instr = false;
                                if let Some(placeholder) = field_placeholder(&state.instr) {
                                    out.push_str(placeholder);
                                    state.suppress = true;
                                    state.placed = true;
                                }
                            }
                            Some("end") => {
                                if !state.placed {
                                    if let Some(placeholder) = field_placeholder(&state.instr) {
                                        out.push_str(placeholder);
                                    }
                                }
                                *state = FieldState::default();
                            }
                            _ => {}
                        },
                        "instrText" if state.in_instr => {
                            state.instr.push_str(piece.text().unwrap_or(""))
                        }
                        "t" if !state.suppress && !state.in_instr => {
                            out.push_str(piece.text().unwrap_or(""))
                        }
                        "tab" if !state.suppress => out.push(' '),
                        _ => {}
                    }
                }
            }
            "hyperlink" | "smartTag" | "ins" | "sdt" | "sdtContent" | "customXml" => {
                collect_text(child, state, out)
            }
            _ => {}
        }
    }
}

fn read_running_part(
    xml: &str,
    styles: &Styles,
    theme: &ThemeFonts,
    region: Region,
    offset: f32,
) -> Option<RawHeaderFooter> {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("DOCX {:?} part unreadable: {}", region, e);
            return None;
        }
    };

    let mut pieces: Vec<String> = Vec::new();
    let mut first: Option<(Node, ResolvedStyle)> = None;
    for p in doc.descendants().filter(|n| is_wml(n, "p")) {
        let mut text = String::new();
        collect_text(p, &mut FieldState::default(), &mut text);
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }
        if first.is_none() {
            let style = styles.resolve(wml(p, "pPr").and_then(|n| wml_attr(n, "pStyle")));
            first = Some((p, style));
        }
        pieces.push(text);
    }
    let (p, style) = first?;
    let text: String = pieces.join(" ").nfc().collect();

    let ppr = wml(p, "pPr");
    let alignment = ppr
        .and_then(|n| wml_attr(n, "jc"))
        .and_then(parse_alignment)
        .or(style.alignment)
        .unwrap_or_default();
    let mut props = style.run.clone();
    if let Some(rpr) = p
        .descendants()
        .filter(|n| is_wml(n, "r"))
        .find(|r| r.descendants().any(|n| is_wml(&n, "t")))
        .and_then(|r| wml(r, "rPr"))
    {
        props = RunProps::parse(rpr, theme).over(&props);
    }

    let size = props.size.unwrap_or(DEFAULT_FONT_SIZE);
    let run = RawRun {
        text: text.clone(),
        font_name: Some(props.font.clone().unwrap_or_else(|| theme.minor.clone())),
        font_size: Some(size),
        bold: props.bold.unwrap_or(false),
        italic: props.italic.unwrap_or(false),
        color: props.color(),
        alignment: Some(alignment),
        style_name: style.name.clone(),
        region,
        ..Default::default()
    };
    // The section distance is measured to the text box; placement is by baseline.
    let baseline = match region {
        Region::Footer => offset + size * 0.2,
        _ => offset + size * 0.8,
    };
    let page_number = text.contains(PAGE_PLACEHOLDER) || text.contains(PAGES_PLACEHOLDER);
    Some(RawHeaderFooter {
        text,
        alignment,
        offset: baseline,
        run,
        page_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

    fn package(parts: &[(&str, String)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opt = zip::write::SimpleFileOptions::default();
            for (name, content) in parts {
                zip.start_file(*name, opt).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    fn styles_xml() -> String {
        format!(
            r#"<?xml version="1.0"?><w:styles {NS}>
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Georgia"/><w:sz w:val="22"/></w:rPr></w:rPrDefault>
<w:pPrDefault><w:pPr><w:spacing w:after="160"/></w:pPr></w:pPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/>
<w:pPr><w:spacing w:before="480" w:after="120"/></w:pPr><w:rPr><w:rFonts w:asciiTheme="majorHAnsi"/><w:b/><w:sz w:val="32"/><w:color w:val="2F5496"/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/></w:style>
<w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4"/></w:tblBorders></w:tblPr></w:style>
</w:styles>"#
        )
    }

    fn document_xml() -> String {
        format!(
            r#"<?xml version="1.0"?><w:document {NS}><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quarterly Report</w:t></w:r></w:p>
<w:p><w:pPr><w:jc w:val="both"/></w:pPr><w:r><w:t xml:space="preserve">Revenue grew </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>steadily</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="ListBullet"/></w:pPr><w:r><w:t>First point</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Second point</w:t></w:r><w:r><w:br w:type="page"/></w:r></w:p>
<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/></w:tblPr><w:tblGrid><w:gridCol/><w:gridCol/><w:gridCol/></w:tblGrid>
<w:tr><w:trPr><w:tblHeader/></w:trPr><w:tc><w:p><w:r><w:t>Item</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Qty</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Price</w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>Apples</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>3</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>1.20</w:t></w:r></w:p></w:tc></w:tr>
</w:tbl>
<w:sectPr><w:headerReference w:type="default" r:id="rId7"/><w:footerReference w:type="default" r:id="rId8"/>
<w:pgSz w:w="16838" w:h="11906" w:orient="landscape"/>
<w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1701" w:header="567" w:footer="567"/></w:sectPr>
</w:body></w:document>"#
        )
    }

    fn sample() -> Vec<u8> {
        package(&[
            ("[Content_Types].xml", "<Types/>".to_string()),
            ("word/document.xml", document_xml()),
            ("word/styles.xml", styles_xml()),
            (
                "word/theme/theme1.xml",
                r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:themeElements><a:fontScheme><a:majorFont><a:latin typeface="Cambria"/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/></a:minorFont></a:fontScheme></a:themeElements></a:theme>"#.to_string(),
            ),
            (
                "word/_rels/document.xml.rels",
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId7" Type="header" Target="header1.xml"/><Relationship Id="rId8" Type="footer" Target="footer1.xml"/></Relationships>"#.to_string(),
            ),
            (
                "word/header1.xml",
                format!(r#"<w:hdr {NS}><w:p><w:pPr><w:jc w:val="right"/></w:pPr><w:r><w:rPr><w:sz w:val="18"/></w:rPr><w:t>ACME Corp</w:t></w:r></w:p></w:hdr>"#),
            ),
            (
                "word/footer1.xml",
                format!(
                    r#"<w:ftr {NS}><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t xml:space="preserve">Page </w:t></w:r><w:fldSimple w:instr=" PAGE "><w:r><w:t>1</w:t></w:r></w:fldSimple><w:r><w:t xml:space="preserve"> of </w:t></w:r><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText> NUMPAGES </w:instrText></w:r><w:r><w:fldChar w:fldCharType="separate"/></w:r><w:r><w:t>2</w:t></w:r><w:r><w:fldChar w:fldCharType="end"/></w:r></w:p></w:ftr>"#
                ),
            ),
        ])
    }

    fn read(data: &[u8]) -> RawStructure {
        DocxReader::new().read(data).unwrap()
    }

    #[test]
    fn test_styles_and_runs() {
        let structure = read(&sample());
        let heading = &structure.runs[0];
        assert_eq!(heading.text, "Quarterly Report");
        assert_eq!(heading.style_name.as_deref(), Some("heading 1"));
        assert_eq!(heading.font_name.as_deref(), Some("Cambria"));
        assert_eq!(heading.font_size, Some(16.0));
        assert!(heading.bold);
        assert_eq!(heading.color.as_deref(), Some("#2F5496"));
        assert_eq!(heading.space_before, Some(24.0));

        let body = &structure.runs[1];
        assert_eq!(body.font_name.as_deref(), Some("Georgia"));
        assert_eq!(body.font_size, Some(11.0));
        assert_eq!(body.alignment, Some(Alignment::Justify));
        assert_eq!(body.space_after, Some(8.0));
        assert!(structure.runs[2].italic);
        assert_eq!(structure.runs[2].paragraph, 1);
    }

    #[test]
    fn test_list_paragraphs_are_numbered() {
        let structure = read(&sample());
        let first = structure.runs.iter().find(|r| r.text == "First point").unwrap();
        let second = structure.runs.iter().find(|r| r.text == "Second point").unwrap();
        assert!(first.numbered);
        assert!(second.numbered);
        assert!(!structure.runs[0].numbered);
    }

    #[test]
    fn test_table_grid_and_border() {
        let structure = read(&sample());
        assert_eq!(structure.tables.len(), 1);
        let table = &structure.tables[0];
        assert_eq!(table.rows, 2);
        assert_eq!(table.columns, 3);
        assert!(table.has_header_row);
        assert_eq!(table.border, BorderStyle::Single);
        assert_eq!(table.page, 2);

        let cell = structure.runs.iter().find(|r| r.text == "Apples").unwrap();
        assert_eq!(cell.table_cell, Some((0, 1)));
    }

    #[test]
    fn test_section_geometry_and_breaks() {
        let structure = read(&sample());
        let page = structure.pages[0];
        assert!((page.width - 841.9).abs() < 0.1);
        assert_eq!(page.landscape, Some(true));
        assert_eq!(structure.page_count(), 2);
        assert_eq!(structure.page_breaks, vec![4]);

        let margins = structure.margins.unwrap();
        assert!((margins.left - 85.05).abs() < 0.01);
        assert!((margins.top - 56.7).abs() < 0.01);
    }

    #[test]
    fn test_header_and_footer_parts() {
        let structure = read(&sample());
        let header = structure.header.unwrap();
        assert_eq!(header.text, "ACME Corp");
        assert_eq!(header.alignment, Alignment::Right);
        assert_eq!(header.run.font_size, Some(9.0));
        assert!(!header.page_number);
        assert!((header.offset - 35.55).abs() < 0.01);

        let footer = structure.footer.unwrap();
        assert_eq!(footer.text, "Page {page} of {pages}");
        assert_eq!(footer.alignment, Alignment::Center);
        assert!(footer.page_number);
    }

    #[test]
    fn test_minimal_package_uses_defaults() {
        let data = package(&[(
            "word/document.xml",
            format!(r#"<w:document {NS}><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#),
        )]);
        let structure = read(&data);
        assert_eq!(structure.runs.len(), 1);
        assert_eq!(structure.runs[0].font_name.as_deref(), Some("Calibri"));
        assert_eq!(structure.runs[0].font_size, Some(DEFAULT_FONT_SIZE));
        assert_eq!(structure.pages[0].width, 612.0);
        assert!(structure.header.is_none());
    }

    #[test]
    fn test_broken_document_xml_is_corrupt() {
        let data = package(&[("word/document.xml", "<w:document".to_string())]);
        let err = DocxReader::new().read(&data).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFile);
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let err = DocxReader::new().read(b"PK\x03\x04garbage").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFile);
    }

    fn sized_runs(values: &[&str]) -> Vec<u8> {
        let runs: String = values
            .iter()
            .map(|v| format!(r#"<w:p><w:r><w:rPr><w:sz w:val="{v}"/></w:rPr><w:t>text {v}</w:t></w:r></w:p>"#))
            .collect();
        package(&[
            ("word/document.xml", format!(r#"<w:document {NS}><w:body>{runs}</w:body></w:document>"#)),
            ("word/styles.xml", styles_xml()),
        ])
    }

    #[test]
    fn test_unusable_run_sizes_fall_back_to_style() {
        let structure = read(&sized_runs(&["0", "-4", "NaN", "inf", "24"]));
        let sizes: Vec<Option<f32>> = structure.runs.iter().map(|r| r.font_size).collect();
        assert_eq!(sizes, vec![Some(11.0), Some(11.0), Some(11.0), Some(11.0), Some(12.0)]);
        assert!(structure
            .warnings
            .iter()
            .any(|w| w.starts_with("4 font size(s)")));
    }

    #[test]
    fn test_unusable_spacing_and_page_size_ignored() {
        let data = package(&[(
            "word/document.xml",
            format!(
                r#"<w:document {NS}><w:body><w:p><w:pPr><w:spacing w:before="-240" w:after="NaN"/></w:pPr><w:r><w:t>x</w:t></w:r></w:p>
<w:sectPr><w:pgSz w:w="0" w:h="-5"/></w:sectPr></w:body></w:document>"#
            ),
        )]);
        let structure = read(&data);
        assert_eq!(structure.runs[0].space_before, None);
        assert_eq!(structure.runs[0].space_after, None);
        assert_eq!(structure.pages[0].width, 612.0);
        assert_eq!(structure.pages[0].height, 792.0);
    }

    #[test]
    fn test_declared_page_count_is_bounded() {
        let app = |pages: &str| {
            format!(r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Pages>{pages}</Pages></Properties>"#)
        };
        let body = format!(
            r#"<w:document {NS}><w:body><w:p><w:r><w:t>a</w:t><w:br w:type="page"/></w:r></w:p><w:p><w:r><w:t>b</w:t></w:r></w:p></w:body></w:document>"#
        );

        let huge = read(&package(&[
            ("word/document.xml", body.clone()),
            ("docProps/app.xml", app("4294967295")),
        ]));
        assert_eq!(huge.pages.len(), 1);
        assert_eq!(huge.page_count(), 2);
        assert!(huge.warnings.iter().any(|w| w.contains("4294967295")));

        let plausible = read(&package(&[
            ("word/document.xml", body.clone()),
            ("docProps/app.xml", app("7")),
        ]));
        assert_eq!(plausible.pages.len(), 1);
        assert_eq!(plausible.page_count(), 7);

        let too_few = read(&package(&[
            ("word/document.xml", body),
            ("docProps/app.xml", app("1")),
        ]));
        assert_eq!(too_few.page_count(), 2);
    }
}
