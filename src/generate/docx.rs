//! DOCX writer.
//!
//! Emits a minimal WordprocessingML package. Word does its own line layout,
//! so the output keeps structure (styles per role, section geometry, running
//! header/footer with live page fields, table grids) rather than the exact
//! placement of the PDF writer.

use std::fmt::Write as _;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::resolve::StyleSheet;
use super::{DocumentWriter, OutputFormat, RenderJob};
use crate::error::{Error, Result};
use crate::model::{
    Alignment, BorderStyle, ContentBlock, HeaderFooter, NormalizedTemplateModel, StyleRole,
    StyleRule, TableSchema, PAGES_PLACEHOLDER, PAGE_PLACEHOLDER,
};

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const NUM_BULLET: u32 = 1;
const ABSTRACT_BULLET: u32 = 0;
const ABSTRACT_DECIMAL: u32 = 1;

/// Writes generated documents as DOCX.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxWriter;

impl DocxWriter {
    /// Create a DOCX writer.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentWriter for DocxWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Docx
    }

    fn write(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        let body = BodyBuilder::new(job.model).build(job.blocks)?;
        let header = job
            .model
            .header
            .as_ref()
            .map(|h| running_part("hdr", h))
            .transpose()?;
        let footer = job
            .model
            .footer
            .as_ref()
            .map(|f| running_part("ftr", f))
            .transpose()?;
        let title = job
            .options
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(escape)
            .transpose()?;

        let parts = Parts {
            document: document_xml(job.model, &body.xml, header.is_some(), footer.is_some()),
            styles: styles_xml(job.styles),
            numbering: numbering_xml(body.ordered_lists),
            header,
            footer,
            title,
            pages: job.layout.pages.len(),
        };
        parts.package()
    }
}

fn render_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Render(format!("{}: {}", context, err))
}

/// Escape text for an XML element or attribute.
///
/// Fails on characters XML 1.0 cannot represent at all.
fn escape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < '\u{20}' || c == '\u{FFFE}' || c == '\u{FFFF}' => {
                return Err(Error::Render(format!(
                    "character U+{:04X} cannot be stored in DOCX",
                    c as u32
                )));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

fn twips(points: f32) -> i64 {
    (points * 20.0).round() as i64
}

fn style_id(role: StyleRole) -> &'static str {
    match role {
        StyleRole::Body => "Normal",
        StyleRole::Heading1 => "Heading1",
        StyleRole::Heading2 => "Heading2",
        StyleRole::Heading3 => "Heading3",
        StyleRole::ListItem => "ListParagraph",
        StyleRole::TableCell => "TableCell",
        StyleRole::TableHeader => "TableHeader",
    }
}

fn style_name(role: StyleRole) -> &'static str {
    match role {
        StyleRole::Body => "Normal",
        StyleRole::Heading1 => "heading 1",
        StyleRole::Heading2 => "heading 2",
        StyleRole::Heading3 => "heading 3",
        StyleRole::ListItem => "List Paragraph",
        StyleRole::TableCell => "Table Cell",
        StyleRole::TableHeader => "Table Header",
    }
}

fn jc(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

fn run_properties(rule: &StyleRule) -> String {
    let mut rpr = String::from("<w:rPr>");
    let font = xml_attr(&rule.font_family);
    let _ = write!(rpr, r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}"/>"#, font);
    if rule.bold {
        rpr.push_str("<w:b/>");
    }
    if rule.italic {
        rpr.push_str("<w:i/>");
    }
    if let Some(color) = &rule.color {
        let _ = write!(rpr, r#"<w:color w:val="{}"/>"#, color.trim_start_matches('#'));
    }
    let half_points = (rule.size * 2.0).round().max(2.0) as i64;
    let _ = write!(rpr, r#"<w:sz w:val="{0}"/><w:szCs w:val="{0}"/>"#, half_points);
    rpr.push_str("</w:rPr>");
    rpr
}

/// Attribute escape for values that come from the model (font names, colors).
fn xml_attr(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn text_run(text: &str) -> Result<String> {
    Ok(format!(
        r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape(text)?
    ))
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

struct Body {
    xml: String,
    /// Number of restarted ordered lists; each gets its own `w:num`
    ordered_lists: u32,
}

struct BodyBuilder<'a> {
    model: &'a NormalizedTemplateModel,
    xml: String,
    ordered_lists: u32,
    in_ordered: bool,
    table_index: usize,
}

impl<'a> BodyBuilder<'a> {
    fn new(model: &'a NormalizedTemplateModel) -> Self {
        Self {
            model,
            xml: String::new(),
            ordered_lists: 0,
            in_ordered: false,
            table_index: 0,
        }
    }

    fn build(mut self, blocks: &[ContentBlock]) -> Result<Body> {
        let mut i = 0;
        while i < blocks.len() {
            if blocks[i].is_table_row() {
                let start = i;
                while i < blocks.len() && blocks[i].is_table_row() {
                    i += 1;
                }
                self.in_ordered = false;
                self.table(&blocks[start..i])?;
                continue;
            }
            self.block(&blocks[i])?;
            i += 1;
        }
        Ok(Body {
            xml: self.xml,
            ordered_lists: self.ordered_lists,
        })
    }

    fn block(&mut self, block: &ContentBlock) -> Result<()> {
        match block {
            ContentBlock::Heading { level, text } => {
                self.in_ordered = false;
                self.paragraph(StyleRole::heading(*level), text, None)
            }
            ContentBlock::Paragraph { text } => {
                self.in_ordered = false;
                self.paragraph(StyleRole::Body, text, None)
            }
            ContentBlock::ListItem { ordered, text } => {
                let num = if *ordered {
                    if !self.in_ordered {
                        self.ordered_lists += 1;
                        self.in_ordered = true;
                    }
                    NUM_BULLET + self.ordered_lists
                } else {
                    self.in_ordered = false;
                    NUM_BULLET
                };
                self.paragraph(StyleRole::ListItem, text, Some(num))
            }
            ContentBlock::PageBreak => {
                self.in_ordered = false;
                self.xml
                    .push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
                Ok(())
            }
            ContentBlock::TableRow { .. } => self.table(std::slice::from_ref(block)),
        }
    }

    fn paragraph(&mut self, role: StyleRole, text: &str, num: Option<u32>) -> Result<()> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        self.xml.push_str("<w:p><w:pPr>");
        let _ = write!(self.xml, r#"<w:pStyle w:val="{}"/>"#, style_id(role));
        if let Some(num) = num {
            let _ = write!(
                self.xml,
                r#"<w:numPr><w:ilvl w:val="0"/><w:numId w:val="{}"/></w:numPr>"#,
                num
            );
        }
        self.xml.push_str("</w:pPr>");
        if !text.is_empty() {
            self.xml.push_str(&text_run(&text)?);
        }
        self.xml.push_str("</w:p>");
        Ok(())
    }

    fn table(&mut self, rows: &[ContentBlock]) -> Result<()> {
        let tables = &self.model.tables;
        let schema: Option<&TableSchema> = tables.get(self.table_index).or(tables.last());
        self.table_index += 1;

        let first_width = match rows.first() {
            Some(ContentBlock::TableRow { cells }) => cells.len(),
            _ => 0,
        };
        let columns = schema
            .map(|s| s.columns)
            .filter(|c| *c > 0)
            .unwrap_or(first_width)
            .max(1);
        let has_header = schema.map_or(true, |s| s.has_header_row);
        let border = schema.map_or(BorderStyle::Single, |s| s.border);
        let header_role = schema.map_or(StyleRole::TableHeader, |s| s.header_style);
        let cell_role = schema.map_or(StyleRole::TableCell, |s| s.cell_style);

        let column_width = twips(self.model.page.content_width().max(72.0) / columns as f32);

        self.xml.push_str(r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/>"#);
        if border == BorderStyle::Single {
            self.xml.push_str("<w:tblBorders>");
            for edge in ["top", "left", "bottom", "right", "insideH", "insideV"] {
                let _ = write!(
                    self.xml,
                    r#"<w:{} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
                    edge
                );
            }
            self.xml.push_str("</w:tblBorders>");
        }
        self.xml.push_str("</w:tblPr><w:tblGrid>");
        for _ in 0..columns {
            let _ = write!(self.xml, r#"<w:gridCol w:w="{}"/>"#, column_width);
        }
        self.xml.push_str("</w:tblGrid>");

        for (r, row) in rows.iter().enumerate() {
            let cells: &[String] = match row {
                ContentBlock::TableRow { cells } => cells,
                _ => &[],
            };
            let header_row = r == 0 && has_header;
            let role = if header_row { header_role } else { cell_role };

            self.xml.push_str("<w:tr>");
            if header_row {
                self.xml.push_str("<w:trPr><w:tblHeader/></w:trPr>");
            }
            for c in 0..columns {
                let text = cells.get(c).map(String::as_str).unwrap_or("");
                let _ = write!(
                    self.xml,
                    r#"<w:tc><w:tcPr><w:tcW w:w="{}" w:type="dxa"/></w:tcPr>"#,
                    column_width
                );
                self.paragraph(role, text, None)?;
                self.xml.push_str("</w:tc>");
            }
            self.xml.push_str("</w:tr>");
        }
        self.xml.push_str("</w:tbl>");

        // Word needs a paragraph between adjacent tables
        self.xml.push_str("<w:p/>");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

fn document_xml(
    model: &NormalizedTemplateModel,
    body: &str,
    header: bool,
    footer: bool,
) -> String {
    let page = &model.page;
    let m = &page.margins;

    let header_distance = running_distance(model.header.as_ref(), 0.8, m.top);
    let footer_distance = running_distance(model.footer.as_ref(), 0.2, m.bottom);

    let mut sect = String::from("<w:sectPr>");
    if header {
        sect.push_str(r#"<w:headerReference w:type="default" r:id="rIdHeader"/>"#);
    }
    if footer {
        sect.push_str(r#"<w:footerReference w:type="default" r:id="rIdFooter"/>"#);
    }
    let orient = if page.width > page.height {
        r#" w:orient="landscape""#
    } else {
        ""
    };
    let _ = write!(
        sect,
        r#"<w:pgSz w:w="{}" w:h="{}"{}/>"#,
        twips(page.width),
        twips(page.height),
        orient
    );
    let _ = write!(
        sect,
        r#"<w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="{}" w:footer="{}" w:gutter="0"/>"#,
        twips(m.top),
        twips(m.right),
        twips(m.bottom),
        twips(m.left),
        twips(header_distance),
        twips(footer_distance)
    );
    sect.push_str("</w:sectPr>");

    format!(
        r#"{XML_DECL}
<w:document xmlns:w="{WML_NS}" xmlns:r="{REL_NS}"><w:body>{body}{sect}</w:body></w:document>"#
    )
}

/// Section distance for a running part whose offset is a baseline.
fn running_distance(running: Option<&HeaderFooter>, ascent: f32, margin: f32) -> f32 {
    match running {
        Some(r) if r.position.offset > 0.0 => (r.position.offset - ascent * r.style.size).max(0.0),
        _ => (margin / 2.0).min(36.0),
    }
}

fn running_part(tag: &str, running: &HeaderFooter) -> Result<String> {
    let rpr = run_properties(&running.style);
    let mut runs = String::new();

    let mut rest = running.text.as_str();
    while !rest.is_empty() {
        let next = [PAGE_PLACEHOLDER, PAGES_PLACEHOLDER]
            .iter()
            .filter_map(|p| rest.find(p).map(|at| (at, *p)))
            .min_by_key(|(at, _)| *at);
        let Some((at, placeholder)) = next else {
            let _ = write!(runs, r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#, rpr, escape(rest)?);
            break;
        };
        if at > 0 {
            let _ = write!(
                runs,
                r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
                rpr,
                escape(&rest[..at])?
            );
        }
        let field = if placeholder == PAGE_PLACEHOLDER {
            "PAGE"
        } else {
            "NUMPAGES"
        };
        let _ = write!(
            runs,
            r#"<w:fldSimple w:instr=" {} "><w:r>{}<w:t>1</w:t></w:r></w:fldSimple>"#,
            field, rpr
        );
        rest = &rest[at + placeholder.len()..];
    }

    Ok(format!(
        r#"{XML_DECL}
<w:{tag} xmlns:w="{WML_NS}" xmlns:r="{REL_NS}"><w:p><w:pPr><w:jc w:val="{jc}"/></w:pPr>{runs}</w:p></w:{tag}>"#,
        jc = jc(running.position.alignment)
    ))
}

fn styles_xml(styles: &StyleSheet) -> String {
    let body = styles.rule(StyleRole::Body);
    let mut xml = format!(
        r#"{XML_DECL}
<w:styles xmlns:w="{WML_NS}"><w:docDefaults><w:rPrDefault>{}</w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:before="0" w:after="0"/></w:pPr></w:pPrDefault></w:docDefaults>"#,
        run_properties(body)
    );

    for role in StyleRole::ALL {
        let rule = styles.rule(role);
        let default = if role == StyleRole::Body {
            r#" w:default="1""#
        } else {
            ""
        };
        let _ = write!(
            xml,
            r#"<w:style w:type="paragraph"{} w:styleId="{}"><w:name w:val="{}"/>"#,
            default,
            style_id(role),
            style_name(role)
        );
        if role != StyleRole::Body {
            xml.push_str(r#"<w:basedOn w:val="Normal"/>"#);
        }
        let _ = write!(
            xml,
            r#"<w:qFormat/><w:pPr><w:spacing w:before="{}" w:after="{}"/><w:jc w:val="{}"/>"#,
            twips(rule.space_before),
            twips(rule.space_after),
            jc(rule.alignment)
        );
        if role == StyleRole::ListItem {
            xml.push_str(r#"<w:ind w:left="720" w:hanging="360"/>"#);
        }
        xml.push_str("</w:pPr>");
        xml.push_str(&run_properties(rule));
        xml.push_str("</w:style>");
    }
    xml.push_str("</w:styles>");
    xml
}

fn numbering_xml(ordered_lists: u32) -> String {
    let level = |format: &str, text: &str| {
        format!(
            r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="{}"/><w:lvlText w:val="{}"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl>"#,
            format, text
        )
    };
    let mut xml = format!(
        r#"{XML_DECL}
<w:numbering xmlns:w="{WML_NS}"><w:abstractNum w:abstractNumId="{}">{}</w:abstractNum><w:abstractNum w:abstractNumId="{}">{}</w:abstractNum>"#,
        ABSTRACT_BULLET,
        level("bullet", "\u{2022}"),
        ABSTRACT_DECIMAL,
        level("decimal", "%1.")
    );
    let _ = write!(
        xml,
        r#"<w:num w:numId="{}"><w:abstractNumId w:val="{}"/></w:num>"#,
        NUM_BULLET, ABSTRACT_BULLET
    );
    for list in 1..=ordered_lists {
        let _ = write!(
            xml,
            r#"<w:num w:numId="{}"><w:abstractNumId w:val="{}"/><w:lvlOverride w:ilvl="0"><w:startOverride w:val="1"/></w:lvlOverride></w:num>"#,
            NUM_BULLET + list,
            ABSTRACT_DECIMAL
        );
    }
    xml.push_str("</w:numbering>");
    xml
}

struct Parts {
    document: String,
    styles: String,
    numbering: String,
    header: Option<String>,
    footer: Option<String>,
    title: Option<String>,
    pages: usize,
}

impl Parts {
    fn content_types(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#
        );
        if self.header.is_some() {
            xml.push_str(r#"<Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/>"#);
        }
        if self.footer.is_some() {
            xml.push_str(r#"<Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/>"#);
        }
        if self.title.is_some() {
            xml.push_str(r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#);
        }
        xml.push_str("</Types>");
        xml
    }

    fn package_rels(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}
<Relationships xmlns="{PACKAGE_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="word/document.xml"/><Relationship Id="rId2" Type="{REL_NS}/extended-properties" Target="docProps/app.xml"/>"#
        );
        if self.title.is_some() {
            xml.push_str(r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#);
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn document_rels(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}
<Relationships xmlns="{PACKAGE_REL_NS}"><Relationship Id="rIdStyles" Type="{REL_NS}/styles" Target="styles.xml"/><Relationship Id="rIdNumbering" Type="{REL_NS}/numbering" Target="numbering.xml"/>"#
        );
        if self.header.is_some() {
            let _ = write!(
                xml,
                r#"<Relationship Id="rIdHeader" Type="{REL_NS}/header" Target="header1.xml"/>"#
            );
        }
        if self.footer.is_some() {
            let _ = write!(
                xml,
                r#"<Relationship Id="rIdFooter" Type="{REL_NS}/footer" Target="footer1.xml"/>"#
            );
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn app(&self) -> String {
        format!(
            r#"{XML_DECL}
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>docstencil</Application><Pages>{}</Pages></Properties>"#,
            self.pages
        )
    }

    fn core(title: &str) -> String {
        format!(
            r#"{XML_DECL}
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title></cp:coreProperties>"#,
            title
        )
    }

    fn package(&self) -> Result<Vec<u8>> {
        let mut entries: Vec<(&str, String)> = vec![
            ("[Content_Types].xml", self.content_types()),
            ("_rels/.rels", self.package_rels()),
            ("docProps/app.xml", self.app()),
            ("word/document.xml", self.document.clone()),
            ("word/_rels/document.xml.rels", self.document_rels()),
            ("word/styles.xml", self.styles.clone()),
            ("word/numbering.xml", self.numbering.clone()),
        ];
        if let Some(header) = &self.header {
            entries.push(("word/header1.xml", header.clone()));
        }
        if let Some(footer) = &self.footer {
            entries.push(("word/footer1.xml", footer.clone()));
        }
        if let Some(title) = &self.title {
            entries.push(("docProps/core.xml", Self::core(title)));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in &entries {
            zip.start_file(*name, options)
                .map_err(|e| render_error("DOCX package", e))?;
            zip.write_all(content.as_bytes())
                .map_err(|e| render_error("DOCX package", e))?;
        }
        let cursor = zip
            .finish()
            .map_err(|e| render_error("DOCX package", e))?;

        let bytes = cursor.into_inner();
        log::debug!("Wrote DOCX: {} parts, {} bytes", entries.len(), bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a < b & \"c\"").unwrap(), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape("tab\there").unwrap(), "tab\there");
        let err = escape("bell\u{7}").unwrap_err();
        assert!(err.to_string().contains("U+0007"));
        assert!(escape("\u{FFFF}").is_err());
    }

    #[test]
    fn test_running_part_fields() {
        let footer = HeaderFooter::new(
            "Page {page} of {pages}",
            crate::model::Placement {
                alignment: Alignment::Right,
                offset: 30.0,
            },
            StyleRule::new("Arial", 9.0),
        );
        let xml = running_part("ftr", &footer).unwrap();
        assert!(xml.contains(r#"<w:jc w:val="right"/>"#));
        assert!(xml.contains(r#"w:instr=" PAGE ""#));
        assert!(xml.contains(r#"w:instr=" NUMPAGES ""#));
        assert!(xml.contains(">Page </w:t>"));
        assert!(xml.contains("> of </w:t>"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }

    #[test]
    fn test_numbering_restarts() {
        let xml = numbering_xml(2);
        assert!(roxmltree::Document::parse(&xml).is_ok());
        assert_eq!(xml.matches("<w:startOverride").count(), 2);
        assert!(xml.contains(r#"<w:num w:numId="3">"#));
    }
}
