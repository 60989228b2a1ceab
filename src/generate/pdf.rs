//! PDF writer.
//!
//! Writes laid-out pages with `lopdf`. Text is set in the standard-14 Type1
//! fonts with WinAnsiEncoding, so no font program is embedded.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::layout::{FontRef, LaidOutPage, Layout};
use super::{DocumentWriter, OutputFormat, RenderJob};
use crate::error::{Error, Result};
use crate::fonts::encode_win_ansi;
use crate::model::PageSetup;

const PRODUCER: &str = concat!("docstencil ", env!("CARGO_PKG_VERSION"));

/// Writes generated documents as PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfWriter;

impl PdfWriter {
    /// Create a PDF writer.
    pub fn new() -> Self {
        Self
    }
}

impl DocumentWriter for PdfWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Pdf
    }

    fn write(&self, job: &RenderJob<'_>) -> Result<Vec<u8>> {
        write_pdf(
            job.layout,
            &job.model.page,
            job.options.title.as_deref(),
            job.options.compress,
        )
    }
}

fn render_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::Render(format!("{}: {}", context, err))
}

/// Serialize a layout to PDF bytes.
pub fn write_pdf(
    layout: &Layout,
    page: &PageSetup,
    title: Option<&str>,
    compress: bool,
) -> Result<Vec<u8>> {
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !(usable(page.width) && usable(page.height)) {
        return Err(Error::Render(format!(
            "invalid page size {}x{}",
            page.width, page.height
        )));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts: BTreeMap<FontRef, String> = BTreeMap::new();
    for text in layout.pages.iter().flat_map(|p| p.texts.iter()) {
        let next = format!("F{}", fonts.len() + 1);
        fonts.entry(text.font).or_insert(next);
    }

    let mut font_dict = Dictionary::new();
    for (font, name) in &fonts {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        font_dict.set(name.as_bytes().to_vec(), Object::Reference(id));
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => font_dict,
    });

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Real(page.width),
        Object::Real(page.height),
    ];

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for laid_out in &layout.pages {
        let content = page_content(laid_out, &fonts)
            .encode()
            .map_err(|e| render_error("content stream", e))?;
        let content_id = doc.add_object(content_stream(content, compress)?);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.clone(),
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = info_dict(&mut doc, title);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| render_error("PDF serialization", e))?;
    log::debug!(
        "Wrote PDF: {} page(s), {} font(s), {} bytes",
        count,
        fonts.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn info_dict(doc: &mut Document, title: Option<&str>) -> ObjectId {
    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    };
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        info.set(
            "Title",
            Object::String(encode_win_ansi(title), StringFormat::Literal),
        );
    }
    doc.add_object(info)
}

fn content_stream(content: Vec<u8>, compress: bool) -> Result<Stream> {
    if !compress {
        return Ok(Stream::new(Dictionary::new(), content));
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&content)
        .map_err(|e| render_error("compression", e))?;
    let compressed = encoder
        .finish()
        .map_err(|e| render_error("compression", e))?;
    Ok(Stream::new(
        dictionary! { "Filter" => "FlateDecode" },
        compressed,
    ))
}

fn real(value: f32) -> Object {
    // two decimals keep content streams small
    Object::Real((value * 100.0).round() / 100.0)
}

fn page_content(page: &LaidOutPage, fonts: &BTreeMap<FontRef, String>) -> Content {
    let mut ops = Vec::new();

    if !page.rules.is_empty() {
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("w", vec![real(0.5)]));
        ops.push(Operation::new("G", vec![Object::Integer(0)]));
        for rule in &page.rules {
            ops.push(Operation::new("m", vec![real(rule.x0), real(rule.y0)]));
            ops.push(Operation::new("l", vec![real(rule.x1), real(rule.y1)]));
        }
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    for text in &page.texts {
        let Some(font) = fonts.get(&text.font) else {
            continue;
        };
        let (r, g, b) = text
            .color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or((0.0, 0.0, 0.0));

        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), real(text.size)],
        ));
        ops.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
        if text.word_spacing > 0.0 {
            ops.push(Operation::new("Tw", vec![real(text.word_spacing)]));
        }
        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                real(text.x),
                real(text.y),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&text.text),
                StringFormat::Literal,
            )],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    Content { operations: ops }
}

/// Parse `#RRGGBB` into 0..1 components.
pub fn parse_hex_color(hex: &str) -> Option<(f32, f32, f32)> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .ok()
            .map(|v| v as f32 / 255.0)
    };
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::StandardFamily;
    use crate::generate::layout::TextItem;

    fn sample_layout() -> Layout {
        let font = FontRef {
            family: StandardFamily::Times,
            bold: true,
            italic: false,
        };
        let pages = (1..=2)
            .map(|number| LaidOutPage {
                number,
                texts: vec![TextItem {
                    x: 72.0,
                    y: 700.0,
                    text: format!("Caf\u{e9} page {}", number),
                    font,
                    size: 12.0,
                    color: Some("#1F4E79".to_string()),
                    word_spacing: 0.0,
                }],
                rules: Vec::new(),
            })
            .collect();
        Layout {
            pages,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), Some((1.0, 0.0, 0.0)));
        assert_eq!(parse_hex_color("00ff00"), Some((0.0, 1.0, 0.0)));
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn test_write_pdf_pages_and_fonts() {
        for compress in [false, true] {
            let bytes =
                write_pdf(&sample_layout(), &PageSetup::letter(), Some("Report"), compress)
                    .unwrap();
            assert!(bytes.starts_with(b"%PDF-"));

            let doc = Document::load_mem(&bytes).unwrap();
            let pages = doc.get_pages();
            assert_eq!(pages.len(), 2);

            let first = pages[&1];
            let fonts = doc.get_page_fonts(first).unwrap();
            assert_eq!(fonts.len(), 1);
            let font = fonts.values().next().unwrap();
            assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Times-Bold");

            let text = doc.extract_text(&[1]).unwrap();
            assert!(text.contains("page 1"));
        }
    }

    #[test]
    fn test_invalid_page_is_render_error() {
        let page = PageSetup::new(0.0, 792.0, crate::model::Margins::uniform(72.0));
        let err = write_pdf(&sample_layout(), &page, None, true).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RenderError);
    }
}
