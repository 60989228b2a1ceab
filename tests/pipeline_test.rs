//! End-to-end tests: generate a document, read it back, extract its template.

use docstencil::content::parse_content;
use docstencil::generate::{DocumentGenerator, GenerateOptions, OutputFormat};
use docstencil::model::{
    Alignment, BorderStyle, HeaderFooter, Margins, NormalizedTemplateModel, PageSetup, Placement,
    StyleRole, StyleRule, TableSchema,
};
use docstencil::{extract_template, ErrorKind, SourceFormat, TemplateScope, TemplateService};
use std::io::{Cursor, Write};

const CONTENT: &str = "# Report

The first paragraph of the report.

A second paragraph with more words.

A third paragraph closes the page.


## Details

| Item | Qty |
|------|-----|
| Apples | 3 |
| Pears | 5 |

- first point
- second point
";

fn template_model() -> NormalizedTemplateModel {
    let mut model = NormalizedTemplateModel::new(PageSetup::new(612.0, 792.0, Margins::uniform(72.0)));
    for (family, size) in [("Helvetica", 11.0), ("Helvetica", 20.0), ("Helvetica", 9.0)] {
        model.observe_font(family, size);
    }
    model.set_style(StyleRole::Body, StyleRule::new("Helvetica", 11.0).with_spacing(0.0, 6.0));
    model.set_style(StyleRole::Heading1, StyleRule::new("Helvetica", 20.0).bold(true));
    model.footer = Some(HeaderFooter::new(
        "Page {page} of {pages}",
        Placement {
            alignment: Alignment::Center,
            offset: 30.0,
        },
        StyleRule::new("Helvetica", 9.0),
    ));
    model.tables.push(TableSchema::new(2, 3, true, BorderStyle::Single));
    model
}

fn generate(format: OutputFormat) -> docstencil::GeneratedDocument {
    DocumentGenerator::new(GenerateOptions::new().with_format(format))
        .generate(&template_model(), parse_content(CONTENT))
        .unwrap()
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.5
}

#[test]
fn test_pdf_round_trip() {
    let doc = generate(OutputFormat::Pdf);
    assert_eq!(doc.format, OutputFormat::Pdf);
    assert_eq!(doc.page_count, 2);

    let extraction = extract_template(&doc.bytes, SourceFormat::Pdf).unwrap();
    let model = extraction.model;

    assert!(close(model.page.width, 612.0));
    assert!(close(model.page.height, 792.0));
    assert_eq!(model.page_count, 2);
    assert!(close(model.page.margins.left, 72.0));

    let body = model.style(StyleRole::Body).unwrap();
    assert_eq!(body.font_family, "Helvetica");
    assert!(close(body.size, 11.0));

    let heading = model.style(StyleRole::Heading1).unwrap();
    assert!(close(heading.size, 20.0));
    assert!(heading.bold);

    let footer = model.footer.as_ref().unwrap();
    assert_eq!(footer.text, "Page {page} of {pages}");
    assert!(footer.page_number);
    assert!(close(footer.position.offset, 30.0));
    assert!(close(footer.style.size, 9.0));
}

#[test]
fn test_docx_round_trip() {
    let doc = generate(OutputFormat::Docx);
    assert_eq!(doc.format, OutputFormat::Docx);
    assert!(!doc.degraded);

    let extraction = extract_template(&doc.bytes, SourceFormat::Docx).unwrap();
    let model = extraction.model;

    assert!(close(model.page.width, 612.0));
    assert!(close(model.page.height, 792.0));
    assert!(close(model.page.margins.top, 72.0));
    assert!(close(model.page.margins.left, 72.0));
    assert_eq!(model.page_count, doc.page_count as u32);
    assert_eq!(model.page_breaks.count, 1);

    let heading = model.style(StyleRole::Heading1).unwrap();
    assert_eq!(heading.font_family, "Helvetica");
    assert!(close(heading.size, 20.0));
    assert!(heading.bold);

    let body = model.style(StyleRole::Body).unwrap();
    assert!(close(body.size, 11.0));
    assert!(close(body.space_after, 6.0));
    assert!(model.style(StyleRole::ListItem).is_some());
    assert!(model.style(StyleRole::TableHeader).is_some());
    assert!(model.style(StyleRole::TableCell).is_some());

    assert_eq!(model.tables.len(), 1);
    assert_eq!(model.tables[0].columns, 2);
    assert_eq!(model.tables[0].rows, 3);
    assert!(model.tables[0].has_header_row);
    assert_eq!(model.tables[0].border, BorderStyle::Single);

    let footer = model.footer.as_ref().unwrap();
    assert_eq!(footer.text, "Page {page} of {pages}");
    assert_eq!(footer.position.alignment, Alignment::Center);
    assert!(close(footer.position.offset, 30.0));
    assert!(model.header.is_none());
}

#[test]
fn test_extraction_is_deterministic() {
    let doc = generate(OutputFormat::Pdf);
    let first = extract_template(&doc.bytes, SourceFormat::Pdf).unwrap();
    let second = extract_template(&doc.bytes, SourceFormat::Pdf).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_service_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let service = TemplateService::open(dir.path()).unwrap();
    let template = generate(OutputFormat::Pdf);
    let scope = TemplateScope::user("42");

    let upload = service
        .upload_template("report.pdf", &template.bytes, None, &scope)
        .unwrap();
    assert_eq!(upload.source_format, SourceFormat::Pdf);

    let info = service.get_template_info("report.pdf", &scope).unwrap();
    assert_eq!(info.template_id, upload.template_id);
    assert_eq!(info.summary.page_count, 2);
    assert!(info.summary.has_footer);

    let response = service
        .generate_pdf("report.pdf", &scope, "# Hello\n\nWorld")
        .unwrap();
    let bytes = response.decode().unwrap();
    assert_eq!(bytes.len(), response.byte_len);
    assert!(bytes.starts_with(b"%PDF-"));
    assert_eq!(response.format, OutputFormat::Pdf);
    assert!(!response.degraded);

    let docx = service
        .generate("report.pdf", &scope, "Plain text", OutputFormat::Docx)
        .unwrap();
    assert_eq!(docx.format, OutputFormat::Docx);

    service.delete_template("report.pdf", &scope).unwrap();
    let err = service.get_template_info("report.pdf", &scope).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_upload_base64_with_data_url() {
    use base64::Engine as _;

    let dir = tempfile::tempdir().unwrap();
    let service = TemplateService::open(dir.path()).unwrap();
    let template = generate(OutputFormat::Docx);
    let encoded = format!(
        "data:application/vnd.openxmlformats-officedocument.wordprocessingml.document;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&template.bytes)
    );

    let upload = service
        .upload_template_base64("memo", &encoded, None, &TemplateScope::Global)
        .unwrap();
    assert_eq!(upload.source_format, SourceFormat::Docx);
    assert_eq!(service.list_templates(&TemplateScope::Global).unwrap().len(), 1);
}

#[test]
fn test_upload_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let service = TemplateService::open(dir.path()).unwrap();
    let scope = TemplateScope::Global;
    let pdf = generate(OutputFormat::Pdf).bytes;

    let empty = service.upload_template("empty", &[], None, &scope).unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::CorruptFile);

    let unknown = service
        .upload_template("notes.txt", b"just some text", None, &scope)
        .unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::UnsupportedFormat);

    let mismatch = service
        .upload_template("letter", &pdf, Some(SourceFormat::Docx), &scope)
        .unwrap_err();
    assert_eq!(mismatch.kind(), ErrorKind::UnsupportedFormat);

    let garbage = service
        .upload_template("broken.pdf", b"not a pdf at all", None, &scope)
        .unwrap_err();
    assert_eq!(garbage.kind(), ErrorKind::CorruptFile);

    assert!(service.list_templates(&scope).unwrap().is_empty());
}

#[test]
fn test_valid_geometry_never_fails() {
    let sizes = [(200.0, 300.0), (612.0, 792.0), (842.0, 595.0), (1000.0, 150.0)];
    for (width, height) in sizes {
        for fraction in [0.0, 0.1, 0.3, 0.45] {
            let margins = Margins {
                top: height * fraction,
                bottom: height * fraction,
                left: width * fraction,
                right: width * fraction,
            };
            let model = NormalizedTemplateModel::new(PageSetup::new(width, height, margins));
            let doc = DocumentGenerator::default()
                .generate(&model, parse_content(CONTENT))
                .unwrap();
            assert!(!doc.bytes.is_empty());
        }
    }
}

const WML: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

fn docx_package(document: String, app: Option<String>) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        if let Some(app) = app {
            zip.start_file("docProps/app.xml", options).unwrap();
            zip.write_all(app.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

#[test]
fn test_upload_survives_unusable_font_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let service = TemplateService::open(dir.path()).unwrap();

    for size in ["0", "-4", "NaN"] {
        let paragraphs: String = (0..3)
            .map(|i| {
                format!(r#"<w:p><w:r><w:rPr><w:sz w:val="{size}"/></w:rPr><w:t>run {i}</w:t></w:r></w:p>"#)
            })
            .collect();
        let data = docx_package(
            format!(r#"<w:document {WML}><w:body>{paragraphs}</w:body></w:document>"#),
            None,
        );

        let name = format!("sized-{}.docx", size);
        let upload = service
            .upload_template(&name, &data, None, &TemplateScope::Global)
            .unwrap();
        assert!(
            upload.warnings.iter().any(|w| w.contains("font size")),
            "{:?}",
            upload.warnings
        );

        let info = service.get_template_info(&name, &TemplateScope::Global).unwrap();
        assert!(info.summary.roles.contains(&StyleRole::Body));
        let record = service.store().get(&name, &TemplateScope::Global).unwrap();
        let body = record.model.style(StyleRole::Body).unwrap();
        assert!(body.size > 0.0 && body.size.is_finite());
    }
}

#[test]
fn test_upload_ignores_inflated_page_count() {
    let dir = tempfile::tempdir().unwrap();
    let service = TemplateService::open(dir.path()).unwrap();
    let data = docx_package(
        format!(r#"<w:document {WML}><w:body><w:p><w:r><w:t>one page</w:t></w:r></w:p></w:body></w:document>"#),
        Some(
            r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Pages>4294967295</Pages></Properties>"#
                .to_string(),
        ),
    );

    let upload = service
        .upload_template("inflated.docx", &data, None, &TemplateScope::Global)
        .unwrap();
    assert!(upload.warnings.iter().any(|w| w.contains("4294967295")));

    let info = service
        .get_template_info("inflated.docx", &TemplateScope::Global)
        .unwrap();
    assert_eq!(info.summary.page_count, 1);
}
