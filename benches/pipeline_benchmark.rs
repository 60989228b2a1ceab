//! Benchmarks for content parsing, generation and extraction.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docstencil::model::{Margins, NormalizedTemplateModel, PageSetup, StyleRole, StyleRule};
use docstencil::{
    extract_template, parse_content, DocumentGenerator, GenerateOptions, OutputFormat,
    SourceFormat,
};

/// Synthetic content with the given number of sections.
fn create_content(sections: usize) -> String {
    let mut text = String::new();
    for i in 0..sections {
        text.push_str(&format!("# Section {}\n\n", i + 1));
        text.push_str("Benchmark paragraph with enough words to wrap across several lines ");
        text.push_str("of the page so that layout has real work to do.\n\n");
        text.push_str("- first point\n- second point\n\n");
        text.push_str("| Key | Value |\n|-----|-------|\n| a | 1 |\n| b | 2 |\n\n");
    }
    text
}

fn create_model() -> NormalizedTemplateModel {
    let mut model = NormalizedTemplateModel::new(PageSetup::new(612.0, 792.0, Margins::uniform(72.0)));
    model.observe_font("Times New Roman", 11.0);
    model.observe_font("Arial", 18.0);
    model.set_style(StyleRole::Body, StyleRule::new("Times New Roman", 11.0));
    model.set_style(StyleRole::Heading1, StyleRule::new("Arial", 18.0).bold(true));
    model
}

/// Benchmark content parsing at various sizes.
fn bench_content_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_parsing");

    for sections in [1, 10, 100].iter() {
        let text = create_content(*sections);
        group.bench_function(format!("{}_sections", sections), |b| {
            b.iter(|| parse_content(black_box(&text)));
        });
    }

    group.finish();
}

/// Benchmark PDF and DOCX generation.
fn bench_generation(c: &mut Criterion) {
    let model = create_model();
    let text = create_content(20);
    let mut group = c.benchmark_group("generation");

    for format in [OutputFormat::Pdf, OutputFormat::Docx] {
        let generator = DocumentGenerator::new(GenerateOptions::new().with_format(format));
        group.bench_function(format.to_string(), |b| {
            b.iter(|| {
                generator
                    .generate(black_box(&model), parse_content(&text))
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark template extraction from a generated PDF.
fn bench_extraction(c: &mut Criterion) {
    let doc = DocumentGenerator::default()
        .generate(&create_model(), parse_content(&create_content(20)))
        .unwrap();

    c.bench_function("extract_pdf_template", |b| {
        b.iter(|| extract_template(black_box(&doc.bytes), SourceFormat::Pdf).unwrap());
    });
}

criterion_group!(benches, bench_content_parsing, bench_generation, bench_extraction);
criterion_main!(benches);
