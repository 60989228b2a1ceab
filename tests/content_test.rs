//! Content parser scenarios.

use docstencil::content::{parse_content, ContentParser};
use docstencil::ContentBlock;

#[test]
fn test_mixed_document() {
    let blocks = parse_content("# A\n\nParagraph one.\n\n- item 1\n- item 2\n");
    assert_eq!(
        blocks.as_slice(),
        &[
            ContentBlock::heading(1, "A"),
            ContentBlock::paragraph("Paragraph one."),
            ContentBlock::bullet("item 1"),
            ContentBlock::bullet("item 2"),
        ]
    );
}

#[test]
fn test_plain_text_is_one_paragraph() {
    let inputs = [
        "hello",
        "  padded text  ",
        "first line\nsecond line",
        "Numbers like 3.5 and dashes - inline stay text",
        "a sentence ending with #hashtag",
    ];
    for input in inputs {
        let blocks = parse_content(input);
        assert_eq!(
            blocks.as_slice(),
            &[ContentBlock::paragraph(input.trim())],
            "{:?}",
            input
        );
    }
}

#[test]
fn test_blank_input_has_no_blocks() {
    assert!(parse_content("").is_empty());
    assert!(parse_content("  \n\t\n").is_empty());
}

#[test]
fn test_tables_and_lists() {
    let text = "\
| Name | Score |
|:-----|------:|
| Ann  | 9 |
| Bo   | 7 |

1. first
2. second
";
    let blocks = parse_content(text);
    assert_eq!(
        blocks.as_slice(),
        &[
            ContentBlock::table_row(["Name", "Score"]),
            ContentBlock::table_row(["Ann", "9"]),
            ContentBlock::table_row(["Bo", "7"]),
            ContentBlock::numbered("first"),
            ContentBlock::numbered("second"),
        ]
    );
}

#[test]
fn test_page_breaks() {
    let blocks = parse_content("\n\n\nIntro\n\n\nNext page\n\n\n\n");
    assert_eq!(
        blocks.as_slice(),
        &[
            ContentBlock::paragraph("Intro"),
            ContentBlock::PageBreak,
            ContentBlock::paragraph("Next page"),
        ]
    );
}

#[test]
fn test_parser_is_reusable() {
    let parser = ContentParser::new();
    let a = parser.parse("## Title\n\nbody");
    let b = parser.parse("## Title\n\nbody");
    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
    assert_eq!(a.as_slice()[0], ContentBlock::heading(2, "Title"));
}
