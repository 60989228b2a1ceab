//! Content parser: loosely marked-up text to [`ContentBlock`]s.
//!
//! The scan is line-oriented and recognizes only block-level markers:
//!
//! | Line                          | Block                    |
//! |-------------------------------|--------------------------|
//! | `#`..`######` + space + text  | `Heading(level, text)`   |
//! | `-`, `*` or `+` + space       | `ListItem(false, text)`  |
//! | digits + `.` + space          | `ListItem(true, text)`   |
//! | `a | b` (two filled cells)    | `TableRow(cells)`        |
//! | two or more blank lines       | `PageBreak`              |
//! | anything else                 | `Paragraph` (soft-wrapped lines joined) |
//!
//! Inline markup such as `**bold**` is kept as literal text.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{BlockSequence, ContentBlock};

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6}) (.*)$").expect("valid heading regex"))
}

fn bullet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-*+] (.*)$").expect("valid bullet regex"))
}

fn ordered_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\. (.*)$").expect("valid ordered item regex"))
}

fn separator_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^:?-+:?$").expect("valid separator regex"))
}

/// What one non-blank line is.
#[derive(Debug, PartialEq)]
enum Line {
    Block(ContentBlock),
    /// `|---|---|` under a table header row
    TableSeparator,
    Text,
}

/// Parses content text into blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentParser;

impl ContentParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse text into an ordered block sequence.
    pub fn parse(&self, text: &str) -> BlockSequence {
        let mut blocks: Vec<ContentBlock> = Vec::new();
        let mut paragraph: Vec<&str> = Vec::new();
        let mut blank_lines = 0usize;

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
            if line.trim().is_empty() {
                flush_paragraph(&mut paragraph, &mut blocks);
                blank_lines += 1;
                continue;
            }

            if blank_lines >= 2 && !blocks.is_empty() {
                blocks.push(ContentBlock::PageBreak);
            }
            blank_lines = 0;

            match classify_line(line) {
                Line::Text => paragraph.push(line),
                Line::TableSeparator => flush_paragraph(&mut paragraph, &mut blocks),
                Line::Block(block) => {
                    flush_paragraph(&mut paragraph, &mut blocks);
                    blocks.push(block);
                }
            }
        }
        flush_paragraph(&mut paragraph, &mut blocks);

        log::debug!("Parsed {} content blocks", blocks.len());
        BlockSequence::new(blocks)
    }
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<ContentBlock>) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n");
    lines.clear();
    let text = text.trim();
    if !text.is_empty() {
        blocks.push(ContentBlock::paragraph(text));
    }
}

fn classify_line(line: &str) -> Line {
    let marked = line.trim();

    if let Some(caps) = heading_regex().captures(marked) {
        let level = caps[1].len() as u8;
        return Line::Block(ContentBlock::heading(level, caps[2].trim()));
    }
    if let Some(caps) = bullet_regex().captures(marked) {
        return Line::Block(ContentBlock::bullet(caps[1].trim()));
    }
    if let Some(caps) = ordered_regex().captures(marked) {
        return Line::Block(ContentBlock::numbered(caps[1].trim()));
    }
    if marked.contains('|') {
        return table_line(marked);
    }
    Line::Text
}

fn table_line(line: &str) -> Line {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    let cells: Vec<&str> = inner.split('|').map(str::trim).collect();

    if cells.len() >= 2
        && cells
            .iter()
            .all(|c| separator_cell_regex().is_match(c) || c.is_empty())
        && cells.iter().any(|c| !c.is_empty())
    {
        return Line::TableSeparator;
    }

    let delimited = cells
        .windows(2)
        .any(|pair| !pair[0].is_empty() && !pair[1].is_empty());
    if delimited {
        Line::Block(ContentBlock::table_row(cells))
    } else {
        Line::Text
    }
}

/// Parse text with the default parser.
pub fn parse_content(text: &str) -> BlockSequence {
    ContentParser::new().parse(text)
}
