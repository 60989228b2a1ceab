//! Font name handling, standard-font mapping and text metrics.
//!
//! Template fonts are rarely available at generation time, so output is set
//! in the PDF standard-14 fonts. Family names are mapped onto the closest
//! of Times, Helvetica or Courier, and widths are estimated from coarse
//! per-character tables (good enough for line wrapping).

use unicode_normalization::UnicodeNormalization;

/// A font name split into family and style flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontName {
    /// Family, e.g. "Times New Roman"
    pub family: String,
    /// Bold/black/heavy/semibold weight
    pub bold: bool,
    /// Italic/oblique style
    pub italic: bool,
}

const BOLD_WORDS: &[&str] = &["bold", "black", "heavy", "semibold", "demi"];
const ITALIC_WORDS: &[&str] = &["italic", "oblique"];
const STYLE_WORDS: &[&str] = &[
    "bold", "black", "heavy", "semibold", "demibold", "demi", "italic", "oblique", "regular",
    "roman", "medium", "light", "book", "normal",
];

/// Split a raw font name as found in a document.
///
/// Handles subset prefixes (`ABCDEF+`), PostScript suffixes
/// (`-BoldItalic`, `,Bold`, `PSMT`, `MT`) and CamelCase family names.
pub fn parse_font_name(raw: &str) -> FontName {
    let lower = raw.to_lowercase();
    let bold = BOLD_WORDS.iter().any(|w| lower.contains(w));
    let italic = ITALIC_WORDS.iter().any(|w| lower.contains(w));

    let mut name = raw.trim();
    if let Some((prefix, rest)) = name.split_once('+') {
        if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) {
            name = rest;
        }
    }

    // "Helvetica-BoldOblique", "Arial,Bold"
    let mut base = match name.find(['-', ',']) {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    };
    for suffix in ["PSMT", "PS", "MT"] {
        if base.len() > suffix.len() + 2 {
            if let Some(stripped) = base.strip_suffix(suffix) {
                base = stripped;
                break;
            }
        }
    }

    let mut family = split_camel_case(base);

    // "Arial Bold Italic"
    loop {
        let trimmed = family.trim_end();
        match trimmed.rsplit_once(' ') {
            Some((head, last)) if STYLE_WORDS.contains(&last.to_lowercase().as_str()) => {
                family = head.to_string();
            }
            _ => break,
        }
    }

    let family = family.trim().to_string();
    FontName {
        family: if family.is_empty() {
            raw.trim().to_string()
        } else {
            family
        },
        bold,
        italic,
    }
}

/// Insert spaces at lower→upper case boundaries: "TimesNewRoman" → "Times New Roman".
fn split_camel_case(name: &str) -> String {
    if name.contains(' ') {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if let Some(p) = prev {
            if p.is_lowercase() && c.is_uppercase() {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// Standard-14 family used to set text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFamily {
    /// Times (serif)
    Times,
    /// Helvetica (sans-serif)
    Helvetica,
    /// Courier (monospace)
    Courier,
}

const SERIF_HINTS: &[&str] = &[
    "times", "georgia", "garamond", "cambria", "palatino", "baskerville", "minion", "century",
    "bookman", "book antiqua", "caslon", "didot", "roman", "serif",
];
const MONO_HINTS: &[&str] = &[
    "courier", "mono", "consolas", "menlo", "code", "typewriter", "fixed",
];

impl StandardFamily {
    /// Map any family name onto the closest standard family.
    pub fn for_family(family: &str) -> Self {
        let lower = family.to_lowercase();
        if MONO_HINTS.iter().any(|h| lower.contains(h)) {
            StandardFamily::Courier
        } else if lower.contains("sans") {
            StandardFamily::Helvetica
        } else if SERIF_HINTS.iter().any(|h| lower.contains(h)) {
            StandardFamily::Times
        } else {
            StandardFamily::Helvetica
        }
    }

    /// PostScript name of the face with the given style.
    pub fn base_font(&self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (StandardFamily::Times, false, false) => "Times-Roman",
            (StandardFamily::Times, true, false) => "Times-Bold",
            (StandardFamily::Times, false, true) => "Times-Italic",
            (StandardFamily::Times, true, true) => "Times-BoldItalic",
            (StandardFamily::Helvetica, false, false) => "Helvetica",
            (StandardFamily::Helvetica, true, false) => "Helvetica-Bold",
            (StandardFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (StandardFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (StandardFamily::Courier, false, false) => "Courier",
            (StandardFamily::Courier, true, false) => "Courier-Bold",
            (StandardFamily::Courier, false, true) => "Courier-Oblique",
            (StandardFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    /// Approximate advance width of a character, in em.
    pub fn char_width(&self, c: char) -> f32 {
        match self {
            StandardFamily::Courier => 0.6,
            StandardFamily::Helvetica => match c {
                ' ' => 0.278,
                'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' => 0.24,
                'f' | 'r' | 't' | '(' | ')' | '[' | ']' | '-' | 'I' => 0.31,
                'm' | 'w' => 0.833,
                'M' | 'W' => 0.85,
                'A'..='Z' => 0.667,
                '0'..='9' | 'a'..='z' => 0.556,
                _ => 0.6,
            },
            StandardFamily::Times => match c {
                ' ' => 0.25,
                'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '\'' | '|' => 0.278,
                'f' | 'r' | 't' | '(' | ')' | '[' | ']' | '-' | 'I' => 0.333,
                'm' | 'w' => 0.75,
                'M' | 'W' => 0.9,
                'A'..='Z' => 0.667,
                '0'..='9' => 0.5,
                'a'..='z' => 0.45,
                _ => 0.5,
            },
        }
    }
}

/// Estimated width of `text` in points.
pub fn text_width(text: &str, family: StandardFamily, bold: bool, size: f32) -> f32 {
    let em: f32 = text.chars().map(|c| family.char_width(c)).sum();
    let weight = if bold { 1.05 } else { 1.0 };
    em * size * weight
}

/// Encode text for a standard font with WinAnsiEncoding.
///
/// Characters outside the encoding are decomposed and reduced to their base
/// letter when possible, otherwise replaced with `?`. Control characters are
/// dropped and tabs become spaces.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        if c == '\t' {
            out.push(b' ');
            continue;
        }
        if c.is_control() {
            continue;
        }
        if let Some(b) = win_ansi_byte(c) {
            out.push(b);
            continue;
        }
        let mut mapped = false;
        for d in c.to_string().nfkd() {
            if let Some(b) = win_ansi_byte(d) {
                out.push(b);
                mapped = true;
            }
        }
        if !mapped {
            out.push(b'?');
        }
    }
    out
}

fn win_ansi_byte(c: char) -> Option<u8> {
    let code = c as u32;
    if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    let b = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(b)
}
