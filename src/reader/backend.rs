//! PDF backend abstraction layer.
//!
//! Isolates lopdf from the page scanner: the scanner only sees page ids,
//! font names, decoded operations and decoded text.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::error::{Error, Result};

/// Page identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// Font resource declared on a page.
#[derive(Debug, Clone)]
pub struct BackendFontInfo {
    /// Resource name (key in the page's font dictionary)
    pub name: Vec<u8>,
    /// Base font name (e.g. "ABCDEF+Helvetica-Bold")
    pub base_font: String,
}

/// A value from a PDF content stream operand.
#[derive(Debug, Clone)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    /// Numeric operand at `index`.
    pub fn number(&self, index: usize) -> Option<f32> {
        self.operands.get(index).and_then(get_number_from_value)
    }

    /// All operands as numbers, or `None` if any is not numeric or fewer
    /// than `count` are present.
    pub fn numbers(&self, count: usize) -> Option<Vec<f32>> {
        if self.operands.len() < count {
            return None;
        }
        self.operands[..count]
            .iter()
            .map(get_number_from_value)
            .collect()
    }
}

/// Text decoder for the fonts of one page.
pub trait TextDecoder {
    /// Decode bytes shown with the font resource `font_name`.
    fn decode(&self, font_name: &[u8], bytes: &[u8]) -> String;
}

/// Abstract interface for PDF document access.
pub trait PdfBackend: Sync {
    /// All pages as page number → id.
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Media box size (width, height) of a page, following inheritance.
    fn page_size(&self, page: PageId) -> Option<(f32, f32)>;

    /// Font resources of a page.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>>;

    /// Decompressed content stream bytes of a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>>;

    /// Parse content stream bytes into operations.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>>;

    /// Build a text decoder for a page. Fonts without a usable encoding fall
    /// back to [`decode_text_simple`].
    fn text_decoder(&self, page: PageId) -> Box<dyn TextDecoder + '_>;
}

/// Text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

/// [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
}

impl LopdfBackend {
    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;
        if doc.is_encrypted() {
            return Err(Error::CorruptFile("document is encrypted".to_string()));
        }
        Ok(Self { doc })
    }

    /// PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    fn media_box(&self, dict: &Dictionary, depth: usize) -> Option<(f32, f32)> {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let array = match media_box {
                Object::Reference(r) => self.doc.get_object(*r).ok()?.as_array().ok()?,
                other => other.as_array().ok()?,
            };
            if array.len() >= 4 {
                let coords: Vec<f32> = array
                    .iter()
                    .take(4)
                    .filter_map(|o| o.as_float().ok())
                    .collect();
                if coords.len() == 4 {
                    return Some(((coords[2] - coords[0]).abs(), (coords[3] - coords[1]).abs()));
                }
            }
        }
        // Inherited from the page tree
        if depth < 16 {
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            let parent = self.doc.get_dictionary(parent).ok()?;
            return self.media_box(parent, depth + 1);
        }
        None
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_size(&self, page: PageId) -> Option<(f32, f32)> {
        let dict = self.doc.get_dictionary(page).ok()?;
        self.media_box(dict, 0)
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>> {
        let lopdf_fonts = self.doc.get_page_fonts(page)?;

        let mut result = Vec::with_capacity(lopdf_fonts.len());
        for (name, font_dict) in &lopdf_fonts {
            let base_font = font_dict
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string())
                .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
            result.push(BackendFontInfo {
                name: name.clone(),
                base_font,
            });
        }
        Ok(result)
    }

    fn page_content(&self, page_id: PageId) -> Result<Vec<u8>> {
        let page_dict = self.doc.get_dictionary(page_id)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(contents) => contents,
            // A page without a content stream is blank
            Err(_) => return Ok(Vec::new()),
        };

        let stream_data = |obj: &Object| -> Option<Vec<u8>> {
            let obj = match obj {
                Object::Reference(r) => self.doc.get_object(*r).ok()?,
                other => other,
            };
            match obj {
                Object::Stream(s) => s
                    .decompressed_content()
                    .ok()
                    .or_else(|| Some(s.content.clone())),
                _ => None,
            }
        };

        let resolved = match contents {
            Object::Reference(r) => self.doc.get_object(*r)?,
            other => other,
        };

        match resolved {
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Some(data) = stream_data(obj) {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                }
                Ok(content)
            }
            other => stream_data(other)
                .ok_or_else(|| Error::CorruptFile("invalid content stream".to_string())),
        }
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content = lopdf::content::Content::decode(data)?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn text_decoder(&self, page: PageId) -> Box<dyn TextDecoder + '_> {
        let fonts = self.doc.get_page_fonts(page).unwrap_or_default();
        Box::new(LopdfTextDecoder {
            doc: &self.doc,
            fonts,
        })
    }
}

struct LopdfTextDecoder<'a> {
    doc: &'a LopdfDocument,
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
}

impl TextDecoder for LopdfTextDecoder<'_> {
    fn decode(&self, font_name: &[u8], bytes: &[u8]) -> String {
        if let Some(font_dict) = self.fonts.get(font_name) {
            if let Ok(enc) = font_dict.get_font_encoding(self.doc) {
                if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

/// Extract a number from a [`PdfValue`].
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(r) => Some(*r),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_simple_utf8() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
    }

    #[test]
    fn test_decode_text_simple_latin1() {
        let bytes = vec![0x48, 0x65, 0x6C, 0x6C, 0xE9];
        assert_eq!(decode_text_simple(&bytes), "Hellé");
    }

    #[test]
    fn test_decode_text_simple_utf16be() {
        let bytes = vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_simple(&bytes), "Hi");
    }

    #[test]
    fn test_content_op_numbers() {
        let op = ContentOp {
            operator: "Td".to_string(),
            operands: vec![PdfValue::Integer(72), PdfValue::Real(700.5)],
        };
        assert_eq!(op.number(1), Some(700.5));
        assert_eq!(op.numbers(2), Some(vec![72.0, 700.5]));
        assert_eq!(op.numbers(3), None);
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let err = LopdfBackend::load_bytes(b"%PDF-1.4 not really").err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptFile);
    }
}
