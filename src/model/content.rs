//! Parsed content blocks.

use serde::{Deserialize, Serialize};

use super::template::StyleRole;

/// One unit of parsed input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// A heading (level 1-6)
    Heading {
        /// Heading level
        level: u8,
        /// Heading text
        text: String,
    },

    /// A paragraph of plain text
    Paragraph {
        /// Paragraph text; soft-wrapped source lines are joined with `\n`
        text: String,
    },

    /// A bulleted or numbered list item
    ListItem {
        /// Numbered (`1.`) rather than bulleted
        ordered: bool,
        /// Item text
        text: String,
    },

    /// One row of a table
    TableRow {
        /// Cell texts in column order
        cells: Vec<String>,
    },

    /// Explicit page break
    PageBreak,
}

impl ContentBlock {
    /// Create a heading.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        ContentBlock::Heading {
            level,
            text: text.into(),
        }
    }

    /// Create a paragraph.
    pub fn paragraph(text: impl Into<String>) -> Self {
        ContentBlock::Paragraph { text: text.into() }
    }

    /// Create an unordered list item.
    pub fn bullet(text: impl Into<String>) -> Self {
        ContentBlock::ListItem {
            ordered: false,
            text: text.into(),
        }
    }

    /// Create an ordered list item.
    pub fn numbered(text: impl Into<String>) -> Self {
        ContentBlock::ListItem {
            ordered: true,
            text: text.into(),
        }
    }

    /// Create a table row.
    pub fn table_row<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        ContentBlock::TableRow {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    /// Style role used for this block. Table rows report the body-cell role;
    /// the generator decides which row of a table is the header.
    pub fn role(&self) -> Option<StyleRole> {
        match self {
            ContentBlock::Heading { level, .. } => Some(StyleRole::heading(*level)),
            ContentBlock::Paragraph { .. } => Some(StyleRole::Body),
            ContentBlock::ListItem { .. } => Some(StyleRole::ListItem),
            ContentBlock::TableRow { .. } => Some(StyleRole::TableCell),
            ContentBlock::PageBreak => None,
        }
    }

    /// Check if this is a table row.
    pub fn is_table_row(&self) -> bool {
        matches!(self, ContentBlock::TableRow { .. })
    }
}

/// The ordered output of one parse.
///
/// The sequence is read-only and handed to the generator by value; to render
/// the same text again, parse it again.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct BlockSequence {
    blocks: Vec<ContentBlock>,
}

impl BlockSequence {
    /// Wrap parsed blocks.
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }

    /// Borrow the blocks.
    pub fn as_slice(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Iterate over the blocks.
    pub fn iter(&self) -> std::slice::Iter<'_, ContentBlock> {
        self.blocks.iter()
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl IntoIterator for BlockSequence {
    type Item = ContentBlock;
    type IntoIter = std::vec::IntoIter<ContentBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.into_iter()
    }
}

impl From<Vec<ContentBlock>> for BlockSequence {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::new(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_roles() {
        assert_eq!(ContentBlock::heading(5, "x").role(), Some(StyleRole::Heading3));
        assert_eq!(ContentBlock::paragraph("x").role(), Some(StyleRole::Body));
        assert_eq!(ContentBlock::numbered("x").role(), Some(StyleRole::ListItem));
        assert_eq!(ContentBlock::PageBreak.role(), None);
    }

    #[test]
    fn test_block_json_shape() {
        let json = serde_json::to_string(&ContentBlock::heading(1, "A")).unwrap();
        assert_eq!(json, r#"{"type":"heading","level":1,"text":"A"}"#);
    }
}
