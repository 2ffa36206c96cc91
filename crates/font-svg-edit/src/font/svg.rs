//! `SVG ` table structure.

use core::ops;

use super::Cursor;
use crate::errors::{ParseError, ParseErrorKind};

/// Entry of the SVG document index: a glyph-id range plus the byte range of
/// its document. `doc_offset` is relative to the start of the index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SvgDocRecord {
    pub(crate) start_id: u16,
    pub(crate) end_id: u16,
    pub(crate) doc_offset: u32,
    pub(crate) doc_length: u32,
}

impl SvgDocRecord {
    pub(crate) const BYTE_LEN: usize = 12;
}

/// Parsed view of the `SVG ` table: main header plus the document index.
#[derive(Debug)]
pub(crate) struct SvgTable {
    pub(crate) doc_index_offset: u32,
    pub(crate) entries: Vec<SvgDocRecord>,
}

impl SvgTable {
    /// Main header length: version + svgDocIndexOffset + reserved.
    pub(crate) const HEADER_LEN: usize = 10;
    /// Byte length of a table with an empty document index.
    pub(crate) const EMPTY_LEN: usize = Self::HEADER_LEN + 2;

    pub(crate) fn parse(table: Cursor<'_>) -> Result<Self, ParseError> {
        let mut cursor = table;
        cursor.read_u16_checked(|version| {
            if version == 0 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion {
                    version: version.into(),
                })
            }
        })?;
        let doc_index_offset = cursor.read_u32()?;
        cursor.skip(4)?; // reserved

        let mut index = table;
        index.skip(doc_index_offset as usize)?;
        let num_entries = index.read_u16()?;
        let entries = (0..num_entries).map(|_| {
            Ok(SvgDocRecord {
                start_id: index.read_u16()?,
                end_id: index.read_u16()?,
                doc_offset: index.read_u32()?,
                doc_length: index.read_u32()?,
            })
        });
        let this = Self {
            doc_index_offset,
            entries: entries.collect::<Result<_, ParseError>>()?,
        };

        let index_end = this.index_pos() + this.index_len();
        let mut prev_end_id = None;
        for entry in &this.entries {
            if entry.end_id < entry.start_id || prev_end_id >= Some(entry.start_id) {
                return Err(table.err(ParseErrorKind::UnsortedDocumentIndex));
            }
            prev_end_id = Some(entry.end_id);

            // Documents must lie within the table, past the index.
            let range = this.document_range(entry);
            if range.start < index_end || range.end > table.len() {
                return Err(table.err(ParseErrorKind::RangeOutOfBounds {
                    range,
                    len: table.len(),
                }));
            }
        }
        Ok(this)
    }

    /// Position of `numEntries` within the table.
    pub(crate) fn index_pos(&self) -> usize {
        self.doc_index_offset as usize
    }

    /// Byte length of the document index (`numEntries` plus the entries).
    pub(crate) fn index_len(&self) -> usize {
        2 + self.entries.len() * SvgDocRecord::BYTE_LEN
    }

    /// Position of the `i`-th index entry within the table.
    pub(crate) fn entry_pos(&self, i: usize) -> usize {
        self.index_pos() + 2 + i * SvgDocRecord::BYTE_LEN
    }

    /// Byte range of an entry's document within the table.
    pub(crate) fn document_range(&self, entry: &SvgDocRecord) -> ops::Range<usize> {
        let start = self.index_pos() + entry.doc_offset as usize;
        start..start + entry.doc_length as usize
    }

    /// Looks up the index entry covering `glyph_id`.
    pub(crate) fn find(&self, glyph_id: u16) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| (entry.start_id..=entry.end_id).contains(&glyph_id))
    }

    /// `startId`-sorted slot at which an entry for `glyph_id` should be inserted.
    pub(crate) fn insertion_slot(&self, glyph_id: u16) -> usize {
        self.entries
            .partition_point(|entry| entry.start_id < glyph_id)
    }
}
