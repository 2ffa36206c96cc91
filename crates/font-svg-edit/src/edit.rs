//! The font mutation engine.

use std::{collections::BTreeSet, fs, path::Path};

use crate::{
    document,
    errors::{EditError, ParseError, ParseErrorKind},
    font::{
        self, patch_u16, patch_u32, write_u16, write_u32, Cursor, FontDirectory, SvgDocRecord,
        SvgTable, TableRecord, TableTag,
    },
};

/// Single editable glyph: a representative code point plus the glyph id it
/// maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    /// Representative character mapped to the glyph.
    pub ch: char,
    /// Glyph id within the font.
    pub glyph_id: u16,
}

impl Glyph {
    /// String shown for this glyph in a glyph grid.
    pub fn display(self) -> String {
        self.ch.to_string()
    }
}

/// Code points never surfaced as editable glyphs: controls, whitespace and
/// zero-width characters.
fn is_hidden_code_point(code: u32) -> bool {
    matches!(
        code,
        0x0000..=0x001f
            | 0x0020
            | 0x007f..=0x00a0
            | 0x2000..=0x200f
            | 0x202f
            | 0x205f
            | 0x3000
            | 0xfeff
    )
}

/// Byte-level editor for SVG documents embedded in an OpenType font.
///
/// The editor owns the font bytes. Every mutation is staged on a copy and
/// committed only once it has fully succeeded, so a failed [`embed()`] or
/// [`remove()`] leaves the font unchanged. After a committed mutation the
/// bytes again satisfy all structural requirements of the container: table
/// offsets, lengths and padding, per-table checksums, directory search hints
/// and `head.checkSumAdjustment`.
///
/// [`embed()`]: Self::embed()
/// [`remove()`]: Self::remove()
#[derive(Debug, Clone)]
pub struct FontEditor {
    data: Vec<u8>,
    family_name: String,
    glyphs: Vec<Glyph>,
    glyph_ids: BTreeSet<u16>,
}

impl FontEditor {
    /// Parses the font directory, character map and family name from `data`.
    ///
    /// # Errors
    ///
    /// Fails if the directory or a required table is malformed or missing,
    /// if `cmap` has no subtable of a supported format (0, 4, 6 or 12), or if
    /// the `name` table has no non-empty family name.
    pub fn load(data: Vec<u8>) -> Result<Self, ParseError> {
        let directory = FontDirectory::parse(&data)?;

        let cmap_record = directory
            .get(TableTag::CMAP)
            .ok_or_else(|| ParseError::missing_table(TableTag::CMAP))?;
        let cmap = font::CmapTable::parse(Cursor::for_table(&data, cmap_record))?;
        let mappings = cmap.mappings();

        let name_record = directory
            .get(TableTag::NAME)
            .ok_or_else(|| ParseError::missing_table(TableTag::NAME))?;
        let name_cursor = Cursor::for_table(&data, name_record);
        let family_name = font::family_name(name_cursor)?
            .ok_or_else(|| name_cursor.err(ParseErrorKind::MissingFamilyName))?;

        let glyph_ids = mappings.iter().map(|&(_, glyph_id)| glyph_id).collect();
        let glyphs = mappings
            .into_iter()
            .filter(|&(code, _)| !is_hidden_code_point(code))
            .filter_map(|(code, glyph_id)| {
                let ch = char::from_u32(code)?;
                Some(Glyph { ch, glyph_id })
            })
            .collect();

        Ok(Self {
            data,
            family_name,
            glyphs,
            glyph_ids,
        })
    }

    /// Gets the font family name (name ID 1).
    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Gets the editable glyphs: one entry per glyph id, excluding control
    /// and whitespace code points.
    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Gets the current font bytes, suitable for writing to an `.otf` / `.ttf`
    /// file.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the editor, returning the font bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Lists glyph ids that currently have an embedded SVG document, in
    /// ascending order.
    ///
    /// # Errors
    ///
    /// Fails if the `SVG ` table is malformed.
    pub fn embedded_glyphs(&self) -> Result<Vec<u16>, ParseError> {
        let directory = FontDirectory::parse(&self.data)?;
        let Some(record) = directory.get(TableTag::SVG) else {
            return Ok(vec![]);
        };
        let table = SvgTable::parse(Cursor::for_table(&self.data, record))?;
        let mut ids: Vec<_> = table.entries.iter().map(|entry| entry.start_id).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Embeds `svg` as the document for `glyph_id`, replacing any existing
    /// document for that glyph. The `SVG ` table and its directory record are
    /// created when the font has none.
    ///
    /// The payload is normalized before embedding: its `viewBox` origin is
    /// translated to the glyph baseline and the root element id is set to
    /// `glyph<N>`.
    ///
    /// # Errors
    ///
    /// - [`EditError::UnknownGlyph`] if `glyph_id` is not mapped by `cmap`.
    /// - [`EditError::CompressedSvg`] for gzipped (SVGZ) payloads.
    /// - [`EditError::MalformedSvg`] if the payload is not well-formed XML
    ///   with an `<svg>` root.
    /// - [`EditError::Parse`] if the `SVG ` table is malformed.
    pub fn embed(&mut self, glyph_id: u16, svg: &[u8]) -> Result<(), EditError> {
        if !self.glyph_ids.contains(&glyph_id) {
            return Err(EditError::UnknownGlyph(glyph_id));
        }
        if document::is_gzipped(svg) {
            return Err(EditError::CompressedSvg);
        }
        let payload = document::prepare_for_embedding(svg, glyph_id)?;

        let mut staged = self.data.clone();
        if FontDirectory::parse(&staged)?.get(TableTag::SVG).is_none() {
            create_svg_table(&mut staged)?;
        }
        let directory = FontDirectory::parse(&staged)?;
        let record = *directory
            .get(TableTag::SVG)
            .expect("the `SVG ` table was just created");
        let table = SvgTable::parse(Cursor::for_table(&staged, &record))?;

        let new_table = {
            let table_bytes = &staged[record.byte_range()];
            match table.find(glyph_id) {
                Some(i) => replace_document(table_bytes, &table, i, &payload),
                None => insert_document(table_bytes, &table, glyph_id, &payload),
            }
        };
        commit_svg_table(&mut staged, &directory, &record, &new_table);
        update_checksum_adjustment(&mut staged)?;
        self.data = staged;
        Ok(())
    }

    /// Removes the SVG document for `glyph_id`. Removing a glyph without a
    /// document is a no-op; removing the last document drops the `SVG ` table
    /// and its directory record entirely.
    ///
    /// # Errors
    ///
    /// Fails only if the font directory or the `SVG ` table is malformed.
    pub fn remove(&mut self, glyph_id: u16) -> Result<(), EditError> {
        let directory = FontDirectory::parse(&self.data)?;
        let Some(record) = directory.get(TableTag::SVG).copied() else {
            return Ok(());
        };
        let table = SvgTable::parse(Cursor::for_table(&self.data, &record))?;
        let Some(i) = table.find(glyph_id) else {
            return Ok(());
        };

        let mut staged = self.data.clone();
        if table.entries.len() == 1 {
            remove_svg_table(&mut staged, &directory, &record);
        } else {
            let new_table = remove_document(&self.data[record.byte_range()], &table, i);
            commit_svg_table(&mut staged, &directory, &record, &new_table);
        }
        update_checksum_adjustment(&mut staged)?;
        self.data = staged;
        Ok(())
    }

    /// Extracts every embedded SVG document into `out_dir` as
    /// `<glyph id>.svg`, overwriting existing files. Documents get the mirror
    /// `viewBox` rewrite of [`embed()`](Self::embed()). Returns the number of
    /// files written.
    ///
    /// # Errors
    ///
    /// - [`EditError::CompressedSvg`] if any document is gzipped; detected
    ///   before the first file is written.
    /// - [`EditError::MalformedSvg`] / [`EditError::Parse`] for inconsistent
    ///   font data.
    /// - [`EditError::Io`] on write failures.
    pub fn export(&self, out_dir: &Path) -> Result<usize, EditError> {
        let directory = FontDirectory::parse(&self.data)?;
        let Some(record) = directory.get(TableTag::SVG) else {
            return Ok(0);
        };
        let table = SvgTable::parse(Cursor::for_table(&self.data, record))?;

        let table_bytes = &self.data[record.byte_range()];
        let documents: Vec<(u16, &[u8])> = table
            .entries
            .iter()
            .map(|entry| (entry.start_id, &table_bytes[table.document_range(entry)]))
            .collect();
        if documents.iter().any(|(_, doc)| document::is_gzipped(doc)) {
            return Err(EditError::CompressedSvg);
        }

        for &(start_id, doc) in &documents {
            let rewritten = document::prepare_for_export(doc)?;
            fs::write(out_dir.join(format!("{start_id}.svg")), rewritten)?;
        }
        Ok(documents.len())
    }
}

/// Appends an empty `SVG ` table at the (4-byte aligned) end of the font and
/// inserts its directory record in tag-sorted order.
fn create_svg_table(data: &mut Vec<u8>) -> Result<(), ParseError> {
    // Well-formed fonts are already padded at the end; do not rely on it.
    data.resize(font::padded_len(data.len()), 0);

    let mut table = Vec::with_capacity(SvgTable::EMPTY_LEN);
    write_u16(&mut table, 0); // version
    write_u32(&mut table, u32::try_from(SvgTable::HEADER_LEN).unwrap()); // svgDocIndexOffset
    write_u32(&mut table, 0); // reserved
    write_u16(&mut table, 0); // numEntries

    // The table lands past the current file end, which the directory growth
    // shifts by another 16 bytes.
    let offset = data.len() + TableRecord::BYTE_LEN;
    insert_table_record(
        data,
        TableTag::SVG,
        font::checksum(&table),
        u32::try_from(offset).expect("font length overflow"),
        u32::try_from(table.len()).unwrap(),
    )?;
    data.extend_from_slice(&table);
    Ok(())
}

/// Splices a new 16-byte record into the directory in tag-sorted order:
/// bumps `numTables`, recomputes the search hints and shifts every existing
/// table offset by the directory growth. The new record's `offset` is written
/// as passed.
fn insert_table_record(
    data: &mut Vec<u8>,
    tag: TableTag,
    checksum: u32,
    offset: u32,
    length: u32,
) -> Result<(), ParseError> {
    let directory = FontDirectory::parse(data)?;
    let slot = directory
        .records
        .partition_point(|record| record.tag < tag);
    let record_pos = FontDirectory::HEADER_LEN + slot * TableRecord::BYTE_LEN;

    let mut record = Vec::with_capacity(TableRecord::BYTE_LEN);
    record.extend_from_slice(&tag.as_bytes());
    write_u32(&mut record, checksum);
    write_u32(&mut record, offset);
    write_u32(&mut record, length);
    data.splice(record_pos..record_pos, record);

    let num_tables = u16::try_from(directory.records.len() + 1).expect("too many tables");
    patch_u16(data, 4, num_tables);
    let (search_range, entry_selector, range_shift) = font::search_hints(num_tables);
    patch_u16(data, 6, search_range);
    patch_u16(data, 8, entry_selector);
    patch_u16(data, 10, range_shift);

    // All tables sit after the directory, so each pre-existing offset moves
    // by the inserted 16 bytes.
    let growth = u32::try_from(TableRecord::BYTE_LEN).unwrap();
    for (i, old) in directory.records.iter().enumerate() {
        let record_offset = old.record_offset + if i >= slot { TableRecord::BYTE_LEN } else { 0 };
        patch_u32(data, record_offset + 8, old.offset + growth);
    }
    Ok(())
}

/// Reverse of [`insert_table_record()`]: drops the `SVG ` table bytes and its
/// directory record, restoring `numTables`, the search hints and all offsets.
fn remove_svg_table(data: &mut Vec<u8>, directory: &FontDirectory, record: &TableRecord) {
    let start = record.offset as usize;
    let end = (start + font::padded_len(record.length as usize)).min(data.len());
    data.drain(start..end);
    let removed = u32::try_from(end - start).expect("table length overflow");
    data.drain(record.record_offset..record.record_offset + TableRecord::BYTE_LEN);

    let num_tables = u16::try_from(directory.records.len() - 1).expect("too many tables");
    patch_u16(data, 4, num_tables);
    let (search_range, entry_selector, range_shift) = font::search_hints(num_tables);
    patch_u16(data, 6, search_range);
    patch_u16(data, 8, entry_selector);
    patch_u16(data, 10, range_shift);

    let shrinkage = u32::try_from(TableRecord::BYTE_LEN).unwrap();
    for other in &directory.records {
        if other.tag == record.tag {
            continue;
        }
        let record_offset = other.record_offset
            - if other.record_offset > record.record_offset {
                TableRecord::BYTE_LEN
            } else {
                0
            };
        let mut offset = other.offset - shrinkage;
        if other.offset > record.offset {
            offset -= removed;
        }
        patch_u32(data, record_offset + 8, offset);
    }
}

/// Replaces the `SVG ` table bytes in the font, re-pads the table, shifts the
/// offsets of all later tables by the length delta and patches the table's
/// directory record (length and checksum).
fn commit_svg_table(
    data: &mut Vec<u8>,
    directory: &FontDirectory,
    record: &TableRecord,
    new_table: &[u8],
) {
    let start = record.offset as usize;
    let old_end = (start + font::padded_len(record.length as usize)).min(data.len());
    let new_padded = font::padded_len(new_table.len());

    let mut replacement = Vec::with_capacity(new_padded);
    replacement.extend_from_slice(new_table);
    replacement.resize(new_padded, 0);
    data.splice(start..old_end, replacement);

    let delta = i64::try_from(new_padded).expect("table length overflow")
        - i64::try_from(old_end - start).expect("table length overflow");
    for other in &directory.records {
        if other.offset as usize > start {
            let shifted = i64::from(other.offset) + delta;
            patch_u32(
                data,
                other.record_offset + 8,
                u32::try_from(shifted).expect("table offset overflow"),
            );
        }
    }
    patch_u32(data, record.record_offset + 4, font::checksum(new_table));
    patch_u32(
        data,
        record.record_offset + 12,
        u32::try_from(new_table.len()).expect("table length overflow"),
    );
}

/// Rewrites `head.checkSumAdjustment` so that the checksum of the whole file
/// sums up to the magic value. Fonts without a `head` table are left as is.
pub(crate) fn update_checksum_adjustment(data: &mut [u8]) -> Result<(), ParseError> {
    let directory = FontDirectory::parse(data)?;
    let Some(head) = directory.get(TableTag::HEAD) else {
        return Ok(());
    };
    let field = font::HEAD_CHECKSUM_OFFSET..font::HEAD_CHECKSUM_OFFSET + 4;
    if field.end > head.length as usize {
        return Err(Cursor::for_table(data, head).err(ParseErrorKind::RangeOutOfBounds {
            range: field,
            len: head.length as usize,
        }));
    }

    let pos = head.offset as usize + font::HEAD_CHECKSUM_OFFSET;
    patch_u32(data, pos, 0);
    let adjustment = font::SFNT_CHECKSUM.wrapping_sub(font::checksum(data));
    patch_u32(data, pos, adjustment);
    Ok(())
}

/// Overwrites the document for index entry `i` in place: later documents
/// shift by the length difference, index entry positions do not change.
fn replace_document(table: &[u8], parsed: &SvgTable, i: usize, payload: &[u8]) -> Vec<u8> {
    let entry = parsed.entries[i];
    let doc_range = parsed.document_range(&entry);

    let mut new_table =
        Vec::with_capacity(table.len() - entry.doc_length as usize + payload.len());
    new_table.extend_from_slice(&table[..doc_range.start]);
    new_table.extend_from_slice(payload);
    new_table.extend_from_slice(&table[doc_range.end..]);

    let new_len = u32::try_from(payload.len()).expect("document length overflow");
    let delta = i64::from(new_len) - i64::from(entry.doc_length);
    patch_u32(&mut new_table, parsed.entry_pos(i) + 8, new_len);
    for (j, other) in parsed.entries.iter().enumerate() {
        if other.doc_offset > entry.doc_offset {
            let shifted = i64::from(other.doc_offset) + delta;
            patch_u32(
                &mut new_table,
                parsed.entry_pos(j) + 4,
                u32::try_from(shifted).expect("document offset overflow"),
            );
        }
    }
    new_table
}

/// Splices a new single-glyph index entry into its `startId`-sorted slot and
/// appends the document at the end of the table. Every pre-existing document
/// is pushed down by the inserted entry, so all old `docOffset`s grow by 12.
fn insert_document(table: &[u8], parsed: &SvgTable, glyph_id: u16, payload: &[u8]) -> Vec<u8> {
    let slot = parsed.insertion_slot(glyph_id);
    let slot_pos = parsed.entry_pos(slot);

    let doc_offset = table.len() + SvgDocRecord::BYTE_LEN - parsed.index_pos();
    let mut entry = Vec::with_capacity(SvgDocRecord::BYTE_LEN);
    write_u16(&mut entry, glyph_id);
    write_u16(&mut entry, glyph_id);
    write_u32(
        &mut entry,
        u32::try_from(doc_offset).expect("document offset overflow"),
    );
    write_u32(
        &mut entry,
        u32::try_from(payload.len()).expect("document length overflow"),
    );

    let mut new_table =
        Vec::with_capacity(table.len() + SvgDocRecord::BYTE_LEN + payload.len());
    new_table.extend_from_slice(&table[..slot_pos]);
    new_table.extend_from_slice(&entry);
    new_table.extend_from_slice(&table[slot_pos..]);
    new_table.extend_from_slice(payload);

    let num_entries = u16::try_from(parsed.entries.len() + 1).expect("too many documents");
    patch_u16(&mut new_table, parsed.index_pos(), num_entries);
    let entry_growth = u32::try_from(SvgDocRecord::BYTE_LEN).unwrap();
    for (j, other) in parsed.entries.iter().enumerate() {
        let entry_pos = parsed.entry_pos(j) + if j >= slot { SvgDocRecord::BYTE_LEN } else { 0 };
        patch_u32(&mut new_table, entry_pos + 4, other.doc_offset + entry_growth);
    }
    new_table
}

/// Deletes index entry `i` together with its document bytes. Remaining
/// entries lose 12 from their `docOffset`; those whose document sat past the
/// deleted one additionally lose its length.
fn remove_document(table: &[u8], parsed: &SvgTable, i: usize) -> Vec<u8> {
    let entry = parsed.entries[i];
    let entry_start = parsed.entry_pos(i);
    let doc_range = parsed.document_range(&entry);

    let mut new_table =
        Vec::with_capacity(table.len() - SvgDocRecord::BYTE_LEN - entry.doc_length as usize);
    new_table.extend_from_slice(&table[..entry_start]);
    new_table.extend_from_slice(&table[entry_start + SvgDocRecord::BYTE_LEN..doc_range.start]);
    new_table.extend_from_slice(&table[doc_range.end..]);

    let num_entries = u16::try_from(parsed.entries.len() - 1).expect("too many documents");
    patch_u16(&mut new_table, parsed.index_pos(), num_entries);
    let entry_shrinkage = u32::try_from(SvgDocRecord::BYTE_LEN).unwrap();
    for (j, other) in parsed.entries.iter().enumerate() {
        if j == i {
            continue;
        }
        let new_j = if j > i { j - 1 } else { j };
        let mut doc_offset = other.doc_offset - entry_shrinkage;
        if other.doc_offset > entry.doc_offset {
            doc_offset -= entry.doc_length;
        }
        patch_u32(&mut new_table, parsed.entry_pos(new_j) + 4, doc_offset);
    }
    new_table
}
