//! `cmap` table decoding.

use std::collections::BTreeSet;

use super::Cursor;
use crate::errors::{ParseError, ParseErrorKind};

/// Byte encoding subtable (format 0): 256 directly mapped code points.
#[derive(Debug)]
struct ByteEncoding<'a> {
    glyph_ids: &'a [u8],
}

impl<'a> ByteEncoding<'a> {
    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format == 0 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat { format })
            }
        })?;
        cursor.skip(4)?; // length, language
        let glyph_ids = cursor.split_at(256)?;
        Ok(Self {
            glyph_ids: glyph_ids.bytes,
        })
    }

    fn collect_mappings(&self, mappings: &mut Vec<(u32, u16)>) {
        for (code, &glyph_id) in (0_u32..).zip(self.glyph_ids) {
            if glyph_id != 0 {
                mappings.push((code, glyph_id.into()));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SegmentWithDelta {
    start_code: u16,
    end_code: u16,
    id_delta: u16,
    id_range_offset: u16,
}

/// Segment mapping to delta values (format 4) subtable.
#[derive(Debug)]
struct SegmentDeltas<'a> {
    segments: Vec<SegmentWithDelta>,
    glyph_id_array: &'a [u8],
}

impl<'a> SegmentDeltas<'a> {
    fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format == 4 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat { format })
            }
        })?;
        let remaining_len = cursor.read_u16_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(4)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(2)?; // language
        let segment_count = cursor.read_u16()? / 2;
        cursor.skip(6)?; // searchRange, entrySelector, rangeShift

        let vec_len = 2 * usize::from(segment_count);
        let mut end_codes = cursor.split_at(vec_len)?;
        cursor.read_u16_checked(|pad| {
            if pad == 0 {
                Ok(())
            } else {
                Err(ParseErrorKind::NonZeroReserved)
            }
        })?;
        let mut start_codes = cursor.split_at(vec_len)?;
        let mut id_deltas = cursor.split_at(vec_len)?;
        let mut id_range_offsets = cursor.split_at(vec_len)?;

        let segments = (0..segment_count).map(|_| {
            Ok(SegmentWithDelta {
                start_code: start_codes.read_u16()?,
                end_code: end_codes.read_u16()?,
                id_delta: id_deltas.read_u16()?,
                id_range_offset: id_range_offsets.read_u16()?,
            })
        });

        Ok(Self {
            segments: segments.collect::<Result<_, ParseError>>()?,
            glyph_id_array: cursor.bytes,
        })
    }

    fn glyph_id(&self, segment_idx: usize, code: u16) -> Option<u16> {
        let segment = &self.segments[segment_idx];
        if segment.id_range_offset == 0 {
            return Some(segment.id_delta.wrapping_add(code));
        }

        // Offset is counted from this segment's position in `idRangeOffsets`
        let mut byte_offset = 2 * segment_idx;
        byte_offset += usize::from(segment.id_range_offset);
        byte_offset += 2 * usize::from(code - segment.start_code);
        // Shift the offset to count from the start of `glyphIdArray`
        byte_offset = byte_offset.checked_sub(2 * self.segments.len())?;
        let glyph_id_bytes = self.glyph_id_array.get(byte_offset..byte_offset + 2)?;
        let glyph_id = u16::from_be_bytes(glyph_id_bytes.try_into().unwrap());
        if glyph_id == 0 {
            None // missing glyph; `idDelta` is not applied
        } else {
            Some(segment.id_delta.wrapping_add(glyph_id))
        }
    }

    fn collect_mappings(&self, mappings: &mut Vec<(u32, u16)>) {
        for (i, segment) in self.segments.iter().enumerate() {
            for code in segment.start_code..=segment.end_code {
                let Some(glyph_id) = self.glyph_id(i, code) else {
                    continue;
                };
                if glyph_id != 0 {
                    mappings.push((code.into(), glyph_id));
                }
            }
        }
    }
}

/// Trimmed table mapping subtable (format 6).
#[derive(Debug)]
struct TrimmedMapping {
    first_code: u16,
    glyph_ids: Vec<u16>,
}

impl TrimmedMapping {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format == 6 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat { format })
            }
        })?;
        cursor.skip(4)?; // length, language
        let first_code = cursor.read_u16()?;
        let entry_count = cursor.read_u16()?;
        let glyph_ids = (0..entry_count)
            .map(|_| cursor.read_u16())
            .collect::<Result<_, ParseError>>()?;
        Ok(Self {
            first_code,
            glyph_ids,
        })
    }

    fn collect_mappings(&self, mappings: &mut Vec<(u32, u16)>) {
        for (i, &glyph_id) in (0_u32..).zip(&self.glyph_ids) {
            if glyph_id != 0 {
                mappings.push((u32::from(self.first_code) + i, glyph_id));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SequentialMapGroup {
    start_char_code: u32,
    end_char_code: u32,
    start_glyph_id: u32,
}

/// Segmented coverage (format 12) subtable.
#[derive(Debug)]
struct SegmentedCoverage {
    groups: Vec<SequentialMapGroup>,
}

impl SegmentedCoverage {
    fn parse(mut cursor: Cursor<'_>) -> Result<Self, ParseError> {
        cursor.read_u16_checked(|format| {
            if format == 12 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableFormat { format })
            }
        })?;
        cursor.skip(2)?; // reserved

        let remaining_len = cursor.read_u32_checked(|subtable_len| {
            Ok(subtable_len
                .checked_sub(8)
                .ok_or(ParseErrorKind::UnexpectedEof)? as usize)
        })?;
        cursor = cursor.range(0..remaining_len)?;

        cursor.skip(4)?; // language
        let num_groups = cursor.read_u32()?;
        let groups = (0..num_groups).map(|_| {
            Ok(SequentialMapGroup {
                start_char_code: cursor.read_u32()?,
                end_char_code: cursor.read_u32()?,
                start_glyph_id: cursor.read_u32()?,
            })
        });

        Ok(Self {
            groups: groups.collect::<Result<_, ParseError>>()?,
        })
    }

    fn collect_mappings(&self, mappings: &mut Vec<(u32, u16)>) {
        for group in &self.groups {
            let end = group.end_char_code.min(char::MAX as u32);
            for code in group.start_char_code..=end {
                let Some(glyph_id) = group
                    .start_glyph_id
                    .checked_add(code - group.start_char_code)
                else {
                    break;
                };
                let Ok(glyph_id) = u16::try_from(glyph_id) else {
                    break;
                };
                if glyph_id != 0 {
                    mappings.push((code, glyph_id));
                }
            }
        }
    }
}

#[derive(Debug)]
enum CmapSubtable<'a> {
    ByteEncoding(ByteEncoding<'a>),
    SegmentDeltas(SegmentDeltas<'a>),
    TrimmedMapping(TrimmedMapping),
    SegmentedCoverage(SegmentedCoverage),
}

/// Decoded `cmap` table, restricted to the supported subtable formats.
#[derive(Debug)]
pub(crate) struct CmapTable<'a> {
    subtables: Vec<CmapSubtable<'a>>,
}

impl<'a> CmapTable<'a> {
    pub(crate) fn parse(mut cursor: Cursor<'a>) -> Result<Self, ParseError> {
        let table_cursor = cursor;
        cursor.read_u16_checked(|version| {
            if version == 0 {
                Ok(())
            } else {
                Err(ParseErrorKind::UnexpectedTableVersion {
                    version: version.into(),
                })
            }
        })?;

        // Several encoding records routinely point at the same subtable;
        // collect distinct offsets rather than parsing it repeatedly.
        let num_tables = cursor.read_u16()?;
        let mut offsets = BTreeSet::new();
        for _ in 0..num_tables {
            cursor.skip(4)?; // platformID, encodingID
            offsets.insert(cursor.read_u32()?);
        }

        let mut subtables = Vec::new();
        for offset in offsets {
            let mut subtable = table_cursor;
            subtable.skip(offset as usize)?;
            let format = {
                let mut peek = subtable;
                peek.read_u16()?
            };
            let parsed = match format {
                0 => CmapSubtable::ByteEncoding(ByteEncoding::parse(subtable)?),
                4 => CmapSubtable::SegmentDeltas(SegmentDeltas::parse(subtable)?),
                6 => CmapSubtable::TrimmedMapping(TrimmedMapping::parse(subtable)?),
                12 => CmapSubtable::SegmentedCoverage(SegmentedCoverage::parse(subtable)?),
                _ => continue, // unsupported subtable format
            };
            subtables.push(parsed);
        }

        if subtables.is_empty() {
            return Err(table_cursor.err(ParseErrorKind::NoSupportedCmap));
        }
        Ok(Self { subtables })
    }

    /// Enumerates `(code point, glyph id)` pairs across all subtables.
    /// Glyph id 0 (the missing glyph) is skipped, and a glyph id mapped from
    /// several code points is reported once, for the first code point seen.
    pub(crate) fn mappings(&self) -> Vec<(u32, u16)> {
        let mut mappings = Vec::new();
        for subtable in &self.subtables {
            match subtable {
                CmapSubtable::ByteEncoding(subtable) => subtable.collect_mappings(&mut mappings),
                CmapSubtable::SegmentDeltas(subtable) => subtable.collect_mappings(&mut mappings),
                CmapSubtable::TrimmedMapping(subtable) => subtable.collect_mappings(&mut mappings),
                CmapSubtable::SegmentedCoverage(subtable) => {
                    subtable.collect_mappings(&mut mappings);
                }
            }
        }

        let mut seen = BTreeSet::new();
        mappings.retain(|&(_, glyph_id)| seen.insert(glyph_id));
        mappings
    }
}
