//! `name` table decoding.

use super::Cursor;
use crate::errors::ParseError;

const FAMILY_NAME_ID: u16 = 1;

/// Extracts the font family name (name ID 1) from the `name` table.
///
/// Returns `None` if the table has no non-empty family name record. Strings
/// starting with a zero byte are decoded as UTF-16BE, everything else as
/// UTF-8; both decodes are lossy.
pub(crate) fn family_name(mut cursor: Cursor<'_>) -> Result<Option<String>, ParseError> {
    let table_cursor = cursor;
    cursor.skip(2)?; // format
    let count = cursor.read_u16()?;
    let string_offset = cursor.read_u16()?;

    for _ in 0..count {
        cursor.skip(6)?; // platformID, encodingID, languageID
        let name_id = cursor.read_u16()?;
        let length = cursor.read_u16()?;
        let offset = cursor.read_u16()?;
        if name_id != FAMILY_NAME_ID || length == 0 {
            continue;
        }
        let start = usize::from(string_offset) + usize::from(offset);
        let string = table_cursor.range(start..start + usize::from(length))?;
        return Ok(Some(decode_name_string(string.bytes)));
    }
    Ok(None)
}

fn decode_name_string(bytes: &[u8]) -> String {
    if bytes.first() == Some(&0) {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|unit| u16::from_be_bytes([unit[0], unit[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
