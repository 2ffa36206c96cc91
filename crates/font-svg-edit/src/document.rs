//! SVG document rewriting for embedding and export.
//!
//! The OpenType SVG convention puts the glyph origin on the baseline, so an
//! inbound document gets its `viewBox` origin translated down by the view-box
//! height, and the root element is tagged with `id="glyph<N>"`. Export applies
//! the mirror `viewBox` rewrite. Only the root tag is re-serialized; all other
//! bytes of the document pass through untouched.

use core::ops;

use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};

use crate::errors::SvgError;

/// Magic bytes of a gzip stream (and hence of an SVGZ document).
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub(crate) fn is_gzipped(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    /// Shift the view-box origin to the glyph baseline: `minY := height`.
    Embed,
    /// Restore the view-box origin: `minY := 0`.
    Export,
}

/// Rewrites an inbound SVG document for embedding.
pub(crate) fn prepare_for_embedding(svg: &[u8], glyph_id: u16) -> Result<Vec<u8>, SvgError> {
    rewrite(svg, Direction::Embed, Some(glyph_id))
}

/// Mirror rewrite applied on export; the `id` attribute is left as written.
pub(crate) fn prepare_for_export(svg: &[u8]) -> Result<Vec<u8>, SvgError> {
    rewrite(svg, Direction::Export, None)
}

fn rewrite(svg: &[u8], direction: Direction, glyph_id: Option<u16>) -> Result<Vec<u8>, SvgError> {
    let mut reader = Reader::from_reader(svg);
    let mut root: Option<(ops::Range<usize>, Vec<u8>)> = None;

    // Read the document to the end even after the root tag is found so that
    // syntax errors anywhere in the payload are surfaced.
    loop {
        let start = position(&reader);
        match reader.read_event().map_err(SvgError::Xml)? {
            Event::Eof => break,
            Event::Start(elem) if root.is_none() => {
                let span = start..position(&reader);
                root = Some((span, rebuild_root(&elem, direction, glyph_id, false)?));
            }
            Event::Empty(elem) if root.is_none() => {
                let span = start..position(&reader);
                root = Some((span, rebuild_root(&elem, direction, glyph_id, true)?));
            }
            _ => { /* passed through verbatim */ }
        }
    }

    let Some((span, tag)) = root else {
        return Err(SvgError::NotSvgRoot);
    };
    let mut output = Vec::with_capacity(svg.len() + 32);
    output.extend_from_slice(&svg[..span.start]);
    output.extend_from_slice(&tag);
    output.extend_from_slice(&svg[span.end..]);
    Ok(output)
}

fn position(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).expect("SVG document length exceeds usize")
}

fn rebuild_root(
    elem: &BytesStart<'_>,
    direction: Direction,
    glyph_id: Option<u16>,
    self_closing: bool,
) -> Result<Vec<u8>, SvgError> {
    if elem.name().local_name().as_ref() != b"svg" {
        return Err(SvgError::NotSvgRoot);
    }

    let mut tag = Vec::with_capacity(64);
    tag.push(b'<');
    tag.extend_from_slice(elem.name().as_ref());

    let forced_id = glyph_id.map(|id| format!("glyph{id}"));
    let mut has_id = false;
    for attr in elem.attributes() {
        let attr = attr.map_err(SvgError::Attr)?;
        tag.push(b' ');
        match (attr.key.as_ref(), &forced_id) {
            (b"viewBox", _) => {
                let value = attr.unescape_value().map_err(SvgError::Xml)?;
                let rewritten = rewrite_view_box(&value, direction)?;
                push_attribute(&mut tag, b"viewBox", rewritten.as_bytes());
            }
            (b"id", Some(id)) => {
                has_id = true;
                push_attribute(&mut tag, b"id", id.as_bytes());
            }
            (key, _) => push_attribute(&mut tag, key, &attr.value),
        }
    }
    if let Some(id) = &forced_id {
        if !has_id {
            tag.push(b' ');
            push_attribute(&mut tag, b"id", id.as_bytes());
        }
    }

    tag.extend_from_slice(if self_closing { b"/>" } else { b">" });
    Ok(tag)
}

/// Appends `key="value"`. Values are emitted as-is apart from double quotes,
/// which must be re-escaped since the original attribute may have been
/// single-quoted.
fn push_attribute(tag: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    tag.extend_from_slice(key);
    tag.extend_from_slice(b"=\"");
    for &byte in value {
        if byte == b'"' {
            tag.extend_from_slice(b"&quot;");
        } else {
            tag.push(byte);
        }
    }
    tag.push(b'"');
}

/// Replaces the `minY` component of a `viewBox`, keeping the other tokens
/// verbatim. Tokens may be separated by whitespace or commas.
fn rewrite_view_box(value: &str, direction: Direction) -> Result<String, SvgError> {
    let tokens: Vec<&str> = value
        .split([' ', '\t', '\r', '\n', ','])
        .filter(|token| !token.is_empty())
        .collect();
    let [min_x, _, width, height] = tokens[..] else {
        return Err(SvgError::InvalidViewBox);
    };
    if tokens.iter().any(|token| token.parse::<f64>().is_err()) {
        return Err(SvgError::InvalidViewBox);
    }

    let min_y = match direction {
        Direction::Embed => height,
        Direction::Export => "0",
    };
    Ok(format!("{min_x} {min_y} {width} {height}"))
}
