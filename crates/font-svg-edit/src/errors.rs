//! Error types.

use core::{fmt, ops};
use std::{error, io};

use crate::font::TableTag;

/// Kind of a font [`ParseError`].
#[derive(Debug)]
#[non_exhaustive]
pub enum ParseErrorKind {
    /// Unexpected end of the font data.
    UnexpectedEof,
    /// Unexpected sfnt version at the start of the file.
    UnexpectedFontVersion(u32),
    /// Missing required font table (e.g., `cmap`).
    MissingTable,
    /// No `cmap` subtable in one of the supported formats (0, 4, 6, 12).
    NoSupportedCmap,
    /// The `name` table has no non-empty family name record.
    MissingFamilyName,
    /// Range inferred from the table data is out of bounds.
    RangeOutOfBounds {
        /// Inferred range.
        range: ops::Range<usize>,
        /// Length of the indexed data.
        len: usize,
    },
    /// Unexpected version of a table.
    UnexpectedTableVersion {
        /// Actual table version.
        version: u32,
    },
    /// Unexpected table format (e.g., for a `cmap` subtable).
    UnexpectedTableFormat {
        /// Actual format.
        format: u16,
    },
    /// Reserved field expected to be zero has another value.
    NonZeroReserved,
    /// SVG document index entries are not sorted by the start glyph id.
    UnsortedDocumentIndex,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => formatter.write_str("unexpected end of font data"),
            Self::UnexpectedFontVersion(version) => {
                write!(formatter, "unexpected sfnt version {version:#010x}")
            }
            Self::MissingTable => formatter.write_str("missing required font table"),
            Self::NoSupportedCmap => formatter.write_str("no supported `cmap` subtable"),
            Self::MissingFamilyName => {
                formatter.write_str("no non-empty family name record in the `name` table")
            }
            Self::RangeOutOfBounds { range, len } => {
                write!(formatter, "range {range:?} is out of bounds ({len} bytes)")
            }
            Self::UnexpectedTableVersion { version } => {
                write!(formatter, "unexpected table version {version}")
            }
            Self::UnexpectedTableFormat { format } => {
                write!(formatter, "unexpected table format {format}")
            }
            Self::NonZeroReserved => formatter.write_str("reserved field has a non-zero value"),
            Self::UnsortedDocumentIndex => {
                formatter.write_str("SVG document index entries are not sorted")
            }
        }
    }
}

/// Errors that can occur when parsing a font.
#[derive(Debug)]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) offset: usize,
    pub(crate) table: Option<TableTag>,
}

impl ParseError {
    pub(crate) fn missing_table(tag: TableTag) -> Self {
        Self {
            kind: ParseErrorKind::MissingTable,
            offset: 0,
            table: Some(tag),
        }
    }

    /// Gets the error kind.
    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    /// Gets the table this error relates to.
    pub fn table(&self) -> Option<TableTag> {
        self.table
    }

    /// Gets the offset in the font data.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "error at offset {}", self.offset)?;
        if let Some(table) = self.table {
            write!(formatter, " in table {table}")?;
        }
        write!(formatter, ": {}", self.kind)
    }
}

impl error::Error for ParseError {}

/// Reason an SVG payload was rejected.
#[derive(Debug)]
#[non_exhaustive]
pub enum SvgError {
    /// XML syntax error.
    Xml(quick_xml::Error),
    /// Malformed attribute on the root element.
    Attr(quick_xml::events::attributes::AttrError),
    /// The document root is not an `<svg>` element.
    NotSvgRoot,
    /// The root `viewBox` does not consist of four numeric tokens.
    InvalidViewBox,
}

impl fmt::Display for SvgError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml(err) => write!(formatter, "XML syntax error: {err}"),
            Self::Attr(err) => write!(formatter, "malformed root attribute: {err}"),
            Self::NotSvgRoot => formatter.write_str("document root is not an `<svg>` element"),
            Self::InvalidViewBox => {
                formatter.write_str("`viewBox` does not consist of four numeric tokens")
            }
        }
    }
}

impl error::Error for SvgError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Xml(err) => Some(err),
            Self::Attr(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors that can occur when mutating a font or exporting its SVG documents.
#[derive(Debug)]
#[non_exhaustive]
pub enum EditError {
    /// The SVG payload is not a well-formed SVG document.
    MalformedSvg(SvgError),
    /// The SVG payload is gzip-compressed (SVGZ), which is not supported.
    CompressedSvg,
    /// The glyph id is absent from the font's character map.
    UnknownGlyph(u16),
    /// The font structure is inconsistent.
    Parse(ParseError),
    /// I/O failure while exporting documents.
    Io(io::Error),
}

impl fmt::Display for EditError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedSvg(err) => write!(formatter, "malformed SVG payload: {err}"),
            Self::CompressedSvg => {
                formatter.write_str("gzip-compressed SVG payloads are not supported")
            }
            Self::UnknownGlyph(id) => {
                write!(formatter, "glyph {id} is not mapped by the character map")
            }
            Self::Parse(err) => write!(formatter, "font structure error: {err}"),
            Self::Io(err) => write!(formatter, "I/O error exporting SVG documents: {err}"),
        }
    }
}

impl error::Error for EditError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::MalformedSvg(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for EditError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<SvgError> for EditError {
    fn from(err: SvgError) -> Self {
        Self::MalformedSvg(err)
    }
}

impl From<io::Error> for EditError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
