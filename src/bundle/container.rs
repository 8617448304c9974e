use nom::IResult;
use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, le_u32};

use crate::foundation::error::{SkelxflError, SkelxflResult};

pub const BUNDLE_MAGIC: &[u8; 4] = b"SABF";
pub const BUNDLE_VERSION: u16 = 1;

/// Section kinds understood by this decoder. Unknown kinds are preserved so a
/// newer bundle still decodes the sections we care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Atlas,
    Timeline,
    Labels,
    Image,
    Unknown(u16),
}

impl SectionKind {
    fn from_u16(v: u16) -> Self {
        match v {
            1 => Self::Atlas,
            2 => Self::Timeline,
            3 => Self::Labels,
            4 => Self::Image,
            other => Self::Unknown(other),
        }
    }
}

/// A decoded section: kind plus its raw payload bytes. Payload decoding is
/// the concern of the atlas/timeline modules.
#[derive(Clone, Debug)]
pub struct Section<'a> {
    pub kind: SectionKind,
    pub payload: &'a [u8],
}

/// The sectioned bundle container. Holds borrowed payload slices; the caller
/// keeps the backing byte buffer alive.
#[derive(Clone, Debug)]
pub struct Bundle<'a> {
    pub version: u16,
    pub sections: Vec<Section<'a>>,
}

impl<'a> Bundle<'a> {
    pub fn section(&self, kind: SectionKind) -> Option<&'a [u8]> {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.payload)
    }

    pub fn require(&self, kind: SectionKind, name: &'static str) -> SkelxflResult<&'a [u8]> {
        self.section(kind)
            .ok_or_else(|| SkelxflError::format(name, 0, "section missing from bundle"))
    }
}

fn header(i: &[u8]) -> IResult<&[u8], (u16, u16)> {
    let (i, _) = tag(&BUNDLE_MAGIC[..])(i)?;
    let (i, version) = le_u16(i)?;
    let (i, section_count) = le_u16(i)?;
    Ok((i, (version, section_count)))
}

fn section(i: &[u8]) -> IResult<&[u8], Section<'_>> {
    let (i, kind) = le_u16(i)?;
    let (i, _reserved) = le_u16(i)?;
    let (i, len) = le_u32(i)?;
    // take() fails (rather than panicking or over-reading) when the declared
    // length exceeds the remaining input.
    let (i, payload) = take(len as usize)(i)?;
    Ok((
        i,
        Section {
            kind: SectionKind::from_u16(kind),
            payload,
        },
    ))
}

/// Parse the bundle container. Rejects bad magic, unsupported versions, and
/// any section whose declared length exceeds the remaining input.
pub fn parse_bundle(input: &[u8]) -> SkelxflResult<Bundle<'_>> {
    let (mut rest, (version, section_count)) =
        header(input).map_err(|e| to_format_error("header", input, e))?;
    if version != BUNDLE_VERSION {
        return Err(SkelxflError::format(
            "header",
            4,
            format!("unsupported bundle version {version}"),
        ));
    }

    let mut sections = Vec::with_capacity(usize::from(section_count));
    for _ in 0..section_count {
        let (next, s) = section(rest).map_err(|e| to_format_error("section table", input, e))?;
        rest = next;
        sections.push(s);
    }

    if !rest.is_empty() {
        return Err(SkelxflError::format(
            "section table",
            input.len() - rest.len(),
            format!("{} trailing bytes after last section", rest.len()),
        ));
    }

    Ok(Bundle { version, sections })
}

/// Map a nom error to a `FormatError`, recovering the absolute byte offset
/// from the length of the unconsumed remainder.
pub fn to_format_error(
    section: &'static str,
    full: &[u8],
    err: nom::Err<nom::error::Error<&[u8]>>,
) -> SkelxflError {
    match err {
        nom::Err::Incomplete(_) => SkelxflError::format(section, full.len(), "truncated input"),
        nom::Err::Error(e) | nom::Err::Failure(e) => SkelxflError::format(
            section,
            full.len() - e.input.len(),
            format!("{:?}", e.code),
        ),
    }
}

/// Length-prefixed UTF-8 string: `u16` byte length followed by the bytes.
pub fn pstring(i: &[u8]) -> IResult<&[u8], String> {
    let (i, len) = le_u16(i)?;
    let (rest, raw) = take(usize::from(len))(i)?;
    match std::str::from_utf8(raw) {
        Ok(s) => Ok((rest, s.to_owned())),
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Char,
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bundle/container.rs"]
mod tests;
