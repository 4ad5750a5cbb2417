//! PDF header validation and structural hints.

use crate::error::{Error, Result, UnreadableCause};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Header version plus hints about how the document carries its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// Header version, such as "1.4"
    pub version: String,
    /// Whether any font resource is declared
    pub has_fonts: bool,
    /// Whether any font carries a ToUnicode table
    pub has_tounicode: bool,
    /// Whether any image XObject is present
    pub has_images: bool,
}

impl fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PDF {}", self.version)?;
        if self.has_tounicode {
            f.write_str(", ToUnicode fonts")?;
        } else if self.has_fonts {
            f.write_str(", fonts")?;
        }
        if self.has_images {
            f.write_str(", images")?;
        }
        Ok(())
    }
}

impl PdfFormat {
    /// Best guess at why extraction produced no usable text.
    ///
    /// A document with images but no fonts is a scan; anything with fonts
    /// that still decodes to garbage points at the font encoding.
    pub fn likely_cause(&self, any_text: bool) -> UnreadableCause {
        if !self.has_fonts || (!any_text && self.has_images) {
            UnreadableCause::NoTextLayer
        } else {
            UnreadableCause::CustomFontEncoding
        }
    }
}

const HEADER_MAGIC: &[u8] = b"%PDF-";

/// Readers tolerate junk before the header within the first kilobyte.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Read the header window of a file and validate it.
///
/// Structural hints need the whole file and are left unset; use
/// [`inspect`] for those.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let mut window = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    File::open(path)?
        .take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut window)?;
    detect_format_from_bytes(&window)
}

/// Validate the `%PDF-x.y` header of in-memory data.
///
/// Fails with [`Error::UnknownFormat`] when no header is found and with
/// [`Error::UnsupportedVersion`] when the version is not `digit.digit`.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let start = find(window, HEADER_MAGIC).ok_or(Error::UnknownFormat)?;
    let version = match data.get(start + HEADER_MAGIC.len()..start + HEADER_MAGIC.len() + 3) {
        Some(bytes) => parse_version(bytes)?,
        None => return Err(Error::UnknownFormat),
    };

    Ok(PdfFormat {
        version,
        has_fonts: false,
        has_tounicode: false,
        has_images: false,
    })
}

/// Validate the header and scan the whole file for font and image markers.
///
/// Markers inside compressed object streams are missed, so the hints
/// are advisory only.
pub fn inspect(data: &[u8]) -> Result<PdfFormat> {
    let mut format = detect_format_from_bytes(data)?;
    format.has_fonts = find(data, b"/Font").is_some();
    format.has_tounicode = find(data, b"/ToUnicode").is_some();
    format.has_images = find(data, b"/Image").is_some() || find(data, b"/DCTDecode").is_some();
    Ok(format)
}

fn parse_version(bytes: &[u8]) -> Result<String> {
    match *bytes {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok(format!("{}.{}", major as char, minor as char))
        }
        _ => Err(Error::UnsupportedVersion(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Whether the file starts with a PDF header.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Whether the bytes start with a PDF header.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
