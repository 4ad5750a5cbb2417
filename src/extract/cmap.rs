//! ToUnicode CMap parsing and decoding.
//!
//! A CMap maps font-internal byte codes to Unicode. Only the parts needed
//! for text recovery are understood: `codespacerange`, `bfchar` and
//! `bfrange` blocks. Anything malformed is skipped, never reported.

use std::collections::HashMap;

/// Largest number of codes a single `bfrange` entry may expand to.
const MAX_RANGE_LEN: u32 = 0x1_0000;

static_regex!(bfchar_re, r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>");
static_regex!(
    bfrange_seq_re,
    r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>"
);
static_regex!(
    bfrange_array_re,
    r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>\s*\[((?:\s*<[0-9A-Fa-f\s]*>)*)\s*\]"
);
static_regex!(hex_re, r"<([0-9A-Fa-f\s]*)>");

/// Byte-code to Unicode table for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CMap {
    map: HashMap<Vec<u8>, String>,
    codespace_width: Option<usize>,
}

impl CMap {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (decompressed) ToUnicode stream.
    ///
    /// Never fails: unparsable entries are dropped and an input without
    /// any mapping block yields an empty table.
    pub fn parse(data: &[u8]) -> Self {
        let content = String::from_utf8_lossy(data);
        let mut cmap = CMap::new();

        for section in extract_sections(&content, "begincodespacerange", "endcodespacerange") {
            for caps in hex_re().captures_iter(section) {
                let width = hex_to_bytes(&caps[1]).len();
                if (1..=4).contains(&width) {
                    cmap.codespace_width = Some(cmap.codespace_width.unwrap_or(0).max(width));
                }
            }
        }

        for section in extract_sections(&content, "beginbfchar", "endbfchar") {
            for caps in bfchar_re().captures_iter(section) {
                let src = hex_to_bytes(&caps[1]);
                let dst = decode_utf16be(&hex_to_bytes(&caps[2]));
                if !src.is_empty() && !dst.is_empty() {
                    cmap.map.insert(src, dst);
                }
            }
        }

        for section in extract_sections(&content, "beginbfrange", "endbfrange") {
            cmap.parse_bfrange_section(section);
        }

        log::debug!("Parsed CMap with {} entries", cmap.map.len());
        cmap
    }

    fn parse_bfrange_section(&mut self, section: &str) {
        // Array entries first; their spans are blanked so the sequential
        // pattern cannot re-match inside them.
        let mut rest = section.to_string();
        for caps in bfrange_array_re().captures_iter(section) {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let start = hex_to_bytes(&caps[1]);
            let end = hex_to_bytes(&caps[2]);
            let dsts: Vec<String> = hex_re()
                .captures_iter(&caps[3])
                .map(|c| decode_utf16be(&hex_to_bytes(&c[1])))
                .collect();
            if let Some((lo, hi, width)) = code_bounds(&start, &end) {
                for (offset, dst) in (lo..=hi).zip(dsts) {
                    if !dst.is_empty() {
                        self.map.insert(code_to_bytes(offset, width), dst);
                    }
                }
            }
            rest.replace_range(whole, &" ".repeat(caps[0].len()));
        }

        for caps in bfrange_seq_re().captures_iter(&rest) {
            let start = hex_to_bytes(&caps[1]);
            let end = hex_to_bytes(&caps[2]);
            let dst = hex_to_bytes(&caps[3]);
            if dst.is_empty() {
                continue;
            }
            let Some((lo, hi, width)) = code_bounds(&start, &end) else {
                continue;
            };
            for (i, code) in (lo..=hi).enumerate() {
                let text = decode_utf16be(&offset_destination(&dst, i as u32));
                if !text.is_empty() {
                    self.map.insert(code_to_bytes(code, width), text);
                }
            }
        }
    }

    /// Merge another table into this one. Later entries win on collision.
    pub fn merge(&mut self, other: CMap) {
        self.map.extend(other.map);
        self.codespace_width = match (self.codespace_width, other.codespace_width) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Number of mapped codes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the table maps nothing.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look up a single code.
    pub fn get(&self, code: &[u8]) -> Option<&str> {
        self.map.get(code).map(String::as_str)
    }

    /// Bytes per code: the declared codespace width, else the longest key.
    pub fn code_width(&self) -> usize {
        self.codespace_width
            .or_else(|| self.map.keys().map(Vec::len).max())
            .unwrap_or(1)
            .clamp(1, 4)
    }

    /// Decode a byte string through the table.
    ///
    /// Codes are read at the table width. An unknown code falls back to a
    /// single-byte lookup, then to printable ASCII; other bytes are dropped.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let width = self.code_width();
        let mut out = String::new();
        let mut i = 0;

        while i < bytes.len() {
            if i + width <= bytes.len() {
                if let Some(text) = self.map.get(&bytes[i..i + width]) {
                    out.push_str(text);
                    i += width;
                    continue;
                }
            }
            if width > 1 {
                if let Some(text) = self.map.get(&bytes[i..i + 1]) {
                    out.push_str(text);
                    i += 1;
                    continue;
                }
            }
            let b = bytes[i];
            if (0x20..=0x7E).contains(&b) {
                out.push(b as char);
            }
            i += 1;
        }

        out
    }
}

/// Slice out every `begin ... end` section.
fn extract_sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut sections = Vec::new();
    let mut remaining = content;

    while let Some(begin_pos) = remaining.find(begin) {
        let after_begin = &remaining[begin_pos + begin.len()..];
        match after_begin.find(end) {
            Some(end_pos) => {
                sections.push(&after_begin[..end_pos]);
                remaining = &after_begin[end_pos + end.len()..];
            }
            None => break,
        }
    }

    sections
}

/// Hex digits (whitespace ignored) to bytes. An odd trailing digit is
/// treated as if followed by `0`, matching how PDF hex strings are read.
pub(crate) fn hex_to_bytes(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter_map(|b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Interpret destination bytes as UTF-16BE.
///
/// Valid surrogate pairs combine into one code point; unpaired surrogates
/// are dropped. A lone odd byte is treated as its own code unit.
pub(crate) fn decode_utf16be(bytes: &[u8]) -> String {
    let units: Vec<u16> = if bytes.len() % 2 == 1 {
        std::iter::once(u16::from(bytes[0]))
            .chain(bytes[1..].chunks(2).map(|c| u16::from_be_bytes([c[0], c[1]])))
            .collect()
    } else {
        bytes
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect()
    };

    char::decode_utf16(units)
        .filter_map(|r| r.ok())
        .filter(|c| *c != '\0')
        .collect()
}

/// Integer bounds and byte width of a source range, or `None` when malformed.
fn code_bounds(start: &[u8], end: &[u8]) -> Option<(u32, u32, usize)> {
    if start.is_empty() || start.len() > 4 || start.len() != end.len() {
        return None;
    }
    let lo = bytes_to_code(start);
    let hi = bytes_to_code(end);
    if hi < lo || hi - lo >= MAX_RANGE_LEN {
        return None;
    }
    Some((lo, hi, start.len()))
}

fn bytes_to_code(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn code_to_bytes(code: u32, width: usize) -> Vec<u8> {
    code.to_be_bytes()[4 - width..].to_vec()
}

/// Add `offset` to the last UTF-16 unit of a destination.
fn offset_destination(dst: &[u8], offset: u32) -> Vec<u8> {
    let mut out = dst.to_vec();
    if offset == 0 {
        return out;
    }
    if out.len() >= 2 {
        let n = out.len();
        let last = u32::from(u16::from_be_bytes([out[n - 2], out[n - 1]]));
        let bumped = (last + offset) as u16;
        out[n - 2..].copy_from_slice(&bumped.to_be_bytes());
    } else {
        let bumped = u32::from(out[0]) + offset;
        out = (bumped as u16).to_be_bytes().to_vec();
    }
    out
}
