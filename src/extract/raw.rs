//! Raw stream scanning: the in-process fallback that needs no object model.
//!
//! Every `stream ... endstream` body in the file is located by byte search,
//! inflated, and sorted into ToUnicode tables and content streams. The
//! tables are merged into one document CMap which then decodes every
//! content stream. Works on files whose cross-reference data is too broken
//! for a structured parser.

use crate::detect::find;
use crate::model::Page;

use super::cmap::CMap;
use super::content;

/// A stream body found in the file plus the dictionary text preceding it.
#[derive(Debug, Clone)]
pub struct RawStream<'a> {
    pub dict: &'a [u8],
    pub data: &'a [u8],
}

impl<'a> RawStream<'a> {
    fn dict_has(&self, key: &[u8]) -> bool {
        find(self.dict, key).is_some()
    }

    /// Streams that can never carry page text.
    pub fn is_binary_resource(&self) -> bool {
        const SKIP: &[&[u8]] = &[
            b"/Image",
            b"/XRef",
            b"/ObjStm",
            b"/FontFile",
            b"/Length1",
            b"/Length2",
            b"/Type1C",
            b"/CIDFontType0C",
            b"/OpenType",
            b"/DCTDecode",
            b"/JPXDecode",
            b"/CCITTFaxDecode",
            b"/JBIG2Decode",
            b"/Metadata",
        ];
        SKIP.iter().any(|k| self.dict_has(k))
    }
}

/// Locate every stream body in a PDF file.
pub fn scan_streams(data: &[u8]) -> Vec<RawStream<'_>> {
    let mut streams = Vec::new();
    let mut pos = 0;

    while let Some(rel) = find(&data[pos..], b"stream") {
        let keyword = pos + rel;
        // Skip the tail of "endstream".
        if keyword >= 3 && &data[keyword - 3..keyword] == b"end" {
            pos = keyword + 6;
            continue;
        }

        let mut start = keyword + 6;
        if data.get(start) == Some(&b'\r') {
            start += 1;
        }
        if data.get(start) == Some(&b'\n') {
            start += 1;
        }

        let Some(end_rel) = find(&data[start..], b"endstream") else {
            break;
        };
        let mut end = start + end_rel;
        while end > start && matches!(data[end - 1], b'\r' | b'\n') {
            end -= 1;
        }

        let dict_start = rfind(&data[..keyword], b"obj").map_or(0, |p| p + 3);
        streams.push(RawStream {
            dict: &data[dict_start..keyword],
            data: &data[start..end],
        });

        pos = start + end_rel + 9;
    }

    streams
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn is_cmap(content: &[u8]) -> bool {
    find(content, b"beginbfchar").is_some() || find(content, b"beginbfrange").is_some()
}

/// Build the merged document CMap from every ToUnicode stream in the file.
pub fn document_cmap(data: &[u8]) -> CMap {
    let mut cmap = CMap::new();
    for stream in scan_streams(data) {
        if stream.is_binary_resource() {
            continue;
        }
        let body = content::inflate(stream.data);
        if is_cmap(&body) {
            cmap.merge(CMap::parse(&body));
        }
    }
    cmap
}

/// Extract pages from raw streams.
///
/// Each content stream that yields text becomes one page, numbered in file
/// order. Page boundaries of multi-stream pages are therefore approximate.
pub fn extract(data: &[u8]) -> Vec<Page> {
    let streams = scan_streams(data);
    let mut cmap = CMap::new();
    let mut bodies = Vec::new();

    for stream in &streams {
        if stream.is_binary_resource() {
            continue;
        }
        let body = content::inflate(stream.data);
        if is_cmap(&body) {
            cmap.merge(CMap::parse(&body));
        } else {
            bodies.push(body);
        }
    }

    log::debug!(
        "Raw scan: {} streams, {} candidates, CMap with {} entries",
        streams.len(),
        bodies.len(),
        cmap.len()
    );

    let cmap = if cmap.is_empty() { None } else { Some(&cmap) };
    let mut pages = Vec::new();
    for body in &bodies {
        let lines = content::extract_lines(body, cmap);
        if !lines.is_empty() {
            pages.push(Page {
                number: pages.len() as u32 + 1,
                lines,
            });
        }
    }
    pages
}
