//! Structured PDF access behind a small trait.
//!
//! The structured strategies only need page enumeration, content
//! operations, font-aware string decoding and the library's own page text.
//! Keeping those behind [`PdfBackend`] isolates lopdf from layout logic.

use std::collections::BTreeMap;

use lopdf::{Document as LopdfDocument, Object};

use crate::error::{Error, Result};

use super::content::decode_text_bytes;

/// Page identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// A value from a PDF content stream operand.
#[derive(Debug, Clone)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

impl PdfValue {
    /// Numeric value, if any.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PdfValue::Integer(i) => Some(*i as f32),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// Abstract interface for structured PDF access.
pub trait PdfBackend {
    /// Return all pages as (page_number → PageId).
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Return the decompressed content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>>;

    /// Parse content stream bytes into a sequence of operations.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>>;

    /// Decode a string operand with the named font's encoding on a page.
    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String;

    /// The library's own plain-text rendering of one page.
    fn page_text(&self, page_number: u32) -> Result<String>;
}

/// [`PdfBackend`] over a loaded `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
}

impl LopdfBackend {
    /// Parse the document. An encrypted statement maps to [`Error::Encrypted`].
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        match LopdfDocument::load_mem(data) {
            Ok(doc) => Ok(Self { doc }),
            Err(lopdf::Error::Decryption(_)) => Err(Error::Encrypted),
            Err(e) => Err(e.into()),
        }
    }

    pub fn version(&self) -> &str {
        &self.doc.version
    }

    /// Decoded bytes of one content stream object, raw bytes if the filter
    /// is unsupported.
    fn stream_bytes(&self, id: lopdf::ObjectId) -> Option<Vec<u8>> {
        match self.doc.get_object(id) {
            Ok(Object::Stream(stream)) => Some(
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone()),
            ),
            _ => None,
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>> {
        let dict = self.doc.get_dictionary(page)?;
        let parts: Vec<lopdf::ObjectId> = match dict.get(b"Contents")? {
            Object::Reference(id) => vec![*id],
            Object::Array(items) => items
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .collect(),
            _ => Vec::new(),
        };

        let mut content = Vec::new();
        for id in parts {
            if let Some(bytes) = self.stream_bytes(id) {
                content.extend_from_slice(&bytes);
                // Operators may not span stream boundaries.
                content.push(b'\n');
            }
        }
        if content.is_empty() {
            return Err(Error::PdfParse(format!(
                "page {} {} has no content stream",
                page.0, page.1
            )));
        }
        Ok(content)
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content = lopdf::content::Content::decode(data)?;
        Ok(content
            .operations
            .iter()
            .map(|op| ContentOp {
                operator: op.operator.clone(),
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String {
        let decoded = self
            .doc
            .get_page_fonts(page)
            .ok()
            .and_then(|fonts| fonts.get(font_name).copied())
            .and_then(|font| font.get_font_encoding(&self.doc).ok())
            .and_then(|encoding| LopdfDocument::decode_text(&encoding, bytes).ok());
        decoded.unwrap_or_else(|| decode_text_bytes(bytes, None))
    }

    fn page_text(&self, page_number: u32) -> Result<String> {
        Ok(self.doc.extract_text(&[page_number])?)
    }
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_as_number() {
        assert_eq!(PdfValue::Integer(42).as_number(), Some(42.0));
        assert_eq!(PdfValue::Real(1.5).as_number(), Some(1.5));
        assert_eq!(PdfValue::Other.as_number(), None);
    }

    #[test]
    fn test_convert_object_nested_array() {
        let obj = Object::Array(vec![
            Object::String(b"ab".to_vec(), lopdf::StringFormat::Literal),
            Object::Integer(-120),
        ]);
        match convert_object(&obj) {
            PdfValue::Array(items) => {
                assert!(matches!(&items[0], PdfValue::Str(s) if s == b"ab"));
                assert_eq!(items[1].as_number(), Some(-120.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
