//! Synthetic PDF documents for integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Builds a small but well-formed PDF: catalog, page tree, one Helvetica
/// font, an optional ToUnicode CMap, and one content stream per page.
#[derive(Debug, Default)]
pub struct PdfBuilder {
    pages: Vec<Vec<u8>>,
    to_unicode: Option<Vec<u8>>,
    compress: bool,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page whose content stream is `content`.
    pub fn page(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.pages.push(content.into());
        self
    }

    /// Add a page that shows each line with `Tj`, one line per `Td` step.
    pub fn text_page(self, lines: &[&str]) -> Self {
        let mut content = String::from("BT /F1 10 Tf 50 760 Td 12 TL");
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                content.push_str(" 0 -14 Td");
            }
            content.push_str(&format!(" ({}) Tj", escape(line)));
        }
        content.push_str(" ET");
        self.page(content)
    }

    /// Attach a ToUnicode CMap to the font.
    pub fn to_unicode(mut self, cmap: impl Into<Vec<u8>>) -> Self {
        self.to_unicode = Some(cmap.into());
        self
    }

    /// Flate-compress every stream.
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut objects: Vec<Vec<u8>> = Vec::new();
        let page_count = self.pages.len();
        let cmap_id = self.to_unicode.as_ref().map(|_| 4);
        let first_page_id = if cmap_id.is_some() { 5 } else { 4 };

        let kids: Vec<String> = (0..page_count)
            .map(|i| format!("{} 0 R", first_page_id + i * 2))
            .collect();

        objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
        objects.push(
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_count
            )
            .into_bytes(),
        );
        let font = match cmap_id {
            Some(id) => format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding /ToUnicode {} 0 R >>",
                id
            ),
            None => "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        };
        objects.push(font.into_bytes());
        if let Some(cmap) = &self.to_unicode {
            objects.push(self.stream(cmap));
        }

        for (i, content) in self.pages.iter().enumerate() {
            let content_id = first_page_id + i * 2 + 1;
            objects.push(
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                     /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                    content_id
                )
                .into_bytes(),
            );
            objects.push(self.stream(content));
        }

        let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref
            )
            .as_bytes(),
        );
        out
    }

    fn stream(&self, data: &[u8]) -> Vec<u8> {
        let (body, filter) = if self.compress {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data).expect("in-memory write");
            (enc.finish().expect("in-memory write"), " /Filter /FlateDecode")
        } else {
            (data.to_vec(), "")
        };

        let mut out = format!("<< /Length {}{} >>\nstream\n", body.len(), filter).into_bytes();
        out.extend_from_slice(&body);
        out.extend_from_slice(b"\nendstream");
        out
    }
}

/// Escape a literal string operand.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// A ToUnicode CMap with the given `bfchar` pairs, in hex.
pub fn bfchar_cmap(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         1 begincodespacerange\n<00> <FF>\nendcodespacerange\n",
    );
    cmap.push_str(&format!("{} beginbfchar\n", pairs.len()));
    for (src, dst) in pairs {
        cmap.push_str(&format!("<{}> <{}>\n", src, dst));
    }
    cmap.push_str("endbfchar\nendcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap.into_bytes()
}

/// Lines of a Metro Bank statement page.
pub const METRO_LINES: &[&str] = &[
    "Metro Bank PLC",
    "Account Statement",
    "Sort code: 23-05-80 Account number: 12345678",
    "Date Description Paid out Paid in Balance",
    "14/01/2024 Balance brought forward 1,260.55",
    "15/01/2024 CARD PAYMENT TESCO 25.99 1,234.56",
    "16/01/2024 SALARY ACME LTD 1,000.00 2,234.56",
];
