//! Error types for bankpdf library.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for bankpdf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why no extraction strategy produced usable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadableCause {
    /// Text operators exist but decode to garbage (custom or subset font encoding).
    CustomFontEncoding,
    /// The document has no text layer at all (scanned or image-only pages).
    NoTextLayer,
}

impl fmt::Display for UnreadableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnreadableCause::CustomFontEncoding => write!(
                f,
                "the PDF uses a custom font encoding that could not be decoded; \
                 try OCR (--ocr) or export the statement as CSV from online banking"
            ),
            UnreadableCause::NoTextLayer => write!(
                f,
                "the PDF has no text layer (scanned or image-based); \
                 try OCR (--ocr) or enter the transactions manually"
            ),
        }
    }
}

/// Error types that can occur during statement processing.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// Every extraction strategy produced unreadable output.
    #[error("No readable text could be extracted: {0}")]
    UnreadableText(UnreadableCause),

    /// No bank hint was given and none could be detected from the text.
    #[error("Cannot auto-detect the bank; pass an explicit bank (metro, hsbc, barclays)")]
    UnrecognizedBank,

    /// The explicit bank hint does not name a known statement layout.
    #[error("Unsupported bank: {0}")]
    UnsupportedBank(String),

    /// An external tool (pdftotext, pdftoppm, tesseract) is not installed.
    #[error("External tool not available: {0}")]
    ToolUnavailable(String),

    /// An external tool ran but failed.
    #[error("External tool failed: {0}")]
    ExternalTool(String),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// Error during rendering (CSV, JSON).
    #[error("Rendering error: {0}")]
    Render(String),
}

impl Error {
    /// Whether this error comes from the PDF container itself rather than its text.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::UnknownFormat
                | Error::UnsupportedVersion(_)
                | Error::PdfParse(_)
                | Error::Encrypted
        )
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<pdf_extract::OutputError> for Error {
    fn from(err: pdf_extract::OutputError) -> Self {
        Error::PdfParse(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Render(format!("CSV error: {}", err))
    }
}
