//! Text extraction from bank statement PDFs.
//!
//! Several strategies of decreasing fidelity are tried in order by the
//! [`ExtractionPipeline`]:
//!
//! - [`structured`]: object-model extraction, four layout variants
//! - [`raw`]: byte-level stream scan decoded through a merged [`CMap`]
//! - [`external`]: `pdftotext`, and OCR via `pdftoppm` + `tesseract`
//!
//! Each result is scored by [`readability`] and the first acceptable one
//! wins.

pub mod backend;
pub mod cmap;
pub mod content;
pub mod external;
pub mod layout;
pub mod options;
pub mod pipeline;
pub mod raw;
pub mod readability;
pub mod structured;

pub use backend::{LopdfBackend, PdfBackend};
pub use cmap::CMap;
pub use external::{OcrEngine, Pdftoppm, Pdftotext, Rasterizer, Tesseract, TextTool, ToolAvailability};
pub use options::{ExtractOptions, PageSelection, Strategy};
pub use pipeline::{Extraction, ExtractionPipeline};
pub use readability::{ReadabilityConfig, ReadabilityReport};
pub use structured::StructuredVariant;
