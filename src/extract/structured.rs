//! Structured extraction through a PDF object model.
//!
//! Four variants share one loaded document. Every call into the PDF
//! libraries runs under `catch_unwind`; a panic becomes
//! [`Error::PdfParse`] so the cascade can move on.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Page;

use super::backend::{LopdfBackend, PdfBackend};
use super::layout::{page_fragments, rows_by_coordinates, rows_by_tolerance};
use super::options::PageSelection;

/// Baseline tolerance for the row-based variant, as a fraction of font size.
const ROW_TOLERANCE_FACTOR: f32 = 0.4;

/// Structured extraction variants, in the order the cascade tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructuredVariant {
    /// Fragments clustered into rows by baseline tolerance
    RowBased,
    /// Fragments bucketed by rounded Y with column gaps preserved
    CoordinateBased,
    /// The PDF library's own per-page text
    WholePage,
    /// Whole-document text, split on form feeds
    WholeDocument,
}

impl StructuredVariant {
    /// All variants in preference order.
    pub const ALL: [StructuredVariant; 4] = [
        StructuredVariant::RowBased,
        StructuredVariant::CoordinateBased,
        StructuredVariant::WholePage,
        StructuredVariant::WholeDocument,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StructuredVariant::RowBased => "row-based",
            StructuredVariant::CoordinateBased => "coordinate-based",
            StructuredVariant::WholePage => "whole-page",
            StructuredVariant::WholeDocument => "whole-document",
        }
    }
}

/// Run a PDF-library call, turning a panic into a structural error.
pub fn guarded<T>(what: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::warn!("{} panicked: {}", what, msg);
            Err(Error::PdfParse(format!("{} panicked: {}", what, msg)))
        }
    }
}

/// A document loaded once and shared by the structured variants.
pub struct StructuredExtractor<'a> {
    data: &'a [u8],
    backend: LopdfBackend,
    gap_threshold: f32,
}

impl<'a> StructuredExtractor<'a> {
    /// Load the document. Fails with a structural error.
    pub fn load(data: &'a [u8], gap_threshold: f32) -> Result<Self> {
        let backend = guarded("PDF load", || LopdfBackend::load_bytes(data))?;
        log::debug!(
            "Loaded PDF {} with {} pages",
            backend.version(),
            backend.pages().len()
        );
        Ok(Self {
            data,
            backend,
            gap_threshold,
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.backend.pages().len() as u32
    }

    /// Run one variant over the selected pages.
    pub fn extract(&self, variant: StructuredVariant, pages: &PageSelection) -> Result<Vec<Page>> {
        guarded(variant.name(), || match variant {
            StructuredVariant::RowBased => self.by_fragments(pages, |fragments| {
                rows_by_tolerance(fragments, ROW_TOLERANCE_FACTOR)
            }),
            StructuredVariant::CoordinateBased => self.by_fragments(pages, |fragments| {
                rows_by_coordinates(fragments, self.gap_threshold)
            }),
            StructuredVariant::WholePage => self.whole_page(pages),
            StructuredVariant::WholeDocument => self.whole_document(pages),
        })
    }

    fn by_fragments(
        &self,
        selection: &PageSelection,
        build: impl Fn(&[super::layout::TextFragment]) -> Vec<String>,
    ) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        for (number, page_id) in self.backend.pages() {
            if !selection.includes(number) {
                continue;
            }
            match page_fragments(&self.backend, page_id) {
                Ok(fragments) => pages.push(Page {
                    number,
                    lines: build(&fragments),
                }),
                Err(e) => {
                    log::debug!("Page {}: fragment extraction failed: {}", number, e);
                    pages.push(Page::new(number));
                }
            }
        }
        Ok(pages)
    }

    fn whole_page(&self, selection: &PageSelection) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        for number in self.backend.pages().keys().copied() {
            if !selection.includes(number) {
                continue;
            }
            let text = self.backend.page_text(number).unwrap_or_else(|e| {
                log::debug!("Page {}: text extraction failed: {}", number, e);
                String::new()
            });
            pages.push(Page::from_text(number, &text));
        }
        Ok(pages)
    }

    fn whole_document(&self, selection: &PageSelection) -> Result<Vec<Page>> {
        let text = pdf_extract::extract_text_from_mem(self.data)?;
        Ok(split_form_feeds(&text)
            .into_iter()
            .filter(|p| selection.includes(p.number))
            .collect())
    }
}

/// Split text on form feeds into numbered pages.
pub fn split_form_feeds(text: &str) -> Vec<Page> {
    let mut parts: Vec<&str> = text.split('\x0c').collect();
    if parts.len() > 1 && parts.last().map_or(false, |p| p.trim().is_empty()) {
        parts.pop();
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| Page::from_text(i as u32 + 1, part))
        .collect()
}
