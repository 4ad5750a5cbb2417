//! Extraction options and configuration.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::external::ToolAvailability;
use super::readability::ReadabilityConfig;
use super::structured::StructuredVariant;

/// One tier of the extraction cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// In-process extraction through the PDF object model
    Structured(StructuredVariant),
    /// Byte-level stream scan with ToUnicode decoding
    RawStream,
    /// External text-extraction tool
    ExternalTool,
    /// Rasterize and OCR every page
    Ocr,
}

impl Strategy {
    /// The default cascade: every structured variant, raw streams, then the
    /// external tool. OCR is never part of it.
    pub fn default_cascade() -> Vec<Strategy> {
        StructuredVariant::ALL
            .iter()
            .map(|v| Strategy::Structured(*v))
            .chain([Strategy::RawStream, Strategy::ExternalTool])
            .collect()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Structured(v) => write!(f, "structured ({})", v.name()),
            Strategy::RawStream => f.write_str("raw stream"),
            Strategy::ExternalTool => f.write_str("external tool"),
            Strategy::Ocr => f.write_str("OCR"),
        }
    }
}

/// Options for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Page selection (which pages to extract)
    pub pages: PageSelection,

    /// Strategies in the order they are tried
    pub strategies: Vec<Strategy>,

    /// Acceptability thresholds
    pub readability: ReadabilityConfig,

    /// Installed external tools
    pub tools: ToolAvailability,

    /// Rasterization resolution for OCR
    pub ocr_dpi: u32,

    /// OCR language code
    pub ocr_language: String,

    /// Horizontal gap (points) treated as a column boundary
    pub column_gap: f32,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Replace the strategy cascade.
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Append the OCR tier to the cascade.
    pub fn with_ocr(mut self) -> Self {
        if !self.strategies.contains(&Strategy::Ocr) {
            self.strategies.push(Strategy::Ocr);
        }
        self
    }

    /// Set readability thresholds.
    pub fn with_readability(mut self, config: ReadabilityConfig) -> Self {
        self.readability = config;
        self
    }

    /// Require a financial term in accepted text.
    pub fn strict(mut self) -> Self {
        self.readability.require_financial_terms = true;
        self
    }

    /// Override the detected tool availability.
    pub fn with_tools(mut self, tools: ToolAvailability) -> Self {
        self.tools = tools;
        self
    }

    /// Set OCR resolution.
    pub fn with_ocr_dpi(mut self, dpi: u32) -> Self {
        self.ocr_dpi = dpi;
        self
    }

    /// Set OCR language.
    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    /// Set the column gap threshold.
    pub fn with_column_gap(mut self, gap: f32) -> Self {
        self.column_gap = gap;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pages: PageSelection::All,
            strategies: Strategy::default_cascade(),
            readability: ReadabilityConfig::default(),
            tools: ToolAvailability::detect(),
            ocr_dpi: 300,
            ocr_language: "eng".to_string(),
            column_gap: 15.0,
        }
    }
}

/// Page selection for extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// Extract all pages
    #[default]
    All,
    /// Extract a range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Extract specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Smallest inclusive range covering the selection, `None` for all pages.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        match self {
            PageSelection::All => None,
            PageSelection::Range(range) => Some((*range.start(), *range.end())),
            PageSelection::Pages(pages) => {
                Some((*pages.iter().min()?, *pages.iter().max()?))
            }
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidPageRange(s.to_string());

        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        let parse_page = |p: &str| -> Result<u32> {
            match p.trim().parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(invalid()),
            }
        };

        if let Some((start, end)) = s.split_once('-') {
            if !s.contains(',') {
                let (start, end) = (parse_page(start)?, parse_page(end)?);
                if start > end {
                    return Err(invalid());
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let (start, end) = (parse_page(start)?, parse_page(end)?);
                if start > end {
                    return Err(invalid());
                }
                pages.extend(start..=end);
            } else {
                pages.push(parse_page(part)?);
            }
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}
