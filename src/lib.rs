//! # bankpdf
//!
//! Bank statement PDF extraction for Rust.
//!
//! Text is recovered with a cascade of extraction strategies (structured
//! PDF parsing, raw content streams decoded through embedded CMaps, an
//! external text tool and, on request, OCR), each scored for readability.
//! The winning text is parsed with a bank-specific grammar into
//! transactions and account metadata.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bankpdf::{parse_file, render};
//!
//! fn main() -> bankpdf::Result<()> {
//!     let statement = parse_file("statement.pdf")?;
//!     println!("{}", render::to_csv(&statement, true)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Supported layouts
//!
//! - **Metro Bank**: slash dates, paid out / paid in / balance columns
//! - **HSBC**: month-name dates, payment-type codes, balance-checked direction
//! - **Barclays**: tabular and arrow-separated business layouts

macro_rules! static_regex {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static regex::Regex {
            static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            RE.get_or_init(|| regex::Regex::new($re).unwrap())
        }
    };
}

pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod render;
pub mod statement;

pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use error::{Error, Result, UnreadableCause};
pub use extract::{
    ExtractOptions, Extraction, ExtractionPipeline, PageSelection, ReadabilityConfig, Strategy,
};
pub use model::{
    Bank, DebugLine, LineClass, Page, StatementInfo, Transaction, TransactionType,
};
pub use render::JsonFormat;
pub use statement::{BalancePriority, ParseOptions, StatementParser};

use std::path::{Path, PathBuf};

use rayon::prelude::*;

/// Parse a bank statement PDF, detecting the bank from its text.
///
/// # Example
///
/// ```no_run
/// let statement = bankpdf::parse_file("statement.pdf").unwrap();
/// println!("{} transactions", statement.transactions.len());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<StatementInfo> {
    Ok(BankPdf::new().parse(path)?.statement)
}

/// Parse a bank statement PDF held in memory.
pub fn parse_bytes(data: &[u8]) -> Result<StatementInfo> {
    Ok(BankPdf::new().parse_bytes(data)?.statement)
}

/// Parse already-extracted pages.
///
/// `bank` bypasses detection when given.
pub fn parse_pages(pages: &[Page], bank: Option<Bank>) -> Result<StatementInfo> {
    let options = ParseOptions {
        bank,
        ..ParseOptions::default()
    };
    Ok(StatementParser::new(options).parse(pages)?.statement)
}

/// Extract the text of a PDF without parsing it.
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(ExtractionPipeline::default().extract_file(path)?.text())
}

/// Parse many documents in parallel.
///
/// Results come back in input order. Documents share no state, so one
/// failure does not affect the others.
pub fn process_batch<P>(paths: &[P], parser: &BankPdf) -> Vec<(PathBuf, Result<BankPdfResult>)>
where
    P: AsRef<Path> + Sync,
{
    paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            (path.to_path_buf(), parser.parse(path))
        })
        .collect()
}

/// Builder for extracting and parsing statements.
///
/// # Example
///
/// ```no_run
/// use bankpdf::{BankPdf, Bank, JsonFormat};
///
/// let json = BankPdf::new()
///     .with_bank(Bank::Hsbc)
///     .strict_terms()
///     .parse("statement.pdf")?
///     .to_json(JsonFormat::Pretty)?;
/// # Ok::<(), bankpdf::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BankPdf {
    extract_options: ExtractOptions,
    parse_options: ParseOptions,
    ocr: bool,
}

impl BankPdf {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip bank detection and use this layout.
    pub fn with_bank(mut self, bank: Bank) -> Self {
        self.parse_options = self.parse_options.with_bank(bank);
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.extract_options = self.extract_options.with_pages(pages);
        self
    }

    /// Only accept extractions that mention a financial term.
    pub fn strict_terms(mut self) -> Self {
        self.extract_options = self.extract_options.strict();
        self
    }

    /// Go straight to OCR instead of the extraction cascade.
    pub fn with_ocr(mut self) -> Self {
        self.ocr = true;
        self
    }

    /// Record how every line was classified.
    pub fn with_debug(mut self) -> Self {
        self.parse_options = self.parse_options.with_debug(true);
        self
    }

    /// Replace the extraction options.
    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extract_options = options;
        self
    }

    /// Choose between balance movement and keywords for direction.
    pub fn with_balance_priority(mut self, priority: BalancePriority) -> Self {
        self.parse_options = self.parse_options.with_balance_priority(priority);
        self
    }

    /// Extract and parse a file.
    pub fn parse<P: AsRef<Path>>(&self, path: P) -> Result<BankPdfResult> {
        let path = path.as_ref();
        let pipeline = self.pipeline();
        let extraction = if self.ocr {
            pipeline.extract_ocr(path)?
        } else {
            pipeline.extract_file(path)?
        };
        self.finish(extraction)
    }

    /// Extract and parse an in-memory document.
    pub fn parse_bytes(&self, data: &[u8]) -> Result<BankPdfResult> {
        let pipeline = self.pipeline();
        let extraction = if self.ocr {
            let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
            std::io::Write::write_all(&mut file, data)?;
            pipeline.extract_ocr(file.path())?
        } else {
            pipeline.extract_bytes(data)?
        };
        self.finish(extraction)
    }

    /// Parse pages that were extracted elsewhere.
    pub fn parse_extraction(&self, extraction: Extraction) -> Result<BankPdfResult> {
        self.finish(extraction)
    }

    fn pipeline(&self) -> ExtractionPipeline {
        ExtractionPipeline::new(self.extract_options.clone())
    }

    fn finish(&self, extraction: Extraction) -> Result<BankPdfResult> {
        let output = StatementParser::new(self.parse_options.clone()).parse(&extraction.pages)?;
        let mut statement = output.statement;
        if extraction.best_effort {
            statement.warnings.insert(
                0,
                format!(
                    "Text extracted with {} did not meet the readability threshold (score {:.2})",
                    extraction.strategy, extraction.report.score
                ),
            );
        }
        log::info!(
            "{}: {} transactions via {}",
            statement.bank,
            statement.transactions.len(),
            extraction.strategy
        );
        Ok(BankPdfResult {
            extraction,
            statement,
            debug: output.debug,
        })
    }
}

/// A parsed statement together with the extraction it came from.
#[derive(Debug, Clone)]
pub struct BankPdfResult {
    /// The winning extraction
    pub extraction: Extraction,
    /// Parsed statement
    pub statement: StatementInfo,
    /// Per-line classification, when requested
    pub debug: Vec<DebugLine>,
}

impl BankPdfResult {
    /// Render the statement as CSV.
    pub fn to_csv(&self, include_metadata: bool) -> Result<String> {
        render::to_csv(&self.statement, include_metadata)
    }

    /// Render the statement as JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        render::to_json(&self.statement, format)
    }

    /// Text of the winning extraction.
    pub fn text(&self) -> String {
        self.extraction.text()
    }
}
