//! The extraction cascade.
//!
//! Strategies run one after another in configured order and the first
//! acceptable result wins. When none is acceptable the most readable
//! salvageable result is returned; failing that, the error names the likely
//! cause so the caller can reach for OCR.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::detect::{self, PdfFormat};
use crate::error::{Error, Result};
use crate::model::Page;

use super::external::{run_ocr, OcrEngine, Pdftoppm, Pdftotext, Rasterizer, Tesseract, TextTool};
use super::options::{ExtractOptions, Strategy};
use super::raw;
use super::readability::{score, ReadabilityReport};
use super::structured::StructuredExtractor;

/// The pages produced by one strategy and how readable they are.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub strategy: Strategy,
    pub pages: Vec<Page>,
    pub report: ReadabilityReport,
    /// Returned although it failed the acceptability predicate
    pub best_effort: bool,
}

impl Extraction {
    fn new(strategy: Strategy, pages: Vec<Page>) -> Self {
        let report = score(&pages);
        Self {
            strategy,
            pages,
            report,
            best_effort: false,
        }
    }

    /// All page text joined.
    pub fn text(&self) -> String {
        crate::model::combined_text(&self.pages)
    }
}

/// Where the external tiers read the document from.
enum Source<'a> {
    Path(&'a Path),
    Bytes,
}

/// Runs the strategy cascade over one document.
pub struct ExtractionPipeline {
    options: ExtractOptions,
    text_tool: Option<Box<dyn TextTool>>,
    rasterizer: Option<Box<dyn Rasterizer>>,
    ocr_engine: Option<Box<dyn OcrEngine>>,
}

impl ExtractionPipeline {
    /// Create a pipeline; external tools are wired up only if installed.
    pub fn new(options: ExtractOptions) -> Self {
        let tools = options.tools;
        let text_tool: Option<Box<dyn TextTool>> = if tools.pdftotext {
            Some(Box::new(Pdftotext::default()))
        } else {
            None
        };
        let rasterizer: Option<Box<dyn Rasterizer>> = if tools.pdftoppm {
            Some(Box::new(Pdftoppm))
        } else {
            None
        };
        let ocr_engine: Option<Box<dyn OcrEngine>> = if tools.tesseract {
            Some(Box::new(
                Tesseract::default().with_language(options.ocr_language.clone()),
            ))
        } else {
            None
        };

        Self {
            options,
            text_tool,
            rasterizer,
            ocr_engine,
        }
    }

    /// Use a specific text-extraction tool.
    pub fn with_text_tool(mut self, tool: impl TextTool + 'static) -> Self {
        self.text_tool = Some(Box::new(tool));
        self
    }

    /// Use a specific rasterizer and OCR engine.
    pub fn with_ocr(
        mut self,
        rasterizer: impl Rasterizer + 'static,
        engine: impl OcrEngine + 'static,
    ) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self.ocr_engine = Some(Box::new(engine));
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract text from a file on disk.
    pub fn extract_file<P: AsRef<Path>>(&self, path: P) -> Result<Extraction> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        self.run(&data, Source::Path(path))
    }

    /// Extract text from an in-memory document.
    ///
    /// External tiers get a temporary copy of the bytes.
    pub fn extract_bytes(&self, data: &[u8]) -> Result<Extraction> {
        self.run(data, Source::Bytes)
    }

    /// Run only the OCR tier.
    pub fn extract_ocr<P: AsRef<Path>>(&self, path: P) -> Result<Extraction> {
        let pages = self.ocr(path.as_ref())?;
        let mut extraction = Extraction::new(Strategy::Ocr, pages);
        extraction.best_effort = !extraction.report.is_acceptable(&self.options.readability);
        Ok(extraction)
    }

    fn run(&self, data: &[u8], source: Source<'_>) -> Result<Extraction> {
        let format = detect::inspect(data)?;
        let config = &self.options.readability;

        let mut candidates: Vec<Extraction> = Vec::new();
        let mut structural: Option<Error> = None;
        let mut loaded: Option<Result<StructuredExtractor<'_>>> = None;

        for &strategy in &self.options.strategies {
            let attempt = match strategy {
                Strategy::Structured(variant) => {
                    let extractor = loaded
                        .get_or_insert_with(|| StructuredExtractor::load(data, self.options.column_gap));
                    match extractor {
                        Ok(extractor) => extractor.extract(variant, &self.options.pages),
                        Err(e) => {
                            if structural.is_none() {
                                structural = Some(Error::PdfParse(e.to_string()));
                            }
                            continue;
                        }
                    }
                }
                Strategy::RawStream => Ok(raw::extract(data)),
                Strategy::ExternalTool => self.external(data, &source),
                Strategy::Ocr => self.with_path(data, &source, |path| self.ocr(path)),
            };

            match attempt {
                Ok(pages) => {
                    let extraction = Extraction::new(strategy, pages);
                    log::debug!(
                        "{}: {} pages, {} chars, score {:.2}",
                        strategy,
                        extraction.pages.len(),
                        extraction.report.non_whitespace_chars,
                        extraction.report.score
                    );
                    if extraction.report.is_acceptable(config) {
                        log::info!("Extracted text with {}", strategy);
                        return Ok(extraction);
                    }
                    candidates.push(extraction);
                }
                Err(Error::ToolUnavailable(tool)) => {
                    log::debug!("{}: {} not available, skipping", strategy, tool);
                }
                Err(e) => {
                    log::debug!("{} failed: {}", strategy, e);
                    if e.is_structural() && structural.is_none() {
                        structural = Some(e);
                    }
                }
            }
        }

        self.best_effort(candidates, structural, &format)
    }

    fn best_effort(
        &self,
        candidates: Vec<Extraction>,
        structural: Option<Error>,
        format: &PdfFormat,
    ) -> Result<Extraction> {
        let config = &self.options.readability;
        let any_text = candidates.iter().any(|c| c.report.non_whitespace_chars > 0);

        let best = candidates
            .into_iter()
            .filter(|c| c.report.is_salvageable(config))
            .max_by(|a, b| {
                a.report
                    .score
                    .partial_cmp(&b.report.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.report.non_whitespace_chars.cmp(&b.report.non_whitespace_chars))
            });

        if let Some(mut extraction) = best {
            log::warn!(
                "No strategy met the readability threshold; using {} (score {:.2})",
                extraction.strategy,
                extraction.report.score
            );
            extraction.best_effort = true;
            return Ok(extraction);
        }

        if !any_text {
            if let Some(err) = structural {
                return Err(err);
            }
        }

        Err(Error::UnreadableText(format.likely_cause(any_text)))
    }

    fn external(&self, data: &[u8], source: &Source<'_>) -> Result<Vec<Page>> {
        let tool = self
            .text_tool
            .as_ref()
            .ok_or_else(|| Error::ToolUnavailable("pdftotext".to_string()))?;
        let bounds = self.options.pages.bounds();
        let pages = self.with_path(data, source, |path| tool.extract(path, bounds))?;
        Ok(pages
            .into_iter()
            .filter(|p| self.options.pages.includes(p.number))
            .collect())
    }

    fn ocr(&self, path: &Path) -> Result<Vec<Page>> {
        let rasterizer = self
            .rasterizer
            .as_ref()
            .ok_or_else(|| Error::ToolUnavailable("pdftoppm".to_string()))?;
        let engine = self
            .ocr_engine
            .as_ref()
            .ok_or_else(|| Error::ToolUnavailable("tesseract".to_string()))?;
        run_ocr(path, rasterizer.as_ref(), engine.as_ref(), self.options.ocr_dpi)
    }

    /// Call `f` with a filesystem path for the document.
    fn with_path<T>(
        &self,
        data: &[u8],
        source: &Source<'_>,
        f: impl FnOnce(&Path) -> Result<T>,
    ) -> Result<T> {
        match source {
            Source::Path(path) => f(path),
            Source::Bytes => {
                let mut file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
                file.write_all(data)?;
                file.flush()?;
                f(file.path())
            }
        }
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}
