//! Integration tests for the extraction cascade.

mod common;

use std::path::{Path, PathBuf};

use bankpdf::error::{Result, UnreadableCause};
use bankpdf::extract::{OcrEngine, Rasterizer, TextTool, ToolAvailability};
use bankpdf::{Bank, BankPdf, Error, ExtractOptions, ExtractionPipeline, Page, Strategy};

use common::{PdfBuilder, METRO_LINES};

/// Text tool that always returns the same text.
struct CannedTool(&'static str);

impl TextTool for CannedTool {
    fn name(&self) -> &str {
        "canned"
    }

    fn extract(&self, path: &Path, _pages: Option<(u32, u32)>) -> Result<Vec<Page>> {
        assert!(path.exists());
        Ok(vec![Page::from_text(1, self.0)])
    }
}

struct TwoPages;

impl Rasterizer for TwoPages {
    fn rasterize(&self, _path: &Path, _dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(vec![out_dir.join("page-1.png"), out_dir.join("page-2.png")])
    }
}

struct BlankSecondPage;

impl OcrEngine for BlankSecondPage {
    fn recognize(&self, image: &Path) -> Result<String> {
        if image.ends_with("page-1.png") {
            Ok("HSBC UK Statement of account\n17 Jan 24 CR SALARY 2,500.00 3,689.56".to_string())
        } else {
            Ok("   \n".to_string())
        }
    }
}

const CLEAN_TEXT: &str = "Metro Bank PLC Statement\n\
Date Description Paid out Paid in Balance\n\
15/01/2024 CARD PAYMENT TESCO 25.99 1,234.56";

fn no_tools() -> ExtractOptions {
    ExtractOptions::new().with_tools(ToolAvailability::none())
}

fn garbage_pdf() -> Vec<u8> {
    PdfBuilder::new()
        .page("BT /F1 10 Tf 50 700 Td <0102030405060708> Tj ET")
        .build()
}

#[test]
fn test_raw_stream_reads_plain_and_flate_streams() {
    let pipeline = ExtractionPipeline::new(no_tools().with_strategies(vec![Strategy::RawStream]));

    for builder in [
        PdfBuilder::new().text_page(METRO_LINES),
        PdfBuilder::new().text_page(METRO_LINES).compressed(),
    ] {
        let extraction = pipeline.extract_bytes(&builder.build()).unwrap();
        assert_eq!(extraction.strategy, Strategy::RawStream);
        assert!(!extraction.best_effort);
        assert_eq!(extraction.pages.len(), 1);
        assert_eq!(extraction.pages[0].lines, METRO_LINES);
    }
}

#[test]
fn test_raw_stream_one_page_per_content_stream() {
    let pdf = PdfBuilder::new()
        .text_page(&METRO_LINES[..4])
        .text_page(&METRO_LINES[4..])
        .build();
    let pipeline = ExtractionPipeline::new(no_tools().with_strategies(vec![Strategy::RawStream]));

    let extraction = pipeline.extract_bytes(&pdf).unwrap();
    assert_eq!(extraction.pages.len(), 2);
    assert_eq!(extraction.pages[1].number, 2);
    assert_eq!(extraction.pages[1].lines[0], METRO_LINES[4]);
}

#[test]
fn test_default_cascade_accepts_text_layer() {
    let pdf = PdfBuilder::new().text_page(METRO_LINES).compressed().build();
    let extraction = ExtractionPipeline::new(no_tools()).extract_bytes(&pdf).unwrap();

    assert!(!extraction.best_effort);
    assert!(extraction.report.score > 0.9);
    assert!(extraction.text().contains("CARD PAYMENT TESCO"));
}

#[test]
fn test_extract_file_matches_extract_bytes() {
    let pdf = PdfBuilder::new().text_page(METRO_LINES).build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statement.pdf");
    std::fs::write(&path, &pdf).unwrap();

    let pipeline = ExtractionPipeline::new(no_tools().with_strategies(vec![Strategy::RawStream]));
    let from_file = pipeline.extract_file(&path).unwrap();
    let from_bytes = pipeline.extract_bytes(&pdf).unwrap();
    assert_eq!(from_file.pages, from_bytes.pages);
}

#[test]
fn test_external_tool_rescues_unreadable_document() {
    let pipeline = ExtractionPipeline::new(no_tools()).with_text_tool(CannedTool(CLEAN_TEXT));

    let extraction = pipeline.extract_bytes(&garbage_pdf()).unwrap();
    assert_eq!(extraction.strategy, Strategy::ExternalTool);
    assert!(!extraction.best_effort);

    let result = BankPdf::new().parse_extraction(extraction).unwrap();
    assert_eq!(result.statement.bank, Bank::MetroBank);
    assert_eq!(result.statement.transactions.len(), 1);
    assert!(result.statement.warnings.is_empty());
}

#[test]
fn test_unreadable_document_without_tools() {
    let result = ExtractionPipeline::new(no_tools()).extract_bytes(&garbage_pdf());
    assert!(matches!(result, Err(Error::UnreadableText(_))));
}

#[test]
fn test_scanned_document_points_at_ocr() {
    let pdf = b"%PDF-1.4\n1 0 obj << /Type /XObject /Subtype /Image /Width 1 /Height 1 /Length 1 >>\nstream\n\xff\nendstream\nendobj\n%%EOF";
    let pipeline = ExtractionPipeline::new(
        no_tools().with_strategies(vec![Strategy::RawStream, Strategy::ExternalTool]),
    );

    match pipeline.extract_bytes(pdf) {
        Err(Error::UnreadableText(cause)) => assert_eq!(cause, UnreadableCause::NoTextLayer),
        other => panic!("expected unreadable text, got {:?}", other),
    }
}

#[test]
fn test_strict_mode_rejects_text_without_financial_terms() {
    let lines = [
        "Lorem ipsum dolor sit amet consectetur adipiscing elit",
        "sed do eiusmod tempor incididunt ut labore et dolore magna",
    ];
    let pdf = PdfBuilder::new().text_page(&lines).build();
    let raw = vec![Strategy::RawStream];

    let relaxed = ExtractionPipeline::new(no_tools().with_strategies(raw.clone()));
    assert!(!relaxed.extract_bytes(&pdf).unwrap().best_effort);

    let strict = ExtractionPipeline::new(no_tools().with_strategies(raw).strict());
    let extraction = strict.extract_bytes(&pdf).unwrap();
    assert!(extraction.best_effort);
    assert!(!extraction.report.has_financial_terms);
}

#[test]
fn test_ocr_tier_keeps_pages_with_text() {
    let pdf = PdfBuilder::new().page("q Q").build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, &pdf).unwrap();

    let pipeline = ExtractionPipeline::new(no_tools()).with_ocr(TwoPages, BlankSecondPage);
    let extraction = pipeline.extract_ocr(&path).unwrap();

    assert_eq!(extraction.strategy, Strategy::Ocr);
    assert_eq!(extraction.pages.len(), 1);
    assert!(extraction.text().contains("SALARY"));
}

#[test]
fn test_ocr_without_engine_is_unavailable() {
    let pdf = PdfBuilder::new().page("q Q").build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, &pdf).unwrap();

    let pipeline = ExtractionPipeline::new(no_tools());
    assert!(matches!(
        pipeline.extract_ocr(&path),
        Err(Error::ToolUnavailable(_))
    ));
}
