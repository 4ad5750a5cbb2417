//! External command-line collaborators.
//!
//! The pipeline only knows the traits here. The bundled implementations
//! shell out to poppler's `pdftotext` and `pdftoppm` and to `tesseract`.
//! Whether those binaries exist is probed once per process.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Page;

use super::structured::split_form_feeds;

/// Which external binaries are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolAvailability {
    pub pdftotext: bool,
    pub pdftoppm: bool,
    pub tesseract: bool,
}

impl ToolAvailability {
    /// Probe the system once and cache the answer for the process lifetime.
    pub fn detect() -> Self {
        static PROBED: OnceLock<ToolAvailability> = OnceLock::new();
        *PROBED.get_or_init(|| {
            let found = Self {
                pdftotext: probe("pdftotext", "-v"),
                pdftoppm: probe("pdftoppm", "-v"),
                tesseract: probe("tesseract", "--version"),
            };
            log::debug!("External tools: {:?}", found);
            found
        })
    }

    /// Nothing installed. Useful for tests and sandboxed callers.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the OCR tier can run.
    pub fn ocr_ready(&self) -> bool {
        self.pdftoppm && self.tesseract
    }
}

/// A binary counts as installed if it can be spawned at all; poppler tools
/// print their version to stderr and some exit non-zero for `-v`.
fn probe(program: &str, flag: &str) -> bool {
    Command::new(program).arg(flag).output().is_ok()
}

fn run(mut cmd: Command, tool: &str) -> Result<Vec<u8>> {
    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ToolUnavailable(tool.to_string())
        } else {
            Error::ExternalTool(format!("failed to run {}: {}", tool, e))
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ExternalTool(format!(
            "{} failed: {}",
            tool,
            stderr.trim()
        )));
    }
    Ok(output.stdout)
}

/// Converts a PDF file to plain text.
pub trait TextTool: Send + Sync {
    /// Tool name for logs and results.
    fn name(&self) -> &str;

    /// Extract text from `path`, optionally limited to an inclusive page range.
    fn extract(&self, path: &Path, pages: Option<(u32, u32)>) -> Result<Vec<Page>>;
}

/// Renders PDF pages to image files.
pub trait Rasterizer: Send + Sync {
    /// Render every page of `path` into `out_dir` at `dpi`; images in page order.
    fn rasterize(&self, path: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Recognizes text in one page image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<String>;
}

/// poppler `pdftotext`.
#[derive(Debug, Clone)]
pub struct Pdftotext {
    /// Keep the physical layout (`-layout`), which preserves columns.
    pub layout: bool,
}

impl Default for Pdftotext {
    fn default() -> Self {
        Self { layout: true }
    }
}

impl TextTool for Pdftotext {
    fn name(&self) -> &str {
        "pdftotext"
    }

    fn extract(&self, path: &Path, pages: Option<(u32, u32)>) -> Result<Vec<Page>> {
        let mut cmd = Command::new("pdftotext");
        if self.layout {
            cmd.arg("-layout");
        }
        if let Some((first, last)) = pages {
            cmd.arg("-f").arg(first.to_string());
            cmd.arg("-l").arg(last.to_string());
        }
        cmd.arg(path).arg("-");

        let stdout = run(cmd, "pdftotext")?;
        let text = String::from_utf8_lossy(&stdout);
        let offset = pages.map_or(0, |(first, _)| first.saturating_sub(1));
        Ok(split_form_feeds(&text)
            .into_iter()
            .map(|mut p| {
                p.number += offset;
                p
            })
            .collect())
    }
}

/// poppler `pdftoppm`, PNG output.
#[derive(Debug, Clone, Default)]
pub struct Pdftoppm;

impl Rasterizer for Pdftoppm {
    fn rasterize(&self, path: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut cmd = Command::new("pdftoppm");
        cmd.arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(path)
            .arg(out_dir.join("page"));
        run(cmd, "pdftoppm")?;

        let mut images: Vec<PathBuf> = std::fs::read_dir(out_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "png"))
            .collect();
        // pdftoppm zero-pads page numbers, so lexical order is page order.
        images.sort();

        if images.is_empty() {
            return Err(Error::ExternalTool("pdftoppm produced no images".to_string()));
        }
        Ok(images)
    }
}

/// `tesseract` writing recognized text to stdout.
#[derive(Debug, Clone)]
pub struct Tesseract {
    pub language: String,
    /// Page segmentation mode; 1 is automatic with orientation detection.
    pub psm: u8,
}

impl Default for Tesseract {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            psm: 1,
        }
    }
}

impl Tesseract {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

impl OcrEngine for Tesseract {
    fn recognize(&self, image: &Path) -> Result<String> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string());
        let stdout = run(cmd, "tesseract")?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Rasterize every page and OCR it, keeping pages that produced text.
///
/// A page the OCR engine fails on is logged and skipped.
pub fn run_ocr(
    path: &Path,
    rasterizer: &dyn Rasterizer,
    engine: &dyn OcrEngine,
    dpi: u32,
) -> Result<Vec<Page>> {
    let temp_dir = tempfile::tempdir()?;
    log::info!("Starting OCR for {} at {} dpi", path.display(), dpi);

    let images = rasterizer.rasterize(path, dpi, temp_dir.path())?;
    let mut pages = Vec::with_capacity(images.len());

    for (i, image) in images.iter().enumerate() {
        let number = i as u32 + 1;
        match engine.recognize(image) {
            Ok(text) => {
                let page = Page::from_text(number, &text);
                if !page.is_empty() {
                    pages.push(page);
                }
            }
            Err(e) => log::warn!("OCR failed on page {}: {}", number, e),
        }
    }

    log::info!("OCR complete: {} of {} pages with text", pages.len(), images.len());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeRasterizer(usize);

    impl Rasterizer for FakeRasterizer {
        fn rasterize(&self, _path: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
            assert_eq!(dpi, 300);
            Ok((1..=self.0)
                .map(|i| out_dir.join(format!("page-{}.png", i)))
                .collect())
        }
    }

    struct ScriptedOcr(Mutex<Vec<Result<String>>>);

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, _image: &Path) -> Result<String> {
            self.0.lock().unwrap().remove(0)
        }
    }

    #[test]
    fn test_run_ocr_collects_non_empty_pages() {
        let engine = ScriptedOcr(Mutex::new(vec![
            Ok("Statement\nBalance 10.00".to_string()),
            Ok("   \n".to_string()),
            Err(Error::ExternalTool("crash".to_string())),
            Ok("last page".to_string()),
        ]));
        let pages = run_ocr(Path::new("in.pdf"), &FakeRasterizer(4), &engine, 300).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].lines, vec!["Statement", "Balance 10.00"]);
        assert_eq!(pages[1].number, 4);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let cmd = Command::new("definitely-not-a-real-binary-bankpdf");
        assert!(matches!(
            run(cmd, "definitely-not-a-real-binary-bankpdf"),
            Err(Error::ToolUnavailable(_))
        ));
    }

    #[test]
    fn test_availability_is_cached() {
        assert_eq!(ToolAvailability::detect(), ToolAvailability::detect());
        assert!(!ToolAvailability::none().ocr_ready());
    }
}
