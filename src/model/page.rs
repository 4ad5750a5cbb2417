//! Page-level types.

use serde::{Deserialize, Serialize};

/// One page of extracted text as an ordered sequence of lines.
///
/// Line order follows reading order: top to bottom, left to right, as far
/// as the producing strategy could reconstruct it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Trimmed, non-empty lines
    pub lines: Vec<String>,
}

impl Page {
    /// Create an empty page.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            lines: Vec::new(),
        }
    }

    /// Build a page from a block of text, one line per newline.
    ///
    /// Lines are trimmed and blank lines are dropped.
    pub fn from_text(number: u32, text: &str) -> Self {
        Self {
            number,
            lines: text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Append a line, ignoring blanks.
    pub fn push_line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref().trim();
        if !line.is_empty() {
            self.lines.push(line.to_string());
        }
    }

    /// Lines joined by newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Number of non-whitespace characters on the page.
    pub fn char_count(&self) -> usize {
        self.lines
            .iter()
            .flat_map(|l| l.chars())
            .filter(|c| !c.is_whitespace())
            .count()
    }

    /// Check if the page has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Concatenate the text of every page, separated by blank lines.
pub fn combined_text(pages: &[Page]) -> String {
    pages
        .iter()
        .map(Page::text)
        .collect::<Vec<_>>()
        .join("\n\n")
}
