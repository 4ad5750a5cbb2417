//! Positioned text fragments and row reconstruction.
//!
//! Fragments come from walking a page's content operations with a text
//! matrix. Two row builders turn them back into reading-order lines: one
//! clusters by baseline tolerance, the other buckets by rounded Y and marks
//! wide horizontal gaps as column boundaries.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::Result;

use super::backend::{PdfBackend, PageId, PdfValue};

/// A decoded text run and where it was drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline, origin bottom-left)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Effective font size in points
    pub font_size: f32,
}

/// Average glyph advance as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.5;

impl TextFragment {
    /// Create a fragment, estimating its width from the character count.
    pub fn new(text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        let text = text.into();
        let width = text.chars().count() as f32 * font_size * AVG_GLYPH_WIDTH;
        Self {
            text,
            x,
            y,
            width,
            font_size,
        }
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Collect the text fragments drawn on one page.
pub fn page_fragments<B: PdfBackend + ?Sized>(
    backend: &B,
    page_id: PageId,
) -> Result<Vec<TextFragment>> {
    let content = backend.page_content(page_id)?;
    let ops = backend.decode_content(&content)?;

    let mut fragments = Vec::new();
    let mut font_name: Vec<u8> = Vec::new();
    let mut font_size: f32 = 12.0;
    let mut leading: f32 = 0.0;
    let mut matrix = TextMatrix::default();
    let mut in_text = false;

    for op in ops {
        let nums: Vec<f32> = op.operands.iter().filter_map(PdfValue::as_number).collect();
        match op.operator.as_str() {
            "BT" => {
                in_text = true;
                matrix = TextMatrix::default();
            }
            "ET" => in_text = false,
            "Tf" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    font_name = name.clone();
                }
                if let Some(size) = op.operands.get(1).and_then(PdfValue::as_number) {
                    font_size = size;
                }
            }
            "TL" => leading = nums.first().copied().unwrap_or(leading),
            "Td" => {
                if nums.len() >= 2 {
                    matrix.translate(nums[0], nums[1]);
                }
            }
            "TD" => {
                if nums.len() >= 2 {
                    leading = -nums[1];
                    matrix.translate(nums[0], nums[1]);
                }
            }
            "Tm" => {
                if nums.len() >= 6 {
                    matrix.set(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                }
            }
            "T*" => matrix.next_line(leading),
            "Tj" | "TJ" | "'" | "\"" if in_text => {
                if op.operator == "'" || op.operator == "\"" {
                    matrix.next_line(leading);
                }
                let text = match (op.operator.as_str(), op.operands.as_slice()) {
                    ("TJ", [PdfValue::Array(items), ..]) => items
                        .iter()
                        .filter_map(|item| match item {
                            PdfValue::Str(bytes) => {
                                Some(backend.decode_text(page_id, &font_name, bytes))
                            }
                            _ => None,
                        })
                        .collect::<String>(),
                    ("\"", [_, _, PdfValue::Str(bytes), ..]) | (_, [PdfValue::Str(bytes), ..]) => {
                        backend.decode_text(page_id, &font_name, bytes)
                    }
                    _ => String::new(),
                };

                if !text.trim().is_empty() {
                    let (x, y) = matrix.position();
                    let fragment = TextFragment::new(text, x, y, font_size * matrix.scale());
                    // Advance so a following Tj on the same line lands after this one.
                    matrix.advance(fragment.width);
                    fragments.push(fragment);
                }
            }
            _ => {}
        }
    }

    Ok(fragments)
}

/// Row-based reconstruction.
///
/// Fragments whose baselines lie within a fraction of the font size of the
/// row's first fragment share a row; rows are read top-down and fragments
/// joined left-to-right with single spaces.
pub fn rows_by_tolerance(fragments: &[TextFragment], tolerance_factor: f32) -> Vec<String> {
    let mut sorted: Vec<&TextFragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut rows: Vec<Vec<&TextFragment>> = Vec::new();
    let mut row_y: Option<f32> = None;

    for fragment in sorted {
        let tolerance = (fragment.font_size * tolerance_factor).max(1.0);
        match row_y {
            Some(y) if (fragment.y - y).abs() <= tolerance => {
                if let Some(row) = rows.last_mut() {
                    row.push(fragment);
                }
            }
            _ => {
                row_y = Some(fragment.y);
                rows.push(vec![fragment]);
            }
        }
    }

    rows.into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
            row.iter()
                .map(|f| f.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Coordinate-based reconstruction.
///
/// Fragments are bucketed by rounded Y, buckets read by descending Y, and
/// fragments within a bucket by ascending X. A horizontal gap wider than
/// `gap_threshold` becomes a double space so column boundaries survive.
pub fn rows_by_coordinates(fragments: &[TextFragment], gap_threshold: f32) -> Vec<String> {
    let mut buckets: BTreeMap<i64, Vec<&TextFragment>> = BTreeMap::new();
    for fragment in fragments {
        buckets
            .entry(fragment.y.round() as i64)
            .or_default()
            .push(fragment);
    }

    buckets
        .into_iter()
        .rev()
        .map(|(_, mut row)| {
            row.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
            let mut line = String::new();
            let mut prev_right: Option<f32> = None;
            for fragment in row {
                let text = fragment.text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(right) = prev_right {
                    if fragment.x - right > gap_threshold {
                        line.push_str("  ");
                    } else {
                        line.push(' ');
                    }
                }
                line.push_str(text);
                prev_right = Some(fragment.right());
            }
            line
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Text matrix tracking for positioning.
#[derive(Debug, Clone, Copy)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32, // X translation
    f: f32, // Y translation
    line_x: f32,
    line_y: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
            line_x: 0.0,
            line_y: 0.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        *self = Self {
            a,
            b,
            c,
            d,
            e,
            f,
            line_x: e,
            line_y: f,
        };
    }

    /// Move relative to the start of the current line.
    fn translate(&mut self, tx: f32, ty: f32) {
        self.line_x += tx * self.a + ty * self.c;
        self.line_y += tx * self.b + ty * self.d;
        self.e = self.line_x;
        self.f = self.line_y;
    }

    fn next_line(&mut self, leading: f32) {
        let leading = if leading == 0.0 { 12.0 } else { leading };
        self.translate(0.0, -leading);
    }

    fn advance(&mut self, width: f32) {
        self.e += width * self.a;
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, x: f32, y: f32) -> TextFragment {
        TextFragment::new(text, x, y, 10.0)
    }

    #[test]
    fn test_width_estimate() {
        let f = frag("abcd", 0.0, 0.0);
        assert_eq!(f.width, 20.0);
        assert_eq!(f.right(), 20.0);
    }

    #[test]
    fn test_coordinate_rows_descending_y_ascending_x() {
        let fragments = vec![
            frag("25.99", 300.0, 680.2),
            frag("Date", 50.0, 700.0),
            frag("15/01/2024", 50.0, 679.8),
            frag("Balance", 300.0, 700.0),
        ];
        let rows = rows_by_coordinates(&fragments, 15.0);
        assert_eq!(rows, vec!["Date  Balance", "15/01/2024  25.99"]);
    }

    #[test]
    fn test_coordinate_rows_small_gap_single_space() {
        let fragments = vec![frag("CARD", 50.0, 500.0), frag("PAYMENT", 75.0, 500.0)];
        assert_eq!(rows_by_coordinates(&fragments, 15.0), vec!["CARD PAYMENT"]);
    }

    #[test]
    fn test_tolerance_rows_merge_jittered_baselines() {
        let fragments = vec![
            frag("TESCO", 120.0, 600.0),
            frag("12/01/2024", 50.0, 601.5),
            frag("next", 50.0, 580.0),
        ];
        let rows = rows_by_tolerance(&fragments, 0.4);
        assert_eq!(rows, vec!["12/01/2024 TESCO", "next"]);
    }

    #[test]
    fn test_matrix_translate_is_line_relative() {
        let mut m = TextMatrix::default();
        m.translate(50.0, 700.0);
        m.advance(30.0);
        m.translate(0.0, -14.0);
        assert_eq!(m.position(), (50.0, 686.0));
    }
}
