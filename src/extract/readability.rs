//! Readability scoring for extracted text.
//!
//! Decides whether a strategy's output is good enough to stop the cascade.
//! Text is readable when it is long enough and mostly made of characters a
//! bank statement is written in; the strict variant also asks for at least
//! one word a statement is bound to contain.

use serde::{Deserialize, Serialize};

use crate::model::Page;

/// Words every real statement contains at least one of.
pub const FINANCIAL_TERMS: &[&str] = &[
    "balance",
    "account",
    "statement",
    "transaction",
    "sort code",
    "brought forward",
    "carried forward",
    "paid out",
    "paid in",
    "money out",
    "money in",
];

/// Thresholds for the acceptability predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityConfig {
    /// Non-whitespace characters required across all pages
    pub min_chars: usize,
    /// Readable fraction required for acceptance
    pub min_ratio: f64,
    /// Readable fraction required for a best-effort pick
    pub relaxed_ratio: f64,
    /// Also require a financial term
    pub require_financial_terms: bool,
}

impl Default for ReadabilityConfig {
    fn default() -> Self {
        Self {
            min_chars: 50,
            min_ratio: 0.6,
            relaxed_ratio: 0.3,
            require_financial_terms: false,
        }
    }
}

impl ReadabilityConfig {
    /// Default thresholds plus the financial-term guard.
    pub fn strict() -> Self {
        Self {
            require_financial_terms: true,
            ..Self::default()
        }
    }
}

/// Measured readability of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadabilityReport {
    /// All characters, whitespace included
    pub total_chars: usize,
    /// Characters that are not whitespace
    pub non_whitespace_chars: usize,
    /// Characters counted as readable
    pub readable_chars: usize,
    /// `readable_chars / total_chars`, 0 for empty text
    pub score: f64,
    pub has_financial_terms: bool,
}

impl ReadabilityReport {
    /// Whether the extraction passes the full predicate.
    pub fn is_acceptable(&self, config: &ReadabilityConfig) -> bool {
        self.non_whitespace_chars > config.min_chars
            && self.score > config.min_ratio
            && (!config.require_financial_terms || self.has_financial_terms)
    }

    /// Whether the extraction may be returned as a best-effort result.
    pub fn is_salvageable(&self, config: &ReadabilityConfig) -> bool {
        self.non_whitespace_chars > 0 && self.score >= config.relaxed_ratio
    }
}

/// Characters a statement is plausibly written in.
pub fn is_readable_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_ascii_punctuation()
        || c.is_whitespace()
        || matches!(c, '£' | '€' | '$' | '¥')
}

/// Score a sequence of pages.
pub fn score(pages: &[Page]) -> ReadabilityReport {
    let mut report = ReadabilityReport::default();
    let mut lowered = String::new();

    // Line breaks are not characters of the page and are not scored.
    for (i, line) in pages.iter().flat_map(|p| p.lines.iter()).enumerate() {
        if i > 0 {
            lowered.push('\n');
        }
        for c in line.chars() {
            report.total_chars += 1;
            if !c.is_whitespace() {
                report.non_whitespace_chars += 1;
            }
            if is_readable_char(c) {
                report.readable_chars += 1;
            }
        }
        lowered.push_str(&line.to_lowercase());
    }

    report.score = if report.total_chars == 0 {
        0.0
    } else {
        report.readable_chars as f64 / report.total_chars as f64
    };
    report.has_financial_terms = FINANCIAL_TERMS.iter().any(|t| lowered.contains(t));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> Vec<Page> {
        vec![Page::from_text(1, text)]
    }

    const CLEAN: &str = "Statement of account\nDate Description Paid out Paid in Balance\n\
                         15/01/2024 CARD PAYMENT TESCO 25.99 1,234.56";

    #[test]
    fn test_clean_text_is_acceptable() {
        let report = score(&page(CLEAN));
        assert!(report.score > 0.99);
        assert!(report.has_financial_terms);
        assert!(report.is_acceptable(&ReadabilityConfig::strict()));
    }

    #[test]
    fn test_short_text_rejected() {
        let report = score(&page("Balance 10.00"));
        assert!(!report.is_acceptable(&ReadabilityConfig::default()));
        assert!(report.is_salvageable(&ReadabilityConfig::default()));
    }

    #[test]
    fn test_printable_garbage_fails_strict_only() {
        let garbage = "Xq7 Zr9 Kp2 Lm4 Wv8 Hj3 Nb6 Tc1 Yd5 Fg0 Qs7 Ue2 Io4 Pa9 Rk3 Bz1 Cx8 Dv6";
        let report = score(&page(garbage));
        assert!(report.is_acceptable(&ReadabilityConfig::default()));
        assert!(!report.is_acceptable(&ReadabilityConfig::strict()));
    }

    #[test]
    fn test_symbol_soup_is_unreadable() {
        let soup: String = std::iter::repeat("ÐÞßøæ¶§¤").take(20).collect();
        let report = score(&page(&soup));
        assert!(report.score < 0.3);
        assert!(!report.is_salvageable(&ReadabilityConfig::default()));
    }

    #[test]
    fn test_appending_garbage_never_raises_score() {
        let mut text = String::from("Balance ÐÞß 12.00 øæ¶");
        let mut last = score(&page(&text)).score;
        for _ in 0..10 {
            text.push('\u{1}');
            text.push('Þ');
            let next = score(&page(&text)).score;
            assert!(next <= last);
            last = next;
        }
    }

    #[test]
    fn test_garbage_lines_never_raise_score() {
        let mut lines = vec!["ÞÞÞÞÞÞ".to_string()];
        let mut last = score(&[Page { number: 1, lines: lines.clone() }]).score;
        assert_eq!(last, 0.0);

        let mut pages = vec![Page {
            number: 1,
            lines: vec!["Balance ÐÞß 12.00 øæ¶".to_string()],
        }];
        let mut mixed = score(&pages).score;

        for garbage in ["\u{1}", "¤¤", "\u{7}\u{8}", "ÐÞ"] {
            lines.push(garbage.to_string());
            let next = score(&[Page { number: 1, lines: lines.clone() }]).score;
            assert!(next <= last, "{} > {}", next, last);
            last = next;

            pages.push(Page {
                number: pages.len() as u32 + 1,
                lines: vec![garbage.to_string()],
            });
            let next = score(&pages).score;
            assert!(next <= mixed, "{} > {}", next, mixed);
            mixed = next;
        }
    }

    #[test]
    fn test_line_breaks_do_not_join_terms() {
        let report = score(&page("bal\nance"));
        assert!(!report.has_financial_terms);
        assert_eq!(report.total_chars, 7);
    }

    #[test]
    fn test_empty_scores_zero() {
        let report = score(&[]);
        assert_eq!(report.score, 0.0);
        assert!(!report.is_salvageable(&ReadabilityConfig::default()));
    }
}
