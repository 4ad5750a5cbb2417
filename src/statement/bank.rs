//! Bank detection and grammar dispatch.

use crate::error::{Error, Result};
use crate::model::{combined_text, Bank, Page};

use super::barclays::BarclaysGrammar;
use super::grammar::StatementGrammar;
use super::hsbc::HsbcGrammar;
use super::metro::MetroGrammar;

/// Identifying substrings per bank, lower case.
const SIGNATURES: &[(Bank, &[&str])] = &[
    (Bank::MetroBank, &["metro bank", "metrobankonline"]),
    (Bank::Hsbc, &["hsbc"]),
    (Bank::Barclays, &["barclays"]),
];

/// Detect the bank from statement text.
///
/// Every signature occurrence counts, so a bank named once in a
/// description loses to the one printed on every page. Ties go to the
/// earlier bank in [`Bank::ALL`].
pub fn detect_bank(text: &str) -> Option<Bank> {
    let lower = text.to_lowercase();
    let mut best: Option<(Bank, usize)> = None;

    for (bank, needles) in SIGNATURES {
        let hits: usize = needles.iter().map(|n| lower.matches(n).count()).sum();
        log::trace!("{}: {} signature hits", bank, hits);
        if hits > 0 && best.map_or(true, |(_, most)| hits > most) {
            best = Some((*bank, hits));
        }
    }

    best.map(|(bank, _)| bank)
}

/// Detect the bank across all pages.
pub fn detect_bank_in_pages(pages: &[Page]) -> Option<Bank> {
    detect_bank(&combined_text(pages))
}

/// Use the explicit hint, or detect.
pub fn resolve_bank(hint: Option<Bank>, pages: &[Page]) -> Result<Bank> {
    if let Some(bank) = hint {
        log::debug!("Using bank hint: {}", bank);
        return Ok(bank);
    }

    let bank = detect_bank_in_pages(pages).ok_or(Error::UnrecognizedBank)?;
    log::info!("Detected bank: {}", bank);
    Ok(bank)
}

/// The grammar that reads a bank's statements.
pub fn grammar_for(bank: Bank) -> &'static dyn StatementGrammar {
    match bank {
        Bank::MetroBank => &MetroGrammar,
        Bank::Hsbc => &HsbcGrammar,
        Bank::Barclays => &BarclaysGrammar,
    }
}
