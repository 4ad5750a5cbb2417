//! Barclays statements.
//!
//! Two layouts share this grammar. Personal statements are the usual
//! `Date  Description  Money out  Money in  Balance` table. Business
//! statements separate columns with an arrow glyph and print short dates
//! (`12 Jan`) that take their year from the last full date seen.

use std::borrow::Cow;

use crate::model::Bank;

use super::grammar::{cells_to_row, money_rules, ParseContext, RowMatch, RowShape, StatementGrammar};
use super::primitives::DateMatch;

const ARROWS: &[char] = &['→', '►', '▶', '➔', '➜'];

/// Grammar for Barclays statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarclaysGrammar;

impl StatementGrammar for BarclaysGrammar {
    fn bank(&self) -> Bank {
        Bank::Barclays
    }

    fn prepare<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if line.contains(ARROWS) {
            Cow::Owned(line.replace(ARROWS, "\t"))
        } else {
            Cow::Borrowed(line)
        }
    }

    /// Same-day rows repeat only description, amount and balance.
    fn match_undated(&self, line: &str, _ctx: &ParseContext) -> Option<RowMatch> {
        let row = if line.contains('\t') {
            cells_to_row(line)?
        } else {
            money_rules()
                .iter()
                .filter(|r| r.shape == RowShape::AmountBalance)
                .find_map(|r| r.apply(line))?
        };

        let complete = !row.description.is_empty() && !row.amounts.is_none() && row.balance.is_some();
        complete.then_some(row)
    }

    fn complete_date(&self, date: &DateMatch<'_>, ctx: &ParseContext) -> String {
        match (&ctx.last_year, date.has_year) {
            (Some(year), false) => format!("{} {}", date.text, year),
            _ => date.text.to_string(),
        }
    }
}
