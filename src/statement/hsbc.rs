//! HSBC UK statements.
//!
//! `Date  Payment type and details  Paid out  Paid in  Balance` with
//! month-name dates. Rows on the same day after the first are printed
//! without a date and start with a payment-type code instead. Alternate
//! extraction paths deliver tab-delimited cells, and some deliver the
//! description and money columns as separate blocks; the engine's pending
//! queue re-associates those.

use crate::model::{Bank, TransactionType};

use super::grammar::{match_body, ParseContext, RowMatch, StatementGrammar};

static_regex!(
    code_re,
    r"^(VIS|DD|SO|BP|CR|DR|ATM|TFR|CHQ|OBP|PAY|\)\)\))(?:\s+|$)"
);

/// Grammar for HSBC statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct HsbcGrammar;

impl HsbcGrammar {
    /// Move a leading payment-type code from the description to `code`.
    fn strip_code(mut row: RowMatch) -> RowMatch {
        let found = code_re()
            .captures(&row.description)
            .map(|caps| (caps[1].to_string(), caps[0].len()));
        if let Some((code, len)) = found {
            row.description = row.description[len..].trim().to_string();
            row.code = Some(code);
        }
        row
    }
}

impl StatementGrammar for HsbcGrammar {
    fn bank(&self) -> Bank {
        Bank::Hsbc
    }

    fn match_dated(&self, body: &str) -> Option<RowMatch> {
        match_body(self.rules(), body).map(Self::strip_code)
    }

    fn match_undated(&self, line: &str, _ctx: &ParseContext) -> Option<RowMatch> {
        let first_cell = line.split('\t').find(|c| !c.trim().is_empty())?;
        if !code_re().is_match(first_cell.trim()) {
            return None;
        }
        match_body(self.rules(), line).map(Self::strip_code)
    }

    fn code_type(&self, code: &str) -> Option<TransactionType> {
        match code {
            "CR" => Some(TransactionType::Credit),
            "VIS" | "DD" | "SO" | "ATM" | "DR" | "CHQ" | ")))" => Some(TransactionType::Debit),
            _ => None,
        }
    }

    fn supports_balance_delta(&self) -> bool {
        true
    }
}
