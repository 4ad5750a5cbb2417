//! Metro Bank personal statements.
//!
//! `Date  Description  Paid out  Paid in  Balance` with slash dates. Text
//! extraction usually collapses the empty money column, leaving a single
//! amount whose direction comes from keywords.

use crate::model::Bank;

use super::grammar::StatementGrammar;

/// Grammar for Metro Bank statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetroGrammar;

impl StatementGrammar for MetroGrammar {
    fn bank(&self) -> Bank {
        Bank::MetroBank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::grammar::{Amounts, ParseContext};
    use rust_decimal::Decimal;

    #[test]
    fn test_dated_row() {
        let row = MetroGrammar
            .match_line("15/01/2024 CARD PAYMENT TESCO 25.99 1,234.56", &ParseContext::default())
            .unwrap();
        assert_eq!(row.date.as_deref(), Some("15/01/2024"));
        assert_eq!(row.description, "CARD PAYMENT TESCO");
        assert_eq!(row.amounts, Amounts::Single(Decimal::new(2599, 2)));
        assert_eq!(row.balance, Some(Decimal::new(123456, 2)));
    }

    #[test]
    fn test_undated_line_is_not_a_row() {
        assert!(MetroGrammar
            .match_line("TESCO STORES 25.99 1,234.56", &ParseContext::default())
            .is_none());
        assert!(!MetroGrammar.supports_balance_delta());
    }
}
