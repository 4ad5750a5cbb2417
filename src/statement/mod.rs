//! Statement parsing.
//!
//! Extracted pages go in, a [`StatementInfo`](crate::model::StatementInfo)
//! comes out. The bank is taken from [`ParseOptions::bank`] or detected
//! from the text, and selects one of the [`StatementGrammar`]s below.

pub mod bank;
pub mod barclays;
pub mod engine;
pub mod grammar;
pub mod hsbc;
pub mod metro;
pub mod options;
pub mod primitives;

pub use bank::{detect_bank, detect_bank_in_pages, grammar_for, resolve_bank};
pub use barclays::BarclaysGrammar;
pub use engine::{ParseOutput, StatementParser};
pub use grammar::{Amounts, LineGrammar, ParseContext, RowMatch, RowShape, StatementGrammar};
pub use hsbc::HsbcGrammar;
pub use metro::MetroGrammar;
pub use options::{BalancePriority, ParseOptions};
pub use primitives::parse_amount;
