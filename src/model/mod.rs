//! Data model shared by extraction and statement parsing.
//!
//! Extraction produces [`Page`]s; the statement engine turns them into a
//! [`StatementInfo`] holding [`Transaction`]s.

mod page;
mod statement;

pub use page::{combined_text, Page};
pub use statement::{
    Bank, DebugLine, LineClass, StatementInfo, Transaction, TransactionType,
};
