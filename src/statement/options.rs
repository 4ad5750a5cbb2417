//! Statement parsing options.

use serde::{Deserialize, Serialize};

use crate::model::Bank;

/// Options for the statement parser.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Explicit bank; skips detection when set
    pub bank: Option<Bank>,

    /// Which evidence wins when keywords and balances disagree
    pub balance_priority: BalancePriority,

    /// Record a classification for every source line
    pub collect_debug: bool,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bank hint.
    pub fn with_bank(mut self, bank: Bank) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Set the balance priority.
    pub fn with_balance_priority(mut self, priority: BalancePriority) -> Self {
        self.balance_priority = priority;
        self
    }

    /// Prefer description keywords over the running balance.
    pub fn keywords_first(mut self) -> Self {
        self.balance_priority = BalancePriority::Keywords;
        self
    }

    /// Enable or disable per-line diagnostics.
    pub fn with_debug(mut self, collect: bool) -> Self {
        self.collect_debug = collect;
        self
    }
}

/// Precedence between balance movement and description keywords.
///
/// Segregated paid-out / paid-in columns always decide on their own; this
/// only matters for single-amount rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalancePriority {
    /// Balance movement overrides keywords where the bank's layout supports it
    #[default]
    BalanceDelta,
    /// Keywords decide; balance movement only fills gaps
    Keywords,
}
