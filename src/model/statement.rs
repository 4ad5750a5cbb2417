//! Statement-level types: banks, transactions, and parse results.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A supported statement layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bank {
    /// Metro Bank (slash dates, paid out / paid in columns)
    #[serde(rename = "metro")]
    MetroBank,
    /// HSBC UK (month-name dates, payment-type codes)
    Hsbc,
    /// Barclays (personal tabular form and business arrow form)
    Barclays,
}

impl Bank {
    /// All supported banks, in detection priority order.
    pub const ALL: [Bank; 3] = [Bank::MetroBank, Bank::Hsbc, Bank::Barclays];

    /// Short tag used on the command line and in output.
    pub fn tag(self) -> &'static str {
        match self {
            Bank::MetroBank => "metro",
            Bank::Hsbc => "hsbc",
            Bank::Barclays => "barclays",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Bank::MetroBank => "Metro Bank",
            Bank::Hsbc => "HSBC",
            Bank::Barclays => "Barclays",
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Bank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "metro" | "metrobank" => Ok(Bank::MetroBank),
            "hsbc" | "hsbcuk" => Ok(Bank::Hsbc),
            "barclays" | "barclaysbank" => Ok(Bank::Barclays),
            _ => Err(Error::UnsupportedBank(s.to_string())),
        }
    }
}

/// Direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Money out
    Debit,
    /// Money in
    Credit,
}

impl TransactionType {
    /// Upper-case label used in CSV output.
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Debit => "DEBIT",
            TransactionType::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single statement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Date exactly as printed on the statement
    pub date: String,

    /// Description, with wrapped lines joined by single spaces
    pub description: String,

    /// Debit or credit
    #[serde(rename = "type")]
    pub kind: TransactionType,

    /// Always non-negative; the sign lives in `kind`
    pub amount: Decimal,

    /// Running balance after this row, when printed
    pub balance: Option<Decimal>,
}

impl Transaction {
    /// Create a transaction. The amount is stored as its absolute value.
    pub fn new(
        date: impl Into<String>,
        description: impl Into<String>,
        kind: TransactionType,
        amount: Decimal,
    ) -> Self {
        Self {
            date: date.into(),
            description: description.into(),
            kind,
            amount: amount.abs(),
            balance: None,
        }
    }

    /// Set the running balance.
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Amount with the direction applied (debits negative).
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionType::Debit => -self.amount,
            TransactionType::Credit => self.amount,
        }
    }

    /// Append a wrapped description line, separated by a single space.
    pub fn append_description(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }
}

/// Everything recovered from one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementInfo {
    /// Which layout produced the rows
    pub bank: Bank,

    /// Account holder name, when printed before the table
    pub account_holder: Option<String>,

    /// Account number
    pub account_number: Option<String>,

    /// Sort code, formatted `NN-NN-NN`
    pub sort_code: Option<String>,

    /// Statement period as printed
    pub statement_period: Option<String>,

    /// Balance brought forward
    pub opening_balance: Option<Decimal>,

    /// Balance carried forward
    pub closing_balance: Option<Decimal>,

    /// Rows in statement order
    pub transactions: Vec<Transaction>,

    /// Non-fatal notes produced while parsing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StatementInfo {
    /// Create an empty result for a bank.
    pub fn new(bank: Bank) -> Self {
        Self {
            bank,
            account_holder: None,
            account_number: None,
            sort_code: None,
            statement_period: None,
            opening_balance: None,
            closing_balance: None,
            transactions: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Sum of debit amounts.
    pub fn total_debits(&self) -> Decimal {
        self.total_of(TransactionType::Debit)
    }

    /// Sum of credit amounts.
    pub fn total_credits(&self) -> Decimal {
        self.total_of(TransactionType::Credit)
    }

    /// Credits minus debits.
    pub fn net_change(&self) -> Decimal {
        self.total_credits() - self.total_debits()
    }

    /// Whether opening + net change equals the closing balance.
    ///
    /// `None` when either balance is missing.
    pub fn reconciles(&self) -> Option<bool> {
        let opening = self.opening_balance?;
        let closing = self.closing_balance?;
        Some(opening + self.net_change() == closing)
    }

    fn total_of(&self, kind: TransactionType) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.amount)
            .sum()
    }
}

/// How the parser treated one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineClass {
    /// Table header
    Header,
    /// Started or completed a transaction
    Parsed,
    /// Extended the previous description
    Continuation,
    /// Metadata, summary, footer, or pre-table text
    Skipped,
    /// Inside the table but matched nothing
    Unmatched,
}

/// Diagnostic record for a single source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLine {
    pub page: u32,
    pub line_number: usize,
    pub text: String,
    pub class: LineClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_from_str() {
        assert_eq!("metro".parse::<Bank>().unwrap(), Bank::MetroBank);
        assert_eq!("Metro Bank".parse::<Bank>().unwrap(), Bank::MetroBank);
        assert_eq!("HSBC".parse::<Bank>().unwrap(), Bank::Hsbc);
        assert_eq!("barclays".parse::<Bank>().unwrap(), Bank::Barclays);
        assert!(matches!(
            "monzo".parse::<Bank>(),
            Err(Error::UnsupportedBank(_))
        ));
    }

    #[test]
    fn test_amount_is_never_negative() {
        let t = Transaction::new("1/1/24", "x", TransactionType::Debit, Decimal::new(-1050, 2));
        assert_eq!(t.amount, Decimal::new(1050, 2));
        assert_eq!(t.signed_amount(), Decimal::new(-1050, 2));
    }

    #[test]
    fn test_append_description() {
        let mut t = Transaction::new("1/1/24", "CARD PAYMENT", TransactionType::Debit, Decimal::ONE);
        t.append_description("  TESCO STORES  ");
        assert_eq!(t.description, "CARD PAYMENT TESCO STORES");
        t.append_description("   ");
        assert_eq!(t.description, "CARD PAYMENT TESCO STORES");
    }

    #[test]
    fn test_totals_and_reconcile() {
        let mut info = StatementInfo::new(Bank::Hsbc);
        info.opening_balance = Some(Decimal::new(10000, 2));
        info.transactions.push(Transaction::new(
            "1 Jan",
            "a",
            TransactionType::Debit,
            Decimal::new(2500, 2),
        ));
        info.transactions.push(Transaction::new(
            "2 Jan",
            "b",
            TransactionType::Credit,
            Decimal::new(1000, 2),
        ));
        assert_eq!(info.total_debits(), Decimal::new(2500, 2));
        assert_eq!(info.net_change(), Decimal::new(-1500, 2));
        assert_eq!(info.reconciles(), None);
        info.closing_balance = Some(Decimal::new(8500, 2));
        assert_eq!(info.reconciles(), Some(true));
    }

    #[test]
    fn test_transaction_serializes_type_field() {
        let t = Transaction::new("1/1/24", "x", TransactionType::Credit, Decimal::ONE);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("\"type\":\"CREDIT\""));
    }
}
