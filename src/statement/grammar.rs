//! Line grammars.
//!
//! A grammar is an ordered list of rules, each a regex plus a [`RowShape`]
//! saying which named captures feed which transaction fields. Rules run
//! against the text that follows a row's leading date; the first match
//! wins. Tab-delimited rows skip the rules and are split into cells.

use std::borrow::Cow;

use regex::Regex;
use rust_decimal::Decimal;

use crate::model::{Bank, TransactionType};

use super::primitives::{
    amount_tokens, find_date_at_start, is_empty_column, parse_amount, parse_balance, DateMatch,
};
use super::primitives::{AMOUNT, BALANCE, EMPTY_COLUMN};

static_regex!(
    columns_re,
    &format!(
        r"^(?:(?P<desc>.*?)\s+)?(?P<out>{AMOUNT}|{EMPTY_COLUMN})\s+(?P<in>{AMOUNT}|{EMPTY_COLUMN})\s+(?P<bal>{BALANCE})$"
    )
);
static_regex!(
    amount_balance_re,
    &format!(r"^(?:(?P<desc>.*?)\s+)?(?P<amt>{AMOUNT})\s+(?P<bal>{BALANCE})$")
);
static_regex!(amount_re, &format!(r"^(?:(?P<desc>.*?)\s+)?(?P<amt>{AMOUNT})$"));
static_regex!(description_re, r"^(?P<desc>.*)$");

/// Money columns recovered from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Amounts {
    /// Nothing yet; the row waits for its amounts
    #[default]
    None,
    /// Segregated paid-out and paid-in columns
    Columns {
        paid_out: Option<Decimal>,
        paid_in: Option<Decimal>,
    },
    /// One amount whose column is unknown
    Single(Decimal),
}

impl Amounts {
    pub fn is_none(&self) -> bool {
        matches!(self, Amounts::None)
    }

    /// The amount, plus the direction when the columns settle it.
    pub fn resolve(&self) -> (Option<Decimal>, Option<TransactionType>) {
        let nonzero = |v: &Option<Decimal>| v.filter(|d| !d.is_zero()).map(|d| d.abs());
        match self {
            Amounts::None => (None, None),
            Amounts::Columns { paid_out, paid_in } => {
                if let Some(out) = nonzero(paid_out) {
                    (Some(out), Some(TransactionType::Debit))
                } else if let Some(inn) = nonzero(paid_in) {
                    (Some(inn), Some(TransactionType::Credit))
                } else {
                    (None, None)
                }
            }
            Amounts::Single(amount) => (Some(amount.abs()), None),
        }
    }

    /// A minus sign on a single amount marks money out.
    pub fn sign_hint(&self) -> Option<TransactionType> {
        match self {
            Amounts::Single(amount) if amount.is_sign_negative() && !amount.is_zero() => {
                Some(TransactionType::Debit)
            }
            _ => None,
        }
    }
}

/// Fields recovered from one source line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowMatch {
    /// Completed date; `None` for rows printed without one
    pub date: Option<String>,
    pub description: String,
    pub amounts: Amounts,
    pub balance: Option<Decimal>,
    /// Payment-type code stripped from the description
    pub code: Option<String>,
}

impl RowMatch {
    /// Whether the row carries any amount or balance.
    pub fn has_money(&self) -> bool {
        !self.amounts.is_none() || self.balance.is_some()
    }
}

/// Which fields a rule's captures fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// `desc`, `out`, `in`, `bal`
    Columns,
    /// `desc`, `amt`, `bal`
    AmountBalance,
    /// `desc`, `amt`
    Amount,
    /// `desc` only; amounts arrive on a later line
    DescriptionOnly,
}

/// One pattern and its field mapping.
pub struct LineGrammar {
    pub name: &'static str,
    pub shape: RowShape,
    regex: fn() -> &'static Regex,
}

impl LineGrammar {
    pub const fn new(name: &'static str, shape: RowShape, regex: fn() -> &'static Regex) -> Self {
        Self { name, shape, regex }
    }

    /// Apply the rule to text that follows the date.
    pub fn apply(&self, text: &str) -> Option<RowMatch> {
        let caps = (self.regex)().captures(text)?;
        let group = |name: &str| caps.name(name).map(|m| m.as_str());
        let description = group("desc").unwrap_or("").trim().to_string();

        let (amounts, balance) = match self.shape {
            RowShape::Columns => (
                Amounts::Columns {
                    paid_out: group("out").and_then(parse_amount),
                    paid_in: group("in").and_then(parse_amount),
                },
                group("bal").and_then(parse_balance),
            ),
            RowShape::AmountBalance => (
                Amounts::Single(parse_amount(group("amt")?)?),
                group("bal").and_then(parse_balance),
            ),
            RowShape::Amount => (Amounts::Single(parse_amount(group("amt")?)?), None),
            RowShape::DescriptionOnly => (Amounts::None, None),
        };

        Some(RowMatch {
            date: None,
            description,
            amounts,
            balance,
            code: None,
        })
    }
}

/// Rules shared by every layout, most specific first.
pub static STANDARD_RULES: [LineGrammar; 4] = [
    LineGrammar::new("columns", RowShape::Columns, columns_re),
    LineGrammar::new("amount+balance", RowShape::AmountBalance, amount_balance_re),
    LineGrammar::new("amount", RowShape::Amount, amount_re),
    LineGrammar::new("description", RowShape::DescriptionOnly, description_re),
];

/// The rules that require money on the line.
pub fn money_rules() -> &'static [LineGrammar] {
    &STANDARD_RULES[..3]
}

/// First rule that matches, logged by name.
pub fn apply_rules(rules: &[LineGrammar], text: &str) -> Option<RowMatch> {
    rules.iter().find_map(|rule| {
        let row = rule.apply(text)?;
        log::trace!("rule {} matched {:?}", rule.name, text);
        Some(row)
    })
}

/// Interpret trailing amount slots, left to right.
///
/// One slot is an amount; two are amount and balance; three are paid out,
/// paid in and balance. Blank and dash-only slots are empty columns.
pub fn amounts_from_slots(slots: &[&str]) -> Option<(Amounts, Option<Decimal>)> {
    let amount = |s: &str| {
        if is_empty_column(s) {
            None
        } else {
            parse_amount(s)
        }
    };
    let balance = |s: &str| {
        if is_empty_column(s) {
            None
        } else {
            parse_balance(s)
        }
    };

    match *slots {
        [only] => Some((Amounts::Single(amount(only)?), None)),
        [first, bal] => {
            let amounts = amount(first).map_or(Amounts::None, Amounts::Single);
            Some((amounts, balance(bal)))
        }
        [out, inn, bal] => Some((
            Amounts::Columns {
                paid_out: amount(out),
                paid_in: amount(inn),
            },
            balance(bal),
        )),
        _ => None,
    }
}

/// Split a tab-delimited row into description and money cells.
///
/// Cells are scanned right to left; amount-shaped, empty or dash cells are money
/// slots (at most three), everything before them is the description.
pub fn cells_to_row(text: &str) -> Option<RowMatch> {
    let mut cells: Vec<&str> = text.split('\t').map(str::trim).collect();
    while cells.last().map_or(false, |c| c.is_empty()) {
        cells.pop();
    }
    if cells.is_empty() {
        return None;
    }

    let mut split = cells.len();
    while split > 0 && cells.len() - split < 3 {
        let cell = cells[split - 1];
        let is_amount = amount_tokens(cell).map_or(false, |t| t.len() == 1);
        if is_empty_column(cell) || is_amount {
            split -= 1;
        } else {
            break;
        }
    }

    let description = cells[..split]
        .iter()
        .filter(|c| !is_empty_column(c))
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    let (amounts, balance) = if split == cells.len() {
        (Amounts::None, None)
    } else {
        amounts_from_slots(&cells[split..])?
    };

    Some(RowMatch {
        date: None,
        description,
        amounts,
        balance,
        code: None,
    })
}

/// Running context the engine shares with grammars.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Date of the most recent transaction
    pub last_date: Option<String>,
    /// Year of the most recent full date seen on any line, as printed
    pub last_year: Option<String>,
}

/// Match the text after a date: cells when tab-delimited, rules otherwise.
pub fn match_body(rules: &[LineGrammar], body: &str) -> Option<RowMatch> {
    if body.contains('\t') {
        cells_to_row(body)
    } else {
        apply_rules(rules, body)
    }
}

/// A bank's statement layout.
pub trait StatementGrammar: Send + Sync {
    /// The bank this grammar reads.
    fn bank(&self) -> Bank;

    /// Rules for the text after a leading date.
    fn rules(&self) -> &'static [LineGrammar] {
        &STANDARD_RULES
    }

    /// Rewrite a line before matching.
    fn prepare<'a>(&self, line: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(line)
    }

    /// Try to read a transaction row from a line.
    fn match_line(&self, line: &str, ctx: &ParseContext) -> Option<RowMatch> {
        let line = self.prepare(line);
        match find_date_at_start(&line) {
            Some(date) => {
                let mut row = self.match_dated(date.rest)?;
                row.date = Some(self.complete_date(&date, ctx));
                Some(row)
            }
            None => self.match_undated(&line, ctx),
        }
    }

    /// Match the text following a leading date.
    fn match_dated(&self, body: &str) -> Option<RowMatch> {
        match_body(self.rules(), body)
    }

    /// Match a row printed without a date. Only some layouts have them.
    fn match_undated(&self, _line: &str, _ctx: &ParseContext) -> Option<RowMatch> {
        None
    }

    /// Turn a printed date into the date stored on the transaction.
    fn complete_date(&self, date: &DateMatch<'_>, _ctx: &ParseContext) -> String {
        date.text.to_string()
    }

    /// Direction implied by a payment-type code.
    fn code_type(&self, _code: &str) -> Option<TransactionType> {
        None
    }

    /// Whether balance movement may override description keywords.
    fn supports_balance_delta(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_amount_balance_rule() {
        let row = apply_rules(&STANDARD_RULES, "CARD PAYMENT TESCO 25.99 1,234.56").unwrap();
        assert_eq!(row.description, "CARD PAYMENT TESCO");
        assert_eq!(row.amounts, Amounts::Single(dec("25.99")));
        assert_eq!(row.balance, Some(dec("1234.56")));
    }

    #[test]
    fn test_columns_rule() {
        let row = apply_rules(&STANDARD_RULES, "SALARY 0.00 2,500.00 3,689.56").unwrap();
        assert_eq!(
            row.amounts.resolve(),
            (Some(dec("2500.00")), Some(TransactionType::Credit))
        );
    }

    #[test]
    fn test_dash_marks_empty_column() {
        let row = apply_rules(&STANDARD_RULES, "CARD PAYMENT TESCO 25.99 - 1,234.56").unwrap();
        assert_eq!(row.description, "CARD PAYMENT TESCO");
        assert_eq!(
            row.amounts.resolve(),
            (Some(dec("25.99")), Some(TransactionType::Debit))
        );
        assert_eq!(row.balance, Some(dec("1234.56")));

        let row = apply_rules(&STANDARD_RULES, "SALARY ACME LTD – 1,000.00 2,234.56").unwrap();
        assert_eq!(row.description, "SALARY ACME LTD");
        assert_eq!(
            row.amounts.resolve(),
            (Some(dec("1000.00")), Some(TransactionType::Credit))
        );
    }

    #[test]
    fn test_dash_cells_are_empty_slots() {
        let row = cells_to_row("Refund from Amazon\t-\t10.00\t1,241.36").unwrap();
        assert_eq!(row.description, "Refund from Amazon");
        assert_eq!(
            row.amounts,
            Amounts::Columns {
                paid_out: None,
                paid_in: Some(dec("10.00"))
            }
        );
    }

    #[test]
    fn test_description_only_rule() {
        let row = apply_rules(&STANDARD_RULES, "CARD PAYMENT TO").unwrap();
        assert_eq!(row.description, "CARD PAYMENT TO");
        assert!(!row.has_money());
    }

    #[test]
    fn test_money_rules_need_money() {
        assert!(apply_rules(money_rules(), "CARD PAYMENT TO").is_none());
        assert!(apply_rules(money_rules(), "TESCO 3.20").is_some());
    }

    #[test]
    fn test_cells_right_to_left() {
        let row = cells_to_row("CREDIT SALARY\t\t2,500.00\t3,689.56").unwrap();
        assert_eq!(row.description, "CREDIT SALARY");
        assert_eq!(
            row.amounts,
            Amounts::Columns {
                paid_out: None,
                paid_in: Some(dec("2500.00"))
            }
        );
        assert_eq!(row.balance, Some(dec("3689.56")));

        let row = cells_to_row("VIS\tTESCO STORES\t12.50\t\t").unwrap();
        assert_eq!(row.description, "VIS TESCO STORES");
        assert_eq!(row.amounts, Amounts::Single(dec("12.50")));
        assert_eq!(row.balance, None);
    }

    #[test]
    fn test_sign_hint() {
        assert_eq!(
            Amounts::Single(dec("-4.00")).sign_hint(),
            Some(TransactionType::Debit)
        );
        assert_eq!(Amounts::Single(dec("4.00")).sign_hint(), None);
    }

    #[test]
    fn test_slots() {
        let (amounts, bal) = amounts_from_slots(&["", "10.00"]).unwrap();
        assert!(amounts.is_none());
        assert_eq!(bal, Some(dec("10.00")));
        let (amounts, _) = amounts_from_slots(&["—", "10.00"]).unwrap();
        assert!(amounts.is_none());
        assert!(amounts_from_slots(&[]).is_none());
    }
}
