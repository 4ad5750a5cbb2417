//! The per-line statement state machine.
//!
//! Each page starts before the transaction table. A header line, or the
//! first line that starts with a date, enters the table. Inside it every
//! line is tried, in order, as a summary line, a foreign-currency note, a
//! grammar row, an amount-only line for a waiting row, text finishing a
//! waiting row, and finally a continuation of the previous description.
//!
//! Rows become [`Transaction`]s in a second pass that walks the running
//! balance, so a row's direction can be checked against the balance move.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::{DebugLine, LineClass, Page, StatementInfo, Transaction, TransactionType};

use super::bank::{grammar_for, resolve_bank};
use super::grammar::{amounts_from_slots, apply_rules, money_rules, Amounts, ParseContext, RowMatch, StatementGrammar};
use super::options::{BalancePriority, ParseOptions};
use super::primitives::{
    amount_tokens, balance_delta, classify_summary, extract_metadata, full_date_year,
    is_foreign_detail, is_table_header, keyword_type, normalize_line, starts_with_date, Summary,
};

/// A parsed statement plus optional per-line diagnostics.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub statement: StatementInfo,
    pub debug: Vec<DebugLine>,
}

/// Turns extracted pages into a [`StatementInfo`].
#[derive(Debug, Clone, Default)]
pub struct StatementParser {
    options: ParseOptions,
}

impl StatementParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse pages, detecting the bank unless one was given.
    pub fn parse(&self, pages: &[Page]) -> Result<ParseOutput> {
        let bank = resolve_bank(self.options.bank, pages)?;
        Ok(self.parse_with(grammar_for(bank), pages))
    }

    /// Parse pages with a specific grammar.
    pub fn parse_with(&self, grammar: &dyn StatementGrammar, pages: &[Page]) -> ParseOutput {
        let mut run = Run::new(grammar, &self.options);
        for page in pages {
            run.page(page);
        }
        run.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    BeforeTable,
    InTable,
}

/// A row waiting for the balance pass.
#[derive(Debug)]
struct Draft {
    date: String,
    description: String,
    amounts: Amounts,
    balance: Option<Decimal>,
    code: Option<String>,
    /// Balance brought forward printed just before this row
    anchor: Option<Decimal>,
}

impl Draft {
    fn append(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(text);
    }

    /// Fill in money that arrived on a later line.
    fn complete(&mut self, row: RowMatch) {
        self.append(&row.description);
        self.amounts = row.amounts;
        if row.balance.is_some() {
            self.balance = row.balance;
        }
        if self.code.is_none() {
            self.code = row.code;
        }
    }
}

struct Run<'a> {
    grammar: &'a dyn StatementGrammar,
    options: &'a ParseOptions,
    info: StatementInfo,
    drafts: Vec<Draft>,
    /// Rows still missing their amounts on the current page, oldest first
    pending: VecDeque<usize>,
    anchor: Option<Decimal>,
    ctx: ParseContext,
    debug: Vec<DebugLine>,
}

impl<'a> Run<'a> {
    fn new(grammar: &'a dyn StatementGrammar, options: &'a ParseOptions) -> Self {
        Self {
            grammar,
            options,
            info: StatementInfo::new(grammar.bank()),
            drafts: Vec::new(),
            pending: VecDeque::new(),
            anchor: None,
            ctx: ParseContext::default(),
            debug: Vec::new(),
        }
    }

    fn page(&mut self, page: &Page) {
        let mut state = TableState::BeforeTable;
        self.pending.clear();

        for (index, raw) in page.lines.iter().enumerate() {
            let line = normalize_line(raw);
            if line.is_empty() {
                continue;
            }
            if let Some(year) = full_date_year(&line) {
                self.ctx.last_year = Some(year);
            }

            let class = self.line(&line, &mut state);
            log::trace!("p{}:{} {:?} {}", page.number, index + 1, class, line);

            if self.options.collect_debug {
                self.debug.push(DebugLine {
                    page: page.number,
                    line_number: index + 1,
                    text: line,
                    class,
                });
            }
        }
    }

    fn line(&mut self, line: &str, state: &mut TableState) -> LineClass {
        if is_table_header(line) {
            *state = TableState::InTable;
            return LineClass::Header;
        }

        if let Some(summary) = classify_summary(line) {
            self.record_summary(summary);
            return LineClass::Skipped;
        }

        if *state == TableState::BeforeTable {
            // Before a header, only a dated row carrying money opens the
            // table; period lines and other dated metadata do not.
            let opens_table = starts_with_date(line)
                && self
                    .grammar
                    .match_line(line, &self.ctx)
                    .map_or(false, |row| row.has_money());
            if !opens_table {
                extract_metadata(line, &mut self.info);
                return LineClass::Skipped;
            }
            *state = TableState::InTable;
        }

        let dated = starts_with_date(line);
        if !dated && is_foreign_detail(line) {
            return match self.drafts.last_mut() {
                Some(draft) => {
                    draft.append(line);
                    LineClass::Continuation
                }
                None => LineClass::Skipped,
            };
        }

        if let Some(row) = self.grammar.match_line(line, &self.ctx) {
            if self.accept_row(row) {
                return LineClass::Parsed;
            }
        }

        if let Some(tokens) = amount_tokens(line) {
            return match amounts_from_slots(&tokens) {
                Some((amounts, balance)) if !self.pending.is_empty() => {
                    self.fill_oldest(amounts, balance);
                    LineClass::Parsed
                }
                _ => LineClass::Unmatched,
            };
        }

        if !self.pending.is_empty() {
            if let Some(row) = apply_rules(money_rules(), line) {
                if let Some(index) = self.pending.pop_back() {
                    self.drafts[index].complete(row);
                    return LineClass::Parsed;
                }
            }
        }

        match self.drafts.last_mut() {
            Some(draft) if !dated => {
                draft.append(line);
                LineClass::Continuation
            }
            _ => LineClass::Unmatched,
        }
    }

    fn record_summary(&mut self, summary: Summary) {
        match summary {
            Summary::Opening(Some(balance)) => {
                if self.info.opening_balance.is_none() {
                    self.info.opening_balance = Some(balance);
                } else {
                    self.anchor = Some(balance);
                }
            }
            Summary::Closing(Some(balance)) => self.info.closing_balance = Some(balance),
            _ => {}
        }
    }

    /// Start a row or finish a waiting one. Returns false if the row has no
    /// date and none can be inherited.
    fn accept_row(&mut self, row: RowMatch) -> bool {
        let date = match row.date.clone() {
            Some(date) => date,
            None => {
                if row.code.is_none() && row.has_money() {
                    if let Some(index) = self.pending.pop_back() {
                        self.drafts[index].complete(row);
                        return true;
                    }
                }
                match &self.ctx.last_date {
                    Some(date) => date.clone(),
                    None => return false,
                }
            }
        };

        self.ctx.last_date = Some(date.clone());
        let waiting = !row.has_money();
        self.drafts.push(Draft {
            date,
            description: row.description,
            amounts: row.amounts,
            balance: row.balance,
            code: row.code,
            anchor: self.anchor.take(),
        });
        if waiting {
            self.pending.push_back(self.drafts.len() - 1);
        }
        true
    }

    fn fill_oldest(&mut self, amounts: Amounts, balance: Option<Decimal>) {
        if let Some(index) = self.pending.pop_front() {
            let draft = &mut self.drafts[index];
            draft.amounts = amounts;
            if balance.is_some() {
                draft.balance = balance;
            }
        }
    }

    fn finish(mut self) -> ParseOutput {
        let delta_first = self.grammar.supports_balance_delta()
            && self.options.balance_priority == BalancePriority::BalanceDelta;
        let mut previous = self.info.opening_balance;

        for draft in std::mem::take(&mut self.drafts) {
            if draft.anchor.is_some() {
                previous = draft.anchor;
            }

            let delta = match (previous, draft.balance) {
                (Some(prev), Some(balance)) => balance_delta(prev, balance),
                _ => None,
            };

            let (amount, column_kind) = draft.amounts.resolve();
            let Some(amount) = amount.or(delta.map(|(_, size)| size)) else {
                let note = format!(
                    "Dropped row {} \"{}\": no amount",
                    draft.date, draft.description
                );
                log::warn!("{}", note);
                self.info.warnings.push(note);
                previous = draft.balance.or(previous);
                continue;
            };

            let hint = draft
                .code
                .as_deref()
                .and_then(|code| self.grammar.code_type(code))
                .or_else(|| draft.amounts.sign_hint())
                .or_else(|| keyword_type(&draft.description));
            let delta_kind = delta.map(|(kind, _)| kind);

            if let (None, Some(h), Some(d)) = (column_kind, hint, delta_kind) {
                if h != d {
                    log::debug!(
                        "{} {}: keywords say {}, balance says {}",
                        draft.date,
                        draft.description,
                        h,
                        d
                    );
                }
            }

            let kind = column_kind
                .or(if delta_first {
                    delta_kind.or(hint)
                } else {
                    hint.or(delta_kind)
                })
                .unwrap_or(TransactionType::Debit);

            let mut transaction = Transaction::new(draft.date, draft.description, kind, amount);
            transaction.balance = draft.balance;
            previous = match draft.balance {
                Some(balance) => Some(balance),
                None => previous.map(|prev| prev + transaction.signed_amount()),
            };
            self.info.transactions.push(transaction);
        }

        if self.info.transactions.is_empty() {
            log::warn!("No transactions found");
            self.info.warnings.push("No transactions found".to_string());
        } else {
            log::info!(
                "Parsed {} {} transactions",
                self.info.transactions.len(),
                self.info.bank
            );
        }

        ParseOutput {
            statement: self.info,
            debug: self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bank;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn parse(bank: Bank, text: &str) -> ParseOutput {
        let parser = StatementParser::new(ParseOptions::new().with_bank(bank).with_debug(true));
        parser.parse(&[Page::from_text(1, text)]).unwrap()
    }

    #[test]
    fn test_metro_scenario() {
        let out = parse(
            Bank::MetroBank,
            "Date Description Paid out Paid in Balance\n15/01/2024 CARD PAYMENT TESCO 25.99 1,234.56",
        );
        let txs = &out.statement.transactions;
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].date, "15/01/2024");
        assert_eq!(txs[0].amount, dec("25.99"));
        assert_eq!(txs[0].kind, TransactionType::Debit);
        assert_eq!(txs[0].balance, Some(dec("1234.56")));
        assert_eq!(out.debug[0].class, LineClass::Header);
        assert_eq!(out.debug[1].class, LineClass::Parsed);
    }

    #[test]
    fn test_opening_balance_not_a_transaction() {
        let out = parse(
            Bank::Hsbc,
            "01 Jan 24 BALANCE BROUGHT FORWARD 1,189.56\n\
             17 Jan 24 CREDIT SALARY EMPLOYER LTD £2,500.00 £3,689.56",
        );
        assert_eq!(out.statement.opening_balance, Some(dec("1189.56")));
        assert_eq!(out.statement.transactions.len(), 1);
        assert_eq!(out.statement.transactions[0].kind, TransactionType::Credit);
    }

    #[test]
    fn test_summary_box_before_header_is_not_a_row() {
        let out = parse(
            Bank::Hsbc,
            "1 January to 31 January 2024\n\
             Account Summary\n\
             Opening Balance 1,189.56\n\
             Payments In 2,500.00\n\
             Payments Out 10.44\n\
             Date Payment type and details Paid out Paid in Balance\n\
             16 Jan 24 VIS TESCO STORES 10.44 1,179.12\n\
             17 Jan 24 CR SALARY EMPLOYER LTD 2,500.00 3,679.12",
        );
        let txs = &out.statement.transactions;
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].description, "TESCO STORES");
        assert_eq!(txs[0].kind, TransactionType::Debit);
        assert_eq!(txs[1].kind, TransactionType::Credit);
        assert_eq!(out.statement.opening_balance, Some(dec("1189.56")));

        let classes: Vec<LineClass> = out.debug.iter().take(5).map(|d| d.class).collect();
        assert_eq!(classes, vec![LineClass::Skipped; 5]);
    }

    #[test]
    fn test_dated_row_with_money_opens_table_without_header() {
        let out = parse(
            Bank::MetroBank,
            "31/01/2024 Statement of account\n\
             15/01/2024 CARD PAYMENT TESCO 25.99 1,234.56",
        );
        assert_eq!(out.debug[0].class, LineClass::Skipped);
        assert_eq!(out.debug[1].class, LineClass::Parsed);
        assert_eq!(out.statement.transactions.len(), 1);
    }

    #[test]
    fn test_balance_delta_overrides_keywords() {
        let text = "01 Jan 24 BALANCE BROUGHT FORWARD 100.00\n\
                    02 Jan 24 CARD PAYMENT REFUND SHOP 10.00 110.00";
        let out = parse(Bank::Hsbc, text);
        assert_eq!(out.statement.transactions[0].kind, TransactionType::Credit);

        let parser = StatementParser::new(ParseOptions::new().with_bank(Bank::Hsbc).keywords_first());
        let out = parser.parse(&[Page::from_text(1, text)]).unwrap();
        assert_eq!(out.statement.transactions[0].kind, TransactionType::Debit);
    }

    #[test]
    fn test_missing_amount_filled_from_delta() {
        let out = parse(
            Bank::Hsbc,
            "01 Jan 24 BALANCE BROUGHT FORWARD 100.00\n\
             02 Jan 24\tBP\tACME LTD\t\t\t75.50",
        );
        let tx = &out.statement.transactions[0];
        assert_eq!(tx.amount, dec("24.50"));
        assert_eq!(tx.kind, TransactionType::Debit);
    }

    #[test]
    fn test_pending_rows_filled_oldest_first() {
        let out = parse(
            Bank::Hsbc,
            "Date Payment type and details Paid out Paid in Balance\n\
             03 Feb 24 VIS TESCO STORES\n\
             VIS COSTA COFFEE\n\
             12.50\n\
             3.20 984.30",
        );
        let txs = &out.statement.transactions;
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].description, "TESCO STORES");
        assert_eq!(txs[0].amount, dec("12.50"));
        assert_eq!(txs[1].description, "COSTA COFFEE");
        assert_eq!(txs[1].date, "03 Feb 24");
        assert_eq!(txs[1].balance, Some(dec("984.30")));
    }

    #[test]
    fn test_text_with_amounts_completes_pending() {
        let out = parse(
            Bank::MetroBank,
            "Date Description Paid out Paid in Balance\n\
             15/01/2024 CARD PAYMENT TO\n\
             TESCO STORES 25.99 1,234.56",
        );
        let tx = &out.statement.transactions[0];
        assert_eq!(tx.description, "CARD PAYMENT TO TESCO STORES");
        assert_eq!(tx.amount, dec("25.99"));
    }

    #[test]
    fn test_foreign_detail_appended() {
        let out = parse(
            Bank::Barclays,
            "Date Description Money out Money in Balance\n\
             10/03/2024 Card Payment to Amazon.com 30.00 970.00\n\
             USD 37.50 @ 1.2500\n\
             11/03/2024 Card Payment to Tesco 5.00 965.00",
        );
        let txs = &out.statement.transactions;
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].description, "Card Payment to Amazon.com USD 37.50 @ 1.2500");
    }

    #[test]
    fn test_row_without_amount_dropped_with_warning() {
        let out = parse(
            Bank::MetroBank,
            "Date Description Paid out Paid in Balance\n15/01/2024 MYSTERY ROW",
        );
        assert!(out.statement.transactions.is_empty());
        assert_eq!(out.statement.warnings.len(), 2);
        assert!(out.statement.warnings[0].contains("MYSTERY ROW"));
    }

    #[test]
    fn test_zero_transactions_is_a_warning() {
        let out = parse(Bank::Barclays, "Barclays Bank UK PLC\nNothing to see");
        assert!(out.statement.transactions.is_empty());
        assert_eq!(out.statement.warnings, vec!["No transactions found"]);
    }

    #[test]
    fn test_pending_cleared_at_page_boundary() {
        let parser = StatementParser::new(ParseOptions::new().with_bank(Bank::MetroBank));
        let pages = vec![
            Page::from_text(1, "Date Description Paid out Paid in Balance\n15/01/2024 WAITING ROW"),
            Page::from_text(2, "Date Description Paid out Paid in Balance\n25.00 975.00"),
        ];
        let out = parser.parse(&pages).unwrap();
        assert!(out.statement.transactions.is_empty());
    }
}
