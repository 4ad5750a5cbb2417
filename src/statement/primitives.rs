//! Building blocks shared by every statement grammar.
//!
//! Dates, amounts, header and summary recognition, description keywords,
//! and the account metadata printed above the transaction table.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use unicode_normalization::UnicodeNormalization;

use crate::model::{StatementInfo, TransactionType};

/// A money amount with exactly two decimals, optional currency and sign.
pub const AMOUNT: &str = r"-?(?:[£$€]\s?)?-?(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}";

/// A dash printed in place of an empty money column.
pub const EMPTY_COLUMN: &str = r"[-–—]";

/// An amount that may carry an overdrawn marker.
pub const BALANCE: &str =
    r"-?(?:[£$€]\s?)?-?(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}(?:\s?(?:OD|DR|D)\b)?";

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

static_regex!(slash_date_re, r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})(?:\s+|$)");
static_regex!(
    month_date_re,
    &format!(r"(?i)^(\d{{1,2}})\s+({MONTH})(?:\s+(\d{{4}}|\d{{2}}))?(?:\s+|$)")
);
static_regex!(
    dash_date_re,
    &format!(r"(?i)^(\d{{1,2}})-({MONTH})-(\d{{4}}|\d{{2}})(?:\s+|$)")
);
static_regex!(
    full_date_re,
    &format!(
        r"(?i)\b\d{{1,2}}(?:/\d{{1,2}}/|\s+{MONTH}\s+|-{MONTH}-)(\d{{4}}|\d{{2}})(?:[^\d.,]|$)"
    )
);
static_regex!(balance_any_re, BALANCE);
static_regex!(page_number_re, r"(?i)^(?:page\s+\d+(?:\s+of\s+\d+)?|\d+\s+of\s+\d+)$");
static_regex!(
    fx_rate_re,
    r"(?i)^(?:[a-z]{3}\s+)?-?\d[\d,]*\.\d{2,}\s*(?:@|at)\s*(?:rate\s*)?\d"
);
static_regex!(
    sort_code_re,
    r"(?i)sort\s*code[:\s]*(\d{2})[-\s]?(\d{2})[-\s]?(\d{2})\b"
);
static_regex!(
    account_number_re,
    r"(?i)account\s*(?:number|no\.?|num)[:\s]*(\d[\d ]{5,12}\d)\b"
);
static_regex!(period_label_re, r"(?i)^(?:statement\s+)?period[:\s]+(.+?)\s*$");
static_regex!(
    period_range_re,
    &format!(
        r"(?i)(\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTH}\s+\d{{4}})\s+(?:to|-|–)\s+(\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTH}\s+\d{{4}})"
    )
);
static_regex!(
    holder_label_re,
    r"(?i)^(?:account\s+(?:holder|name)s?|name)[:\s]+(.+?)\s*$"
);
static_regex!(holder_title_re, r"(?i)^(?:mr|mrs|ms|miss|dr|mx)\.?\s+[a-z][a-z .'-]+$");

/// A date found at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMatch<'a> {
    /// The date as printed
    pub text: &'a str,
    /// Everything after the date, leading whitespace removed
    pub rest: &'a str,
    /// Whether the printed date includes a year
    pub has_year: bool,
}

/// Find a date at the start of `line`.
///
/// One stray leading character left over from extraction is tolerated.
pub fn find_date_at_start(line: &str) -> Option<DateMatch<'_>> {
    let line = line.trim_start();
    if let Some(found) = match_date(line) {
        return Some(found);
    }

    let first = line.chars().next()?;
    if first.is_ascii_digit() {
        return None;
    }
    match_date(line[first.len_utf8()..].trim_start())
}

/// Whether the line begins with a recognizable date.
pub fn starts_with_date(line: &str) -> bool {
    find_date_at_start(line).is_some()
}

fn match_date(line: &str) -> Option<DateMatch<'_>> {
    if let Some(caps) = slash_date_re().captures(line) {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return valid_date(day, month, Some(&caps[3])).then(|| date_match(line, &caps, true));
    }

    if let Some(caps) = dash_date_re().captures(line) {
        let month = month_number(&caps[2])?;
        let day = caps[1].parse().ok()?;
        return valid_date(day, month, Some(&caps[3])).then(|| date_match(line, &caps, true));
    }

    if let Some(caps) = month_date_re().captures(line) {
        let month = month_number(&caps[2])?;
        let day = caps[1].parse().ok()?;
        let year = caps.get(3).map(|m| m.as_str());
        return valid_date(day, month, year).then(|| date_match(line, &caps, year.is_some()));
    }

    None
}

fn date_match<'a>(line: &'a str, caps: &regex::Captures<'a>, has_year: bool) -> DateMatch<'a> {
    let whole = caps.get(0).map_or(0, |m| m.end());
    DateMatch {
        text: line[..whole].trim_end(),
        rest: line[whole..].trim_start(),
        has_year,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let key = name.get(..3)?.to_ascii_lowercase();
    let month = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn valid_date(day: u32, month: u32, year: Option<&str>) -> bool {
    // 2000 is a leap year, so a yearless 29 Feb still validates.
    let year = match year.map(str::parse::<i32>) {
        Some(Ok(y)) if y < 100 => 2000 + y,
        Some(Ok(y)) => y,
        Some(Err(_)) => return false,
        None => 2000,
    };
    NaiveDate::from_ymd_opt(year, month, day).is_some()
}

/// The year of the last full date anywhere in the line, as printed.
pub fn full_date_year(line: &str) -> Option<String> {
    full_date_re()
        .captures_iter(line)
        .last()
        .map(|caps| caps[1].to_string())
}

/// Parse a printed amount.
///
/// Currency symbols (including their mis-encoded forms), thousands
/// separators and whitespace are ignored. Empty or dash-only input is zero.
/// A leading or trailing minus, or surrounding parentheses, make the value
/// negative. Returns `None` for anything else that is not a number.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = fix_currency(s);
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.chars().all(is_dash) {
        return Some(Decimal::ZERO);
    }

    let (negative, body) = if let Some(inner) = cleaned
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        (true, inner)
    } else if let Some(inner) = cleaned.strip_suffix('-') {
        (true, inner)
    } else {
        (false, cleaned.as_str())
    };

    let value = Decimal::from_str(body).ok()?;
    Some(if negative { -value.abs() } else { value })
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '–' | '—')
}

/// Whether a cell is blank or holds only a dash placeholder.
pub fn is_empty_column(s: &str) -> bool {
    s.trim().chars().all(is_dash)
}

/// Parse a running balance; an `OD`, `DR` or `D` suffix means overdrawn.
pub fn parse_balance(s: &str) -> Option<Decimal> {
    let s = s.trim();
    for suffix in ["OD", "DR", "D"] {
        if let Some(body) = s.strip_suffix(suffix) {
            return parse_amount(body).map(|v| -v.abs());
        }
    }
    parse_amount(s)
}

/// Split a line made only of amounts into its amount tokens.
///
/// Returns `None` if anything other than amounts and whitespace is present
/// or if there are more than three.
pub fn amount_tokens(line: &str) -> Option<Vec<&str>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut tokens = Vec::new();
    let mut last_end = 0;
    for m in balance_any_re().find_iter(line) {
        if !line[last_end..m.start()].trim().is_empty() {
            return None;
        }
        tokens.push(m.as_str());
        last_end = m.end();
    }

    if tokens.is_empty() || tokens.len() > 3 || !line[last_end..].trim().is_empty() {
        return None;
    }
    Some(tokens)
}

/// Whether a line is a transaction table header.
pub fn is_table_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("date")
        && ["description", "details", "transaction"]
            .iter()
            .any(|w| lower.contains(w))
        && ["amount", "paid", "balance", "money"]
            .iter()
            .any(|w| lower.contains(w))
}

/// Lines that carry statement totals or page furniture rather than rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Summary {
    /// Balance brought forward, with the amount when printed
    Opening(Option<Decimal>),
    /// Balance carried forward, with the amount when printed
    Closing(Option<Decimal>),
    /// Page numbers, totals and regulatory text
    Boilerplate,
}

const OPENING_PHRASES: &[&str] = &[
    "balance brought forward",
    "brought forward",
    "opening balance",
    "start balance",
    "previous balance",
    "balance b/f",
];

const CLOSING_PHRASES: &[&str] = &[
    "balance carried forward",
    "carried forward",
    "closing balance",
    "end balance",
    "balance c/f",
];

const BOILERPLATE_PHRASES: &[&str] = &[
    "financial services compensation",
    "fscs",
    "prudential regulation authority",
    "financial conduct authority",
    "registered office",
    "registered in england",
    "authorised by",
    "continued on",
    "total payments",
    "total receipts",
    "total paid out",
    "total paid in",
    "total money out",
    "total money in",
];

/// Labels of the summary box printed above the table. They only count at
/// the start of a line, since descriptions can contain the same words.
const SUMMARY_BOX_LABELS: &[&str] = &[
    "account summary",
    "payments in",
    "payments out",
    "money in",
    "money out",
];

/// Classify a summary or footer line.
pub fn classify_summary(line: &str) -> Option<Summary> {
    let lower = line.to_lowercase();

    if OPENING_PHRASES.iter().any(|p| contains_phrase(&lower, p)) {
        return Some(Summary::Opening(last_balance(line)));
    }
    if CLOSING_PHRASES.iter().any(|p| contains_phrase(&lower, p)) {
        return Some(Summary::Closing(last_balance(line)));
    }
    let head = lower.trim_start();
    if page_number_re().is_match(line.trim())
        || BOILERPLATE_PHRASES.iter().any(|p| contains_phrase(&lower, p))
        || SUMMARY_BOX_LABELS.iter().any(|label| {
            head.strip_prefix(label)
                .map_or(false, |rest| !rest.starts_with(char::is_alphanumeric))
        })
    {
        return Some(Summary::Boilerplate);
    }
    None
}

fn last_balance(line: &str) -> Option<Decimal> {
    balance_any_re()
        .find_iter(line)
        .last()
        .and_then(|m| parse_balance(m.as_str()))
}

const FOREIGN_PHRASES: &[&str] = &[
    "exchange rate",
    "non-sterling",
    "non sterling",
    "conversion rate",
    "currency conversion",
    "foreign currency",
];

/// Whether a line annotates a foreign-currency payment.
pub fn is_foreign_detail(line: &str) -> bool {
    let lower = line.to_lowercase();
    FOREIGN_PHRASES.iter().any(|p| lower.contains(p)) || fx_rate_re().is_match(line.trim())
}

const DEBIT_PHRASES: &[&str] = &[
    "card payment",
    "direct debit",
    "standing order",
    "withdrawal",
    "cash machine",
    "atm",
    "bill payment",
    "payment to",
    "transfer to",
    "purchase",
    "interest charged",
    "fee",
    "charge",
    "charges",
    "cheque",
    "debit",
];

const CREDIT_PHRASES: &[&str] = &[
    "salary",
    "wages",
    "refund",
    "interest paid",
    "deposit",
    "received",
    "payment from",
    "transfer from",
    "bank giro credit",
    "dividend",
    "reversal",
    "credit",
];

/// Guess the direction from description keywords.
///
/// The longest matching phrase wins, so "direct debit" beats "debit".
pub fn keyword_type(description: &str) -> Option<TransactionType> {
    let lower = description.to_lowercase();
    let mut phrases: Vec<(&str, TransactionType)> = DEBIT_PHRASES
        .iter()
        .map(|p| (*p, TransactionType::Debit))
        .chain(CREDIT_PHRASES.iter().map(|p| (*p, TransactionType::Credit)))
        .collect();
    phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    phrases
        .into_iter()
        .find(|(phrase, _)| contains_phrase(&lower, phrase))
        .map(|(_, kind)| kind)
}

/// Substring match that respects word boundaries at both ends.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + phrase.len()..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

/// Direction and size of the move between two running balances.
pub fn balance_delta(previous: Decimal, current: Decimal) -> Option<(TransactionType, Decimal)> {
    let diff = current - previous;
    if diff.is_zero() {
        None
    } else if diff.is_sign_negative() {
        Some((TransactionType::Debit, -diff))
    } else {
        Some((TransactionType::Credit, diff))
    }
}

/// Record any account metadata printed on the line; first value wins.
pub fn extract_metadata(line: &str, info: &mut StatementInfo) {
    if info.sort_code.is_none() {
        if let Some(caps) = sort_code_re().captures(line) {
            info.sort_code = Some(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]));
        }
    }

    if info.account_number.is_none() {
        if let Some(caps) = account_number_re().captures(line) {
            let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
            if (6..=10).contains(&digits.len()) {
                info.account_number = Some(digits);
            }
        }
    }

    if info.statement_period.is_none() {
        if let Some(caps) = period_range_re().captures(line) {
            info.statement_period = Some(format!("{} to {}", &caps[1], &caps[2]));
        } else if let Some(caps) = period_label_re().captures(line) {
            info.statement_period = Some(caps[1].to_string());
        }
    }

    if info.account_holder.is_none() {
        let trimmed = line.trim();
        if let Some(caps) = holder_label_re().captures(trimmed) {
            info.account_holder = Some(caps[1].to_string());
        } else if holder_title_re().is_match(trimmed) {
            info.account_holder = Some(trimmed.to_string());
        }
    }
}

/// Repair mis-encoded currency symbols.
fn fix_currency(s: &str) -> String {
    s.replace("Â£", "£").replace("â‚¬", "€")
}

/// Normalize an extracted line before parsing.
///
/// Applies NFKC (splitting ligatures such as `ﬁ`), turns non-breaking
/// spaces into spaces, and repairs mis-encoded currency symbols.
pub fn normalize_line(line: &str) -> String {
    fix_currency(line)
        .replace('\u{a0}', " ")
        .nfkc()
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bank;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_slash_date() {
        let m = find_date_at_start("15/01/2024 CARD PAYMENT TESCO 25.99").unwrap();
        assert_eq!(m.text, "15/01/2024");
        assert_eq!(m.rest, "CARD PAYMENT TESCO 25.99");
        assert!(m.has_year);
    }

    #[test]
    fn test_month_date_with_and_without_year() {
        let m = find_date_at_start("17 Jan 24 CREDIT SALARY").unwrap();
        assert_eq!(m.text, "17 Jan 24");
        assert_eq!(m.rest, "CREDIT SALARY");

        let m = find_date_at_start("12 Jan Card Payment").unwrap();
        assert_eq!(m.text, "12 Jan");
        assert!(!m.has_year);

        let m = find_date_at_start("3 Feb 12.50").unwrap();
        assert_eq!(m.text, "3 Feb");
        assert_eq!(m.rest, "12.50");
    }

    #[test]
    fn test_dash_date_and_stray_prefix() {
        assert_eq!(find_date_at_start("05-Mar-2024 X").unwrap().text, "05-Mar-2024");
        assert_eq!(find_date_at_start("|15/01/2024 X").unwrap().text, "15/01/2024");
        assert!(find_date_at_start("ab15/01/2024 X").is_none());
    }

    #[test]
    fn test_invalid_dates_rejected() {
        assert!(find_date_at_start("31/02/2024 X").is_none());
        assert!(find_date_at_start("15/13/2024 X").is_none());
        assert!(find_date_at_start("1 Mayfair Cafe").is_none());
        assert!(find_date_at_start("CARD PAYMENT").is_none());
    }

    #[test]
    fn test_full_date_year() {
        assert_eq!(
            full_date_year("Balance brought forward 31 Dec 2023 1,000.00"),
            Some("2023".to_string())
        );
        assert_eq!(full_date_year("1 Jan 2024 to 31 Jan 2024"), Some("2024".to_string()));
        assert_eq!(full_date_year("3 Feb 12.50"), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("£1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("Â£ 12.00"), Some(dec("12.00")));
        assert_eq!(parse_amount(""), Some(Decimal::ZERO));
        assert_eq!(parse_amount(" - "), Some(Decimal::ZERO));
        assert_eq!(parse_amount("-25.99"), Some(dec("-25.99")));
        assert_eq!(parse_amount("(25.99)"), Some(dec("-25.99")));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_parse_amount_idempotent() {
        let once = parse_amount("£1,234.56").unwrap();
        assert_eq!(parse_amount(&once.to_string()), Some(once));
    }

    #[test]
    fn test_parse_balance_overdrawn() {
        assert_eq!(parse_balance("120.00 OD"), Some(dec("-120.00")));
        assert_eq!(parse_balance("120.00D"), Some(dec("-120.00")));
        assert_eq!(parse_balance("1,000.00"), Some(dec("1000.00")));
    }

    #[test]
    fn test_amount_tokens() {
        assert_eq!(amount_tokens("25.99 1,234.56"), Some(vec!["25.99", "1,234.56"]));
        assert_eq!(amount_tokens("£25.99"), Some(vec!["£25.99"]));
        assert_eq!(amount_tokens("12.00 OD"), Some(vec!["12.00 OD"]));
        assert_eq!(amount_tokens("TESCO 25.99"), None);
        assert_eq!(amount_tokens("1.00 2.00 3.00 4.00"), None);
    }

    #[test]
    fn test_table_header() {
        assert!(is_table_header("Date Description Paid out Paid in Balance"));
        assert!(is_table_header("Date Payment type and details Paid out Paid in Balance"));
        assert!(!is_table_header("Date of statement 1 Feb 2024"));
    }

    #[test]
    fn test_dash_placeholders_are_empty() {
        for dash in ["-", "–", "—", " - ", ""] {
            assert!(is_empty_column(dash), "{:?}", dash);
            assert_eq!(parse_amount(dash), Some(Decimal::ZERO));
        }
        assert!(!is_empty_column("-1.00"));
    }

    #[test]
    fn test_classify_summary() {
        assert_eq!(
            classify_summary("01 Jan 24 BALANCE BROUGHT FORWARD 1,189.56"),
            Some(Summary::Opening(Some(dec("1189.56"))))
        );
        assert_eq!(
            classify_summary("Closing balance £50.00 OD"),
            Some(Summary::Closing(Some(dec("-50.00"))))
        );
        assert_eq!(classify_summary("Page 2 of 3"), Some(Summary::Boilerplate));
        assert_eq!(classify_summary("CARD PAYMENT TESCO"), None);
        assert_eq!(classify_summary("Payments In 2,500.00"), Some(Summary::Boilerplate));
        assert_eq!(classify_summary("Money out £10.44"), Some(Summary::Boilerplate));
        assert_eq!(classify_summary("Account Summary"), Some(Summary::Boilerplate));
        assert_eq!(classify_summary("TRANSFER MONEY IN 20.00 120.00"), None);
        assert_eq!(classify_summary("Payments Inc 4.00 116.00"), None);
    }

    #[test]
    fn test_foreign_detail() {
        assert!(is_foreign_detail("USD 30.00 @ 1.2634"));
        assert!(is_foreign_detail("Non-Sterling Transaction Fee 0.87"));
        assert!(!is_foreign_detail("TESCO STORES 3.20"));
    }

    #[test]
    fn test_keyword_type() {
        assert_eq!(keyword_type("CARD PAYMENT TESCO"), Some(TransactionType::Debit));
        assert_eq!(keyword_type("CREDIT SALARY EMPLOYER LTD"), Some(TransactionType::Credit));
        assert_eq!(keyword_type("DIRECT DEBIT BRITISH GAS"), Some(TransactionType::Debit));
        assert_eq!(keyword_type("Coffee"), None);
        assert_eq!(keyword_type("FEEDBACK LTD"), None);
    }

    #[test]
    fn test_balance_delta() {
        assert_eq!(
            balance_delta(dec("1189.56"), dec("3689.56")),
            Some((TransactionType::Credit, dec("2500.00")))
        );
        assert_eq!(
            balance_delta(dec("10.00"), dec("-5.00")),
            Some((TransactionType::Debit, dec("15.00")))
        );
        assert_eq!(balance_delta(dec("1.00"), dec("1.00")), None);
    }

    #[test]
    fn test_extract_metadata() {
        let mut info = StatementInfo::new(Bank::MetroBank);
        for line in [
            "MR JOHN SMITH",
            "Sort code 23-05-80 Account number 12345678",
            "Statement period 1 January 2024 to 31 January 2024",
        ] {
            extract_metadata(line, &mut info);
        }
        assert_eq!(info.account_holder.as_deref(), Some("MR JOHN SMITH"));
        assert_eq!(info.sort_code.as_deref(), Some("23-05-80"));
        assert_eq!(info.account_number.as_deref(), Some("12345678"));
        assert_eq!(
            info.statement_period.as_deref(),
            Some("1 January 2024 to 31 January 2024")
        );
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("  Â£12.00\u{a0}ﬁnal "), "£12.00 final");
    }
}
