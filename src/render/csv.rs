//! CSV rendering for parsed statements.
//!
//! Optional `key,value` metadata rows and a blank line come first, then
//! `Date,Description,Type,Amount,Balance` with one row per transaction.

use std::io::Write;

use crate::error::Result;
use crate::model::StatementInfo;

/// Column header of the transaction table.
pub const CSV_HEADER: [&str; 5] = ["Date", "Description", "Type", "Amount", "Balance"];

/// Write a statement as CSV.
pub fn write_csv<W: Write>(info: &StatementInfo, mut writer: W, include_metadata: bool) -> Result<()> {
    if include_metadata {
        let mut meta = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(&mut writer);

        meta.write_record(["Bank", info.bank.display_name()])?;
        let fields = [
            ("Account Holder", info.account_holder.clone()),
            ("Account Number", info.account_number.clone()),
            ("Sort Code", info.sort_code.clone()),
            ("Statement Period", info.statement_period.clone()),
            ("Opening Balance", info.opening_balance.map(|b| b.to_string())),
            ("Closing Balance", info.closing_balance.map(|b| b.to_string())),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                meta.write_record([key, value.as_str()])?;
            }
        }
        meta.flush()?;
        drop(meta);
        writer.write_all(b"\n")?;
    }

    let mut table = csv::Writer::from_writer(&mut writer);
    table.write_record(CSV_HEADER)?;
    for tx in &info.transactions {
        let amount = tx.amount.to_string();
        let balance = tx.balance.map(|b| b.to_string()).unwrap_or_default();
        table.write_record([
            tx.date.as_str(),
            tx.description.as_str(),
            tx.kind.as_str(),
            amount.as_str(),
            balance.as_str(),
        ])?;
    }
    table.flush()?;
    Ok(())
}

/// Render a statement as a CSV string.
pub fn to_csv(info: &StatementInfo, include_metadata: bool) -> Result<String> {
    let mut out = Vec::new();
    write_csv(info, &mut out, include_metadata)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}
