use crate::domain::balances::Balances;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow<'a> {
    account: &'a str,
    balance: String,
}

/// Writes derived balances as `account,balance` CSV rows.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances(&mut self, balances: &Balances) -> Result<()> {
        if balances.is_empty() {
            self.writer.write_record(["account", "balance"])?;
        }
        for (account, balance) in balances.iter() {
            self.writer.serialize(BalanceRow {
                account: account.as_str(),
                balance: balance.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
