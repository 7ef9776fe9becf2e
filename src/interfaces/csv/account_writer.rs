use crate::domain::account::AccountSnapshot;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct AccountRow<'a> {
    account_number: &'a str,
    owner: &'a str,
    balance: Decimal,
}

/// Writes account snapshots as CSV: `account_number,owner,balance`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(
        &mut self,
        accounts: impl IntoIterator<Item = AccountSnapshot>,
    ) -> Result<(), csv::Error> {
        let mut wrote_any = false;
        for account in accounts {
            self.writer.serialize(AccountRow {
                account_number: account.account_number.as_str(),
                owner: account.owner_email.as_str(),
                balance: account.balance.value(),
            })?;
            wrote_any = true;
        }
        if !wrote_any {
            // Keep the header even when there is nothing to report.
            self.writer
                .write_record(["account_number", "owner", "balance"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
