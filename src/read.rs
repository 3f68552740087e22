use crate::data::{AccountInfo, Error, LedgerRow, Split, MIN_SCALE};

/// Trait for doing something with an account record read from a ledger export
/// (or received from elsewhere). Used by `Ledger` to build its account store,
/// but also used for mock tests to check we get the correct results from
/// reading a CSV stream.
pub(crate) trait SplitSink {
    /// `split` is `None` when the row only declares the account.
    fn use_split(&mut self, account: AccountInfo, split: Option<Split>) -> Result<(), Error>;
}

/// CSV importer for ledger rows. Any malformed row aborts the import: a report
/// computed from a partially read ledger would be wrong without saying so.
pub(crate) fn read_ledger<R: std::io::Read, S: SplitSink>(
    reader: R,
    sink: &mut S,
) -> Result<(), Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut record = csv::StringRecord::new();
    while rdr.read_record(&mut record)? {
        let row: LedgerRow = record.deserialize(Some(&headers))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let split = match (row.date, row.quantity) {
            (Some(date), Some(mut quantity)) => {
                if quantity.scale() < MIN_SCALE {
                    quantity.rescale(MIN_SCALE);
                }
                Some(Split { date, quantity })
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(Error::Malformed {
                    line,
                    reason: "split has a date but no quantity",
                })
            }
            (None, Some(_)) => {
                return Err(Error::Malformed {
                    line,
                    reason: "split has a quantity but no date",
                })
            }
        };
        let account = AccountInfo {
            name: row.account,
            guid: row.guid,
            account_type: row.account_type,
            placeholder: row.placeholder,
            commodity: row.commodity,
            description: row.description,
        };
        sink.use_split(account, split)?;
    }
    Ok(())
}
