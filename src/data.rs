use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt::Debug;
use thiserror::Error;

/// Quantities read from the ledger are rescaled to at least this many decimal
/// places so that sums and reports keep a uniform cent resolution.
pub const MIN_SCALE: u32 = 2;

/// One signed movement against an account. The ledger only resolves calendar
/// days, so there is no time component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Split {
    pub date: NaiveDate,
    pub quantity: Decimal,
}

/// GnuCash account types, spelled the way the CSV export spells them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum AccountType {
    Asset,
    #[default]
    Bank,
    Cash,
    Credit,
    Equity,
    Expense,
    Income,
    Liability,
    Mutual,
    Payable,
    Receivable,
    Root,
    Stock,
    Trading,
}

/// Account metadata. Every ledger row repeats it, so the optional fields stay
/// optional until the whole file has been read: a row that omits a field does
/// not contradict a row that sets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AccountInfo {
    /// Full, colon separated name; unique key of the account.
    pub name: String,
    pub guid: Option<String>,
    pub account_type: Option<AccountType>,
    pub placeholder: Option<bool>,
    pub commodity: String,
    pub description: Option<String>,
}

impl AccountInfo {
    /// Last component of the full name, e.g. `Savings` for `Assets:Bank:Savings`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type.unwrap_or_default()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.unwrap_or(false)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Folds the metadata of another row for the same account into this one.
    pub fn merge(&mut self, other: AccountInfo) -> Result<(), Error> {
        if self.commodity != other.commodity {
            return Err(self.inconsistent("commodity", &self.commodity, &other.commodity));
        }
        merge_field(&self.name, "guid", &mut self.guid, other.guid)?;
        merge_field(&self.name, "type", &mut self.account_type, other.account_type)?;
        merge_field(&self.name, "placeholder", &mut self.placeholder, other.placeholder)?;
        merge_field(&self.name, "description", &mut self.description, other.description)
    }

    fn inconsistent<T: Debug>(&self, field: &'static str, first: &T, other: &T) -> Error {
        Error::InconsistentAccount {
            account: self.name.clone(),
            field,
            first: format!("{first:?}"),
            other: format!("{other:?}"),
        }
    }
}

fn merge_field<T: Debug + PartialEq>(
    account: &str,
    field: &'static str,
    mine: &mut Option<T>,
    theirs: Option<T>,
) -> Result<(), Error> {
    match (mine.as_ref(), theirs) {
        (Some(first), Some(other)) if *first != other => Err(Error::InconsistentAccount {
            account: account.to_owned(),
            field,
            first: format!("{first:?}"),
            other: format!("{other:?}"),
        }),
        (None, theirs @ Some(_)) => {
            *mine = theirs;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Account {
    pub info: AccountInfo,
    pub splits: Vec<Split>,
}

/// Highest end-of-day balance of one account within one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BalanceResult {
    pub max_balance: Decimal,
    pub max_balance_date: NaiveDate,
}

/// The closed day interval `[year-01-01, year-12-31]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct YearWindow {
    pub year: i32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl YearWindow {
    pub fn new(year: i32) -> Result<Self, Error> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(Error::InvalidYear(year))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(Error::InvalidYear(year))?;
        Ok(Self { year, start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Result reported for an account that never moved within the window.
    pub fn sentinel(&self) -> BalanceResult {
        BalanceResult {
            max_balance: Decimal::ZERO,
            max_balance_date: self.start,
        }
    }
}

/// One row of the ledger CSV export. A row carries the account metadata and,
/// unless it only declares the account, one split.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct LedgerRow {
    pub account: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(rename = "type", default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub placeholder: Option<bool>,
    pub commodity: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

/// Errors raised while loading the ledger or validating the run configuration.
/// Scanning and aggregation work on already validated data; the only failure
/// left to them is decimal overflow.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Line {line}: {reason}")]
    Malformed { line: u64, reason: &'static str },
    #[error("Account {account} has inconsistent {field} ({first} then {other})")]
    InconsistentAccount {
        account: String,
        field: &'static str,
        first: String,
        other: String,
    },
    #[error("Ledger {0} is locked by another process")]
    Locked(String),
    #[error("Year {0} is out of the supported calendar range")]
    InvalidYear(i32),
    #[error("Conversion rate must be positive, got {0}")]
    InvalidConversionRate(Decimal),
    #[error("Decimal overflow while aggregating account {0}")]
    Overflow(String),
    #[error("Running balance overflows on {0}")]
    BalanceOverflow(NaiveDate),
}
