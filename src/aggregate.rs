use crate::data::{Account, BalanceResult, Error};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

/// Aggregate maximum value, in reference currency, above which the accounts
/// have to be reported.
pub const FBAR_THRESHOLD: Decimal = dec!(10000);

/// Currency the conversion rate converts into.
pub const REFERENCE_CURRENCY: &str = "USD";

/// One reported account. `reference_amount` is `None` when no conversion rate
/// was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "RowSerializer")]
pub(crate) struct ReportRow {
    pub account: String,
    pub max_balance: Decimal,
    pub currency: String,
    pub reference_amount: Option<Decimal>,
    pub date: NaiveDate,
}

/// Proxy for serializing `ReportRow`: a missing reference amount is written as
/// `N/A` rather than as an empty field.
#[derive(Serialize)]
pub(crate) struct RowSerializer {
    pub account: String,
    pub max_balance: Decimal,
    pub currency: String,
    #[serde(rename = "usd")]
    pub reference_amount: String,
    pub date: NaiveDate,
}

impl From<ReportRow> for RowSerializer {
    fn from(row: ReportRow) -> Self {
        Self {
            account: row.account,
            max_balance: row.max_balance,
            currency: row.currency,
            reference_amount: row.reference_amount.map_or_else(
                || "N/A".to_owned(),
                |amount| {
                    amount
                        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                        .to_string()
                },
            ),
            date: row.date,
        }
    }
}

/// Outcome of a run. `total` is `None` when no conversion rate was given, in
/// which case the accounts are always reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Aggregate {
    pub rows: Vec<ReportRow>,
    pub total: Option<Decimal>,
    pub threshold: Decimal,
    pub reportable: bool,
}

/// Running sum of the converted maxima, fed one account at a time.
#[derive(Debug, Clone)]
pub(crate) struct AggregateState {
    rate: Option<Decimal>,
    threshold: Decimal,
    total: Decimal,
    rows: Vec<ReportRow>,
}

impl AggregateState {
    /// `rate` is in local currency units per one reference unit.
    pub fn new(rate: Option<Decimal>) -> Self {
        Self {
            rate,
            threshold: FBAR_THRESHOLD,
            total: Decimal::ZERO,
            rows: Vec::new(),
        }
    }

    pub fn add(&mut self, account: &Account, result: BalanceResult) -> Result<(), Error> {
        if result.max_balance <= Decimal::ZERO {
            debug!(account = %account.info.name, "no positive balance, skipped");
            return Ok(());
        }
        let overflow = || Error::Overflow(account.info.name.clone());
        let reference_amount = match self.rate {
            Some(rate) => {
                let amount = result.max_balance.checked_div(rate).ok_or_else(overflow)?;
                self.total = self.total.checked_add(amount).ok_or_else(overflow)?;
                Some(amount)
            }
            None => None,
        };
        self.rows.push(ReportRow {
            account: account.info.short_name().to_owned(),
            max_balance: result.max_balance,
            currency: account.info.commodity.clone(),
            reference_amount,
            date: result.max_balance_date,
        });
        Ok(())
    }

    pub fn finish(self) -> Aggregate {
        let total = self.rate.map(|_| self.total);
        let reportable = total.map_or(true, |total| total > self.threshold);
        Aggregate {
            rows: if reportable { self.rows } else { Vec::new() },
            total,
            threshold: self.threshold,
            reportable,
        }
    }
}

/// Folds per-account results into the report rows and the threshold verdict.
pub(crate) fn aggregate<'a, I>(results: I, rate: Option<Decimal>) -> Result<Aggregate, Error>
where
    I: IntoIterator<Item = (&'a Account, BalanceResult)>,
{
    let mut state = AggregateState::new(rate);
    for (account, result) in results {
        state.add(account, result)?;
    }
    Ok(state.finish())
}
