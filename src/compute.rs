use crate::data::{BalanceResult, Error, Split, YearWindow};
use rust_decimal::Decimal;

/// This is where the business logic stands: the highest balance an account
/// reached within `window`, and the day it was reached.
///
/// The ledger only knows calendar days, so the order of splits within a day
/// means nothing; splits are therefore grouped per day and only the balance
/// at the end of each day is looked at. Everything dated before the window
/// seeds the opening balance, everything after it is ignored.
///
/// When no split falls in the window, the result is the window's sentinel
/// `(0, year-01-01)`. The only failure is a running balance that no longer
/// fits in a `Decimal`.
pub(crate) fn scan(splits: &[Split], window: YearWindow) -> Result<BalanceResult, Error> {
    let mut sorted = splits.to_vec();
    sorted.sort_by_key(|split| split.date);

    let mut balance = Decimal::ZERO;
    let mut result = window.sentinel();
    for day in sorted.chunk_by(|a, b| a.date == b.date) {
        let date = day[0].date;
        if date > window.end {
            break;
        }
        balance = day
            .iter()
            .try_fold(balance, |sum, split| sum.checked_add(split.quantity))
            .ok_or(Error::BalanceOverflow(date))?;
        if window.contains(date) && balance > result.max_balance {
            result = BalanceResult {
                max_balance: balance,
                max_balance_date: date,
            };
        }
    }
    Ok(result)
}
