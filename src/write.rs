use crate::{
    aggregate::{Aggregate, ReportRow, REFERENCE_CURRENCY},
    config::Format,
};
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use std::io::Write;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

/// Writes the report: the account rows when the aggregate is reportable,
/// otherwise a single sentence explaining why nothing needs to be reported.
pub(crate) fn write_report<W: Write>(
    mut writer: W,
    report: &Aggregate,
    year: i32,
    format: Format,
) -> Result<(), anyhow::Error> {
    if !report.reportable {
        writeln!(
            writer,
            "Aggregate maximum balance in {year} was {} {REFERENCE_CURRENCY}, below the FBAR \
             threshold of {} {REFERENCE_CURRENCY}; no report required.",
            format_amount(report.total.unwrap_or_default()),
            format_amount(report.threshold),
        )?;
        return Ok(());
    }
    match format {
        Format::Table => write_table(writer, report),
        Format::Csv => write_csv(writer, &report.rows),
    }
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Max Balance")]
    max_balance: String,
    #[tabled(rename = "CUR")]
    currency: String,
    #[tabled(rename = "USD")]
    reference_amount: String,
    #[tabled(rename = "Date")]
    date: NaiveDate,
}

impl From<&ReportRow> for TableRow {
    fn from(row: &ReportRow) -> Self {
        Self {
            account: row.account.clone(),
            max_balance: format_amount(row.max_balance),
            currency: row.currency.clone(),
            reference_amount: row
                .reference_amount
                .map_or_else(|| "N/A".to_owned(), format_amount),
            date: row.date,
        }
    }
}

fn write_table<W: Write>(mut writer: W, report: &Aggregate) -> Result<(), anyhow::Error> {
    let mut table = Table::new(report.rows.iter().map(TableRow::from));
    table
        .with(Style::ascii())
        .modify(Columns::single(1), Alignment::right())
        .modify(Columns::single(3), Alignment::right());
    writeln!(writer, "{table}")?;
    match report.total {
        Some(total) => writeln!(
            writer,
            "Aggregate maximum balance: {} {REFERENCE_CURRENCY}, above the FBAR threshold of {} \
             {REFERENCE_CURRENCY}.",
            format_amount(total),
            format_amount(report.threshold),
        )?,
        None => writeln!(
            writer,
            "No conversion rate given; the FBAR threshold was not assessed."
        )?,
    }
    Ok(())
}

/// Basic CSV exporter for report rows
fn write_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<(), anyhow::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Formats an amount with two decimals, rounded half away from zero, and the
/// `en` thousands separator whatever the user's locale.
pub(crate) fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let units = rounded.trunc().abs();
    let cents = ((rounded.abs() - units) * Decimal::ONE_HUNDRED)
        .to_u32()
        .unwrap_or_default();
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!(
        "{sign}{}.{cents:02}",
        units.to_u128().unwrap_or_default().to_formatted_string(&Locale::en)
    )
}
