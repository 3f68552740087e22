use crate::{
    data::{Error, YearWindow},
    ledger::{OpenOptions, Selector},
};
use chrono::{Datelike, Local};
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Description tag selecting accounts when no other selection is given.
pub const DEFAULT_TAG: &str = "FBAR";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    Table,
    Csv,
}

#[derive(Parser, Debug)]
#[command(
    name = "fbar",
    version,
    about = "Maximum yearly balances of ledger accounts, checked against the FBAR threshold",
    long_about = "Reads a ledger CSV export, finds the highest end-of-day balance of each \
                  selected account during the year and tells whether their aggregate, \
                  converted to USD, exceeds the 10,000 USD FBAR reporting threshold."
)]
pub(crate) struct Cli {
    /// Ledger CSV export
    pub dbfile: PathBuf,

    /// Year to analyse [default: current year]
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Local currency units per 1 USD
    #[arg(short, long, env = "FBAR_CONVERSION")]
    pub conversion: Option<Decimal>,

    /// Select accounts whose description contains this tag [default: FBAR]
    #[arg(short, long, conflicts_with_all = ["account", "guid", "parent"])]
    pub tag: Option<String>,

    /// Select one account by full or short name
    #[arg(long, conflicts_with_all = ["guid", "parent"])]
    pub account: Option<String>,

    /// Select one account by identifier
    #[arg(long, conflicts_with = "parent")]
    pub guid: Option<String>,

    /// Select every bank account below this parent account
    #[arg(long)]
    pub parent: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Refuse to read a ledger locked by another process
    #[arg(long)]
    pub respect_lock: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Config {
    pub path: PathBuf,
    pub window: YearWindow,
    pub rate: Option<Decimal>,
    pub selector: Selector,
    pub format: Format,
    pub open_options: OpenOptions,
    pub verbose: bool,
}

impl TryFrom<Cli> for Config {
    type Error = Error;

    fn try_from(cli: Cli) -> Result<Self, Error> {
        let window = YearWindow::new(cli.year.unwrap_or_else(|| Local::now().year()))?;
        if let Some(rate) = cli.conversion {
            if rate <= Decimal::ZERO {
                return Err(Error::InvalidConversionRate(rate));
            }
        }
        let selector = match (cli.account, cli.guid, cli.parent, cli.tag) {
            (Some(name), ..) => Selector::Name(name),
            (_, Some(guid), ..) => Selector::Guid(guid),
            (_, _, Some(parent), _) => Selector::Parent(parent),
            (_, _, _, tag) => Selector::Tag(tag.unwrap_or_else(|| DEFAULT_TAG.to_owned())),
        };
        Ok(Self {
            path: cli.dbfile,
            window,
            rate: cli.conversion,
            selector,
            format: cli.format,
            open_options: OpenOptions {
                tolerate_lock: !cli.respect_lock,
            },
            verbose: cli.verbose,
        })
    }
}
