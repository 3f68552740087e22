use aggregate::aggregate;
use anyhow::Context;
use clap::Parser;
use compute::scan;
use config::{Cli, Config};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use write::write_report;

mod aggregate;
mod compute;
mod config;
mod data;
mod ledger;
mod read;
mod write;

fn main() -> Result<(), anyhow::Error> {
    let config = Config::try_from(Cli::parse())?;
    init_tracing(config.verbose)?;

    let ledger = ledger::open(&config.path, config.open_options)
        .with_context(|| format!("cannot read ledger {}", config.path.display()))?;
    let results = ledger
        .accounts(&config.selector)
        .map(|account| {
            let result = scan(&account.splits, config.window)
                .with_context(|| format!("cannot scan account {}", account.info.name))?;
            debug!(
                account = %account.info.name,
                max_balance = %result.max_balance,
                date = %result.max_balance_date,
                "scanned"
            );
            Ok((account, result))
        })
        .collect::<Result<Vec<_>, anyhow::Error>>()?;
    let report = aggregate(results, config.rate)?;
    write_report(
        std::io::stdout().lock(),
        &report,
        config.window.year,
        config.format,
    )?;
    Ok(())
}

/// Logs go to stderr so that stdout only carries the report. `RUST_LOG` still
/// applies on top of the verbosity flag.
fn init_tracing(verbose: bool) -> Result<(), anyhow::Error> {
    let level = if verbose { "fbar=debug" } else { "fbar=warn" };
    let filter = EnvFilter::from_default_env().add_directive(level.parse()?);
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
