mod cmd;
mod engine;
mod fx;
mod instruments;
mod ledger;
mod tax;
mod transaction;
mod warnings;

use clap::{Parser, Subcommand};

/// Irish tax calculator for capital gains and investment income.
#[derive(Parser, Debug)]
#[command(name = "taxirl", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-year tax report: CGT, fund exit tax and dividend income
    Report(cmd::report::ReportCommand),
    /// Transaction-level view of a single instrument
    Instrument(cmd::instrument::InstrumentCommand),
    /// Export per-year and per-ticker CSV files
    Export(cmd::export::ExportCommand),
    /// Check inputs for data quality issues
    Validate(cmd::validate::ValidateCommand),
    /// Add or update an entry in the instrument cache
    Cache(cmd::cache::CacheCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Report(cmd) => cmd.exec(),
        Command::Instrument(cmd) => cmd.exec(),
        Command::Export(cmd) => cmd.exec(),
        Command::Validate(cmd) => cmd.exec(),
        Command::Cache(cmd) => cmd.exec(),
    }
}
