//! CLI definition and dispatch.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use crate::adapters::csv_adapter::CsvBarAdapter;
use crate::domain::backtest::{self, RunConfig};
use crate::domain::error::StratsimError;
use crate::domain::strategy::StrategyDsl;
use crate::domain::validate::{Severity, validate};
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "stratsim", about = "Strategy rule DSL compiler and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a strategy document
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Compile a strategy and run it over a bar series
    Backtest {
        #[arg(short, long)]
        strategy: PathBuf,
        /// CSV bar file (time,open,high,low,close[,volume])
        #[arg(short, long)]
        bars: PathBuf,
        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,
        /// Inclusive range start, e.g. 2024-01-15T09:15:00
        #[arg(long)]
        from: Option<NaiveDateTime>,
        /// Inclusive range end
        #[arg(long)]
        to: Option<NaiveDateTime>,
        /// Write the full result (trades, equity curve, summary) as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Backtest {
            strategy,
            bars,
            capital,
            from,
            to,
            output,
        } => run_backtest(&strategy, &bars, capital, from, to, output.as_deref()),
    }
}

fn load_strategy(path: &Path) -> Result<StrategyDsl, ExitCode> {
    let content = fs::read_to_string(path).map_err(|e| {
        let err = StratsimError::from(e);
        eprintln!("error reading {}: {err}", path.display());
        ExitCode::from(&err)
    })?;
    serde_json::from_str(&content).map_err(|e| {
        let err = StratsimError::from(e);
        eprintln!("error parsing {}: {err}", path.display());
        ExitCode::from(&err)
    })
}

fn run_validate(strategy_path: &Path) -> ExitCode {
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let issues = validate(&strategy);
    for issue in &issues {
        let label = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("{label} {}: {}", issue.path, issue.message);
    }

    if issues.iter().any(|i| i.severity == Severity::Error) {
        ExitCode::from(3)
    } else {
        println!("{}: ok", strategy.name);
        ExitCode::SUCCESS
    }
}

fn run_backtest(
    strategy_path: &Path,
    bars_path: &Path,
    capital: f64,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
    output_path: Option<&Path>,
) -> ExitCode {
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    eprintln!("Loaded strategy: {}", strategy.name);

    let Some(symbol) = bars_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        eprintln!("error: {} has no file name", bars_path.display());
        return ExitCode::from(4);
    };
    let base = bars_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let adapter = CsvBarAdapter::new(base);

    let bars = match adapter.fetch_bars(&symbol, from, to) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    eprintln!("Loaded {} bars from {}", bars.len(), bars_path.display());

    let config = RunConfig {
        initial_capital: capital,
        cancel: None,
    };
    let result = match backtest::run(&strategy, &bars, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let s = &result.summary;
    println!("Trades:        {}", s.total_trades);
    println!("Win rate:      {:.1}%", s.win_rate * 100.0);
    println!("Net P&L:       {:.2}", s.net_pnl);
    println!("Charges:       {:.2}", s.total_charges);
    println!("Profit factor: {:.2}", s.profit_factor);
    println!("Max drawdown:  {:.2}%", s.max_drawdown * 100.0);
    println!("Final equity:  {:.2}", s.final_equity);
    if result.diagnostics.fault_count > 0 {
        eprintln!(
            "warning: {} rule evaluation fault(s), first: {}",
            result.diagnostics.fault_count,
            result.diagnostics.first_fault.as_deref().unwrap_or("unknown")
        );
    }

    if let Some(path) = output_path {
        let json = match serde_json::to_string_pretty(&result) {
            Ok(json) => json,
            Err(e) => {
                let err = StratsimError::from(e);
                eprintln!("error: {err}");
                return ExitCode::from(&err);
            }
        };
        if let Err(e) = fs::write(path, json) {
            let err = StratsimError::from(e);
            eprintln!("error writing {}: {err}", path.display());
            return ExitCode::from(&err);
        }
        eprintln!("Result written to {}", path.display());
    }

    ExitCode::SUCCESS
}
