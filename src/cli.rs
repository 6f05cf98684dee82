//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::bar::Bar;
use crate::domain::config::EngineConfig;
use crate::domain::config_validation::{
    build_engine_config, build_session_window, build_symbols, SessionWindow,
};
use crate::domain::engine::{run_universe, UniverseRun};
use crate::domain::error::VwaptraderError;
use crate::domain::imbalance::{analyze_imbalance, average_split};
use crate::domain::metrics::LedgerStats;
use crate::domain::session::SymbolData;
use crate::domain::signal::ExitReason;
use crate::domain::universe::{load_feeds, parse_symbols};
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "vwaptrader", about = "Intraday VWAP strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over minute-bar CSV files
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one <SYMBOL>.csv per symbol
        #[arg(short, long)]
        data: PathBuf,
        /// Comma-separated symbols, overriding the config
        #[arg(long)]
        symbols: Option<String>,
        /// Run symbols one after another instead of in parallel
        #[arg(long)]
        sequential: bool,
        /// Print every closed trade
        #[arg(long)]
        trades: bool,
        /// Print the daily VWAP imbalance summary per symbol
        #[arg(long)]
        imbalance: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in a data directory
    ListSymbols {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            symbols,
            sequential,
            trades,
            imbalance,
        } => run_backtest(&BacktestArgs {
            config,
            data,
            symbols,
            parallel: !sequential,
            print_trades: trades,
            print_imbalance: imbalance,
        }),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data } => run_list_symbols(data),
    }
}

#[derive(Debug, Clone)]
pub struct BacktestArgs {
    pub config: PathBuf,
    pub data: PathBuf,
    pub symbols: Option<String>,
    pub parallel: bool,
    pub print_trades: bool,
    pub print_imbalance: bool,
}

/// Everything a backtest needs from the config file.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub engine: EngineConfig,
    pub session: SessionWindow,
    pub symbols: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<LoadedConfig, VwaptraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    Ok(LoadedConfig {
        engine: build_engine_config(&adapter)?,
        session: build_session_window(&adapter)?,
        symbols: build_symbols(&adapter)?,
    })
}

/// CLI override first, then the config list, then every file in the feed.
pub fn resolve_symbols(
    cli_symbols: Option<&str>,
    configured: &[String],
    data_port: &dyn DataPort,
) -> Result<Vec<String>, VwaptraderError> {
    if let Some(list) = cli_symbols {
        return parse_symbols(list)
            .map_err(|e| VwaptraderError::invalid("backtest", "symbols", e.to_string()));
    }
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    data_port.list_symbols()
}

/// Loads config and data and runs the engine.
pub fn execute_backtest(args: &BacktestArgs) -> Result<UniverseRun, VwaptraderError> {
    let loaded = load_config(&args.config)?;
    let data_port = CsvAdapter::new(args.data.clone(), loaded.session);

    let symbols = resolve_symbols(args.symbols.as_deref(), &loaded.symbols, &data_port)?;
    if symbols.is_empty() {
        return Err(VwaptraderError::ConfigMissing {
            section: "backtest".into(),
            key: "symbols".into(),
        });
    }

    eprintln!(
        "Running {} symbol(s): {}",
        symbols.len(),
        symbols.join(", ")
    );
    let feeds = load_feeds(&data_port, &symbols);

    if args.print_imbalance {
        print_imbalance(&feeds, &loaded.engine);
    }

    run_universe(feeds, &loaded.engine, args.parallel)
}

fn run_backtest(args: &BacktestArgs) -> ExitCode {
    eprintln!("Loading config from {}", args.config.display());
    let universe = match execute_backtest(args) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for (symbol, e) in &universe.failures {
        eprintln!("warning: skipped {symbol} ({e})");
    }
    if universe.runs.is_empty() {
        eprintln!("error: no symbol produced a result");
        return ExitCode::from(5);
    }

    if args.print_trades {
        print_trades(&universe);
    }
    print_summary(&universe);
    ExitCode::SUCCESS
}

fn print_imbalance(
    feeds: &[(String, Result<Vec<Bar>, VwaptraderError>)],
    engine: &EngineConfig,
) {
    eprintln!("\n=== VWAP Imbalance ===");
    for (symbol, feed) in feeds {
        let Ok(bars) = feed else { continue };
        let Ok(data) = SymbolData::new(symbol.as_str(), bars.clone()) else {
            continue;
        };
        let days = analyze_imbalance(&data, &engine.indicators);
        let (above, below) = average_split(&days);
        eprintln!(
            "  {}: {} days, avg above {:.1}%, avg below {:.1}%",
            symbol,
            days.len(),
            above,
            below
        );
    }
}

fn print_trades(universe: &UniverseRun) {
    eprintln!("\n=== Trades ===");
    for t in &universe.trades {
        eprintln!(
            "  {} {:<5} {} -> {}  x{} @ {:.2} -> {:.2}  net {:+.2}  [{}]",
            t.symbol,
            t.direction,
            t.entry_time,
            t.exit_time,
            t.shares,
            t.entry_price,
            t.exit_price,
            t.net_pnl,
            t.exit_reason,
        );
    }
}

fn print_stats(stats: &LedgerStats) {
    eprintln!("Final Capital:    {:.2}", stats.final_capital);
    eprintln!("Total Return:     {:.2}%", stats.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", stats.max_drawdown * 100.0);
    eprintln!(
        "Total Trades:     {} ({} long, {} short)",
        stats.total_trades, stats.long_trades, stats.short_trades
    );
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", stats.profit_factor);
    eprintln!("Avg Winner:       {:.2}", stats.avg_win);
    eprintln!("Avg Loser:        -{:.2}", stats.avg_loss);
    eprintln!("Best / Worst:     {:.2} / {:.2}", stats.best_trade, stats.worst_trade);
    eprintln!("Avg Hold:         {:.1} min", stats.avg_hold_minutes);
    eprintln!("Commission:       {:.2}", stats.total_commission);
}

fn print_summary(universe: &UniverseRun) {
    let stats = universe.stats();

    eprintln!("\n=== Aggregate Results ===");
    print_stats(&stats);

    if !stats.exit_reasons.is_empty() {
        eprintln!("\n=== Exit Reasons ===");
        for (reason, count) in &stats.exit_reasons {
            eprintln!("  {:<22} {}", reason.tag(), count);
        }
    }

    eprintln!("\n=== Per-Symbol Summary ===");
    for run in &universe.runs {
        let s = run.stats();
        let pnl_sign = if s.total_net_pnl >= 0.0 { "+" } else { "" };
        eprintln!(
            "  {}:  {} trades, {:.1}% win rate, {}${:.0}, {} end-of-data",
            run.symbol,
            s.total_trades,
            s.win_rate * 100.0,
            pnl_sign,
            s.total_net_pnl,
            s.exit_count(ExitReason::EndOfData),
        );
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let loaded = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let engine = &loaded.engine;
    let signals = &engine.signals;
    eprintln!("Config validated successfully");
    eprintln!(
        "\nSession:    {} - {}",
        loaded.session.start, loaded.session.end
    );
    eprintln!(
        "Entries:    {} - {}, buffer {}, volume x{}",
        signals.entry_start, signals.entry_end, signals.vwap_buffer, signals.volume_multiplier
    );
    eprintln!("VWAP stop:  {:?}", signals.vwap_stop);
    eprintln!("Sizing:     {}", engine.sizing);
    if loaded.symbols.is_empty() {
        eprintln!("Symbols:    (all files in data directory)");
    } else {
        eprintln!("Symbols:    {}", loaded.symbols.join(", "));
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(data: PathBuf) -> ExitCode {
    let adapter = CsvAdapter::new(data, SessionWindow::default());
    match adapter.list_symbols() {
        Ok(symbols) => {
            for symbol in symbols {
                println!("{symbol}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
