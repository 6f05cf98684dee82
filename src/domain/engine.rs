//! Per-symbol event loop and the universe runner.
//!
//! A [`Simulator`] replays one symbol's bars in a single forward pass. At
//! each date change the previous day is closed out (equity sampled) and a
//! fresh [`DayContext`] starts, so indicator state never leaks across days.
//! For every bar, in order:
//!
//! 1. feed validation against the previous bar
//! 2. indicator update
//! 3. excursion update and exit check for an open position
//! 4. entry check when flat and under the daily cap
//!
//! Symbols are independent; [`run_universe`] runs them on the rayon pool
//! (or sequentially) and merges the results afterwards.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::bar::Bar;
use super::config::EngineConfig;
use super::error::{DataQualityIssue, VwaptraderError};
use super::indicator::DayContext;
use super::ledger::{combine_equity, merge_trades, EquityPoint, Ledger};
use super::metrics::LedgerStats;
use super::position::{EntryRequest, EntryResult, PositionSlot, Trade};
use super::session::check_next;
use super::signal::{evaluate_entry, evaluate_exit, ExitReason};
use super::sizing::Sizer;

/// Output of one symbol's run.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRun {
    pub symbol: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub bars_processed: usize,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl SymbolRun {
    pub fn stats(&self) -> LedgerStats {
        LedgerStats::compute(&self.trades, self.initial_capital)
    }
}

pub struct Simulator<'a> {
    symbol: String,
    config: &'a EngineConfig,
    sizer: &'a dyn Sizer,
    scale: f64,
    ledger: Ledger,
    slot: PositionSlot,
    day: Option<DayContext>,
    entries_today: usize,
    bars_processed: usize,
}

impl<'a> Simulator<'a> {
    pub fn new(
        symbol: impl Into<String>,
        config: &'a EngineConfig,
        sizer: &'a dyn Sizer,
    ) -> Result<Self, VwaptraderError> {
        config.validate()?;
        let symbol = symbol.into();
        Ok(Simulator {
            scale: config.size_scale(&symbol),
            symbol,
            config,
            sizer,
            ledger: Ledger::new(config.initial_capital),
            slot: PositionSlot::Flat,
            day: None,
            entries_today: 0,
            bars_processed: 0,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn capital(&self) -> f64 {
        self.ledger.capital()
    }

    pub fn slot(&self) -> &PositionSlot {
        &self.slot
    }

    /// Processes the next bar of the feed.
    pub fn step(&mut self, bar: Bar) -> Result<(), VwaptraderError> {
        let previous = self.day.as_ref().and_then(|d| d.view().bars.last());
        check_next(&self.symbol, previous, &bar)
            .map_err(|issue| VwaptraderError::data_quality(&self.symbol, issue))?;

        let date = bar.date();
        let new_day = self.day.as_ref().is_none_or(|d| d.date() != date);
        if new_day {
            if let Some(finished) = self.day.take() {
                self.ledger.record_equity(finished.date());
            }
            self.day = Some(DayContext::new(date, self.config.indicators));
            self.entries_today = 0;
        }
        let Some(ctx) = self.day.as_mut() else {
            return Ok(());
        };

        ctx.push(bar);
        self.bars_processed += 1;

        let view = ctx.view();
        let i = view.len() - 1;
        let (bar, indicators) = view.at(i);
        let signals = &self.config.signals;

        if let Some(position) = self.slot.position_mut() {
            position.track_excursion(bar);
            if let Some(reason) = evaluate_exit(position, view, i, signals) {
                let capital = self.ledger.capital();
                if let Some(trade) = self.slot.close(
                    bar,
                    indicators.vwap,
                    reason,
                    self.config.commission_per_share,
                    capital,
                ) {
                    debug!(
                        symbol = %self.symbol,
                        time = %trade.exit_time,
                        reason = %trade.exit_reason,
                        price = trade.exit_price,
                        net_pnl = trade.net_pnl,
                        "closed position"
                    );
                    self.ledger.record_trade(trade);
                }
            }
        }

        let under_cap = self
            .config
            .max_trades_per_day
            .is_none_or(|cap| self.entries_today < cap);
        if !self.slot.is_open() && under_cap {
            if let Some(direction) = evaluate_entry(view, i, signals) {
                let request = EntryRequest {
                    bar,
                    indicators,
                    direction,
                    index: i,
                };
                match self
                    .slot
                    .try_enter(request, self.sizer, self.ledger.capital(), self.scale)
                {
                    EntryResult::Entered { shares, price } => {
                        self.entries_today += 1;
                        debug!(
                            symbol = %self.symbol,
                            time = %bar.timestamp,
                            %direction,
                            price,
                            shares,
                            vwap = indicators.vwap,
                            "opened position"
                        );
                    }
                    EntryResult::ZeroShares => {
                        debug!(
                            symbol = %self.symbol,
                            time = %bar.timestamp,
                            sizer = self.sizer.name(),
                            "entry skipped, sized to zero shares"
                        );
                    }
                    EntryResult::AlreadyOpen => {}
                }
            }
        }

        Ok(())
    }

    /// Liquidates any open position at the last bar and closes the final day.
    pub fn finish(mut self) -> Result<SymbolRun, VwaptraderError> {
        let Some(ctx) = self.day.take() else {
            return Err(VwaptraderError::data_quality(
                &self.symbol,
                DataQualityIssue::EmptySession,
            ));
        };

        let view = ctx.view();
        if let Some(i) = view.len().checked_sub(1) {
            let (bar, indicators) = view.at(i);
            let capital = self.ledger.capital();
            if let Some(trade) = self.slot.close(
                bar,
                indicators.vwap,
                ExitReason::EndOfData,
                self.config.commission_per_share,
                capital,
            ) {
                debug!(
                    symbol = %self.symbol,
                    time = %trade.exit_time,
                    net_pnl = trade.net_pnl,
                    "liquidated at end of data"
                );
                self.ledger.record_trade(trade);
            }
        }
        self.ledger.record_equity(ctx.date());

        let initial_capital = self.ledger.initial_capital;
        let final_capital = self.ledger.capital();
        let (trades, equity_curve) = self.ledger.into_parts();
        info!(
            symbol = %self.symbol,
            bars = self.bars_processed,
            trades = trades.len(),
            final_capital,
            "symbol run complete"
        );

        Ok(SymbolRun {
            symbol: self.symbol,
            initial_capital,
            final_capital,
            bars_processed: self.bars_processed,
            trades,
            equity_curve,
        })
    }
}

/// Runs one symbol with the configured sizing policy.
pub fn run_symbol(
    symbol: &str,
    bars: Vec<Bar>,
    config: &EngineConfig,
) -> Result<SymbolRun, VwaptraderError> {
    run_symbol_with_sizer(symbol, bars, config, &config.sizing)
}

/// Runs one symbol with a caller-supplied sizer.
pub fn run_symbol_with_sizer(
    symbol: &str,
    bars: Vec<Bar>,
    config: &EngineConfig,
    sizer: &dyn Sizer,
) -> Result<SymbolRun, VwaptraderError> {
    let mut sim = Simulator::new(symbol, config, sizer)?;
    for bar in bars {
        sim.step(bar)?;
    }
    sim.finish()
}

/// Merged results of a multi-symbol run.
#[derive(Debug)]
pub struct UniverseRun {
    /// Successful runs, in input order.
    pub runs: Vec<SymbolRun>,
    /// Symbols whose feed could not be loaded or failed validation.
    pub failures: Vec<(String, VwaptraderError)>,
    /// All trades ordered by exit time, then symbol.
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl UniverseRun {
    pub fn initial_capital(&self) -> f64 {
        self.runs.iter().map(|r| r.initial_capital).sum()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats::compute(&self.trades, self.initial_capital())
    }
}

/// Runs every symbol independently, each with its own capital.
///
/// A feed that failed to load, or a symbol whose bars fail validation, is
/// recorded in `failures` without affecting the others. Configuration
/// errors abort before any symbol runs.
pub fn run_universe<I>(
    feeds: I,
    config: &EngineConfig,
    parallel: bool,
) -> Result<UniverseRun, VwaptraderError>
where
    I: IntoIterator<Item = (String, Result<Vec<Bar>, VwaptraderError>)>,
{
    config.validate()?;

    let feeds: Vec<_> = feeds.into_iter().collect();
    let run_one = |(symbol, feed): (String, Result<Vec<Bar>, VwaptraderError>)| {
        let result = feed.and_then(|bars| run_symbol(&symbol, bars, config));
        (symbol, result)
    };
    let results: Vec<(String, Result<SymbolRun, VwaptraderError>)> = if parallel {
        feeds.into_par_iter().map(run_one).collect()
    } else {
        feeds.into_iter().map(run_one).collect()
    };

    let mut runs = Vec::new();
    let mut failures = Vec::new();
    for (symbol, result) in results {
        match result {
            Ok(run) => runs.push(run),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol");
                failures.push((symbol, e));
            }
        }
    }

    let trades = merge_trades(runs.iter().map(|r| r.trades.as_slice()));
    let equity_curve = combine_equity(
        runs.iter()
            .map(|r| (r.initial_capital, r.equity_curve.as_slice())),
    );
    info!(
        symbols = runs.len(),
        failed = failures.len(),
        trades = trades.len(),
        "universe run complete"
    );

    Ok(UniverseRun {
        runs,
        failures,
        trades,
        equity_curve,
    })
}
