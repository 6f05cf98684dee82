//! Trade statistics derived purely from a trade sequence.

use std::collections::BTreeMap;

use super::position::Trade;
use super::signal::{Direction, ExitReason};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStats {
    pub total_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub total_gross_pnl: f64,
    pub total_commission: f64,
    pub total_net_pnl: f64,
    pub avg_net_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub avg_hold_minutes: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    /// Largest peak-to-trough fall of realized capital, as a fraction.
    pub max_drawdown: f64,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
}

impl LedgerStats {
    /// Statistics over `trades` in the order given, starting from
    /// `initial_capital`.
    pub fn compute(trades: &[Trade], initial_capital: f64) -> Self {
        let mut long_trades = 0usize;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total_gross_pnl = 0.0_f64;
        let mut total_commission = 0.0_f64;
        let mut total_hold = 0.0_f64;
        let mut best_trade = f64::NEG_INFINITY;
        let mut worst_trade = f64::INFINITY;
        let mut exit_reasons = BTreeMap::new();

        for trade in trades {
            let pnl = trade.net_pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
            } else {
                trades_breakeven += 1;
            }
            if trade.direction == Direction::Long {
                long_trades += 1;
            }
            best_trade = best_trade.max(pnl);
            worst_trade = worst_trade.min(pnl);
            total_gross_pnl += trade.gross_pnl;
            total_commission += trade.commission;
            total_hold += trade.hold_minutes();
            *exit_reasons.entry(trade.exit_reason).or_insert(0) += 1;
        }

        let total_trades = trades.len();
        let total_net_pnl = total_wins - total_losses;
        let per_trade = |total: f64, n: usize| if n > 0 { total / n as f64 } else { 0.0 };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let final_capital = initial_capital + total_net_pnl;
        let total_return = if initial_capital > 0.0 {
            total_net_pnl / initial_capital
        } else {
            0.0
        };

        LedgerStats {
            total_trades,
            long_trades,
            short_trades: total_trades - long_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: per_trade(trades_won as f64, total_trades),
            total_gross_pnl,
            total_commission,
            total_net_pnl,
            avg_net_pnl: per_trade(total_net_pnl, total_trades),
            best_trade: if total_trades > 0 { best_trade } else { 0.0 },
            worst_trade: if total_trades > 0 { worst_trade } else { 0.0 },
            avg_win: per_trade(total_wins, trades_won),
            avg_loss: per_trade(total_losses, trades_lost),
            profit_factor,
            avg_hold_minutes: per_trade(total_hold, total_trades),
            exit_reasons,
            max_drawdown: compute_drawdown(trades, initial_capital),
            initial_capital,
            final_capital,
            total_return,
        }
    }

    pub fn exit_count(&self, reason: ExitReason) -> usize {
        self.exit_reasons.get(&reason).copied().unwrap_or(0)
    }

    /// Per-symbol statistics, each symbol starting from `initial_capital`.
    pub fn per_symbol(trades: &[Trade], initial_capital: f64) -> BTreeMap<String, LedgerStats> {
        let mut grouped: BTreeMap<&str, Vec<Trade>> = BTreeMap::new();
        for trade in trades {
            grouped
                .entry(trade.symbol.as_str())
                .or_default()
                .push(trade.clone());
        }
        grouped
            .into_iter()
            .map(|(symbol, trades)| {
                (
                    symbol.to_string(),
                    LedgerStats::compute(&trades, initial_capital),
                )
            })
            .collect()
    }
}

/// Max drawdown of the realized capital path: initial capital followed by
/// the running total after each trade.
fn compute_drawdown(trades: &[Trade], initial_capital: f64) -> f64 {
    let mut capital = initial_capital;
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;

    for trade in trades {
        capital += trade.net_pnl;
        if capital > peak {
            peak = capital;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - capital) / peak);
        }
    }

    max_dd
}
