//! Capital, trade log and equity curve for one symbol, plus the merged
//! universe view.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::position::Trade;
use super::session::build_unified_timeline;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub capital: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub initial_capital: f64,
    capital: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Ledger {
            initial_capital,
            capital: initial_capital,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    /// Appends a closed trade; the only place capital changes.
    pub fn record_trade(&mut self, trade: Trade) {
        debug_assert!(
            self.trades
                .last()
                .is_none_or(|last| last.exit_time <= trade.exit_time),
            "trades must be recorded in exit order"
        );
        self.capital = trade.capital_after;
        self.trades.push(trade);
    }

    /// Samples current capital for `date`, replacing an earlier sample of
    /// the same date.
    pub fn record_equity(&mut self, date: NaiveDate) {
        let capital = self.capital;
        match self.equity_curve.last_mut() {
            Some(last) if last.date == date => last.capital = capital,
            _ => self.equity_curve.push(EquityPoint { date, capital }),
        }
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}

/// All trades of a universe ordered by exit time, ties broken by symbol.
pub fn merge_trades<'a, I>(logs: I) -> Vec<Trade>
where
    I: IntoIterator<Item = &'a [Trade]>,
{
    let mut merged: Vec<Trade> = logs.into_iter().flatten().cloned().collect();
    merged.sort_by(|a, b| {
        a.exit_time
            .cmp(&b.exit_time)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    merged
}

/// Sum of every symbol's capital on each date of the unified timeline.
///
/// A symbol with no sample on a date contributes its most recent earlier
/// sample, or its initial capital before its first one.
pub fn combine_equity<'a, I>(curves: I) -> Vec<EquityPoint>
where
    I: IntoIterator<Item = (f64, &'a [EquityPoint])>,
{
    let curves: Vec<(f64, BTreeMap<NaiveDate, f64>)> = curves
        .into_iter()
        .map(|(initial, points)| {
            (
                initial,
                points.iter().map(|p| (p.date, p.capital)).collect(),
            )
        })
        .collect();

    let timeline = build_unified_timeline(curves.iter().flat_map(|(_, m)| m.keys()));

    timeline
        .into_iter()
        .map(|date| {
            let capital = curves
                .iter()
                .map(|(initial, samples)| {
                    samples
                        .range(..=date)
                        .next_back()
                        .map_or(*initial, |(_, c)| *c)
                })
                .sum();
            EquityPoint { date, capital }
        })
        .collect()
}
