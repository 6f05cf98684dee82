//! Per-symbol position state: at most one open position, opened by sizing
//! a signal and closed into an immutable [`Trade`].

use chrono::NaiveDateTime;

use super::bar::Bar;
use super::indicator::IndicatorSet;
use super::signal::{Direction, ExitReason};
use super::sizing::{size_position, Sizer};

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub entry_vwap: f64,
    pub shares: i64,
    /// Highest high since entry for longs, lowest low for shorts.
    pub best_price: f64,
    /// Index of the entry bar within its session.
    pub entry_index: usize,
}

impl Position {
    pub fn minutes_held(&self, now: NaiveDateTime) -> f64 {
        (now - self.entry_time).num_seconds() as f64 / 60.0
    }

    /// Directional fractional return at `price`.
    pub fn return_at(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) / self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.shares as f64
    }

    /// Extends the best excursion with a bar's high or low.
    pub fn track_excursion(&mut self, bar: &Bar) {
        self.best_price = match self.direction {
            Direction::Long => self.best_price.max(bar.high),
            Direction::Short => self.best_price.min(bar.low),
        };
    }

    /// `close` has retraced at least `trail` from the best excursion.
    pub fn trailing_stop_hit(&self, close: f64, trail: f64) -> bool {
        match self.direction {
            Direction::Long => close <= self.best_price * (1.0 - trail),
            Direction::Short => close >= self.best_price * (1.0 + trail),
        }
    }
}

/// A closed round trip. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_vwap: f64,
    pub exit_vwap: f64,
    pub shares: i64,
    pub gross_pnl: f64,
    pub commission: f64,
    pub net_pnl: f64,
    /// Net PnL as a fraction of entry notional.
    pub return_pct: f64,
    pub exit_reason: ExitReason,
    /// Symbol capital after this trade's PnL was applied.
    pub capital_after: f64,
}

impl Trade {
    pub fn hold_minutes(&self) -> f64 {
        (self.exit_time - self.entry_time).num_seconds() as f64 / 60.0
    }

    pub fn is_win(&self) -> bool {
        self.net_pnl > 0.0
    }
}

/// What happened to an entry request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryResult {
    Entered { shares: i64, price: f64 },
    /// Sizing produced no shares; the signal is dropped.
    ZeroShares,
    AlreadyOpen,
}

/// An entry signal ready to be sized.
#[derive(Debug, Clone, Copy)]
pub struct EntryRequest<'a> {
    pub bar: &'a Bar,
    pub indicators: &'a IndicatorSet,
    pub direction: Direction,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PositionSlot {
    #[default]
    Flat,
    Open(Position),
}

impl PositionSlot {
    pub fn is_open(&self) -> bool {
        matches!(self, PositionSlot::Open(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionSlot::Open(p) => Some(p),
            PositionSlot::Flat => None,
        }
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        match self {
            PositionSlot::Open(p) => Some(p),
            PositionSlot::Flat => None,
        }
    }

    /// Sizes and opens a position at the request bar's close.
    pub fn try_enter(
        &mut self,
        request: EntryRequest<'_>,
        sizer: &dyn Sizer,
        capital: f64,
        scale: f64,
    ) -> EntryResult {
        if self.is_open() {
            return EntryResult::AlreadyOpen;
        }

        let bar = request.bar;
        let price = bar.close;
        let shares = size_position(sizer, capital, price, request.indicators, scale);
        if shares == 0 {
            return EntryResult::ZeroShares;
        }

        let best_price = match request.direction {
            Direction::Long => bar.high,
            Direction::Short => bar.low,
        };
        *self = PositionSlot::Open(Position {
            symbol: bar.symbol.clone(),
            direction: request.direction,
            entry_time: bar.timestamp,
            entry_price: price,
            entry_vwap: request.indicators.vwap,
            shares,
            best_price,
            entry_index: request.index,
        });
        EntryResult::Entered { shares, price }
    }

    /// Closes the open position at `bar`'s close. Returns `None` when flat.
    ///
    /// Commission is charged per share on both legs. `capital` is the
    /// symbol capital before the trade; the trade records the result.
    pub fn close(
        &mut self,
        bar: &Bar,
        exit_vwap: f64,
        reason: ExitReason,
        commission_per_share: f64,
        capital: f64,
    ) -> Option<Trade> {
        let PositionSlot::Open(position) = std::mem::take(self) else {
            return None;
        };

        let exit_price = bar.close;
        let shares = position.shares as f64;
        let gross_pnl = position.unrealized_pnl(exit_price);
        let commission = 2.0 * commission_per_share * shares;
        let net_pnl = gross_pnl - commission;
        let notional = position.entry_price * shares;

        Some(Trade {
            symbol: position.symbol,
            direction: position.direction,
            entry_time: position.entry_time,
            exit_time: bar.timestamp,
            entry_price: position.entry_price,
            exit_price,
            entry_vwap: position.entry_vwap,
            exit_vwap,
            shares: position.shares,
            gross_pnl,
            commission,
            net_pnl,
            return_pct: if notional > 0.0 { net_pnl / notional } else { 0.0 },
            exit_reason: reason,
            capital_after: capital + net_pnl,
        })
    }
}
