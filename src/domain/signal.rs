//! VWAP entry and exit signal evaluation.
//!
//! Both predicates are pure: they look at the current bar, its indicators,
//! earlier bars of the same session and the configuration, and never
//! mutate anything. Suppression is expressed as `None`, not as an error.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;

use crate::domain::indicator::SessionView;
use crate::domain::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Close is on this direction's side of the buffered VWAP band.
    pub fn beyond_band(&self, close: f64, vwap: f64, buffer: f64) -> bool {
        match self {
            Direction::Long => close > vwap * (1.0 + buffer),
            Direction::Short => close < vwap * (1.0 - buffer),
        }
    }

    /// Close has crossed the buffered VWAP band against this direction.
    pub fn against_band(&self, close: f64, vwap: f64, buffer: f64) -> bool {
        match self {
            Direction::Long => close < vwap * (1.0 - buffer),
            Direction::Short => close > vwap * (1.0 + buffer),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.pad("long"),
            Direction::Short => f.pad("short"),
        }
    }
}

/// Why a position was closed. Variant order is exit priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    TimeStop,
    MarketClose,
    ProfitTarget,
    TrailingStop,
    VwapStop,
    VwapStopConfirmed,
    EndOfData,
}

impl ExitReason {
    pub fn tag(&self) -> &'static str {
        match self {
            ExitReason::TimeStop => "Time Stop",
            ExitReason::MarketClose => "Market Close",
            ExitReason::ProfitTarget => "Profit Target",
            ExitReason::TrailingStop => "Trailing Stop",
            ExitReason::VwapStop => "VWAP Stop",
            ExitReason::VwapStopConfirmed => "VWAP Stop (Confirmed)",
            ExitReason::EndOfData => "End of Data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VwapStopMode {
    /// Exit on the first close beyond the buffered band.
    Immediate,
    /// Exit once the last `n` closes of the session, current included, are.
    Confirmed(usize),
}

impl FromStr for VwapStopMode {
    type Err = String;

    /// `immediate`, `confirmed` (two bars) or `confirmed:<n>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.split_once(':') {
            None if s == "immediate" => Ok(VwapStopMode::Immediate),
            None if s == "confirmed" => Ok(VwapStopMode::Confirmed(2)),
            Some(("confirmed", n)) => n
                .trim()
                .parse::<usize>()
                .map(VwapStopMode::Confirmed)
                .map_err(|_| format!("invalid confirmation count '{n}'")),
            _ => Err(format!(
                "unknown vwap stop '{s}', expected immediate or confirmed[:n]"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub entry_start: NaiveTime,
    pub entry_end: NaiveTime,
    /// Positions still open at or after this time are closed.
    pub exit_cutoff: Option<NaiveTime>,
    /// Fractional band around VWAP, e.g. 0.001 for 0.1%.
    pub vwap_buffer: f64,
    pub volume_multiplier: f64,
    pub trend_filter: bool,
    pub entry_confirmation_bars: usize,
    /// Bars of the session that must precede an entry.
    pub min_session_bars: usize,
    pub vwap_stop: VwapStopMode,
    pub max_hold_minutes: Option<i64>,
    pub profit_target: Option<f64>,
    pub trailing_stop: Option<f64>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            entry_start: hm(9, 45),
            entry_end: hm(15, 30),
            exit_cutoff: Some(hm(15, 59)),
            vwap_buffer: 0.001,
            volume_multiplier: 1.2,
            trend_filter: false,
            entry_confirmation_bars: 0,
            min_session_bars: 15,
            vwap_stop: VwapStopMode::Confirmed(2),
            max_hold_minutes: Some(120),
            profit_target: Some(0.015),
            trailing_stop: None,
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Entry direction for bar `i` of the session, if every filter passes.
///
/// Position state and the daily trade cap are the caller's concern; this
/// only looks at market data.
pub fn evaluate_entry(view: SessionView<'_>, i: usize, config: &SignalConfig) -> Option<Direction> {
    let (bar, ind) = view.at(i);

    let time = bar.time();
    if time < config.entry_start || time > config.entry_end {
        return None;
    }
    if i < config.min_session_bars {
        return None;
    }

    let avg_volume = ind.avg_volume?;
    if (bar.volume as f64) < avg_volume * config.volume_multiplier {
        return None;
    }

    let direction = if Direction::Long.beyond_band(bar.close, ind.vwap, config.vwap_buffer) {
        Direction::Long
    } else if Direction::Short.beyond_band(bar.close, ind.vwap, config.vwap_buffer) {
        Direction::Short
    } else {
        return None;
    };

    if config.trend_filter {
        let ma = ind.trend_ma?;
        let with_trend = match direction {
            Direction::Long => bar.close > ma,
            Direction::Short => bar.close < ma,
        };
        if !with_trend {
            return None;
        }
    }

    let k = config.entry_confirmation_bars;
    if k > 0 {
        let start = i.checked_sub(k)?;
        let confirmed = view
            .span(start..i)
            .all(|(b, s)| direction.beyond_band(b.close, s.vwap, 0.0));
        if !confirmed {
            return None;
        }
    }

    Some(direction)
}

/// First exit rule that fires for `position` at bar `i`, in priority order:
/// time stop, session cutoff, profit target, trailing stop, VWAP stop.
pub fn evaluate_exit(
    position: &Position,
    view: SessionView<'_>,
    i: usize,
    config: &SignalConfig,
) -> Option<ExitReason> {
    let (bar, ind) = view.at(i);

    if let Some(max_hold) = config.max_hold_minutes {
        if position.minutes_held(bar.timestamp) >= max_hold as f64 {
            return Some(ExitReason::TimeStop);
        }
    }

    if let Some(cutoff) = config.exit_cutoff {
        if bar.time() >= cutoff {
            return Some(ExitReason::MarketClose);
        }
    }

    if let Some(target) = config.profit_target {
        if position.return_at(bar.close) >= target {
            return Some(ExitReason::ProfitTarget);
        }
    }

    if let Some(trail) = config.trailing_stop {
        if position.trailing_stop_hit(bar.close, trail) {
            return Some(ExitReason::TrailingStop);
        }
    }

    let direction = position.direction;
    match config.vwap_stop {
        VwapStopMode::Immediate => direction
            .against_band(bar.close, ind.vwap, config.vwap_buffer)
            .then_some(ExitReason::VwapStop),
        VwapStopMode::Confirmed(k) => {
            let start = (i + 1).checked_sub(k.max(1))?;
            view.span(start..i + 1)
                .all(|(b, s)| direction.against_band(b.close, s.vwap, config.vwap_buffer))
                .then_some(ExitReason::VwapStopConfirmed)
        }
    }
}
