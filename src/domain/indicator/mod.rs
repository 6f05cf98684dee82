//! Intraday indicator engine.
//!
//! Everything here is computed per session: a [`DayContext`] is created at
//! the first bar of a trading day and dropped at the next day boundary, so
//! no accumulator or rolling window ever sees a previous day's bars.
//!
//! - `IndicatorConfig`: which representative price to use and window sizes
//! - `IndicatorSet`: the values attached to a single bar
//! - `DayContext`: streaming, causal computation over one session
//! - `SessionView`: read-only view of the bars and indicators seen so far

pub mod atr;
pub mod rolling;
pub mod stddev;
pub mod vwap;

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::bar::Bar;
use atr::AtrState;
use rolling::RollingWindow;
use vwap::VwapAccumulator;

/// Price used to weight volume in the VWAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceMode {
    #[default]
    Close,
    Typical,
}

impl PriceMode {
    pub fn price(&self, bar: &Bar) -> f64 {
        match self {
            PriceMode::Close => bar.close,
            PriceMode::Typical => bar.typical_price(),
        }
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceMode::Close => write!(f, "close"),
            PriceMode::Typical => write!(f, "typical"),
        }
    }
}

impl FromStr for PriceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" => Ok(PriceMode::Close),
            "typical" => Ok(PriceMode::Typical),
            other => Err(format!("unknown price mode '{other}', expected close or typical")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorConfig {
    pub price_mode: PriceMode,
    /// Cumulative volume at or below this keeps VWAP at the bar's own price.
    pub vwap_min_volume: f64,
    pub volume_window: usize,
    pub atr_period: usize,
    /// `None` disables the trend moving average.
    pub trend_window: Option<usize>,
    pub volatility_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            price_mode: PriceMode::Close,
            vwap_min_volume: 0.0,
            volume_window: 15,
            atr_period: 14,
            trend_window: None,
            volatility_window: 20,
        }
    }
}

/// Indicator values aligned to one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub vwap: f64,
    pub avg_volume: Option<f64>,
    pub atr: f64,
    pub trend_ma: Option<f64>,
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DayContext {
    date: NaiveDate,
    config: IndicatorConfig,
    vwap: VwapAccumulator,
    volume: RollingWindow,
    atr: AtrState,
    closes: Option<RollingWindow>,
    returns: RollingWindow,
    prev_close: Option<f64>,
    bars: Vec<Bar>,
    indicators: Vec<IndicatorSet>,
}

impl DayContext {
    pub fn new(date: NaiveDate, config: IndicatorConfig) -> Self {
        DayContext {
            date,
            config,
            vwap: VwapAccumulator::new(),
            volume: RollingWindow::new(config.volume_window),
            atr: AtrState::new(config.atr_period),
            closes: config.trend_window.map(RollingWindow::new),
            returns: RollingWindow::new(config.volatility_window),
            prev_close: None,
            bars: Vec::new(),
            indicators: Vec::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Appends the next bar of the session and returns its indicators.
    pub fn push(&mut self, bar: Bar) -> &IndicatorSet {
        debug_assert_eq!(bar.date(), self.date, "bar pushed into wrong session");

        let price = self.config.price_mode.price(&bar);
        let vwap = self
            .vwap
            .push(price, bar.volume, self.config.vwap_min_volume);

        self.volume.push(bar.volume as f64);
        let avg_volume = self.volume.mean();

        let atr = self.atr.push(&bar);

        let trend_ma = self.closes.as_mut().and_then(|w| {
            w.push(bar.close);
            w.mean()
        });

        if let Some(prev) = self.prev_close {
            if let Some(r) = stddev::pct_return(prev, bar.close) {
                self.returns.push(r);
            }
        }
        self.prev_close = Some(bar.close);
        let volatility = stddev::sample_stddev(self.returns.values());

        self.indicators.push(IndicatorSet {
            timestamp: bar.timestamp,
            price,
            vwap,
            avg_volume,
            atr,
            trend_ma,
            volatility,
        });
        self.bars.push(bar);

        &self.indicators[self.indicators.len() - 1]
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            bars: &self.bars,
            indicators: &self.indicators,
        }
    }

    pub fn into_indicators(self) -> Vec<IndicatorSet> {
        self.indicators
    }
}

/// Bars of the current session with their indicators, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub bars: &'a [Bar],
    pub indicators: &'a [IndicatorSet],
}

impl<'a> SessionView<'a> {
    pub fn new(bars: &'a [Bar], indicators: &'a [IndicatorSet]) -> Self {
        debug_assert_eq!(bars.len(), indicators.len());
        SessionView { bars, indicators }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn at(self, i: usize) -> (&'a Bar, &'a IndicatorSet) {
        (&self.bars[i], &self.indicators[i])
    }

    pub fn span(self, range: Range<usize>) -> impl Iterator<Item = (&'a Bar, &'a IndicatorSet)> {
        self.bars[range.clone()]
            .iter()
            .zip(self.indicators[range].iter())
    }
}

/// Computes the indicators of a single session's bars.
pub fn compute_day(bars: &[Bar], config: &IndicatorConfig) -> Vec<IndicatorSet> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };
    let mut ctx = DayContext::new(first.date(), *config);
    for bar in bars {
        ctx.push(bar.clone());
    }
    ctx.into_indicators()
}
