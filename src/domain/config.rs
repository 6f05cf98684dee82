//! Engine configuration and contradictory-parameter checks.

use std::collections::BTreeMap;

use super::error::VwaptraderError;
use super::indicator::IndicatorConfig;
use super::signal::{SignalConfig, VwapStopMode};
use super::sizing::SizingPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub commission_per_share: f64,
    pub max_trades_per_day: Option<usize>,
    pub indicators: IndicatorConfig,
    pub signals: SignalConfig,
    pub sizing: SizingPolicy,
    /// Multiplier on the raw share count, keyed by upper-case symbol.
    pub symbol_scale: BTreeMap<String, f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_capital: 100_000.0,
            commission_per_share: 0.0005,
            max_trades_per_day: None,
            indicators: IndicatorConfig::default(),
            signals: SignalConfig::default(),
            sizing: SizingPolicy::default(),
            symbol_scale: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn size_scale(&self, symbol: &str) -> f64 {
        self.symbol_scale.get(symbol).copied().unwrap_or(1.0)
    }

    /// Rejects values that cannot describe a runnable strategy.
    pub fn validate(&self) -> Result<(), VwaptraderError> {
        positive("backtest", "initial_capital", self.initial_capital)?;
        if !(self.commission_per_share.is_finite() && self.commission_per_share >= 0.0) {
            return Err(VwaptraderError::invalid(
                "backtest",
                "commission_per_share",
                "must be >= 0",
            ));
        }
        if self.max_trades_per_day == Some(0) {
            return Err(VwaptraderError::invalid(
                "strategy",
                "max_trades_per_day",
                "must be at least 1 when set",
            ));
        }

        self.validate_indicators()?;
        self.validate_signals()?;
        self.validate_sizing()?;

        for (symbol, scale) in &self.symbol_scale {
            positive("symbol_scale", symbol, *scale)?;
        }
        Ok(())
    }

    fn validate_indicators(&self) -> Result<(), VwaptraderError> {
        let ind = &self.indicators;
        for (key, window) in [
            ("volume_window", Some(ind.volume_window)),
            ("atr_period", Some(ind.atr_period)),
            ("volatility_window", Some(ind.volatility_window)),
            ("trend_window", ind.trend_window),
        ] {
            if window == Some(0) {
                return Err(VwaptraderError::invalid("indicators", key, "window must be at least 1"));
            }
        }
        if !(ind.vwap_min_volume.is_finite() && ind.vwap_min_volume >= 0.0) {
            return Err(VwaptraderError::invalid("indicators", "vwap_min_volume", "must be >= 0"));
        }
        Ok(())
    }

    fn validate_signals(&self) -> Result<(), VwaptraderError> {
        let sig = &self.signals;
        if sig.entry_end < sig.entry_start {
            return Err(VwaptraderError::invalid(
                "strategy",
                "entry_end",
                format!("{} is before entry_start {}", sig.entry_end, sig.entry_start),
            ));
        }
        if let Some(cutoff) = sig.exit_cutoff {
            if cutoff <= sig.entry_start {
                return Err(VwaptraderError::invalid(
                    "strategy",
                    "exit_cutoff",
                    format!("{cutoff} must be after entry_start {}", sig.entry_start),
                ));
            }
        }
        if !(sig.vwap_buffer.is_finite() && (0.0..1.0).contains(&sig.vwap_buffer)) {
            return Err(VwaptraderError::invalid("strategy", "vwap_buffer", "must be in [0, 1)"));
        }
        if !(sig.volume_multiplier.is_finite() && sig.volume_multiplier >= 0.0) {
            return Err(VwaptraderError::invalid("strategy", "volume_multiplier", "must be >= 0"));
        }
        if sig.trend_filter && self.indicators.trend_window.is_none() {
            return Err(VwaptraderError::invalid(
                "strategy",
                "trend_filter",
                "requires [indicators] trend_window",
            ));
        }
        if sig.vwap_stop == VwapStopMode::Confirmed(0) {
            return Err(VwaptraderError::invalid(
                "strategy",
                "exit_confirmation_bars",
                "confirmed VWAP stop needs at least 1 bar",
            ));
        }
        if let Some(minutes) = sig.max_hold_minutes {
            if minutes <= 0 {
                return Err(VwaptraderError::invalid("strategy", "max_hold_minutes", "must be > 0"));
            }
        }
        if let Some(target) = sig.profit_target {
            positive("strategy", "profit_target", target)?;
        }
        if let Some(trail) = sig.trailing_stop {
            positive("strategy", "trailing_stop", trail)?;
            if trail >= 1.0 {
                return Err(VwaptraderError::invalid("strategy", "trailing_stop", "must be < 1"));
            }
        }
        Ok(())
    }

    fn validate_sizing(&self) -> Result<(), VwaptraderError> {
        match self.sizing {
            SizingPolicy::FlatFraction { fraction } => fraction_in_unit("fraction", fraction),
            SizingPolicy::RiskBased {
                atr_multiplier,
                max_risk_fraction,
                max_capital_fraction,
            } => {
                positive("sizing", "atr_multiplier", atr_multiplier)?;
                fraction_in_unit("max_risk_fraction", max_risk_fraction)?;
                fraction_in_unit("max_capital_fraction", max_capital_fraction)
            }
            SizingPolicy::VolatilityScaled {
                k,
                min_scale,
                max_scale,
            } => {
                positive("sizing", "volatility_k", k)?;
                positive("sizing", "min_scale", min_scale)?;
                positive("sizing", "max_scale", max_scale)?;
                if min_scale > max_scale {
                    return Err(VwaptraderError::invalid(
                        "sizing",
                        "min_scale",
                        format!("{min_scale} exceeds max_scale {max_scale}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn positive(section: &str, key: &str, value: f64) -> Result<(), VwaptraderError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(VwaptraderError::invalid(section, key, format!("must be > 0, got {value}")))
    }
}

fn fraction_in_unit(key: &str, value: f64) -> Result<(), VwaptraderError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(VwaptraderError::invalid("sizing", key, format!("must be in (0, 1], got {value}")))
    }
}
