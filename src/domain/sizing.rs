//! Position sizing policies.
//!
//! A policy produces a raw (fractional) share count from the capital
//! available at entry, the entry price and the entry bar's indicators.
//! [`whole_shares`] turns that into the order quantity by rounding down; a
//! quantity of zero means no trade.

use std::fmt;

use crate::domain::indicator::IndicatorSet;

/// Computes a raw share count for a new position.
///
/// `None` means a required input (ATR, volatility) is unavailable and the
/// entry must be skipped.
pub trait Sizer: Send + Sync {
    fn raw_shares(&self, capital: f64, price: f64, indicators: &IndicatorSet) -> Option<f64>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingPolicy {
    /// Fraction of current capital, 1.0 for all-in.
    FlatFraction { fraction: f64 },
    /// Risk a fixed fraction of capital against an ATR-based stop distance,
    /// capped by a maximum capital allocation.
    RiskBased {
        atr_multiplier: f64,
        max_risk_fraction: f64,
        max_capital_fraction: f64,
    },
    /// Scale full-capital size down as short-term volatility rises.
    VolatilityScaled {
        k: f64,
        min_scale: f64,
        max_scale: f64,
    },
}

impl Default for SizingPolicy {
    fn default() -> Self {
        SizingPolicy::FlatFraction { fraction: 1.0 }
    }
}

impl fmt::Display for SizingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingPolicy::FlatFraction { fraction } => write!(f, "flat({fraction})"),
            SizingPolicy::RiskBased {
                atr_multiplier,
                max_risk_fraction,
                max_capital_fraction,
            } => write!(
                f,
                "risk(atr x{atr_multiplier}, risk {max_risk_fraction}, cap {max_capital_fraction})"
            ),
            SizingPolicy::VolatilityScaled {
                k,
                min_scale,
                max_scale,
            } => write!(f, "volatility(k {k}, scale {min_scale}..{max_scale})"),
        }
    }
}

impl Sizer for SizingPolicy {
    fn raw_shares(&self, capital: f64, price: f64, indicators: &IndicatorSet) -> Option<f64> {
        if price <= 0.0 {
            return None;
        }
        match *self {
            SizingPolicy::FlatFraction { fraction } => Some(capital * fraction / price),
            SizingPolicy::RiskBased {
                atr_multiplier,
                max_risk_fraction,
                max_capital_fraction,
            } => {
                let stop_distance = indicators.atr * atr_multiplier;
                if stop_distance.is_nan() || stop_distance <= 0.0 {
                    return None;
                }
                let by_risk = capital * max_risk_fraction / stop_distance;
                let by_capital = (capital * max_capital_fraction / price).floor();
                Some(by_risk.min(by_capital))
            }
            SizingPolicy::VolatilityScaled {
                k,
                min_scale,
                max_scale,
            } => {
                let volatility = indicators.volatility?;
                let scale = (1.0 - volatility * k).max(min_scale).min(max_scale);
                Some(capital / price * scale)
            }
        }
    }

    fn name(&self) -> &str {
        match self {
            SizingPolicy::FlatFraction { .. } => "flat",
            SizingPolicy::RiskBased { .. } => "risk",
            SizingPolicy::VolatilityScaled { .. } => "volatility",
        }
    }
}

/// Whole-share order quantity, `floor(raw)`. Zero for missing, negative or
/// non-finite input.
pub fn whole_shares(raw: Option<f64>) -> i64 {
    match raw {
        Some(r) if r.is_finite() => r.floor().max(0.0) as i64,
        _ => 0,
    }
}

/// Shares to buy or sell short, with an optional per-symbol scale applied
/// to the raw amount before rounding.
pub fn size_position(
    sizer: &dyn Sizer,
    capital: f64,
    price: f64,
    indicators: &IndicatorSet,
    scale: f64,
) -> i64 {
    whole_shares(
        sizer
            .raw_shares(capital, price, indicators)
            .map(|raw| raw * scale),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn indicators(atr: f64, volatility: Option<f64>) -> IndicatorSet {
        IndicatorSet {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            price: 100.0,
            vwap: 100.0,
            avg_volume: Some(1000.0),
            atr,
            trend_ma: None,
            volatility,
        }
    }

    #[test]
    fn whole_shares_rounding() {
        assert_eq!(whole_shares(Some(99.9)), 99);
        assert_eq!(whole_shares(Some(1.0)), 1);
        assert_eq!(whole_shares(Some(0.3)), 0);
        assert_eq!(whole_shares(Some(f64::INFINITY)), 0);
        assert_eq!(whole_shares(Some(0.0)), 0);
        assert_eq!(whole_shares(Some(-5.0)), 0);
        assert_eq!(whole_shares(Some(f64::NAN)), 0);
        assert_eq!(whole_shares(None), 0);
    }

    #[test]
    fn flat_all_in() {
        let policy = SizingPolicy::default();
        let shares = size_position(&policy, 100_000.0, 101.0, &indicators(1.0, None), 1.0);
        assert_eq!(shares, 990);
    }

    #[test]
    fn flat_with_symbol_scale() {
        let policy = SizingPolicy::FlatFraction { fraction: 1.0 };
        let shares = size_position(&policy, 100_000.0, 100.0, &indicators(1.0, None), 0.5);
        assert_eq!(shares, 500);
    }

    #[test]
    fn flat_capital_below_price_no_trade() {
        let policy = SizingPolicy::FlatFraction { fraction: 0.1 };
        let shares = size_position(&policy, 500.0, 100.0, &indicators(1.0, None), 1.0);
        assert_eq!(shares, 0);
        let shares = size_position(&SizingPolicy::default(), 50.0, 101.0, &indicators(1.0, None), 1.0);
        assert_eq!(shares, 0);
    }

    #[test]
    fn volatility_scaled_below_one_share_no_trade() {
        let policy = SizingPolicy::VolatilityScaled {
            k: 100.0,
            min_scale: 0.3,
            max_scale: 1.0,
        };
        // 150 / 100 * 0.3 = 0.45
        let shares = size_position(&policy, 150.0, 100.0, &indicators(1.0, Some(0.05)), 1.0);
        assert_eq!(shares, 0);
    }

    #[test]
    fn flat_non_positive_capital_no_trade() {
        let policy = SizingPolicy::default();
        assert_eq!(size_position(&policy, 0.0, 100.0, &indicators(1.0, None), 1.0), 0);
        assert_eq!(size_position(&policy, -50.0, 100.0, &indicators(1.0, None), 1.0), 0);
    }

    #[test]
    fn risk_based_limited_by_risk() {
        let policy = SizingPolicy::RiskBased {
            atr_multiplier: 1.0,
            max_risk_fraction: 0.01,
            max_capital_fraction: 1.0,
        };
        // 1000 risk / 2.0 stop = 500 shares, cap 1000
        let shares = size_position(&policy, 100_000.0, 100.0, &indicators(2.0, None), 1.0);
        assert_eq!(shares, 500);
    }

    #[test]
    fn risk_based_limited_by_capital() {
        let policy = SizingPolicy::RiskBased {
            atr_multiplier: 1.0,
            max_risk_fraction: 0.01,
            max_capital_fraction: 0.25,
        };
        // risk allows 10000, capital cap 250
        let shares = size_position(&policy, 100_000.0, 100.0, &indicators(0.1, None), 1.0);
        assert_eq!(shares, 250);
    }

    #[test]
    fn risk_based_zero_atr_no_trade() {
        let policy = SizingPolicy::RiskBased {
            atr_multiplier: 1.5,
            max_risk_fraction: 0.01,
            max_capital_fraction: 1.0,
        };
        assert_eq!(size_position(&policy, 100_000.0, 100.0, &indicators(0.0, None), 1.0), 0);
    }

    #[test]
    fn volatility_scaled_clamps() {
        let policy = SizingPolicy::VolatilityScaled {
            k: 100.0,
            min_scale: 0.3,
            max_scale: 1.0,
        };
        // 100.5 * (1 - 0.002 * 100) = 80.4
        let shares = size_position(&policy, 10_050.0, 100.0, &indicators(1.0, Some(0.002)), 1.0);
        assert_eq!(shares, 80);
        // 1 - 0.05 * 100 clamps to 0.3
        let shares = size_position(&policy, 10_050.0, 100.0, &indicators(1.0, Some(0.05)), 1.0);
        assert_eq!(shares, 30);
        // zero volatility clamps to the max
        let shares = size_position(&policy, 10_050.0, 100.0, &indicators(1.0, Some(0.0)), 1.0);
        assert_eq!(shares, 100);
    }

    #[test]
    fn volatility_scaled_without_volatility_no_trade() {
        let policy = SizingPolicy::VolatilityScaled {
            k: 100.0,
            min_scale: 0.3,
            max_scale: 1.0,
        };
        assert_eq!(size_position(&policy, 10_000.0, 100.0, &indicators(1.0, None), 1.0), 0);
    }

    #[test]
    fn policy_names() {
        assert_eq!(SizingPolicy::default().name(), "flat");
        assert_eq!(SizingPolicy::default().to_string(), "flat(1)");
    }
}
