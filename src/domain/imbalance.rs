//! Daily VWAP imbalance: how often the previous close sat above or below
//! the current bar's VWAP.

use chrono::NaiveDate;

use super::indicator::{compute_day, IndicatorConfig};
use super::session::SymbolData;

#[derive(Debug, Clone, PartialEq)]
pub struct DayImbalance {
    pub date: NaiveDate,
    pub above: usize,
    /// Ties count as below.
    pub below: usize,
    pub above_pct: f64,
    pub below_pct: f64,
    /// `above_pct - below_pct`, in percentage points.
    pub imbalance: f64,
}

/// One entry per trading day. The first bar of each day has no previous
/// close in its session and is not classified.
pub fn analyze_imbalance(data: &SymbolData, config: &IndicatorConfig) -> Vec<DayImbalance> {
    data.days
        .iter()
        .map(|day| {
            let bars = data.day_bars(day);
            let indicators = compute_day(bars, config);

            let mut above = 0usize;
            let mut below = 0usize;
            for (prev, (_, ind)) in bars.iter().zip(bars.iter().zip(&indicators).skip(1)) {
                if prev.close > ind.vwap {
                    above += 1;
                } else {
                    below += 1;
                }
            }

            let total = above + below;
            let pct = |n: usize| {
                if total > 0 {
                    n as f64 / total as f64 * 100.0
                } else {
                    0.0
                }
            };
            let above_pct = pct(above);
            let below_pct = pct(below);

            DayImbalance {
                date: day.date,
                above,
                below,
                above_pct,
                below_pct,
                imbalance: above_pct - below_pct,
            }
        })
        .collect()
}

/// Mean above and below percentages across days.
pub fn average_split(days: &[DayImbalance]) -> (f64, f64) {
    if days.is_empty() {
        return (0.0, 0.0);
    }
    let n = days.len() as f64;
    let above = days.iter().map(|d| d.above_pct).sum::<f64>() / n;
    let below = days.iter().map(|d| d.below_pct).sum::<f64>() / n;
    (above, below)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Bar;

    fn make_bar(d: u32, minute: u32, close: f64) -> Bar {
        Bar {
            symbol: "QQQ".into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, d)
                .unwrap()
                .and_hms_opt(9, 30 + minute, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    #[test]
    fn counts_previous_close_against_vwap() {
        // day 1 vwaps: 100, 101, 101.33, 101.75
        // prev closes: 100 (below 101), 102 (above 101.33), 102 (above 101.75)
        let bars = vec![
            make_bar(1, 0, 100.0),
            make_bar(1, 1, 102.0),
            make_bar(1, 2, 102.0),
            make_bar(1, 3, 103.0),
            make_bar(4, 0, 50.0),
        ];
        let data = SymbolData::new("QQQ", bars).unwrap();
        let days = analyze_imbalance(&data, &IndicatorConfig::default());

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].above, 2);
        assert_eq!(days[0].below, 1);
        assert!((days[0].above_pct - 200.0 / 3.0).abs() < 1e-9);
        assert!((days[0].imbalance - 100.0 / 3.0).abs() < 1e-9);

        // single-bar day has nothing to classify
        assert_eq!(days[1].above + days[1].below, 0);
        assert!(days[1].imbalance.abs() < f64::EPSILON);
    }

    #[test]
    fn average_split_means() {
        let day = |above_pct: f64| DayImbalance {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            above: 0,
            below: 0,
            above_pct,
            below_pct: 100.0 - above_pct,
            imbalance: 2.0 * above_pct - 100.0,
        };
        let (above, below) = average_split(&[day(60.0), day(40.0)]);
        assert!((above - 50.0).abs() < 1e-12);
        assert!((below - 50.0).abs() < 1e-12);
        assert_eq!(average_split(&[]), (0.0, 0.0));
    }
}
