//! Session VWAP accumulator.
//!
//! VWAP[i] = sum(P[j] * V[j], j = 0..=i) / sum(V[j], j = 0..=i)
//! where P is the representative price of each bar. While cumulative
//! volume is at or below the configured floor, the bar's own
//! representative price is reported instead.

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VwapAccumulator {
    cum_price_volume: f64,
    cum_volume: f64,
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, price: f64, volume: i64, min_volume: f64) -> f64 {
        let volume = volume as f64;
        self.cum_price_volume += price * volume;
        self.cum_volume += volume;
        if self.cum_volume > min_volume && self.cum_volume > 0.0 {
            self.cum_price_volume / self.cum_volume
        } else {
            price
        }
    }
}
