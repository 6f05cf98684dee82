//! Intraday Average True Range.
//!
//! Simple rolling mean of True Range, minimum-periods = 1. The first bar
//! of a session has no previous close and contributes high - low.

use super::rolling::RollingWindow;
use crate::domain::bar::Bar;

#[derive(Debug, Clone)]
pub struct AtrState {
    prev_close: Option<f64>,
    window: RollingWindow,
}

impl AtrState {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            window: RollingWindow::new(period),
        }
    }

    pub fn push(&mut self, bar: &Bar) -> f64 {
        let tr = match self.prev_close {
            Some(pc) => bar.true_range(pc),
            None => bar.high - bar.low,
        };
        self.prev_close = Some(bar.close);
        self.window.push(tr);
        self.window.mean().unwrap_or(tr)
    }
}
