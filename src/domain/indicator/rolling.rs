//! Fixed-length trailing window with minimum-periods = 1 semantics.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            values: VecDeque::with_capacity(period),
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.period {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean of whatever the window currently holds; `None` only when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}
