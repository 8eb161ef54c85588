//! Exponential Moving Average (EMA) indicator.

use super::Indicator;
use crate::types::Bar;

/// Incremental EMA over bar closes.
///
/// Seeded with the simple average of the first `period` closes; every later
/// close applies `ema = close * k + ema * (1 - k)` with `k = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    /// Feed one close.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        match self.value {
            Some(ema) => {
                self.value = Some(close * self.k + ema * (1.0 - self.k));
            }
            None => {
                self.seed_sum += close;
                self.seen += 1;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}

impl Indicator for Ema {
    fn name(&self) -> String {
        format!("EMA ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.push(bar.close)
    }

    fn value(&self) -> Option<f64> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_unseeded_until_period() {
        let mut ema = Ema::new(3);
        assert_eq!(ema.push(1.0), None);
        assert_eq!(ema.push(2.0), None);
        assert!(!ema.is_seeded());
        assert_eq!(ema.push(3.0), Some(2.0));
        assert!(ema.is_seeded());
    }

    #[test]
    fn test_ema_reference_vector() {
        // k = 0.5; seed = 2, then each step lands exactly one below the close
        let mut ema = Ema::new(3);
        let values: Vec<Option<f64>> = (1..=8).map(|c| ema.push(c as f64)).collect();
        assert_eq!(
            values,
            vec![None, None, Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0), Some(7.0)]
        );
    }

    #[test]
    fn test_ema_constant_series_is_constant() {
        let mut ema = Ema::new(5);
        for _ in 0..20 {
            ema.push(42.0);
        }
        assert_eq!(ema.value(), Some(42.0));
    }

    #[test]
    fn test_ema_name_and_min_periods() {
        let ema = Ema::new(15);
        assert_eq!(ema.name(), "EMA (15)");
        assert_eq!(ema.min_periods(), 15);
    }
}
