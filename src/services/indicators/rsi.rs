//! Relative Strength Index (RSI) indicator.

use super::Indicator;
use crate::types::Bar;

/// Incremental RSI with Wilder smoothing.
///
/// Values range from 0-100. The first `period` close-to-close changes seed
/// average gain and loss as simple means; afterwards each change is folded in
/// with `avg = (avg * (period - 1) + x) / period`.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    changes: usize,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            changes: 0,
            avg_gain: None,
            avg_loss: None,
        }
    }

    /// Feed one close.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let period = self.period as f64;

        match (self.avg_gain, self.avg_loss) {
            (Some(avg_gain), Some(avg_loss)) => {
                self.avg_gain = Some((avg_gain * (period - 1.0) + gain) / period);
                self.avg_loss = Some((avg_loss * (period - 1.0) + loss) / period);
            }
            _ => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.changes += 1;
                if self.changes == self.period {
                    self.avg_gain = Some(self.gain_sum / period);
                    self.avg_loss = Some(self.loss_sum / period);
                }
            }
        }

        self.value()
    }

    /// Smoothed (avg_gain, avg_loss), once seeded.
    pub fn averages(&self) -> Option<(f64, f64)> {
        Some((self.avg_gain?, self.avg_loss?))
    }
}

/// RSI from Wilder averages; a zero average loss reads as 100.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

impl Indicator for Rsi {
    fn name(&self) -> String {
        format!("RSI ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.push(bar.close)
    }

    fn value(&self) -> Option<f64> {
        let (avg_gain, avg_loss) = self.averages()?;
        Some(rsi_from_averages(avg_gain, avg_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_min_periods() {
        let rsi = Rsi::default();
        assert_eq!(rsi.min_periods(), 15);
        assert_eq!(rsi.name(), "RSI (14)");
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let mut rsi = Rsi::new(14);
        for i in 0..14 {
            assert_eq!(rsi.push(100.0 + i as f64), None);
        }
        assert!(rsi.push(114.0).is_some());
    }

    #[test]
    fn test_rsi_reference_vector() {
        // period 2 over 1,2,1,2,1:
        // seed gains (1+0)/2, losses (0+1)/2 -> 50
        // +1 -> gain .75, loss .25 -> 75
        // -1 -> gain .375, loss .625 -> 37.5
        let mut rsi = Rsi::new(2);
        let values: Vec<Option<f64>> = [1.0, 2.0, 1.0, 2.0, 1.0].iter().map(|c| rsi.push(*c)).collect();
        assert_eq!(values[..4], [None, None, Some(50.0), Some(75.0)]);
        assert!((values[4].unwrap() - 37.5).abs() < 1e-9);
        assert_eq!(rsi.averages(), Some((0.375, 0.625)));
    }

    #[test]
    fn test_rsi_no_losses_is_100() {
        let mut rsi = Rsi::new(5);
        for i in 0..20 {
            rsi.push(100.0 + i as f64);
        }
        assert_eq!(rsi.value(), Some(100.0));
    }

    #[test]
    fn test_rsi_downtrend_approaches_zero() {
        let mut rsi = Rsi::new(5);
        for i in 0..40 {
            rsi.push(200.0 - i as f64);
        }
        assert_eq!(rsi.value(), Some(0.0));
    }

    #[test]
    fn test_rsi_value_range() {
        let mut rsi = Rsi::new(3);
        for i in 0..50 {
            let close = 100.0 + ((i * 7) % 11) as f64 - 5.0;
            if let Some(v) = rsi.push(close) {
                assert!((0.0..=100.0).contains(&v), "RSI out of range: {}", v);
            }
        }
    }
}
