//! Average True Range (ATR) indicator.

use super::Indicator;
use crate::types::Bar;

/// Incremental ATR with Wilder smoothing.
///
/// True range needs the previous close, so the first bar only primes the
/// series: TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|).
/// The first `period` TRs seed a simple mean, later ones are smoothed with
/// `atr = (atr * (period - 1) + tr) / period`.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    tr_sum: f64,
    ranges: usize,
    value: Option<f64>,
}

impl Default for Atr {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            tr_sum: 0.0,
            ranges: 0,
            value: None,
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> String {
        format!("ATR ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn update(&mut self, bar: &Bar) -> Option<f64> {
        let Some(prev_close) = self.prev_close.replace(bar.close) else {
            return None;
        };

        let tr = bar.true_range(prev_close);
        let period = self.period as f64;

        match self.value {
            Some(atr) => {
                self.value = Some((atr * (period - 1.0) + tr) / period);
            }
            None => {
                self.tr_sum += tr;
                self.ranges += 1;
                if self.ranges == self.period {
                    self.value = Some(self.tr_sum / period);
                }
            }
        }

        self.value
    }

    fn value(&self) -> Option<f64> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            open: close,
            high,
            low,
            close,
            period_start: 0,
        }
    }

    #[test]
    fn test_atr_min_periods() {
        let atr = Atr::default();
        assert_eq!(atr.min_periods(), 15);
        assert_eq!(atr.name(), "ATR (14)");
    }

    #[test]
    fn test_atr_reference_vector() {
        // TRs: 2, 3 -> seed 2.5; then TR 1 -> (2.5 + 1) / 2 = 1.75
        let mut atr = Atr::new(2);
        assert_eq!(atr.update(&bar(10.0, 8.0, 9.0)), None);
        assert_eq!(atr.update(&bar(11.0, 9.0, 10.0)), None);
        assert_eq!(atr.update(&bar(12.0, 9.0, 11.0)), Some(2.5));
        assert_eq!(atr.update(&bar(11.0, 10.0, 10.5)), Some(1.75));
    }

    #[test]
    fn test_atr_counts_gaps() {
        let mut atr = Atr::new(1);
        atr.update(&bar(10.0, 10.0, 10.0));
        // flat bar that gapped up 5 points
        assert_eq!(atr.update(&bar(15.0, 15.0, 15.0)), Some(5.0));
    }

    #[test]
    fn test_atr_positive_value() {
        let mut atr = Atr::default();
        for i in 0..30 {
            let base = 100.0 + i as f64 * 1.5;
            atr.update(&bar(base + 2.0, base - 1.0, base + 1.0));
        }
        let value = atr.value().unwrap();
        assert!(value > 0.0, "ATR should be positive, got {}", value);
    }
}
