//! Stop-loss / take-profit placement from ATR.

use crate::config::RiskConfig;
use crate::types::Action;

/// Protective levels for one entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
    /// ATR after flooring.
    pub atr: f64,
}

/// Derives SL/TP at fixed ATR multiples from the entry.
#[derive(Debug, Clone)]
pub struct RiskCalculator {
    sl_atr_mult: f64,
    tp_atr_mult: f64,
    min_atr: f64,
}

impl RiskCalculator {
    pub fn new(config: &RiskConfig, min_atr: f64) -> Self {
        Self {
            sl_atr_mult: config.sl_atr_mult,
            tp_atr_mult: config.tp_atr_mult,
            min_atr,
        }
    }

    pub fn compute(&self, action: Action, entry: f64, atr: f64) -> RiskLevels {
        let atr = atr.max(self.min_atr);
        let sl_distance = atr * self.sl_atr_mult;
        let tp_distance = atr * self.tp_atr_mult;

        let (stop_loss, take_profit) = match action {
            Action::Buy => (entry - sl_distance, entry + tp_distance),
            Action::Sell => (entry + sl_distance, entry - tp_distance),
        };

        RiskLevels {
            stop_loss,
            take_profit,
            atr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> RiskCalculator {
        RiskCalculator::new(
            &RiskConfig {
                sl_atr_mult: 3.0,
                tp_atr_mult: 6.0,
            },
            0.01,
        )
    }

    #[test]
    fn test_buy_levels() {
        let levels = calculator().compute(Action::Buy, 100.0, 0.5);
        assert_eq!(levels.stop_loss, 98.5);
        assert_eq!(levels.take_profit, 103.0);
        assert_eq!(levels.atr, 0.5);
    }

    #[test]
    fn test_sell_levels_are_mirrored() {
        let levels = calculator().compute(Action::Sell, 100.0, 0.5);
        assert_eq!(levels.stop_loss, 101.5);
        assert_eq!(levels.take_profit, 97.0);
    }

    #[test]
    fn test_atr_floor_applies_first() {
        let levels = calculator().compute(Action::Buy, 100.0, 0.0);
        assert_eq!(levels.atr, 0.01);
        assert!((levels.stop_loss - 99.97).abs() < 1e-9);
        assert!((levels.take_profit - 100.06).abs() < 1e-9);
    }
}
