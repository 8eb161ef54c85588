//! Tick-to-tick spike detection for symbols with a configured jump threshold.

use crate::types::Spike;
use std::collections::HashMap;

/// Per-symbol jump thresholds; the caller supplies the previous price.
#[derive(Debug, Clone, Default)]
pub struct SpikeDetector {
    thresholds: HashMap<String, f64>,
}

impl SpikeDetector {
    pub fn new(thresholds: HashMap<String, f64>) -> Self {
        Self { thresholds }
    }

    pub fn threshold(&self, symbol: &str) -> Option<f64> {
        self.thresholds.get(symbol).copied()
    }

    pub fn is_enabled(&self) -> bool {
        !self.thresholds.is_empty()
    }

    /// Compare a tick with the symbol's previous price.
    pub fn check(
        &self,
        symbol: &str,
        prev_price: Option<f64>,
        price: f64,
        timestamp_ms: i64,
    ) -> Option<Spike> {
        let threshold = self.threshold(symbol)?;
        let jump = price - prev_price?;
        if jump.abs() < threshold {
            return None;
        }
        Some(Spike {
            symbol: symbol.to_string(),
            jump,
            price,
            timestamp_ms,
        })
    }
}
