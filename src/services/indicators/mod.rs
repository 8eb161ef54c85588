//! Streaming technical indicators.
//!
//! Every indicator here is updated once per closed bar in O(1) and carries
//! its own seeded flag; nothing is recomputed from bar history.

pub mod atr;
pub mod ema;
pub mod rsi;

pub use atr::Atr;
pub use ema::Ema;
pub use rsi::{rsi_from_averages, Rsi};

use crate::config::IndicatorConfig;
use crate::error::{EngineError, Result};
use crate::types::Bar;
use serde::Serialize;
use tracing::debug;

/// Trait for incrementally updated indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> String;

    /// Closed bars required before a value is produced.
    fn min_periods(&self) -> usize;

    /// Fold in one closed bar. Returns the current value once seeded.
    fn update(&mut self, bar: &Bar) -> Option<f64>;

    /// Current value, if seeded.
    fn value(&self) -> Option<f64>;

    fn is_seeded(&self) -> bool {
        self.value().is_some()
    }
}

/// Indicator values as of the most recent closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    /// Wilder ATR before flooring.
    pub raw_atr: Option<f64>,
    /// ATR floored at the configured minimum.
    pub atr: Option<f64>,
    /// Close of the bar this snapshot was taken on.
    pub close: f64,
    pub period_start: i64,
    /// Closed bars folded in so far.
    pub bars: u64,
}

impl IndicatorSnapshot {
    /// All indicators have enough history.
    pub fn is_seeded(&self) -> bool {
        self.ema_fast.is_some() && self.ema_slow.is_some() && self.rsi.is_some() && self.atr.is_some()
    }
}

/// Indicator state for one (symbol, timeframe).
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    ema_fast: Ema,
    ema_slow: Ema,
    rsi: Rsi,
    atr: Atr,
    min_atr: f64,
    bars: u64,
    last: Option<IndicatorSnapshot>,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Self {
        Self {
            ema_fast: Ema::new(config.ema_fast),
            ema_slow: Ema::new(config.ema_slow),
            rsi: Rsi::new(config.rsi_period),
            atr: Atr::new(config.atr_period),
            min_atr: config.min_atr,
            bars: 0,
            last: None,
        }
    }

    /// Fold in a closed bar. Must be called exactly once per closed bar.
    pub fn update(&mut self, symbol: &str, bar: &Bar) -> Result<IndicatorSnapshot> {
        if !bar.is_well_formed() {
            return Err(EngineError::invariant(
                symbol,
                format!("closed bar at {} is malformed: {:?}", bar.period_start, bar),
            ));
        }
        if let Some(prev) = self.last {
            if bar.period_start <= prev.period_start {
                return Err(EngineError::invariant(
                    symbol,
                    format!(
                        "indicator update out of order: {} after {}",
                        bar.period_start, prev.period_start
                    ),
                ));
            }
        }

        let was_seeded = self.last.map(|s| s.is_seeded()).unwrap_or(false);

        let ema_fast = self.ema_fast.update(bar);
        let ema_slow = self.ema_slow.update(bar);
        let rsi = self.rsi.update(bar);
        let raw_atr = self.atr.update(bar);

        if let Some(atr) = raw_atr {
            if !atr.is_finite() || atr < 0.0 {
                return Err(EngineError::invariant(symbol, format!("ATR is {}", atr)));
            }
        }

        self.bars += 1;
        let snapshot = IndicatorSnapshot {
            ema_fast,
            ema_slow,
            rsi,
            raw_atr,
            atr: raw_atr.map(|atr| atr.max(self.min_atr)),
            close: bar.close,
            period_start: bar.period_start,
            bars: self.bars,
        };

        if snapshot.is_seeded() && !was_seeded {
            debug!("Indicators seeded for {} after {} bars", symbol, self.bars);
        }

        self.last = Some(snapshot);
        Ok(snapshot)
    }

    /// Snapshot from the most recent closed bar.
    pub fn snapshot(&self) -> Option<IndicatorSnapshot> {
        self.last
    }

    /// Closed bars needed before every indicator has a value.
    pub fn warmup_bars(&self) -> usize {
        [
            self.ema_fast.min_periods(),
            self.ema_slow.min_periods(),
            self.rsi.min_periods(),
            self.atr.min_periods(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}
