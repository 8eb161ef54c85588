//! Tick-to-bar aggregation.
//!
//! Each symbol owns one [`CandleAggregator`] holding an independent
//! [`BarSeries`] per timeframe. All series are fed from the same tick stream.

use crate::error::{EngineError, Result};
use crate::types::{Bar, ClosedBar, Timeframe, TimeframeRole};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// What a tick did to one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarUpdate {
    /// The open bar absorbed the tick.
    Updated,
    /// A new bucket began; carries the bar it froze, if any.
    Opened(Option<ClosedBar>),
    /// The tick belongs to a bucket before the open bar and was dropped.
    Stale,
}

/// Open bar plus bounded closed-bar history for one timeframe.
#[derive(Debug)]
pub struct BarSeries {
    timeframe: Timeframe,
    open: Option<Bar>,
    history: VecDeque<Bar>,
    max_history: usize,
}

impl BarSeries {
    pub fn new(timeframe: Timeframe, max_history: usize) -> Self {
        Self {
            timeframe,
            open: None,
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Fold a tick into the series.
    pub fn ingest(&mut self, symbol: &str, price: f64, timestamp_ms: i64) -> Result<BarUpdate> {
        let Some(bucket) = self.timeframe.bucket(timestamp_ms) else {
            return Err(EngineError::invariant(
                symbol,
                format!("timestamp {} has no {}ms bucket", timestamp_ms, self.timeframe.interval_ms),
            ));
        };

        let Some(open) = self.open.as_mut() else {
            self.open = Some(Bar::open_at(bucket, price));
            return Ok(BarUpdate::Opened(None));
        };

        if bucket == open.period_start {
            open.update(price);
            if !open.is_well_formed() {
                return Err(EngineError::invariant(
                    symbol,
                    format!("open bar at {} is malformed: {:?}", bucket, open),
                ));
            }
            return Ok(BarUpdate::Updated);
        }

        if bucket < open.period_start {
            warn!(
                "Dropping stale tick for {} ({}ms bars): bucket {} precedes open bar {}",
                symbol, self.timeframe.interval_ms, bucket, open.period_start
            );
            return Ok(BarUpdate::Stale);
        }

        let frozen = *open;
        self.push_closed(symbol, frozen)?;
        self.open = Some(Bar::open_at(bucket, price));

        debug!(
            "Closed {}ms bar for {} at {} (close {})",
            self.timeframe.interval_ms, symbol, frozen.period_start, frozen.close
        );

        Ok(BarUpdate::Opened(Some(ClosedBar {
            timeframe: self.timeframe,
            bar: frozen,
        })))
    }

    fn push_closed(&mut self, symbol: &str, bar: Bar) -> Result<()> {
        if let Some(last) = self.history.back() {
            if bar.period_start <= last.period_start {
                return Err(EngineError::invariant(
                    symbol,
                    format!(
                        "bar history out of order: {} after {}",
                        bar.period_start, last.period_start
                    ),
                ));
            }
        }

        self.history.push_back(bar);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        Ok(())
    }

    /// Closed bars, oldest first.
    pub fn history(&self) -> &VecDeque<Bar> {
        &self.history
    }

    /// The in-progress bar, if any tick has arrived.
    pub fn open_bar(&self) -> Option<&Bar> {
        self.open.as_ref()
    }

    /// Up to `n` most recent closes, oldest first.
    pub fn recent_closes(&self, n: usize) -> Vec<f64> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).map(|b| b.close).collect()
    }
}

/// Buckets one symbol's ticks into every configured timeframe.
#[derive(Debug)]
pub struct CandleAggregator {
    symbol: String,
    series: Vec<BarSeries>,
}

impl CandleAggregator {
    pub fn new(symbol: &str, timeframes: &[Timeframe], max_history: usize) -> Self {
        Self {
            symbol: symbol.to_string(),
            series: timeframes
                .iter()
                .map(|tf| BarSeries::new(*tf, max_history))
                .collect(),
        }
    }

    /// Feed a tick to all timeframes, returning the bars it closed
    /// (finest timeframe first, in configuration order).
    pub fn ingest(&mut self, price: f64, timestamp_ms: i64) -> Result<Vec<ClosedBar>> {
        let mut closed = Vec::new();
        for series in &mut self.series {
            if let BarUpdate::Opened(Some(bar)) = series.ingest(&self.symbol, price, timestamp_ms)? {
                closed.push(bar);
            }
        }
        Ok(closed)
    }

    pub fn series(&self, role: TimeframeRole) -> Option<&BarSeries> {
        self.series.iter().find(|s| s.timeframe.role == role)
    }
}
