use serde::{Deserialize, Serialize};

/// A single price update as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    /// Unix timestamp (milliseconds).
    pub timestamp_ms: i64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp_ms: i64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp_ms,
        }
    }
}

/// OHLC bar over one fixed-width bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Bucket start, unix ms.
    pub period_start: i64,
}

impl Bar {
    /// Open a bar from its first tick.
    pub fn open_at(period_start: i64, price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            period_start,
        }
    }

    /// Fold a tick into an open bar. High/low only ever widen.
    pub fn update(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    /// True range against the previous bar's close.
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// OHLC ordering holds and every field is finite.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite())
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
    }
}

/// Which bar series a timeframe feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeRole {
    /// Evaluation bars driving crossover and confirmation.
    Primary,
    /// Coarser bars used only by the trend filter.
    Trend,
}

/// A fixed bucket width with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeframe {
    pub role: TimeframeRole,
    pub interval_ms: i64,
}

impl Timeframe {
    pub fn new(role: TimeframeRole, interval_ms: i64) -> Self {
        Self { role, interval_ms }
    }

    /// Bucket key: `floor(ts / interval) * interval`, or `None` when the
    /// key does not fit in an `i64`.
    pub fn bucket(&self, timestamp_ms: i64) -> Option<i64> {
        timestamp_ms.div_euclid(self.interval_ms).checked_mul(self.interval_ms)
    }
}

/// A bar frozen because a later bucket began.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedBar {
    pub timeframe: Timeframe,
    pub bar: Bar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_floors_to_interval() {
        let tf = Timeframe::new(TimeframeRole::Primary, 10_000);
        assert_eq!(tf.bucket(0), Some(0));
        assert_eq!(tf.bucket(9_999), Some(0));
        assert_eq!(tf.bucket(10_000), Some(10_000));
        assert_eq!(tf.bucket(25_001), Some(20_000));
        assert_eq!(tf.bucket(-1), Some(-10_000));
    }

    #[test]
    fn test_bucket_out_of_range() {
        let tf = Timeframe::new(TimeframeRole::Primary, 10_000);
        assert_eq!(tf.bucket(i64::MIN), None);
        assert!(tf.bucket(i64::MAX).is_some());
    }

    #[test]
    fn test_bar_update_widens() {
        let mut bar = Bar::open_at(0, 100.0);
        bar.update(102.0);
        bar.update(99.0);
        bar.update(101.0);
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.high, 102.0);
        assert_eq!(bar.low, 99.0);
        assert_eq!(bar.close, 101.0);
        assert!(bar.is_well_formed());
    }

    #[test]
    fn test_true_range_uses_gap_to_prev_close() {
        let bar = Bar {
            open: 12.0,
            high: 12.5,
            low: 11.5,
            close: 12.0,
            period_start: 0,
        };
        assert_eq!(bar.true_range(12.0), 1.0);
        assert_eq!(bar.true_range(10.0), 2.5);
        assert_eq!(bar.true_range(14.0), 2.5);
    }

    #[test]
    fn test_tick_deserializes_camel_case() {
        let tick: Tick =
            serde_json::from_str(r#"{"symbol":"R_10","price":1234.5,"timestampMs":1000}"#).unwrap();
        assert_eq!(tick, Tick::new("R_10", 1234.5, 1000));
    }
}
