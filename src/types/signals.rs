use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade action carried by a signal or held by a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn opposite(&self) -> Self {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
        }
    }

    /// Crossover direction that supports this action.
    pub fn direction(&self) -> Direction {
        match self {
            Action::Buy => Direction::Up,
            Action::Sell => Direction::Down,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// EMA relationship on a closed bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

/// One classified bar in the crossover window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossoverRecord {
    pub direction: Direction,
    /// |emaFast - emaSlow| / close.
    pub gap_ratio: f64,
    pub timestamp_ms: i64,
}

/// A finalized trade signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Floored ATR the levels were derived from.
    pub atr: f64,
    /// Unix timestamp (milliseconds) of the emitting tick.
    pub timestamp_ms: i64,
}

impl Signal {
    pub fn emitted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// Reward distance over risk distance.
    pub fn reward_risk(&self) -> f64 {
        let risk = (self.entry_price - self.stop_loss).abs();
        if risk > 0.0 {
            (self.take_profit - self.entry_price).abs() / risk
        } else {
            0.0
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self
            .emitted_at()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp_ms.to_string());
        write!(
            f,
            "{} {} @ {:.5} | SL: {:.5} | TP: {:.5} | ATR: {:.5} | {}",
            self.action, self.symbol, self.entry_price, self.stop_loss, self.take_profit, self.atr, at
        )
    }
}

/// A single tick-to-tick jump at or above the symbol's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spike {
    pub symbol: String,
    /// Signed price change from the previous tick.
    pub jump: f64,
    pub price: f64,
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal() -> Signal {
        Signal {
            symbol: "R_10".to_string(),
            action: Action::Buy,
            entry_price: 100.0,
            stop_loss: 97.0,
            take_profit: 106.0,
            atr: 1.0,
            timestamp_ms: 60_000,
        }
    }

    #[test]
    fn test_action_opposite_and_direction() {
        assert_eq!(Action::Buy.opposite(), Action::Sell);
        assert_eq!(Action::Sell.opposite(), Action::Buy);
        assert_eq!(Action::Buy.direction(), Direction::Up);
        assert_eq!(Action::Sell.direction(), Direction::Down);
    }

    #[test]
    fn test_signal_serialization() {
        let json = serde_json::to_value(sample_signal()).unwrap();
        assert_eq!(json["action"], "BUY");
        assert_eq!(json["entryPrice"], 100.0);
        assert_eq!(json["stopLoss"], 97.0);
        assert_eq!(json["takeProfit"], 106.0);
        assert_eq!(json["timestampMs"], 60_000);
    }

    #[test]
    fn test_signal_reward_risk() {
        assert_eq!(sample_signal().reward_risk(), 2.0);
    }

    #[test]
    fn test_signal_display() {
        let text = sample_signal().to_string();
        assert!(text.starts_with("BUY R_10 @ 100.00000"));
        assert!(text.ends_with("00:01:00"));
    }
}
