//! Wire-format tests for public types

use ticksignal::types::*;

#[test]
fn test_tick_parses_from_json_line() {
    let tick: Tick =
        serde_json::from_str(r#"{"symbol":"R_75","price":41235.67,"timestampMs":1700000000123}"#).unwrap();
    assert_eq!(tick, Tick::new("R_75", 41235.67, 1_700_000_000_123));
}

#[test]
fn test_tick_rejects_missing_timestamp() {
    assert!(serde_json::from_str::<Tick>(r#"{"symbol":"R_75","price":1.0}"#).is_err());
}

#[test]
fn test_signal_serialization() {
    let signal = Signal {
        symbol: "R_50".to_string(),
        action: Action::Sell,
        entry_price: 250.0,
        stop_loss: 253.5,
        take_profit: 242.5,
        atr: 1.0,
        timestamp_ms: 1_700_000_000_000,
    };

    let json = serde_json::to_value(&signal).unwrap();
    assert_eq!(json["action"], "SELL");
    assert_eq!(json["entryPrice"], 250.0);
    assert_eq!(json["stopLoss"], 253.5);
    assert_eq!(json["takeProfit"], 242.5);
    assert_eq!(json["timestampMs"], 1_700_000_000_000i64);

    let parsed: Signal = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, signal);
}

#[test]
fn test_action_parses_uppercase() {
    let action: Action = serde_json::from_str("\"BUY\"").unwrap();
    assert_eq!(action, Action::Buy);
    assert!(serde_json::from_str::<Action>("\"buy\"").is_err());
}

#[test]
fn test_timeframe_buckets_share_boundaries() {
    let primary = Timeframe::new(TimeframeRole::Primary, 10_000);
    let trend = Timeframe::new(TimeframeRole::Trend, 60_000);

    for ts in [0, 59_999, 60_000, 125_000] {
        let (fine, coarse) = (primary.bucket(ts).unwrap(), trend.bucket(ts).unwrap());
        assert_eq!(coarse % primary.interval_ms, 0);
        assert!(fine >= coarse);
    }
}

#[test]
fn test_true_range_uses_previous_close() {
    let bar = Bar {
        open: 10.0,
        high: 11.0,
        low: 9.5,
        close: 10.5,
        period_start: 0,
    };
    assert_eq!(bar.true_range(10.0), 1.5);
    assert_eq!(bar.true_range(13.0), 3.5);
    assert_eq!(bar.true_range(7.0), 4.0);
}
