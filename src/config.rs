use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use tracing::warn;

/// Indicator periods, all counted in closed bars.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    /// Fast EMA period.
    pub ema_fast: usize,
    /// Slow EMA period. Also used by the trend filter.
    pub ema_slow: usize,
    /// Wilder RSI period.
    pub rsi_period: usize,
    /// Wilder ATR period.
    pub atr_period: usize,
    /// Floor applied to ATR before any downstream use.
    pub min_atr: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 15,
            ema_slow: 30,
            rsi_period: 14,
            atr_period: 10,
            min_atr: 0.00001,
        }
    }
}

/// Confirmation and debounce rules.
#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    /// Consecutive qualifying bars needed to leave NONE.
    pub confirm_set: usize,
    /// Consecutive opposite qualifying bars needed to reverse a held action.
    pub confirm_flip: usize,
    /// Minimum time an action is held before it may flip (ms).
    pub min_hold_ms: i64,
    /// Minimum time between two emitted signals for a symbol (ms).
    pub cooldown_ms: i64,
    /// Minimum |emaFast - emaSlow| / close for a non-flat crossover.
    pub min_gap_ratio: f64,
    /// A bar is flat when the range of the last 3 closes < ATR * flat_factor.
    pub flat_factor: f64,
    /// RSI at or above this qualifies BUY momentum.
    pub rsi_buy_threshold: f64,
    /// RSI at or below this qualifies SELL momentum.
    pub rsi_sell_threshold: f64,
    /// Additionally require an engulfing pattern on the closing bar.
    pub require_engulfing: bool,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            confirm_set: 3,
            confirm_flip: 3,
            min_hold_ms: 120_000,
            cooldown_ms: 60_000,
            min_gap_ratio: 0.0001,
            flat_factor: 0.2,
            rsi_buy_threshold: 60.0,
            rsi_sell_threshold: 40.0,
            require_engulfing: false,
        }
    }
}

/// Stop-loss / take-profit distances as ATR multiples.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub sl_atr_mult: f64,
    pub tp_atr_mult: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sl_atr_mult: 3.5,
            tp_atr_mult: 7.5,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Evaluation bar width (ms).
    pub primary_interval_ms: i64,
    /// Optional coarser trend-filter bar width (ms).
    pub trend_interval_ms: Option<i64>,
    /// Closed bars retained per (symbol, timeframe).
    pub max_history: usize,
    pub indicators: IndicatorConfig,
    pub confirmation: ConfirmationConfig,
    pub risk: RiskConfig,
    /// Per-symbol tick-to-tick jump thresholds (points). Empty disables spike detection.
    pub spike_thresholds: HashMap<String, f64>,
    /// Signals kept by the in-memory signal log.
    pub recent_signal_capacity: usize,
    /// Period of the driver's re-evaluation sweep (ms). 0 disables it.
    pub sweep_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_interval_ms: 10_000,
            trend_interval_ms: Some(60_000),
            max_history: 400,
            indicators: IndicatorConfig::default(),
            confirmation: ConfirmationConfig::default(),
            risk: RiskConfig::default(),
            spike_thresholds: HashMap::new(),
            recent_signal_capacity: 10,
            sweep_interval_ms: 500,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

/// Parse `"SYM:30,SYM2:15"` into a threshold map, skipping malformed entries.
pub fn parse_spike_thresholds(raw: &str) -> HashMap<String, f64> {
    raw.split(',')
        .filter_map(|entry| {
            let (symbol, threshold) = entry.split_once(':')?;
            let symbol = symbol.trim();
            let threshold: f64 = threshold.trim().parse().ok()?;
            if symbol.is_empty() || !threshold.is_finite() || threshold <= 0.0 {
                return None;
            }
            Some((symbol.to_string(), threshold))
        })
        .collect()
}

impl Config {
    /// Load configuration from `TICKSIGNAL_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // "0" or "off" disables the trend filter
        let trend_interval_ms = match env::var("TICKSIGNAL_TREND_INTERVAL_MS") {
            Ok(v) if v.trim() == "off" => None,
            Ok(v) => match v.trim().parse::<i64>() {
                Ok(0) => None,
                Ok(ms) => Some(ms),
                Err(_) => defaults.trend_interval_ms,
            },
            Err(_) => defaults.trend_interval_ms,
        };

        let ind = defaults.indicators;
        let conf = defaults.confirmation;
        let risk = defaults.risk;

        Self {
            primary_interval_ms: env_or("TICKSIGNAL_BAR_INTERVAL_MS", defaults.primary_interval_ms),
            trend_interval_ms,
            max_history: env_or("TICKSIGNAL_MAX_HISTORY", defaults.max_history),
            indicators: IndicatorConfig {
                ema_fast: env_or("TICKSIGNAL_EMA_FAST", ind.ema_fast),
                ema_slow: env_or("TICKSIGNAL_EMA_SLOW", ind.ema_slow),
                rsi_period: env_or("TICKSIGNAL_RSI_PERIOD", ind.rsi_period),
                atr_period: env_or("TICKSIGNAL_ATR_PERIOD", ind.atr_period),
                min_atr: env_or("TICKSIGNAL_MIN_ATR", ind.min_atr),
            },
            confirmation: ConfirmationConfig {
                confirm_set: env_or("TICKSIGNAL_CONFIRM_SET", conf.confirm_set),
                confirm_flip: env_or("TICKSIGNAL_CONFIRM_FLIP", conf.confirm_flip),
                min_hold_ms: env_or("TICKSIGNAL_MIN_HOLD_MS", conf.min_hold_ms),
                cooldown_ms: env_or("TICKSIGNAL_COOLDOWN_MS", conf.cooldown_ms),
                min_gap_ratio: env_or("TICKSIGNAL_MIN_GAP_RATIO", conf.min_gap_ratio),
                flat_factor: env_or("TICKSIGNAL_FLAT_FACTOR", conf.flat_factor),
                rsi_buy_threshold: env_or("TICKSIGNAL_RSI_BUY", conf.rsi_buy_threshold),
                rsi_sell_threshold: env_or("TICKSIGNAL_RSI_SELL", conf.rsi_sell_threshold),
                require_engulfing: env_flag("TICKSIGNAL_REQUIRE_ENGULFING", conf.require_engulfing),
            },
            risk: RiskConfig {
                sl_atr_mult: env_or("TICKSIGNAL_SL_ATR_MULT", risk.sl_atr_mult),
                tp_atr_mult: env_or("TICKSIGNAL_TP_ATR_MULT", risk.tp_atr_mult),
            },
            spike_thresholds: env::var("TICKSIGNAL_SPIKE_THRESHOLDS")
                .map(|s| parse_spike_thresholds(&s))
                .unwrap_or_default(),
            recent_signal_capacity: env_or(
                "TICKSIGNAL_RECENT_SIGNALS",
                defaults.recent_signal_capacity,
            ),
            sweep_interval_ms: env_or("TICKSIGNAL_SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));

        if self.primary_interval_ms <= 0 {
            return invalid(format!("bar interval must be positive, got {}", self.primary_interval_ms));
        }
        if let Some(trend) = self.trend_interval_ms {
            if trend <= self.primary_interval_ms || trend % self.primary_interval_ms != 0 {
                return invalid(format!(
                    "trend interval {} must be a coarser multiple of bar interval {}",
                    trend, self.primary_interval_ms
                ));
            }
        }
        if self.max_history < 3 {
            return invalid(format!("max_history must be at least 3, got {}", self.max_history));
        }

        let ind = &self.indicators;
        if ind.ema_fast == 0 || ind.ema_slow == 0 || ind.rsi_period == 0 || ind.atr_period == 0 {
            return invalid("indicator periods must be non-zero".to_string());
        }
        if ind.ema_fast >= ind.ema_slow {
            return invalid(format!(
                "fast EMA period {} must be below slow period {}",
                ind.ema_fast, ind.ema_slow
            ));
        }
        if !(ind.min_atr.is_finite() && ind.min_atr > 0.0) {
            return invalid(format!("min_atr must be positive, got {}", ind.min_atr));
        }

        let conf = &self.confirmation;
        if conf.confirm_set == 0 || conf.confirm_flip == 0 {
            return invalid("confirmation counts must be non-zero".to_string());
        }
        if conf.min_hold_ms < 0 || conf.cooldown_ms < 0 {
            return invalid("hold and cooldown durations must not be negative".to_string());
        }
        if !(conf.min_gap_ratio >= 0.0 && conf.flat_factor >= 0.0) {
            return invalid("gap ratio and flat factor must not be negative".to_string());
        }
        if conf.rsi_buy_threshold <= conf.rsi_sell_threshold {
            return invalid(format!(
                "RSI buy threshold {} must exceed sell threshold {}",
                conf.rsi_buy_threshold, conf.rsi_sell_threshold
            ));
        }

        let risk = &self.risk;
        if !(risk.sl_atr_mult > 0.0 && risk.tp_atr_mult > 0.0) {
            return invalid("stop-loss and take-profit multiples must be positive".to_string());
        }
        if risk.tp_atr_mult / risk.sl_atr_mult < 1.5 {
            warn!(
                "take-profit/stop-loss ratio {:.2} is below 1.5",
                risk.tp_atr_mult / risk.sl_atr_mult
            );
        }

        Ok(())
    }

    /// Window length the crossover tracker must retain.
    pub fn confirm_window(&self) -> usize {
        self.confirmation.confirm_set.max(self.confirmation.confirm_flip) + 2
    }
}
