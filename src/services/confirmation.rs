//! Per-symbol confirmation state machine.
//!
//! A symbol holds NONE, BUY or SELL. Closed bars that qualify for a direction
//! advance that direction's candidate counter; a transition fires once the
//! counter reaches the entry (CONFIRM_SET) or flip (CONFIRM_FLIP) threshold,
//! subject to minimum hold and cooldown. Deferred transitions keep their
//! counters and fire on the first evaluation after the blocking rule clears.

use crate::config::ConfirmationConfig;
use crate::services::crossover::CrossoverTracker;
use crate::types::{Action, Bar};
use serde::Serialize;
use tracing::debug;

/// Held action and debounce counters for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolState {
    /// `None` is the NONE state.
    pub held_action: Option<Action>,
    pub held_since: Option<i64>,
    pub last_signal_at: Option<i64>,
    pub buy_candidates: usize,
    pub sell_candidates: usize,
}

impl SymbolState {
    pub fn candidates(&self, action: Action) -> usize {
        match action {
            Action::Buy => self.buy_candidates,
            Action::Sell => self.sell_candidates,
        }
    }

    fn candidates_mut(&mut self, action: Action) -> &mut usize {
        match action {
            Action::Buy => &mut self.buy_candidates,
            Action::Sell => &mut self.sell_candidates,
        }
    }
}

/// Higher-timeframe close and its slow EMA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub close: f64,
    pub ema_slow: f64,
}

impl TrendReading {
    pub fn agrees(&self, action: Action) -> bool {
        match action {
            Action::Buy => self.close >= self.ema_slow,
            Action::Sell => self.close <= self.ema_slow,
        }
    }
}

/// Everything needed to judge one closed bar.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub crossover: &'a CrossoverTracker,
    pub rsi: f64,
    /// `None` when no trend timeframe is configured or it is not seeded yet.
    pub trend: Option<TrendReading>,
    pub flat: bool,
    /// Engulfing pattern formed by the last two closed bars.
    pub pattern: Option<Action>,
}

/// Which directions a closed bar qualifies for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Qualification {
    pub buy: bool,
    pub sell: bool,
}

impl Qualification {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn only(action: Action) -> Self {
        match action {
            Action::Buy => Self { buy: true, sell: false },
            Action::Sell => Self { buy: false, sell: true },
        }
    }

    pub fn qualifies(&self, action: Action) -> bool {
        match action {
            Action::Buy => self.buy,
            Action::Sell => self.sell,
        }
    }
}

/// Flat when the range of the last 3 closes is below `atr * factor`.
/// Fewer than 3 closes never counts as flat.
pub fn is_flat_market(recent_closes: &[f64], atr: f64, factor: f64) -> bool {
    if recent_closes.len() < 3 {
        return false;
    }
    let last3 = &recent_closes[recent_closes.len() - 3..];
    let max = last3.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = last3.iter().copied().fold(f64::INFINITY, f64::min);
    (max - min) < atr * factor
}

/// Engulfing pattern of `last` over `prev`, if any.
pub fn engulfing(prev: &Bar, last: &Bar) -> Option<Action> {
    if last.is_bullish() && last.open < prev.close && last.close > prev.open {
        Some(Action::Buy)
    } else if last.is_bearish() && last.open > prev.close && last.close < prev.open {
        Some(Action::Sell)
    } else {
        None
    }
}

/// Applies the qualification, hysteresis, hold and cooldown rules.
#[derive(Debug, Clone)]
pub struct ConfirmationStateMachine {
    config: ConfirmationConfig,
}

impl ConfirmationStateMachine {
    pub fn new(config: ConfirmationConfig) -> Self {
        Self { config }
    }

    /// Confirmation length for entering `action` from the current state.
    pub fn window_for(&self, state: &SymbolState, action: Action) -> usize {
        if state.held_action == Some(action.opposite()) {
            self.config.confirm_flip
        } else {
            self.config.confirm_set
        }
    }

    /// Judge a closed bar for both directions.
    pub fn qualify(&self, state: &SymbolState, ctx: &BarContext<'_>) -> Qualification {
        if ctx.flat {
            return Qualification::none();
        }

        let check = |action: Action| {
            let momentum = match action {
                Action::Buy => ctx.rsi >= self.config.rsi_buy_threshold,
                Action::Sell => ctx.rsi <= self.config.rsi_sell_threshold,
            };
            let trend_ok = ctx.trend.map(|t| t.agrees(action)).unwrap_or(true);
            let pattern_ok = !self.config.require_engulfing || ctx.pattern == Some(action);

            momentum
                && trend_ok
                && pattern_ok
                && ctx
                    .crossover
                    .confirmed(action.direction(), self.window_for(state, action))
        };

        Qualification {
            buy: check(Action::Buy),
            sell: check(Action::Sell),
        }
    }

    /// Advance or reset the candidate counters for one closed bar.
    pub fn record_bar(&self, state: &mut SymbolState, qualification: Qualification) {
        for action in [Action::Buy, Action::Sell] {
            if !qualification.qualifies(action) {
                *state.candidates_mut(action) = 0;
            }
        }
        for action in [Action::Buy, Action::Sell] {
            if qualification.qualifies(action) {
                *state.candidates_mut(action) += 1;
                *state.candidates_mut(action.opposite()) = 0;
            }
        }
    }

    /// The transition the counters call for, ignoring cooldown.
    fn pending(&self, state: &SymbolState, now_ms: i64) -> Option<Action> {
        match state.held_action {
            None => [Action::Buy, Action::Sell]
                .into_iter()
                .find(|a| state.candidates(*a) >= self.config.confirm_set),
            Some(held) => {
                let target = held.opposite();
                if state.candidates(target) < self.config.confirm_flip {
                    return None;
                }
                let held_for = state.held_since.map(|t| now_ms.saturating_sub(t)).unwrap_or(i64::MAX);
                if held_for < self.config.min_hold_ms {
                    debug!(
                        "Flip to {} waiting on min hold ({}ms of {}ms)",
                        target, held_for, self.config.min_hold_ms
                    );
                    return None;
                }
                Some(target)
            }
        }
    }

    fn cooling_down(&self, state: &SymbolState, now_ms: i64) -> bool {
        state
            .last_signal_at
            .map(|t| now_ms.saturating_sub(t) < self.config.cooldown_ms)
            .unwrap_or(false)
    }

    /// Fire the pending transition if nothing blocks it.
    ///
    /// On firing, the state is committed (held action, timestamps, counters)
    /// and the new action returned; the caller emits exactly one signal for it.
    pub fn evaluate(&self, state: &mut SymbolState, now_ms: i64) -> Option<Action> {
        let action = self.pending(state, now_ms)?;

        if self.cooling_down(state, now_ms) {
            debug!("Transition to {} deferred by cooldown", action);
            return None;
        }

        state.held_action = Some(action);
        state.held_since = Some(now_ms);
        state.last_signal_at = Some(now_ms);
        state.buy_candidates = 0;
        state.sell_candidates = 0;
        Some(action)
    }
}
