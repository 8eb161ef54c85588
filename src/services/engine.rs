//! Tick-to-signal pipeline.
//!
//! [`SignalEngine`] shards all per-symbol state behind one map entry per
//! symbol, so a symbol's tick is processed to completion under its own lock
//! while other symbols proceed in parallel. The engine holds no timers and
//! performs no I/O; time only advances with tick (or sweep) timestamps.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::services::candles::CandleAggregator;
use crate::services::confirmation::{
    engulfing, is_flat_market, BarContext, ConfirmationStateMachine, SymbolState, TrendReading,
};
use crate::services::crossover::CrossoverTracker;
use crate::services::indicators::{IndicatorEngine, IndicatorSnapshot};
use crate::services::risk::RiskCalculator;
use crate::services::sink::SignalSink;
use crate::services::spike::SpikeDetector;
use crate::types::{Bar, Signal, Tick, Timeframe, TimeframeRole};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Everything the engine knows about one symbol.
struct SymbolPipeline {
    candles: CandleAggregator,
    primary: IndicatorEngine,
    trend: Option<IndicatorEngine>,
    crossover: CrossoverTracker,
    state: SymbolState,
    last_tick_ms: Option<i64>,
    last_price: Option<f64>,
    /// Set on the first invariant violation; the symbol stays halted.
    fault: Option<EngineError>,
}

/// Read-only view of a symbol's state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub state: SymbolState,
    pub indicators: Option<IndicatorSnapshot>,
    pub trend: Option<IndicatorSnapshot>,
    pub closed_bars: usize,
    pub last_tick_ms: Option<i64>,
    pub halted: bool,
}

/// Converts ticks into confirmed, rate-limited signals.
pub struct SignalEngine {
    config: Config,
    timeframes: Vec<Timeframe>,
    machine: ConfirmationStateMachine,
    risk: RiskCalculator,
    spikes: SpikeDetector,
    symbols: DashMap<String, SymbolPipeline>,
    sink: Arc<dyn SignalSink>,
}

impl SignalEngine {
    /// Create an engine; the configuration is validated first.
    pub fn new(config: Config, sink: Arc<dyn SignalSink>) -> Result<Self> {
        config.validate()?;

        let mut timeframes = vec![Timeframe::new(TimeframeRole::Primary, config.primary_interval_ms)];
        if let Some(trend_ms) = config.trend_interval_ms {
            timeframes.push(Timeframe::new(TimeframeRole::Trend, trend_ms));
        }

        let spikes = SpikeDetector::new(config.spike_thresholds.clone());
        if spikes.is_enabled() {
            info!("Spike detection on for {} symbols", config.spike_thresholds.len());
        }

        Ok(Self {
            machine: ConfirmationStateMachine::new(config.confirmation.clone()),
            risk: RiskCalculator::new(&config.risk, config.indicators.min_atr),
            spikes,
            timeframes,
            symbols: DashMap::new(),
            sink,
            config,
        })
    }

    fn new_pipeline(&self, symbol: &str) -> SymbolPipeline {
        let primary = IndicatorEngine::new(&self.config.indicators);
        debug!(
            "Tracking new symbol {} (signals possible after {} bars)",
            symbol,
            primary.warmup_bars()
        );
        SymbolPipeline {
            candles: CandleAggregator::new(symbol, &self.timeframes, self.config.max_history),
            primary,
            trend: self
                .config
                .trend_interval_ms
                .map(|_| IndicatorEngine::new(&self.config.indicators)),
            crossover: CrossoverTracker::new(
                self.config.confirm_window(),
                self.config.confirmation.min_gap_ratio,
            ),
            state: SymbolState::default(),
            last_tick_ms: None,
            last_price: None,
            fault: None,
        }
    }

    pub fn ingest(&self, tick: &Tick) -> Result<Option<Signal>> {
        self.ingest_tick(&tick.symbol, tick.price, tick.timestamp_ms)
    }

    /// Process one tick to completion.
    ///
    /// Stale, out-of-order and unusable ticks are dropped with a warning and
    /// yield `Ok(None)`. An invariant violation halts the symbol and is
    /// returned on this and every later call for it.
    pub fn ingest_tick(&self, symbol: &str, price: f64, timestamp_ms: i64) -> Result<Option<Signal>> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            warn!("Dropping tick without symbol (price {}, ts {})", price, timestamp_ms);
            return Ok(None);
        }
        if !price.is_finite() || price <= 0.0 {
            warn!("Dropping tick for {} with unusable price {}", symbol, price);
            return Ok(None);
        }
        if self.timeframes.iter().any(|tf| tf.bucket(timestamp_ms).is_none()) {
            warn!("Dropping tick for {} with out-of-range timestamp {}", symbol, timestamp_ms);
            return Ok(None);
        }

        let mut entry = self
            .symbols
            .entry(symbol.to_string())
            .or_insert_with(|| self.new_pipeline(symbol));
        let pipeline = entry.value_mut();

        if let Some(fault) = &pipeline.fault {
            return Err(fault.clone());
        }

        if let Some(last) = pipeline.last_tick_ms {
            if timestamp_ms < last {
                warn!(
                    "Dropping out-of-order tick for {}: {} < last {}",
                    symbol, timestamp_ms, last
                );
                return Ok(None);
            }
        }

        let prev_price = pipeline.last_price;
        pipeline.last_tick_ms = Some(timestamp_ms);
        pipeline.last_price = Some(price);

        let spike = self.spikes.check(symbol, prev_price, price, timestamp_ms);

        let signal = match self.advance(symbol, pipeline, price, timestamp_ms) {
            Ok(signal) => signal,
            Err(err) => {
                error!("Halting {}: {}", symbol, err);
                pipeline.fault = Some(err.clone());
                return Err(err);
            }
        };

        // Release the symbol's lock before calling out.
        drop(entry);

        if let Some(spike) = &spike {
            info!("Spike on {}: jump {:.2} to {}", spike.symbol, spike.jump, spike.price);
            self.sink.on_spike(spike);
        }
        if let Some(signal) = &signal {
            self.sink.on_signal(signal);
        }

        Ok(signal)
    }

    /// Re-evaluate a symbol without a tick, firing a deferred transition
    /// whose cooldown or minimum hold has cleared by `now_ms`.
    pub fn evaluate(&self, symbol: &str, now_ms: i64) -> Result<Option<Signal>> {
        let symbol = symbol.trim();
        let Some(mut entry) = self.symbols.get_mut(symbol) else {
            return Ok(None);
        };
        let pipeline = entry.value_mut();

        if let Some(fault) = &pipeline.fault {
            return Err(fault.clone());
        }
        if pipeline.last_tick_ms.map(|last| now_ms < last).unwrap_or(false) {
            debug!("Ignoring evaluation of {} at {} before its last tick", symbol, now_ms);
            return Ok(None);
        }

        let signal = self.try_emit(symbol, pipeline, now_ms);
        drop(entry);

        if let Some(signal) = &signal {
            self.sink.on_signal(signal);
        }
        Ok(signal)
    }

    /// Aggregate, update indicators on bar close, then try to fire.
    fn advance(
        &self,
        symbol: &str,
        pipeline: &mut SymbolPipeline,
        price: f64,
        now_ms: i64,
    ) -> Result<Option<Signal>> {
        let mut closed = pipeline.candles.ingest(price, now_ms)?;
        // Trend bars first so the filter reflects every bar closed by this tick.
        closed.sort_by_key(|c| c.timeframe.role != TimeframeRole::Trend);

        for bar in closed {
            match bar.timeframe.role {
                TimeframeRole::Trend => {
                    if let Some(trend) = pipeline.trend.as_mut() {
                        trend.update(symbol, &bar.bar)?;
                    }
                }
                TimeframeRole::Primary => self.on_primary_close(symbol, pipeline, &bar.bar, now_ms)?,
            }
        }

        Ok(self.try_emit(symbol, pipeline, now_ms))
    }

    fn on_primary_close(
        &self,
        symbol: &str,
        pipeline: &mut SymbolPipeline,
        bar: &Bar,
        now_ms: i64,
    ) -> Result<()> {
        let snapshot = pipeline.primary.update(symbol, bar)?;

        let (Some(ema_fast), Some(ema_slow), Some(rsi), Some(atr)) =
            (snapshot.ema_fast, snapshot.ema_slow, snapshot.rsi, snapshot.atr)
        else {
            // Not enough history yet: no crossover record, no candidates.
            return Ok(());
        };

        let record = pipeline.crossover.record(ema_fast, ema_slow, snapshot.close, now_ms);

        let series = pipeline
            .candles
            .series(TimeframeRole::Primary)
            .ok_or_else(|| EngineError::invariant(symbol, "primary bar series missing"))?;
        let history = series.history();
        if history.back() != Some(bar) {
            return Err(EngineError::invariant(
                symbol,
                format!("closed bar at {} is not the newest in history", bar.period_start),
            ));
        }

        let flat = is_flat_market(
            &series.recent_closes(3),
            atr,
            self.config.confirmation.flat_factor,
        );
        let pattern = match history.len() {
            n if n >= 2 => engulfing(&history[n - 2], &history[n - 1]),
            _ => None,
        };
        let trend = pipeline
            .trend
            .as_ref()
            .and_then(|t| t.snapshot())
            .and_then(|s| {
                Some(TrendReading {
                    close: s.close,
                    ema_slow: s.ema_slow?,
                })
            });

        let ctx = BarContext {
            crossover: &pipeline.crossover,
            rsi,
            trend,
            flat,
            pattern,
        };
        let qualification = self.machine.qualify(&pipeline.state, &ctx);
        self.machine.record_bar(&mut pipeline.state, qualification);

        debug!(
            "{} bar {}: {:?} gap {:.6} rsi {:.1} atr {:.6} flat {} -> buy {} sell {}",
            symbol,
            bar.period_start,
            record.direction,
            record.gap_ratio,
            rsi,
            atr,
            flat,
            pipeline.state.buy_candidates,
            pipeline.state.sell_candidates
        );

        Ok(())
    }

    /// Fire a pending transition using the latest indicator snapshot.
    fn try_emit(&self, symbol: &str, pipeline: &mut SymbolPipeline, now_ms: i64) -> Option<Signal> {
        let snapshot = pipeline.primary.snapshot().filter(|s| s.is_seeded())?;
        let atr = snapshot.atr?;

        let action = self.machine.evaluate(&mut pipeline.state, now_ms)?;
        let levels = self.risk.compute(action, snapshot.close, atr);

        let signal = Signal {
            symbol: symbol.to_string(),
            action,
            entry_price: snapshot.close,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            atr: levels.atr,
            timestamp_ms: now_ms,
        };
        info!("Signal {}", signal);
        Some(signal)
    }

    /// Read-only view of a tracked symbol.
    pub fn snapshot(&self, symbol: &str) -> Option<SymbolSnapshot> {
        let entry = self.symbols.get(symbol.trim())?;
        let pipeline = entry.value();
        Some(SymbolSnapshot {
            symbol: entry.key().clone(),
            state: pipeline.state.clone(),
            indicators: pipeline.primary.snapshot(),
            trend: pipeline.trend.as_ref().and_then(|t| t.snapshot()),
            closed_bars: pipeline
                .candles
                .series(TimeframeRole::Primary)
                .map(|s| s.history().len())
                .unwrap_or(0),
            last_tick_ms: pipeline.last_tick_ms,
            halted: pipeline.fault.is_some(),
        })
    }

    /// Symbols seen so far.
    pub fn symbols(&self) -> Vec<String> {
        self.symbols.iter().map(|e| e.key().clone()).collect()
    }

    /// Halt a symbol as if an invariant check had failed.
    #[cfg(test)]
    pub(crate) fn inject_fault(&self, symbol: &str, fault: EngineError) {
        if let Some(mut pipeline) = self.symbols.get_mut(symbol) {
            pipeline.fault = Some(fault);
        }
    }

    /// Timestamp of the last accepted tick for a symbol.
    pub fn last_tick(&self, symbol: &str) -> Option<i64> {
        self.symbols.get(symbol.trim()).and_then(|e| e.last_tick_ms)
    }
}
