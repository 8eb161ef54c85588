//! Async driver around the synchronous engine.

use crate::error::Result;
use crate::services::engine::SignalEngine;
use crate::services::sink::SignalSink;
use crate::types::{Signal, Tick};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Republishes signals to broadcast subscribers.
pub struct BroadcastSink {
    tx: broadcast::Sender<Signal>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> (Arc<Self>, broadcast::Receiver<Signal>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Arc::new(Self { tx }), rx)
    }
}

impl SignalSink for BroadcastSink {
    fn on_signal(&self, signal: &Signal) {
        // No subscribers is fine.
        let _ = self.tx.send(signal.clone());
    }
}

/// Counters returned when a feed finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: u64,
    pub signals: u64,
    pub sweeps: u64,
}

/// Pumps ticks from a channel into a [`SignalEngine`].
pub struct TickFeed {
    engine: Arc<SignalEngine>,
    sweep_every: Option<Duration>,
    /// Latest tick timestamp seen across all symbols.
    clock_ms: Option<i64>,
    stats: FeedStats,
}

impl TickFeed {
    pub fn new(engine: Arc<SignalEngine>) -> Self {
        Self {
            engine,
            sweep_every: None,
            clock_ms: None,
            stats: FeedStats::default(),
        }
    }

    /// Periodically re-evaluate every symbol at the feed clock.
    /// A zero duration disables sweeping.
    pub fn with_sweep(mut self, every: Duration) -> Self {
        self.sweep_every = (!every.is_zero()).then_some(every);
        self
    }

    /// Run until the sender side closes or an invariant violation occurs.
    pub async fn run(mut self, mut ticks: mpsc::Receiver<Tick>) -> Result<FeedStats> {
        let sweeping = self.sweep_every.is_some();
        let mut timer = tokio::time::interval(self.sweep_every.unwrap_or(Duration::from_secs(3600)));
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "Tick feed started (sweep: {})",
            self.sweep_every
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_else(|| "off".to_string())
        );

        loop {
            tokio::select! {
                maybe_tick = ticks.recv() => {
                    let Some(tick) = maybe_tick else { break };
                    self.on_tick(&tick)?;
                }
                _ = timer.tick(), if sweeping => {
                    self.sweep()?;
                }
            }
        }

        if sweeping {
            self.sweep()?;
        }

        info!(
            "Tick feed finished: {} ticks, {} signals",
            self.stats.ticks, self.stats.signals
        );
        Ok(self.stats)
    }

    fn on_tick(&mut self, tick: &Tick) -> Result<()> {
        self.stats.ticks += 1;
        if self.engine.ingest(tick)?.is_some() {
            self.stats.signals += 1;
        }
        self.clock_ms = Some(
            self.clock_ms
                .map_or(tick.timestamp_ms, |clock| clock.max(tick.timestamp_ms)),
        );
        Ok(())
    }

    fn sweep(&mut self) -> Result<()> {
        let Some(now_ms) = self.clock_ms else {
            return Ok(());
        };
        self.stats.sweeps += 1;

        for symbol in self.engine.symbols() {
            match self.engine.evaluate(&symbol, now_ms) {
                Ok(Some(signal)) => {
                    debug!("Sweep at {} released {}", now_ms, signal);
                    self.stats.signals += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("Sweep stopped on {}: {}", symbol, err);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
