//! Signal consumers.

use crate::types::{Signal, Spike};
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

/// Receives finalized signals, synchronously, right after the emitting tick.
pub trait SignalSink: Send + Sync {
    fn on_signal(&self, signal: &Signal);

    /// Spike notifications; ignored unless overridden.
    fn on_spike(&self, _spike: &Spike) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SignalSink for NullSink {
    fn on_signal(&self, _signal: &Signal) {}
}

/// Forwards to several sinks, in order.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn SignalSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn SignalSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl SignalSink for Fanout {
    fn on_signal(&self, signal: &Signal) {
        for sink in &self.sinks {
            sink.on_signal(signal);
        }
    }

    fn on_spike(&self, spike: &Spike) {
        for sink in &self.sinks {
            sink.on_spike(spike);
        }
    }
}

/// Keeps the newest signals and spikes in memory, newest first.
#[derive(Debug)]
pub struct SignalLog {
    signals: RwLock<VecDeque<Signal>>,
    spikes: RwLock<VecDeque<Spike>>,
    capacity: usize,
}

impl SignalLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            signals: RwLock::new(VecDeque::with_capacity(capacity)),
            spikes: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Stored signals, newest first.
    pub fn recent(&self) -> Vec<Signal> {
        let signals = self.signals.read().unwrap_or_else(PoisonError::into_inner);
        signals.iter().cloned().collect()
    }

    /// Stored spikes, newest first.
    pub fn recent_spikes(&self) -> Vec<Spike> {
        let spikes = self.spikes.read().unwrap_or_else(PoisonError::into_inner);
        spikes.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Signal> {
        let signals = self.signals.read().unwrap_or_else(PoisonError::into_inner);
        signals.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.signals.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.signals.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.spikes.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) {
    queue.push_front(item);
    queue.truncate(capacity);
}

impl SignalSink for SignalLog {
    fn on_signal(&self, signal: &Signal) {
        let mut signals = self.signals.write().unwrap_or_else(PoisonError::into_inner);
        push_bounded(&mut signals, signal.clone(), self.capacity);
    }

    fn on_spike(&self, spike: &Spike) {
        let mut spikes = self.spikes.write().unwrap_or_else(PoisonError::into_inner);
        push_bounded(&mut spikes, spike.clone(), self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn signal(ts: i64) -> Signal {
        Signal {
            symbol: "R_10".to_string(),
            action: Action::Sell,
            entry_price: 10.0,
            stop_loss: 11.0,
            take_profit: 8.0,
            atr: 0.5,
            timestamp_ms: ts,
        }
    }

    #[test]
    fn test_log_keeps_newest_first() {
        let log = SignalLog::new(10);
        log.on_signal(&signal(1));
        log.on_signal(&signal(2));
        let recent: Vec<i64> = log.recent().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(recent, vec![2, 1]);
        assert_eq!(log.latest().unwrap().timestamp_ms, 2);
    }

    #[test]
    fn test_log_is_bounded() {
        let log = SignalLog::new(3);
        for ts in 0..10 {
            log.on_signal(&signal(ts));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.recent()[2].timestamp_ms, 7);
    }

    #[test]
    fn test_log_clear() {
        let log = SignalLog::new(3);
        log.on_signal(&signal(1));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(SignalLog::new(5));
        let b = Arc::new(SignalLog::new(5));
        let fanout = Fanout::new().with(a.clone()).with(b.clone()).with(Arc::new(NullSink));
        fanout.on_signal(&signal(4));
        assert_eq!(a.len(), 1);
        assert_eq!(b.latest().unwrap().timestamp_ms, 4);
    }

    #[test]
    fn test_log_records_spikes() {
        let log = SignalLog::new(2);
        log.on_spike(&Spike {
            symbol: "BOOM500".to_string(),
            jump: 20.0,
            price: 520.0,
            timestamp_ms: 3,
        });
        assert_eq!(log.recent_spikes().len(), 1);
        assert!(log.recent().is_empty());
    }
}
