//! EMA crossover classification with a bounded confirmation window.

use crate::types::{CrossoverRecord, Direction};
use std::collections::VecDeque;

/// Classifies closed bars by EMA relationship and remembers the last few.
#[derive(Debug, Clone)]
pub struct CrossoverTracker {
    window: VecDeque<CrossoverRecord>,
    capacity: usize,
    min_gap_ratio: f64,
}

impl CrossoverTracker {
    pub fn new(capacity: usize, min_gap_ratio: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            min_gap_ratio,
        }
    }

    /// UP/DOWN only when the EMAs are separated by at least the minimum gap ratio.
    pub fn classify(&self, ema_fast: f64, ema_slow: f64, close: f64) -> (Direction, f64) {
        let gap_ratio = if close != 0.0 {
            (ema_fast - ema_slow).abs() / close.abs()
        } else {
            0.0
        };

        let direction = if gap_ratio < self.min_gap_ratio {
            Direction::Flat
        } else if ema_fast > ema_slow {
            Direction::Up
        } else if ema_fast < ema_slow {
            Direction::Down
        } else {
            Direction::Flat
        };

        (direction, gap_ratio)
    }

    /// Classify and append one closed bar.
    pub fn record(&mut self, ema_fast: f64, ema_slow: f64, close: f64, timestamp_ms: i64) -> CrossoverRecord {
        let (direction, gap_ratio) = self.classify(ema_fast, ema_slow, close);
        let record = CrossoverRecord {
            direction,
            gap_ratio,
            timestamp_ms,
        };

        self.window.push_back(record);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        record
    }

    /// The most recent `n` records all point in `direction` with enough separation.
    pub fn confirmed(&self, direction: Direction, n: usize) -> bool {
        if n == 0 || direction == Direction::Flat || self.window.len() < n {
            return false;
        }
        self.window
            .iter()
            .rev()
            .take(n)
            .all(|r| r.direction == direction && r.gap_ratio >= self.min_gap_ratio)
    }

    pub fn latest(&self) -> Option<&CrossoverRecord> {
        self.window.back()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
