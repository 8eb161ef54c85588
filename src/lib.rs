//! Ticksignal - tick-to-signal pipeline with incremental indicators and debounced confirmation

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{EngineError, Result};
pub use services::{SignalEngine, SignalLog, SignalSink, TickFeed};
pub use types::*;
