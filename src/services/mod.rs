pub mod candles;
pub mod confirmation;
pub mod crossover;
pub mod engine;
pub mod feed;
pub mod indicators;
pub mod risk;
pub mod sink;
pub mod spike;

pub use candles::{BarSeries, BarUpdate, CandleAggregator};
pub use confirmation::{ConfirmationStateMachine, Qualification, SymbolState};
pub use crossover::CrossoverTracker;
pub use engine::{SignalEngine, SymbolSnapshot};
pub use feed::{BroadcastSink, FeedStats, TickFeed};
pub use indicators::{IndicatorEngine, IndicatorSnapshot};
pub use risk::{RiskCalculator, RiskLevels};
pub use sink::{Fanout, NullSink, SignalLog, SignalSink};
pub use spike::SpikeDetector;
