//! Replays JSON-lines ticks from stdin and prints signals as JSON lines.

use std::sync::Arc;
use std::time::Duration;
use ticksignal::services::{BroadcastSink, Fanout, SignalLog};
use ticksignal::{Config, SignalEngine, Tick, TickFeed};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries signals only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticksignal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    info!(
        "Starting ticksignal: {}ms bars, trend {:?}, EMA {}/{}, confirm {}/{}",
        config.primary_interval_ms,
        config.trend_interval_ms,
        config.indicators.ema_fast,
        config.indicators.ema_slow,
        config.confirmation.confirm_set,
        config.confirmation.confirm_flip
    );

    let log = Arc::new(SignalLog::new(config.recent_signal_capacity));
    let (broadcaster, mut signals) = BroadcastSink::new(1024);
    let sink = Fanout::new().with(log.clone()).with(broadcaster);
    let sweep = Duration::from_millis(config.sweep_interval_ms);

    let engine = Arc::new(SignalEngine::new(config, Arc::new(sink))?);
    let (tick_tx, tick_rx) = mpsc::channel::<Tick>(4096);

    // Read ticks from stdin
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut line_no = 0u64;
        while let Ok(Some(line)) = lines.next_line().await {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Tick>(line) {
                Ok(tick) => {
                    if tick_tx.send(tick).await.is_err() {
                        debug!("Feed closed, stopping reader");
                        break;
                    }
                }
                Err(e) => warn!("Skipping line {}: {}", line_no, e),
            }
        }
    });

    // Print signals as they are emitted
    let printer = tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Ok(signal) => match serde_json::to_string(&signal) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Failed to encode signal: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Signal printer lagged, {} signals dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let stats = TickFeed::new(engine).with_sweep(sweep).run(tick_rx).await;
    reader.abort();
    // The feed owned the last engine handle; dropping it closes the broadcast.
    printer.await?;

    let stats = stats?;
    info!(
        "Replay done: {} ticks, {} signals, {} sweeps",
        stats.ticks, stats.signals, stats.sweeps
    );
    if let Some(latest) = log.latest() {
        info!("Last signal: {} (R:R {:.2})", latest, latest.reward_risk());
    }

    Ok(())
}
