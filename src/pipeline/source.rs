//! Event sources and their supervision
//!
//! A source is anything that pushes `EngineEvent`s into the ingestion
//! channel: an exchange stream, a chat-channel listener, a feed poller, or
//! manual input. Sources are independent tasks; a failing source is
//! restarted after a fixed backoff and never takes the pipeline down.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{EngineEvent, MarketTick, Signal};

/// Fixed delay before a failed source is restarted.
pub const DEFAULT_RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// A producer of engine events.
///
/// Implementations block inside `run` for as long as the source lives,
/// pushing events through the sender. Backpressure is delivered through the
/// bounded channel: `send` suspends when the queue is full, and sources must
/// tolerate that suspension without losing correctness.
///
/// Returning `Ok(())` means the source is finished and will not be
/// restarted; a source that should reconnect after a transient disconnect
/// must return an error instead.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Name of this source, for logging
    fn name(&self) -> &str;

    /// Run until the source ends or fails.
    async fn run(&mut self, sender: mpsc::Sender<EngineEvent>) -> Result<()>;
}

/// Spawn a source under supervision: on failure it is restarted after
/// `backoff`, forever, until it exits cleanly or the consumer side of the
/// channel goes away.
pub fn spawn_supervised(
    mut source: Box<dyn EventSource>,
    sender: mpsc::Sender<EngineEvent>,
    backoff: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            info!(source = source.name(), "Starting event source");
            match source.run(sender.clone()).await {
                Ok(()) => {
                    info!(source = source.name(), "Event source finished");
                    return;
                }
                Err(e) => warn!(source = source.name(), error = %e, "Event source failed"),
            }

            if sender.is_closed() {
                info!(source = source.name(), "Pipeline gone; source supervisor exiting");
                return;
            }
            tokio::time::sleep(backoff).await;
        }
    })
}

/// Manual input: one event per line on stdin.
///
/// Lines of the form `tick <INSTRUMENT> <PRICE>` become market ticks;
/// anything else is a signal. Malformed tick lines are dropped with a
/// warning.
pub struct StdinSource;

/// Parse one input line into an event, if it holds one.
fn parse_line(text: &str, now: chrono::DateTime<Utc>) -> Option<EngineEvent> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut parts = text.split_whitespace();
    if let Some(keyword) = parts.next() {
        if keyword.eq_ignore_ascii_case("tick") {
            let instrument = parts.next()?.to_uppercase();
            let price = parts.next()?.parse().ok()?;
            return Some(EngineEvent::Tick(MarketTick::new(instrument, price, now)));
        }
    }

    Some(EngineEvent::Signal(Signal::new("manual", text, now)))
}

#[async_trait]
impl EventSource for StdinSource {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn run(&mut self, sender: mpsc::Sender<EngineEvent>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| EngineError::Internal(format!("stdin read error: {e}")))?
        {
            let Some(event) = parse_line(&line, Utc::now()) else {
                if !line.trim().is_empty() {
                    warn!(line = %line.trim(), "Unparseable tick line dropped");
                }
                continue;
            };
            sender
                .send(event)
                .await
                .map_err(|e| EngineError::ChannelSend(e.to_string()))?;
        }

        Ok(())
    }
}
