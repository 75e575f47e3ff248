//! Asynchronous usage logger
//!
//! Records are handed to a bounded channel and persisted by a background
//! worker, so nothing on the request path ever waits for the usage store.
//! A full buffer or a store outage costs records only after bounded
//! retries, and always leaves a telemetry trail.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, error, warn};

use crate::domain::usage::{UsageRecord, UsageRepository};

/// Tuning for the background worker
#[derive(Debug, Clone)]
pub struct UsageLoggerConfig {
    /// Channel capacity; records beyond it are dropped with a counter
    pub buffer_size: usize,
    /// Maximum records persisted per store call
    pub batch_size: usize,
    /// Retries per batch before it is dropped
    pub retry_attempts: u32,
    /// Base backoff between retries, doubled per attempt
    pub retry_backoff_ms: u64,
}

impl Default for UsageLoggerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            batch_size: 32,
            retry_attempts: 3,
            retry_backoff_ms: 250,
        }
    }
}

/// Cheap clonable handle for the request path
#[derive(Debug, Clone)]
pub struct UsageLogger {
    sender: mpsc::Sender<UsageRecord>,
}

impl UsageLogger {
    /// Spawn the background worker and return the handle
    pub fn spawn(repository: Arc<dyn UsageRepository>, config: UsageLoggerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.buffer_size.max(1));

        tokio::spawn(run_worker(repository, receiver, config));

        Self { sender }
    }

    /// Enqueue a record. Never blocks and never fails the caller; a full
    /// buffer drops the record with a warning and a counter.
    pub fn log(&self, record: UsageRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::counter!("usage_records_dropped_total", "reason" => "buffer_full")
                    .increment(1);
                warn!("Usage log buffer full; dropping record");
            }
            Err(TrySendError::Closed(_)) => {
                metrics::counter!("usage_records_dropped_total", "reason" => "worker_stopped")
                    .increment(1);
                error!("Usage log worker is gone; dropping record");
            }
        }
    }
}

async fn run_worker(
    repository: Arc<dyn UsageRepository>,
    mut receiver: mpsc::Receiver<UsageRecord>,
    config: UsageLoggerConfig,
) {
    debug!("Usage log worker started");

    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];

        while batch.len() < config.batch_size {
            match receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        persist_with_retry(&repository, batch, &config).await;
    }

    debug!("Usage log worker stopped");
}

/// Persist a batch, retrying with bounded exponential backoff. A batch that
/// exhausts its retries is dropped and accounted for; a usage-store outage
/// must never surface beyond this function.
async fn persist_with_retry(
    repository: &Arc<dyn UsageRepository>,
    batch: Vec<UsageRecord>,
    config: &UsageLoggerConfig,
) {
    let size = batch.len();
    let mut attempt: u32 = 0;

    loop {
        match repository.append_batch(batch.clone()).await {
            Ok(()) => {
                metrics::counter!("usage_records_written_total").increment(size as u64);
                return;
            }
            Err(e) if attempt < config.retry_attempts => {
                attempt += 1;
                warn!(
                    attempt,
                    size, "Usage store unavailable, backing off: {}", e
                );

                let backoff = config
                    .retry_backoff_ms
                    .saturating_mul(1u64 << (attempt - 1).min(8));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                metrics::counter!("usage_records_dropped_total", "reason" => "store_unavailable")
                    .increment(size as u64);
                error!(
                    size,
                    "Dropping usage batch after {} attempts: {}", attempt, e
                );
                return;
            }
        }
    }
}
