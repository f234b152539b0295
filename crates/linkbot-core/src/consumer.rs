//! Batching event consumer.
//!
//! Pulls events from an [`EventSource`] starting at a cursor, hands each message
//! to an [`EventHandler`], and moves the cursor past the batch. Fetch failures
//! back off and retry from the same cursor; handler failures are logged and the
//! event is dropped.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    config::Config,
    domain::Cursor,
    errors::Context,
    ports::{EventHandler, EventSource},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ConsumerConfig {
    pub batch_size: usize,
    /// Pause after an empty batch.
    pub idle_delay: Duration,
    /// Pause after a failed fetch.
    pub error_delay: Duration,
}

impl From<&Config> for ConsumerConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            batch_size: cfg.batch_size,
            idle_delay: cfg.idle_delay,
            error_delay: cfg.error_delay,
        }
    }
}

/// Outcome of one fetch-and-dispatch cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Batch {
    pub next: Cursor,
    pub fetched: usize,
    pub failed: usize,
}

pub struct Consumer {
    source: Arc<dyn EventSource>,
    handler: Arc<dyn EventHandler>,
    cfg: ConsumerConfig,
}

impl Consumer {
    pub fn new(
        source: Arc<dyn EventSource>,
        handler: Arc<dyn EventHandler>,
        cfg: ConsumerConfig,
    ) -> Self {
        Self {
            source,
            handler,
            cfg,
        }
    }

    /// Fetch one batch at `cursor` and dispatch it.
    ///
    /// Only a fetch failure is returned as an error, in which case the caller
    /// keeps its cursor.
    pub async fn poll_once(&self, cursor: Cursor) -> Result<Batch> {
        let events = self.source.fetch(cursor.0, self.cfg.batch_size).await?;

        let mut next = cursor;
        let mut failed = 0;
        for event in &events {
            next = next.max(Cursor::after(event.sequence_id));

            let Some(msg) = &event.message else {
                debug!(sequence_id = event.sequence_id, "skipping event without message");
                continue;
            };

            if let Err(e) = self.handler.handle(msg).await {
                failed += 1;
                error!(
                    sequence_id = event.sequence_id,
                    owner = %msg.sender_username,
                    error = %e,
                    "can't handle event"
                );
            }
        }

        Ok(Batch {
            next,
            fetched: events.len(),
            failed,
        })
    }

    /// Run until `shutdown` fires, returning the final cursor.
    ///
    /// Failing the very first fetch means the source was never reachable and is
    /// returned as an error; later failures are retried forever.
    pub async fn run(&self, start: Cursor, shutdown: CancellationToken) -> Result<Cursor> {
        let mut cursor = start;
        let mut reachable = false;

        loop {
            if shutdown.is_cancelled() {
                return Ok(cursor);
            }

            let pause = match self.poll_once(cursor).await {
                Ok(batch) => {
                    reachable = true;
                    cursor = batch.next;
                    (batch.fetched == 0).then_some(self.cfg.idle_delay)
                }
                Err(e) if !reachable => {
                    return Err(e).context("can't reach event source");
                }
                Err(e) => {
                    warn!(cursor = cursor.0, error = %e, "can't fetch events, retrying");
                    Some(self.cfg.error_delay)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(cursor),
                    _ = sleep(pause) => {}
                }
            }
        }
    }
}
