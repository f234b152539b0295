use async_trait::async_trait;

use crate::{
    domain::{Event, IncomingMessage},
    Result,
};

/// Upstream event source (Telegram `getUpdates` today).
///
/// Supplying an offset acknowledges every event below it; there is no separate
/// ack call.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch up to `limit` events with `sequence_id >= offset`, ordered by id.
    async fn fetch(&self, offset: i64, limit: usize) -> Result<Vec<Event>>;
}

/// Consumer of fetched messages. Implemented by the command processor.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, msg: &IncomingMessage) -> Result<()>;
}
