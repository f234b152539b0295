use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outbound reply port.
///
/// Implementations map delivery failures into `Error::Reply`.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
