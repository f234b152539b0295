//! Telegram adapter (teloxide).
//!
//! Implements the `linkbot-core` EventSource over `getUpdates` long polling and
//! the ReplySink over `sendMessage`.

use anyhow::Context as _;
use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{Update, UpdateKind},
};
use tokio::time::sleep;
use tracing::info;

use linkbot_core::{
    config::{Config, MAX_BATCH_SIZE},
    domain::{ChatId, Event, IncomingMessage},
    errors::Error,
    messaging::port::ReplySink,
    ports::EventSource,
    Result,
};

#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Build the bot from config and check the token against the API.
    pub async fn connect(cfg: &Config) -> anyhow::Result<Self> {
        let mut bot = Bot::new(cfg.telegram_bot_token.clone());
        if let Some(raw) = &cfg.telegram_api_url {
            let api_url = url::Url::parse(raw)
                .with_context(|| format!("invalid TELEGRAM_API_URL {raw:?}"))?;
            bot = bot.set_api_url(api_url);
        }

        let me = bot.get_me().await.context("telegram getMe failed")?;
        info!(username = %me.username(), "connected to telegram");

        Ok(Self::new(bot))
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    async fn with_retry<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, teloxide::RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map one update; anything but a text message from a user carries no message.
pub fn to_event(update: &Update) -> Event {
    let message = match &update.kind {
        UpdateKind::Message(msg) => incoming_message(msg),
        _ => None,
    };
    Event {
        sequence_id: i64::from(update.id),
        message,
    }
}

fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let text = msg.text()?;
    let user = msg.from()?;
    let sender_username = user
        .username
        .clone()
        .unwrap_or_else(|| fallback_owner(user.id.0));

    Some(IncomingMessage {
        text: text.to_string(),
        sender_username,
        chat_id: ChatId(msg.chat.id.0),
    })
}

/// Owner for users without a public username. Telegram usernames never contain
/// `-`, so this can't collide with a real one.
fn fallback_owner(user_id: u64) -> String {
    format!("id-{user_id}")
}

#[async_trait]
impl EventSource for TelegramClient {
    async fn fetch(&self, offset: i64, limit: usize) -> Result<Vec<Event>> {
        let offset = i32::try_from(offset)
            .map_err(|_| Error::Upstream(format!("offset {offset} out of range")))?;
        let limit = limit.clamp(1, MAX_BATCH_SIZE) as u8;

        let updates = self
            .with_retry(|| self.bot.get_updates().offset(offset).limit(limit).timeout(0))
            .await
            .map_err(|e| Error::Upstream(format!("telegram getUpdates: {e}")))?;

        Ok(updates.iter().map(to_event).collect())
    }
}

#[async_trait]
impl ReplySink for TelegramClient {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
                .disable_web_page_preview(true)
        })
        .await
        .map_err(|e| Error::Reply(format!("telegram sendMessage: {e}")))?;
        Ok(())
    }
}
