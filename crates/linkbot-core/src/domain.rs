/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Position in the upstream event stream.
///
/// Holds the smallest sequence id not yet handed to the interpreter. It lives in
/// memory only, so a restart replays from whatever the source still retains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor(pub i64);

impl Cursor {
    /// Cursor positioned right after the given event.
    pub fn after(sequence_id: i64) -> Self {
        Self(sequence_id.saturating_add(1))
    }
}

/// One inbound unit of work from the upstream source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub sequence_id: i64,
    pub message: Option<IncomingMessage>,
}

/// A text message carried by an [`Event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub text: String,
    pub sender_username: String,
    pub chat_id: ChatId,
}
