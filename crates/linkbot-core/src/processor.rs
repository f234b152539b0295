use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::{
    commands::{
        classify, hello_message, render_list, Command, MSG_ALREADY_EXISTS, MSG_HELP,
        MSG_NO_SAVED_PAGES, MSG_REMOVED, MSG_SAVED, MSG_UNKNOWN,
    },
    domain::{ChatId, IncomingMessage},
    errors::Context,
    messaging::port::ReplySink,
    ports::EventHandler,
    storage::{Page, Storage},
    Result,
};

/// One async mutex per owner, so check-then-write sequences on a collection
/// never interleave.
#[derive(Default)]
pub struct OwnerLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub async fn lock_owner(&self, owner: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(owner.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Command interpreter: classifies a message and runs its storage and reply
/// side effects.
pub struct Processor {
    storage: Arc<dyn Storage>,
    replies: Arc<dyn ReplySink>,
    owner_locks: OwnerLocks,
}

impl Processor {
    pub fn new(storage: Arc<dyn Storage>, replies: Arc<dyn ReplySink>) -> Self {
        Self {
            storage,
            replies,
            owner_locks: OwnerLocks::default(),
        }
    }

    pub async fn do_command(&self, text: &str, chat_id: ChatId, owner: &str) -> Result<()> {
        let text = text.trim();
        info!(owner, command = text, "got new command");

        let command = match classify(text) {
            Ok(command) => command,
            Err(e) => {
                // Malformed input still gets an answer from the fixed set.
                self.reply(chat_id, MSG_UNKNOWN)
                    .await
                    .context("can't do command: can't send unknown")?;
                return Err(e).context("can't parse command");
            }
        };

        match command {
            Command::Save(url) => self
                .save_page(chat_id, owner, url)
                .await
                .context("can't do command: save page"),
            Command::RemoveIndices(indices) => self
                .remove_pages(chat_id, owner, &indices)
                .await
                .context("can't do command: can't remove pages"),
            Command::List => self
                .send_list(chat_id, owner)
                .await
                .context("can't do command: can't send list"),
            Command::Random => self
                .send_random(chat_id, owner)
                .await
                .context("can't do command: can't send random"),
            Command::Help => self
                .reply(chat_id, MSG_HELP)
                .await
                .context("can't do command: can't send help"),
            Command::Start => self
                .reply(chat_id, &hello_message())
                .await
                .context("can't do command: can't send hello"),
            Command::NoOp => Ok(()),
            Command::Unrecognized(_) => self
                .reply(chat_id, MSG_UNKNOWN)
                .await
                .context("can't do command: can't send unknown"),
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.replies.send(chat_id, text).await
    }

    async fn save_page(&self, chat_id: ChatId, owner: &str, url: String) -> Result<()> {
        let _guard = self.owner_locks.lock_owner(owner).await;
        let page = Page::new(url, owner);

        if self.storage.exists(&page).await? {
            return self.reply(chat_id, MSG_ALREADY_EXISTS).await;
        }

        self.storage.save(&page).await?;
        self.reply(chat_id, MSG_SAVED).await
    }

    async fn remove_pages(
        &self,
        chat_id: ChatId,
        owner: &str,
        indices: &BTreeSet<usize>,
    ) -> Result<()> {
        let _guard = self.owner_locks.lock_owner(owner).await;

        let pages = match self.storage.list(owner).await {
            Ok(pages) => pages,
            Err(e) if e.is_no_saved_pages() => {
                return self.reply(chat_id, MSG_NO_SAVED_PAGES).await;
            }
            Err(e) => return Err(e),
        };

        // Highest position first, so each index still refers to the listing above.
        for &index in indices.iter().rev() {
            let Some(page) = index.checked_sub(1).and_then(|i| pages.get(i)) else {
                warn!(owner, index, total = pages.len(), "page index out of range");
                continue;
            };
            if let Err(e) = self.storage.remove(page).await {
                warn!(owner, index, error = %e, "can't remove page");
            }
        }

        self.reply(chat_id, MSG_REMOVED).await
    }

    async fn send_list(&self, chat_id: ChatId, owner: &str) -> Result<()> {
        let pages = match self.storage.list(owner).await {
            Ok(pages) => pages,
            Err(e) if e.is_no_saved_pages() => {
                return self.reply(chat_id, MSG_NO_SAVED_PAGES).await;
            }
            Err(e) => return Err(e),
        };

        let list = render_list(pages.iter().map(|p| p.url.as_str()));
        self.reply(chat_id, &list).await
    }

    async fn send_random(&self, chat_id: ChatId, owner: &str) -> Result<()> {
        let _guard = self.owner_locks.lock_owner(owner).await;

        let page = match self.storage.pick_random(owner).await {
            Ok(page) => page,
            Err(e) if e.is_no_saved_pages() => {
                return self.reply(chat_id, MSG_NO_SAVED_PAGES).await;
            }
            Err(e) => return Err(e),
        };

        // A delivered pick is consumed.
        self.reply(chat_id, &page.url).await?;
        self.storage.remove(&page).await
    }
}

#[async_trait]
impl EventHandler for Processor {
    async fn handle(&self, msg: &IncomingMessage) -> Result<()> {
        self.do_command(&msg.text, msg.chat_id, &msg.sender_username)
            .await
    }
}
