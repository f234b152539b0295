use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    errors::Error,
    storage::{sort_pages, validate_owner, Page, Storage},
    Result,
};

/// Volatile storage with the same contract as `FileStorage`.
pub struct MemoryStorage {
    // owner -> hash -> page
    pages: Mutex<BTreeMap<String, BTreeMap<String, Page>>>,
    rng: Mutex<StdRng>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(BTreeMap::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            pages: Mutex::new(BTreeMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn snapshot(&self, owner: &str) -> Result<Vec<Page>> {
        validate_owner(owner)?;
        let map = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        let pages: Vec<Page> = map
            .get(owner)
            .map(|by_hash| by_hash.values().cloned().collect())
            .unwrap_or_default();
        if pages.is_empty() {
            return Err(Error::NoSavedPages);
        }
        Ok(pages)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, page: &Page) -> Result<()> {
        validate_owner(&page.owner)?;
        let mut map = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(page.owner.clone())
            .or_default()
            .insert(page.hash(), page.clone());
        Ok(())
    }

    async fn exists(&self, page: &Page) -> Result<bool> {
        validate_owner(&page.owner)?;
        let map = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map
            .get(&page.owner)
            .is_some_and(|by_hash| by_hash.contains_key(&page.hash())))
    }

    async fn list(&self, owner: &str) -> Result<Vec<Page>> {
        let mut pages = self.snapshot(owner)?;
        sort_pages(&mut pages);
        Ok(pages)
    }

    async fn pick_random(&self, owner: &str) -> Result<Page> {
        // Snapshot is in hash order, matching FileStorage's sorted file names.
        let mut pages = self.snapshot(owner)?;
        let idx = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..pages.len())
        };
        Ok(pages.swap_remove(idx))
    }

    async fn remove(&self, page: &Page) -> Result<()> {
        validate_owner(&page.owner)?;
        let mut map = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        let removed = map
            .get_mut(&page.owner)
            .and_then(|by_hash| by_hash.remove(&page.hash()));
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("page {} not found", page.hash()),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn behaves_like_a_collection() {
        let storage = MemoryStorage::with_seed(1);
        let a = Page::new("https://example.com/a", "alice");
        let b = Page::new("https://example.com/b", "alice");

        assert!(storage.list("alice").await.unwrap_err().is_no_saved_pages());
        storage.save(&a).await.unwrap();
        storage.save(&b).await.unwrap();
        assert!(storage.exists(&a).await.unwrap());
        assert_eq!(storage.list("alice").await.unwrap().len(), 2);

        let picked = storage.pick_random("alice").await.unwrap();
        assert!(picked == a || picked == b);
        assert_eq!(storage.list("alice").await.unwrap().len(), 2);

        storage.remove(&a).await.unwrap();
        assert!(!storage.exists(&a).await.unwrap());
        assert!(storage.remove(&a).await.is_err());
    }
}
