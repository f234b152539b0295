//! Content-addressed bookmark storage.
//!
//! Every page is keyed by `Page::hash()`, a SHA-256 digest of its url and owner,
//! so "already saved" checks need no index and a collection can never hold two
//! copies of the same link.

use std::{fmt::Write, path::PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{errors::Error, Result};

pub mod files;
pub mod memory;

pub use files::FileStorage;
pub use memory::MemoryStorage;

/// A bookmarked link.
///
/// Two pages are the same entity when url and owner match; `created_at` is
/// ignored by equality and by the hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl Page {
    pub fn new(url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }

    /// Lowercase hex SHA-256 over the length-prefixed url and owner.
    pub fn hash(&self) -> String {
        let mut h = Sha256::new();
        for field in [&self.url, &self.owner] {
            h.update((field.len() as u64).to_le_bytes());
            h.update(field.as_bytes());
        }
        to_hex(&h.finalize())
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.owner == other.owner
    }
}

impl Eq for Page {}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Per-owner page collections.
///
/// `list` and `pick_random` report an empty (or never created) collection as
/// `Error::NoSavedPages`. Callers must check `exists` before `save`; `save` on
/// an existing hash overwrites the record.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, page: &Page) -> Result<()>;

    async fn exists(&self, page: &Page) -> Result<bool>;

    /// All pages of `owner`, oldest first (ties broken by hash).
    async fn list(&self, owner: &str) -> Result<Vec<Page>>;

    /// One page chosen uniformly at random. The page stays stored.
    async fn pick_random(&self, owner: &str) -> Result<Page>;

    /// Delete the page's record. A missing record is an error.
    async fn remove(&self, page: &Page) -> Result<()>;
}

/// Owners become directory names, so they must be one plain path component.
pub fn validate_owner(owner: &str) -> Result<()> {
    let reason = if owner.is_empty() {
        Some("owner is empty")
    } else if owner == "." || owner == ".." {
        Some("owner is a relative path component")
    } else if owner.contains(['/', '\\', '\0']) {
        Some("owner contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidPath {
            path: PathBuf::from(owner),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Canonical enumeration order shared by every storage variant.
pub(crate) fn sort_pages(pages: &mut [Page]) {
    pages.sort_by_cached_key(|p| (p.created_at, p.hash()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_ignores_created_at() {
        let a = Page::new("https://example.com/a", "alice");
        let mut b = a.clone();
        b.created_at = a.created_at + chrono::Duration::days(3);

        assert_eq!(a.hash(), a.hash());
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
        assert_eq!(a.hash().len(), 64);
        assert!(a.hash().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_differs_by_url_and_owner() {
        let base = Page::new("https://example.com/a", "alice");
        let other_url = Page::new("https://example.com/b", "alice");
        let other_owner = Page::new("https://example.com/a", "bob");
        assert_ne!(base.hash(), other_url.hash());
        assert_ne!(base.hash(), other_owner.hash());
        assert_ne!(base, other_owner);
    }

    #[test]
    fn hash_does_not_collide_on_shifted_boundary() {
        let a = Page::new("ab", "c");
        let b = Page::new("a", "bc");
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn owner_validation() {
        assert!(validate_owner("alice").is_ok());
        assert!(validate_owner("id42").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(
                matches!(validate_owner(bad), Err(Error::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
