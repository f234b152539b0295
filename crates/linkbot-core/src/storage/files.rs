use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::fs;

use crate::{
    errors::{Context, Error},
    storage::{sort_pages, validate_owner, Page, Storage},
    Result,
};

/// One JSON file per page at `<base>/<owner>/<hash>`.
///
/// File presence is the only existence signal. A missing owner directory is an
/// empty collection.
pub struct FileStorage {
    base_path: PathBuf,
    rng: Mutex<StdRng>,
}

impl FileStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic random picks, for tests and reproducible runs.
    pub fn with_seed(base_path: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            base_path: base_path.into(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn owner_dir(&self, owner: &str) -> Result<PathBuf> {
        validate_owner(owner)?;
        Ok(self.base_path.join(owner))
    }

    fn page_path(&self, page: &Page) -> Result<PathBuf> {
        Ok(self.owner_dir(&page.owner)?.join(page.hash()))
    }

    /// Record files in `dir`, sorted by name. Empty when `dir` does not exist.
    async fn record_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut rd = match fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        while let Some(ent) = rd.next_entry().await? {
            if !ent.file_type().await?.is_file() {
                continue;
            }
            let name = ent.file_name();
            if name.to_str().is_some_and(is_record_name) {
                out.push(ent.path());
            }
        }
        out.sort();
        Ok(out)
    }

    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0..len)
    }
}

fn is_record_name(name: &str) -> bool {
    name.len() == 64 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

async fn decode_page(path: &Path) -> Result<Page> {
    let raw = fs::read(path).await.context("can't decode page")?;
    serde_json::from_slice(&raw).context("can't decode page")
}

#[async_trait]
impl Storage for FileStorage {
    async fn save(&self, page: &Page) -> Result<()> {
        let dir = self.owner_dir(&page.owner)?;
        fs::create_dir_all(&dir).await.context("can't save page")?;

        let path = dir.join(page.hash());
        let tmp = path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(page).context("can't save page")?;

        // Write-then-rename so a crash never leaves a truncated record behind.
        fs::write(&tmp, body).await.context("can't save page")?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e).context("can't save page");
        }
        Ok(())
    }

    async fn exists(&self, page: &Page) -> Result<bool> {
        let path = self.page_path(page)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
        .context("can't check if page exists")
    }

    async fn list(&self, owner: &str) -> Result<Vec<Page>> {
        let dir = self.owner_dir(owner)?;
        let paths = self
            .record_paths(&dir)
            .await
            .context("can't make page list")?;
        if paths.is_empty() {
            return Err(Error::NoSavedPages);
        }

        let mut pages = Vec::with_capacity(paths.len());
        for path in &paths {
            pages.push(decode_page(path).await.context("can't make page list")?);
        }
        sort_pages(&mut pages);
        Ok(pages)
    }

    async fn pick_random(&self, owner: &str) -> Result<Page> {
        let dir = self.owner_dir(owner)?;
        let paths = self
            .record_paths(&dir)
            .await
            .context("can't pick random page")?;
        if paths.is_empty() {
            return Err(Error::NoSavedPages);
        }

        let idx = self.pick_index(paths.len());
        decode_page(&paths[idx])
            .await
            .context("can't pick random page")
    }

    async fn remove(&self, page: &Page) -> Result<()> {
        let path = self.page_path(page)?;
        fs::remove_file(&path).await.context("can't remove page")
    }
}
