//! Durable second-level cache of serialized pages.
//!
//! Sits between the per-transaction log and the backing store: commit
//! writes every published page image here as well, and reads consult
//! the cache before touching the store. Entries are keyed by stable
//! page key and are immutable once written, so the cache never evicts
//! and never invalidates.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use revtree_error::{Result, RevTreeError};
use revtree_types::PageKey;
use tracing::{debug, trace};

/// Number of puts between automatic syncs of the cache tree.
const SYNC_AFTER: u64 = 10_000;

#[derive(Debug, Default)]
struct Counters {
    puts: u64,
    syncs: u64,
}

#[derive(Debug)]
pub struct PersistentPageCache {
    tree: sled::Db,
    path: Option<PathBuf>,
    counters: Mutex<Counters>,
}

impl PersistentPageCache {
    /// Open (or create) the cache tree rooted at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let tree = sled::Config::new().path(path).open().map_err(|err| {
            RevTreeError::StoreOpen {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        })?;
        debug!(path = %path.display(), "opened persistent page cache");
        Ok(Self {
            tree,
            path: Some(path.to_path_buf()),
            counters: Mutex::new(Counters::default()),
        })
    }

    /// Open a cache backed by a temporary tree that is deleted on drop.
    pub fn temporary() -> Result<Self> {
        let tree = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        Ok(Self {
            tree,
            path: None,
            counters: Mutex::new(Counters::default()),
        })
    }

    /// Record a serialized page image. Every [`SYNC_AFTER`]th put also
    /// syncs the tree to disk.
    pub fn put(&self, key: PageKey, image: &[u8]) -> Result<()> {
        self.tree
            .insert(key.get().to_be_bytes(), image)
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        let should_sync = {
            let mut counters = self.counters.lock();
            counters.puts += 1;
            counters.puts % SYNC_AFTER == 0
        };
        if should_sync {
            self.sync()?;
        }
        trace!(page = key.get(), bytes = image.len(), "cached page image");
        Ok(())
    }

    /// Look up the image cached under `key`.
    pub fn get(&self, key: PageKey) -> Result<Option<Vec<u8>>> {
        let found = self
            .tree
            .get(key.get().to_be_bytes())
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        Ok(found.map(|ivec| ivec.to_vec()))
    }

    /// Batch retrieval is not supported by this cache.
    pub fn get_all(&self, _keys: &[PageKey]) -> Result<Vec<Vec<u8>>> {
        Err(RevTreeError::UnsupportedBatchRead)
    }

    /// Sync the cache tree to disk.
    pub fn sync(&self) -> Result<()> {
        self.tree
            .flush()
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        self.counters.lock().syncs += 1;
        Ok(())
    }

    /// Destroy the cache: close the tree and remove its on-disk store.
    /// Irreversible; must not run while any transaction still expects
    /// the cached pages.
    pub fn clear(self) -> Result<()> {
        let Self { tree, path, .. } = self;
        tree.clear()
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        tree.flush()
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        drop(tree);
        if let Some(path) = path {
            debug!(path = %path.display(), "removing persistent page cache store");
            std::fs::remove_dir_all(&path)?;
        }
        Ok(())
    }

    /// Number of images written since the cache was opened.
    #[must_use]
    pub fn put_count(&self) -> u64 {
        self.counters.lock().puts
    }

    /// Number of syncs performed, counting both automatic and explicit
    /// ones.
    #[must_use]
    pub fn sync_count(&self) -> u64 {
        self.counters.lock().syncs
    }
}
