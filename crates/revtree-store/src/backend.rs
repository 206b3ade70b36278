//! Backing-store abstraction and the two bundled backends.
//!
//! The backing store holds the authoritative serialized page images.
//! It is deliberately dumb: a keyed blob store with a sync barrier.
//! All versioning semantics live above it, so alternative backends
//! (object stores, test doubles) only need these four operations.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use revtree_error::{Result, RevTreeError};
use revtree_types::PageKey;
use tracing::debug;

/// A keyed store of serialized page images.
///
/// Implementations must tolerate `put` overwriting an existing key:
/// the uber page image at the reserved key is rewritten on every
/// commit. All other keys are written exactly once.
pub trait PageStore: Send + Sync + std::fmt::Debug {
    /// Write (or overwrite) the image stored under `key`.
    fn put(&self, key: PageKey, image: &[u8]) -> Result<()>;

    /// Read the image stored under `key`, if any.
    fn get(&self, key: PageKey) -> Result<Option<Vec<u8>>>;

    /// Durability barrier: once this returns, every preceding `put`
    /// survives a crash.
    fn sync(&self) -> Result<()>;

    /// Number of images ever written, including overwrites.
    fn put_count(&self) -> u64;
}

/// Sled-backed durable store.
#[derive(Debug)]
pub struct SledStore {
    tree: sled::Db,
    puts: Mutex<u64>,
}

impl SledStore {
    /// Open (or create) a store rooted at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let tree = sled::Config::new().path(path).open().map_err(|err| {
            RevTreeError::StoreOpen {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        })?;
        debug!(path = %path.display(), "opened sled page store");
        Ok(Self {
            tree,
            puts: Mutex::new(0),
        })
    }
}

impl PageStore for SledStore {
    fn put(&self, key: PageKey, image: &[u8]) -> Result<()> {
        self.tree
            .insert(key.get().to_be_bytes(), image)
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        *self.puts.lock() += 1;
        Ok(())
    }

    fn get(&self, key: PageKey) -> Result<Option<Vec<u8>>> {
        let found = self
            .tree
            .get(key.get().to_be_bytes())
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        Ok(found.map(|ivec| ivec.to_vec()))
    }

    fn sync(&self) -> Result<()> {
        self.tree
            .flush()
            .map_err(|err| RevTreeError::store_io(err.to_string()))?;
        Ok(())
    }

    fn put_count(&self) -> u64 {
        *self.puts.lock()
    }
}

/// In-memory store for tests and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    images: HashMap<u64, Vec<u8>>,
    puts: u64,
    syncs: u64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sync barriers observed.
    #[must_use]
    pub fn sync_count(&self) -> u64 {
        self.inner.lock().syncs
    }
}

impl PageStore for MemoryStore {
    fn put(&self, key: PageKey, image: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.images.insert(key.get(), image.to_vec());
        inner.puts += 1;
        Ok(())
    }

    fn get(&self, key: PageKey) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().images.get(&key.get()).cloned())
    }

    fn sync(&self) -> Result<()> {
        self.inner.lock().syncs += 1;
        Ok(())
    }

    fn put_count(&self) -> u64 {
        self.inner.lock().puts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn PageStore) {
        let key = PageKey::new(7);
        assert_eq!(store.get(key).unwrap(), None);
        store.put(key, b"first").unwrap();
        assert_eq!(store.get(key).unwrap().as_deref(), Some(&b"first"[..]));

        // Overwrite is allowed (the uber page key is rewritten per commit).
        store.put(key, b"second").unwrap();
        assert_eq!(store.get(key).unwrap().as_deref(), Some(&b"second"[..]));
        assert_eq!(store.put_count(), 2);
        store.sync().unwrap();
    }

    #[test]
    fn memory_store_contract() {
        let store = MemoryStore::new();
        exercise(&store);
        assert_eq!(store.sync_count(), 1);
    }

    #[test]
    fn sled_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        exercise(&store);
    }

    #[test]
    fn sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.put(PageKey::new(1), b"durable").unwrap();
            store.sync().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(PageKey::new(1)).unwrap().as_deref(),
            Some(&b"durable"[..])
        );
    }
}
