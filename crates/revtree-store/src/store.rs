//! Store sessions, read/write transactions, and the commit protocol.
//!
//! A [`TreeStore`] owns the uber page, the persistent page cache and
//! the backing store. Readers resolve node keys against any published
//! revision without coordination; at most one [`WriteTransaction`] is
//! open at a time and privately owns its transaction page cache until
//! commit.
//!
//! Commit walks the pages reachable from the in-progress revision root
//! depth first, assigns each dirty page a fresh stable key, serializes
//! it into the persistent cache and the backing store, syncs, and only
//! then rewrites the uber page image at its reserved key. A crash
//! before that final rewrite leaves the previously published revision
//! fully intact because no already-durable page is ever touched.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use revtree_error::{Result, RevTreeError};
use revtree_types::{LogKey, NodeKey, PageKey, Record, RevisionNumber, TrieLayout};
use tracing::{debug, info, trace};

use crate::backend::{MemoryStore, PageStore, SledStore};
use crate::codec::{BinaryCodec, PageCodec};
use crate::page::{Page, PageKind, TRIE_REF};
use crate::page_ref::PageRef;
use crate::persistent_cache::PersistentPageCache;
use crate::txn_cache::TransactionPageCache;

mod sealed {
    pub trait Sealed {}
}

/// Read access to one revision of the tree, for the axis and query
/// layers above this crate. Sealed: only store-owned handle types can
/// implement it.
pub trait PageReadAccess: sealed::Sealed {
    /// Revision this handle resolves against.
    fn revision(&self) -> RevisionNumber;

    /// Last node key allocated up to and including this revision.
    fn max_node_key(&self) -> i64;

    /// Resolve a node key to its record, or `None` when no record was
    /// ever written under the key.
    fn record(&self, key: NodeKey) -> Result<Option<Record>>;
}

/// Open configuration, built once and threaded through every trie
/// operation.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    layout: TrieLayout,
}

impl StoreConfig {
    #[must_use]
    pub const fn new(layout: TrieLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> TrieLayout {
        self.layout
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(TrieLayout::DEFAULT)
    }
}

#[derive(Debug)]
struct StoreState {
    uber: Page,
    writer_active: bool,
}

#[derive(Debug)]
struct StoreShared {
    layout: TrieLayout,
    codec: BinaryCodec,
    backend: Box<dyn PageStore>,
    cache: PersistentPageCache,
    state: Mutex<StoreState>,
}

impl StoreShared {
    /// Fetch a published page: persistent cache first, then backing
    /// store, populating the cache on a store hit.
    fn fetch_page(&self, key: PageKey) -> Result<Page> {
        if let Some(image) = self.cache.get(key)? {
            return self.codec.deserialize(&image);
        }
        let image = self.backend.get(key)?.ok_or_else(|| {
            RevTreeError::store_io(format!("missing page image for key {}", key.get()))
        })?;
        self.cache.put(key, &image)?;
        self.codec.deserialize(&image)
    }

    /// Walk the trie of a published revision root down to the leaf
    /// record page holding `key`. `None` when any reference on the
    /// path is absent.
    fn walk_to_leaf(&self, root: &Page, key: NodeKey) -> Result<Option<(PageKey, Page)>> {
        self.layout
            .check(key)
            .map_err(|(key, max)| RevTreeError::TrieAddress { key, max })?;
        let mut slot = root.reference(TRIE_REF).clone();
        let mut level = 0;
        loop {
            let page_key = match slot {
                PageRef::Absent => return Ok(None),
                PageRef::Durable(page_key) => page_key,
                PageRef::Log(_) | PageRef::InMemory(_) => {
                    return Err(RevTreeError::internal(
                        "published revision holds an unpersisted page reference",
                    ))
                }
            };
            let page = self.fetch_page(page_key)?;
            if level == self.layout.levels() {
                return Ok(Some((page_key, page)));
            }
            slot = page.reference(self.layout.digit(key, level)).clone();
            level += 1;
        }
    }
}

/// An embeddable temporal page store: every committed revision stays
/// independently readable, and each commit stores only the pages it
/// actually changed.
#[derive(Debug)]
pub struct TreeStore {
    shared: Arc<StoreShared>,
}

impl TreeStore {
    /// Open (or create) a store rooted at `path`. The directory gains
    /// two sled trees: `store` for the authoritative page images and
    /// `cache` for the persistent page cache. A fresh store publishes
    /// revision 0 with an empty trie before this returns.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let backend = SledStore::open(&path.join("store"))?;
        let cache = PersistentPageCache::open(&path.join("cache"))?;
        Self::with_backend(Box::new(backend), cache, config)
    }

    /// Open an ephemeral store for tests and scratch use.
    pub fn in_memory(config: StoreConfig) -> Result<Self> {
        Self::with_backend(
            Box::new(MemoryStore::new()),
            PersistentPageCache::temporary()?,
            config,
        )
    }

    fn with_backend(
        backend: Box<dyn PageStore>,
        cache: PersistentPageCache,
        config: StoreConfig,
    ) -> Result<Self> {
        let layout = config.layout();
        let codec = BinaryCodec::new(layout);
        let uber = match backend.get(PageKey::UBER)? {
            Some(image) => {
                let uber = codec.deserialize(&image)?;
                if uber.kind() != PageKind::Uber {
                    return Err(RevTreeError::codec(format!(
                        "reserved page key holds a {:?} page",
                        uber.kind()
                    )));
                }
                debug!(
                    revisions = uber.revision_count().unwrap_or(0),
                    "opened existing store"
                );
                uber
            }
            None => bootstrap(&codec, &cache, backend.as_ref())?,
        };
        Ok(Self {
            shared: Arc::new(StoreShared {
                layout,
                codec,
                backend,
                cache,
                state: Mutex::new(StoreState {
                    uber,
                    writer_active: false,
                }),
            }),
        })
    }

    /// Trie layout this store was opened with.
    #[must_use]
    pub fn layout(&self) -> TrieLayout {
        self.shared.layout
    }

    /// Number of published revisions. At least 1: revision 0 is
    /// published at bootstrap.
    #[must_use]
    pub fn revision_count(&self) -> u32 {
        self.shared
            .state
            .lock()
            .uber
            .revision_count()
            .unwrap_or(0)
    }

    /// Latest published revision.
    #[must_use]
    pub fn latest_revision(&self) -> RevisionNumber {
        RevisionNumber::new(self.revision_count().saturating_sub(1))
    }

    /// Open a read handle on a published revision.
    pub fn begin_read(&self, revision: RevisionNumber) -> Result<TreeReader> {
        let root_key = {
            let state = self.shared.state.lock();
            let idx = revision.get() as usize;
            if idx >= state.uber.ref_count() {
                return Err(RevTreeError::RevisionNotFound {
                    revision: revision.get(),
                });
            }
            match state.uber.reference(idx) {
                PageRef::Durable(page_key) => *page_key,
                _ => {
                    return Err(RevTreeError::internal(
                        "uber page holds an unpersisted revision root reference",
                    ))
                }
            }
        };
        let root = self.shared.fetch_page(root_key)?;
        if root.revision() != Some(revision) {
            return Err(RevTreeError::internal(format!(
                "revision root {} stored under revision slot {}",
                root.revision().map_or(-1, |r| i64::from(r.get())),
                revision.get()
            )));
        }
        Ok(TreeReader {
            shared: Arc::clone(&self.shared),
            root,
            revision,
        })
    }

    /// Open a read handle on the latest published revision.
    pub fn begin_read_latest(&self) -> Result<TreeReader> {
        self.begin_read(self.latest_revision())
    }

    /// One-shot resolve of a node key against a published revision.
    pub fn resolve(&self, revision: RevisionNumber, key: NodeKey) -> Result<Option<Record>> {
        self.begin_read(revision)?.record(key)
    }

    /// Open a write transaction based on the latest published revision.
    pub fn begin_write(&self) -> Result<WriteTransaction> {
        self.open_write_transaction(self.latest_revision())
    }

    /// Open a write transaction producing the revision after `base`.
    ///
    /// # Errors
    ///
    /// `Busy` when a write transaction is already open or `base` is no
    /// longer the latest revision; `RevisionNotFound` when `base` was
    /// never published.
    pub fn open_write_transaction(&self, base: RevisionNumber) -> Result<WriteTransaction> {
        let (base_key, next_revision) = {
            let mut state = self.shared.state.lock();
            let count = state
                .uber
                .revision_count()
                .ok_or_else(|| RevTreeError::internal("uber page lost its payload"))?;
            if base.get() >= count {
                return Err(RevTreeError::RevisionNotFound {
                    revision: base.get(),
                });
            }
            if state.writer_active || base.next().get() != count {
                return Err(RevTreeError::Busy);
            }
            let base_key = match state.uber.reference(base.get() as usize) {
                PageRef::Durable(page_key) => *page_key,
                _ => {
                    return Err(RevTreeError::internal(
                        "uber page holds an unpersisted revision root reference",
                    ))
                }
            };
            state.writer_active = true;
            (base_key, base.next())
        };

        let base_root = match self.shared.fetch_page(base_key) {
            Ok(page) => page,
            Err(err) => {
                self.shared.state.lock().writer_active = false;
                return Err(err);
            }
        };
        debug!(
            base = base.get(),
            next = next_revision.get(),
            "opened write transaction"
        );
        Ok(WriteTransaction {
            shared: Arc::clone(&self.shared),
            log: TransactionPageCache::new(),
            root: base_root.clone_for_revision(next_revision),
            base,
            state: TxnState::Open,
            mutated: false,
        })
    }

    /// Stable page key of the leaf record page holding `key` in a
    /// published revision. Exposes physical identity so callers can
    /// observe structural sharing across revisions.
    pub fn leaf_page_key(&self, revision: RevisionNumber, key: NodeKey) -> Result<Option<PageKey>> {
        let reader = self.begin_read(revision)?;
        Ok(self
            .shared
            .walk_to_leaf(&reader.root, key)?
            .map(|(page_key, _)| page_key))
    }

    /// The backing store, mainly for write-volume inspection.
    #[must_use]
    pub fn backend(&self) -> &dyn PageStore {
        self.shared.backend.as_ref()
    }

    /// The persistent page cache.
    #[must_use]
    pub fn persistent_cache(&self) -> &PersistentPageCache {
        &self.shared.cache
    }
}

/// Immutable view of one published revision.
#[derive(Debug)]
pub struct TreeReader {
    shared: Arc<StoreShared>,
    root: Page,
    revision: RevisionNumber,
}

impl TreeReader {
    #[must_use]
    pub fn revision(&self) -> RevisionNumber {
        self.revision
    }

    /// Last node key allocated up to this revision, -1 when the
    /// revision chain never allocated any.
    #[must_use]
    pub fn max_node_key(&self) -> i64 {
        self.root.max_node_key().unwrap_or(-1)
    }

    /// Commit timestamp of this revision, milliseconds since the Unix
    /// epoch.
    #[must_use]
    pub fn timestamp_millis(&self) -> u64 {
        self.root.revision_timestamp_millis().unwrap_or(0)
    }

    /// Resolve a node key to its record in this revision.
    pub fn record(&self, key: NodeKey) -> Result<Option<Record>> {
        match self.shared.walk_to_leaf(&self.root, key)? {
            Some((_, leaf)) => Ok(leaf
                .records()
                .and_then(|records| records.get(&key.get()).cloned())),
            None => Ok(None),
        }
    }
}

impl sealed::Sealed for TreeReader {}

impl PageReadAccess for TreeReader {
    fn revision(&self) -> RevisionNumber {
        self.revision
    }

    fn max_node_key(&self) -> i64 {
        self.max_node_key()
    }

    fn record(&self, key: NodeKey) -> Result<Option<Record>> {
        self.record(key)
    }
}

/// Write-transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// The single writer is building the next revision.
    Open,
    /// Commit requested; the dirty page walk is running.
    Committing,
    /// The uber page advanced; the revision is visible to readers.
    Published,
    /// The transaction log was discarded without touching the store.
    Aborted,
}

/// Slot address inside the copy-on-write descent: either a slot on the
/// in-progress revision root or a slot on a page parked in the
/// transaction log.
#[derive(Clone, Copy)]
enum Loc {
    Root(usize),
    Log(LogKey, usize),
}

/// The store's single writer, building the next revision.
///
/// Every mutated page is copied onto the private transaction log;
/// nothing reaches the persistent cache or the backing store before
/// [`commit`](Self::commit). Dropping the transaction aborts it.
#[derive(Debug)]
pub struct WriteTransaction {
    shared: Arc<StoreShared>,
    log: TransactionPageCache,
    root: Page,
    base: RevisionNumber,
    state: TxnState,
    mutated: bool,
}

impl WriteTransaction {
    /// Revision this transaction will publish.
    #[must_use]
    pub fn revision(&self) -> RevisionNumber {
        self.root.revision().unwrap_or(self.base)
    }

    /// Revision this transaction was opened against.
    #[must_use]
    pub fn base_revision(&self) -> RevisionNumber {
        self.base
    }

    #[must_use]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Last allocated node key as seen by this transaction.
    #[must_use]
    pub fn max_node_key(&self) -> i64 {
        self.root.max_node_key().unwrap_or(-1)
    }

    /// Allocate the next node key and store `record` under it.
    pub fn create_record(&mut self, record: Record) -> Result<NodeKey> {
        let raw = self
            .root
            .allocate_node_key()
            .ok_or_else(|| RevTreeError::internal("revision root lost its payload"))?;
        let key = NodeKey::new(raw);
        self.mutated = true;
        self.put(key, record)?;
        Ok(key)
    }

    /// Store `record` under an explicit node key, copying the trie
    /// path from root to leaf on first touch.
    pub fn put(&mut self, key: NodeKey, record: Record) -> Result<()> {
        let leaf = self.prepare_leaf(key)?;
        let page = self
            .log
            .get_mut(leaf)
            .ok_or_else(|| RevTreeError::internal("dangling transaction log key"))?;
        page.records_mut()
            .ok_or_else(|| RevTreeError::internal("leaf log entry is not a record page"))?
            .insert(key.get(), record);
        trace!(key = key.get(), "record staged");
        Ok(())
    }

    /// Remove the record under `key`. Returns whether one was present.
    /// The leaf path is copied even when the key turns out absent from
    /// the leaf itself; a fully absent path is left untouched.
    pub fn remove(&mut self, key: NodeKey) -> Result<bool> {
        self.shared
            .layout
            .check(key)
            .map_err(|(key, max)| RevTreeError::TrieAddress { key, max })?;
        if self.record(key)?.is_none() {
            return Ok(false);
        }
        let leaf = self.prepare_leaf(key)?;
        let page = self
            .log
            .get_mut(leaf)
            .ok_or_else(|| RevTreeError::internal("dangling transaction log key"))?;
        let removed = page
            .records_mut()
            .ok_or_else(|| RevTreeError::internal("leaf log entry is not a record page"))?
            .remove(&key.get())
            .is_some();
        Ok(removed)
    }

    /// Resolve a node key with read-your-writes semantics: the
    /// transaction log shadows published pages on the descent.
    pub fn record(&self, key: NodeKey) -> Result<Option<Record>> {
        self.shared
            .layout
            .check(key)
            .map_err(|(key, max)| RevTreeError::TrieAddress { key, max })?;
        let mut slot = self.root.reference(TRIE_REF).clone();
        let mut level = 0;
        loop {
            let owned;
            let page: &Page = match &slot {
                PageRef::Absent => return Ok(None),
                PageRef::Log(log_key) => self
                    .log
                    .get(*log_key)
                    .ok_or_else(|| RevTreeError::internal("dangling transaction log key"))?,
                PageRef::Durable(page_key) => {
                    owned = self.shared.fetch_page(*page_key)?;
                    &owned
                }
                PageRef::InMemory(boxed) => {
                    owned = (**boxed).clone();
                    &owned
                }
            };
            if level == self.shared.layout.levels() {
                return Ok(page
                    .records()
                    .and_then(|records| records.get(&key.get()).cloned()));
            }
            slot = page.reference(self.shared.layout.digit(key, level)).clone();
            level += 1;
        }
    }

    /// Copy-on-write descent: ensure every page from the trie root to
    /// the leaf holding `key` lives in the transaction log, creating
    /// missing levels, and return the leaf's log key.
    fn prepare_leaf(&mut self, key: NodeKey) -> Result<LogKey> {
        let layout = self.shared.layout;
        layout
            .check(key)
            .map_err(|(key, max)| RevTreeError::TrieAddress { key, max })?;
        let mut loc = Loc::Root(TRIE_REF);
        for level in 0..layout.levels() {
            let log_key = self.materialize(loc, false)?;
            loc = Loc::Log(log_key, layout.digit(key, level));
        }
        self.materialize(loc, true)
    }

    /// Ensure the slot at `loc` points into the transaction log,
    /// cloning a published page or creating a fresh one as needed.
    fn materialize(&mut self, loc: Loc, leaf: bool) -> Result<LogKey> {
        // Fetch before mutating the slot so a failed read leaves the
        // descent state intact.
        let fetched = match self.slot(loc)? {
            PageRef::Durable(page_key) => {
                let mut page = self.shared.fetch_page(*page_key)?;
                page.mark_dirty();
                Some(page)
            }
            _ => None,
        };
        let taken = self.slot_mut(loc)?.take();
        let log_key = match (taken, fetched) {
            (PageRef::Log(log_key), _) => log_key,
            (PageRef::Durable(_), Some(page)) => self.log.put(page),
            (PageRef::InMemory(boxed), _) => {
                let mut page = *boxed;
                page.mark_dirty();
                self.log.put(page)
            }
            (PageRef::Absent, _) => {
                let fanout = self.shared.layout.fanout();
                let page = if leaf { Page::leaf() } else { Page::indirect(fanout) };
                self.log.put(page)
            }
            (PageRef::Durable(_), None) => {
                return Err(RevTreeError::internal("slot changed during descent"))
            }
        };
        *self.slot_mut(loc)? = PageRef::Log(log_key);
        if let Loc::Root(_) = loc {
            self.root.mark_dirty();
        }
        self.mutated = true;
        Ok(log_key)
    }

    fn slot(&self, loc: Loc) -> Result<&PageRef> {
        match loc {
            Loc::Root(idx) => Ok(self.root.reference(idx)),
            Loc::Log(log_key, idx) => Ok(self
                .log
                .get(log_key)
                .ok_or_else(|| RevTreeError::internal("dangling transaction log key"))?
                .reference(idx)),
        }
    }

    fn slot_mut(&mut self, loc: Loc) -> Result<&mut PageRef> {
        match loc {
            Loc::Root(idx) => Ok(self.root.reference_mut(idx)),
            Loc::Log(log_key, idx) => Ok(self
                .log
                .get_mut(log_key)
                .ok_or_else(|| RevTreeError::internal("dangling transaction log key"))?
                .reference_mut(idx)),
        }
    }

    /// Publish this transaction as a new revision and return its
    /// number. A transaction that staged nothing writes nothing and
    /// returns its base revision.
    pub fn commit(mut self) -> Result<RevisionNumber> {
        if !self.mutated {
            self.state = TxnState::Published;
            self.release_writer();
            debug!(base = self.base.get(), "empty commit, nothing written");
            return Ok(self.base);
        }
        self.state = TxnState::Committing;

        let (revision_count, start_key) = {
            let state = self.shared.state.lock();
            let count = state
                .uber
                .revision_count()
                .ok_or_else(|| RevTreeError::internal("uber page lost its payload"))?;
            let watermark = state
                .uber
                .max_page_key()
                .ok_or_else(|| RevTreeError::internal("uber page lost its payload"))?;
            (count, watermark)
        };

        // A revision root built against any other in-progress revision
        // is already durable or stale; skip without writing.
        if !commit_targets_current_revision(&self.root, revision_count) {
            debug!(
                root = self.root.revision().map_or(0, RevisionNumber::get),
                in_progress = revision_count,
                "commit request against a foreign revision root, skipping"
            );
            self.log.clear();
            self.state = TxnState::Aborted;
            self.release_writer();
            return Ok(RevisionNumber::new(revision_count.saturating_sub(1)));
        }

        self.root.set_revision_timestamp(unix_millis());
        let mut next_key = start_key;
        let root = std::mem::replace(&mut self.root, Page::leaf());
        let root_key = persist_page(
            &self.shared.codec,
            &self.shared.cache,
            self.shared.backend.as_ref(),
            &mut self.log,
            &mut next_key,
            root,
        )?;
        self.shared.backend.sync()?;

        {
            let mut state = self.shared.state.lock();
            state.uber.push_reference(PageRef::Durable(root_key));
            state.uber.set_max_page_key(next_key);
            publish_uber(
                &self.shared.codec,
                self.shared.backend.as_ref(),
                &state.uber,
            )?;
            state.writer_active = false;
        }
        self.state = TxnState::Published;
        info!(
            revision = revision_count,
            pages = next_key - start_key,
            "committed revision"
        );
        Ok(RevisionNumber::new(revision_count))
    }

    /// Discard the transaction log without touching the backing store
    /// or any published revision.
    pub fn abort(mut self) {
        self.log.clear();
        self.state = TxnState::Aborted;
        self.release_writer();
        debug!(base = self.base.get(), "write transaction aborted");
    }

    fn release_writer(&self) {
        self.shared.state.lock().writer_active = false;
    }
}

impl sealed::Sealed for WriteTransaction {}

impl PageReadAccess for WriteTransaction {
    fn revision(&self) -> RevisionNumber {
        self.revision()
    }

    fn max_node_key(&self) -> i64 {
        self.max_node_key()
    }

    fn record(&self, key: NodeKey) -> Result<Option<Record>> {
        self.record(key)
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if matches!(self.state, TxnState::Open | TxnState::Committing) {
            self.log.clear();
            self.state = TxnState::Aborted;
            self.release_writer();
            trace!(base = self.base.get(), "write transaction dropped, aborted");
        }
    }
}

/// Commit guard: only the revision root matching the uber page's
/// in-progress revision number may publish.
pub(crate) fn commit_targets_current_revision(root: &Page, revision_count: u32) -> bool {
    root.revision().map(RevisionNumber::get) == Some(revision_count)
}

/// Depth-first persist of a dirty page and every unpersisted page it
/// references: children gain stable keys before the parent serializes,
/// so a serialized parent only ever names durable children. Pages
/// already durable (clean, shared with older revisions) are skipped
/// untouched.
fn persist_page(
    codec: &BinaryCodec,
    cache: &PersistentPageCache,
    backend: &dyn PageStore,
    log: &mut TransactionPageCache,
    next_key: &mut u64,
    mut page: Page,
) -> Result<PageKey> {
    for idx in 0..page.ref_count() {
        let slot = page.reference_mut(idx).take();
        let persisted = match slot {
            PageRef::Absent => PageRef::Absent,
            PageRef::Durable(page_key) => PageRef::Durable(page_key),
            PageRef::Log(log_key) => {
                let child = log
                    .remove(log_key)
                    .ok_or_else(|| RevTreeError::internal("dangling transaction log key"))?;
                PageRef::Durable(persist_page(codec, cache, backend, log, next_key, child)?)
            }
            PageRef::InMemory(boxed) => {
                PageRef::Durable(persist_page(codec, cache, backend, log, next_key, *boxed)?)
            }
        };
        *page.reference_mut(idx) = persisted;
    }
    *next_key += 1;
    let key = PageKey::new(*next_key);
    page.clear_dirty();
    let image = codec.serialize(&page)?;
    cache.put(key, &image)?;
    backend.put(key, &image)?;
    trace!(page = key.get(), kind = ?page.kind(), "page persisted");
    Ok(key)
}

/// Rewrite the uber page image at its reserved key and sync: the
/// atomic publish point of a commit.
fn publish_uber(codec: &BinaryCodec, backend: &dyn PageStore, uber: &Page) -> Result<()> {
    let image = codec.serialize(uber)?;
    backend.put(PageKey::UBER, &image)?;
    backend.sync()
}

/// First open of a fresh store: publish revision 0 with an empty trie
/// and freshly created auxiliary index pages.
fn bootstrap(
    codec: &BinaryCodec,
    cache: &PersistentPageCache,
    backend: &dyn PageStore,
) -> Result<Page> {
    let mut uber = Page::uber();
    let mut root = Page::revision_root();
    root.set_revision_timestamp(unix_millis());
    let mut log = TransactionPageCache::new();
    let mut next_key = 0;
    let root_key = persist_page(codec, cache, backend, &mut log, &mut next_key, root)?;
    backend.sync()?;
    uber.push_reference(PageRef::Durable(root_key));
    uber.set_max_page_key(next_key);
    publish_uber(codec, backend, &uber)?;
    uber.clear_dirty();
    info!(pages = next_key, "bootstrapped fresh store at revision 0");
    Ok(uber)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
