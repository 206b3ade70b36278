use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for revtree operations.
///
/// Structured variants for the cases callers can act on, string details
/// where the backing store only hands us opaque failures. Backing-store
/// and codec failures are never retried internally; they propagate as
/// fatal for the current operation and the caller decides whether to
/// abort.
#[derive(Error, Debug)]
pub enum RevTreeError {
    // === Backing store ===
    /// The backing store (or persistent page cache) could not be opened.
    #[error("cannot open page store at '{path}': {detail}")]
    StoreOpen { path: PathBuf, detail: String },

    /// A get/put/sync/close against the backing store failed.
    #[error("page store I/O error: {detail}")]
    StoreIo { detail: String },

    /// Plain file I/O error (directory creation, store removal).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Page codec ===
    /// Malformed page bytes or an unknown page variant tag.
    #[error("page codec error: {detail}")]
    Codec { detail: String },

    // === Trie addressing ===
    /// Node key outside the range the configured trie can address.
    #[error("node key {key} outside addressable range (max {max})")]
    TrieAddress { key: u64, max: u64 },

    // === Persistent page cache ===
    /// Multi-key lookups on the persistent page cache are rejected by
    /// contract; callers must issue single-key gets.
    #[error("batch reads are not supported by the persistent page cache")]
    UnsupportedBatchRead,

    // === Revisions / transactions ===
    /// The requested revision has not been published.
    #[error("no such revision: {revision}")]
    RevisionNotFound { revision: u32 },

    /// A write transaction is already open, or the requested base
    /// revision is no longer the latest.
    #[error("store is busy: a write transaction is active")]
    Busy,

    // === Internal ===
    /// Internal invariant violation (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RevTreeError {
    /// Create a codec error.
    pub fn codec(detail: impl Into<String>) -> Self {
        Self::Codec {
            detail: detail.into(),
        }
    }

    /// Create a backing-store I/O error.
    pub fn store_io(detail: impl Into<String>) -> Self {
        Self::StoreIo {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same call can ever succeed without the
    /// caller changing something first.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Result type alias using `RevTreeError`.
pub type Result<T> = std::result::Result<T, RevTreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_trie_address() {
        let err = RevTreeError::TrieAddress {
            key: 1 << 60,
            max: (1 << 54) - 1,
        };
        assert_eq!(
            err.to_string(),
            format!(
                "node key {} outside addressable range (max {})",
                1_u64 << 60,
                (1_u64 << 54) - 1
            )
        );
    }

    #[test]
    fn error_display_store_open() {
        let err = RevTreeError::StoreOpen {
            path: PathBuf::from("/tmp/db"),
            detail: "already locked".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "cannot open page store at '/tmp/db': already locked"
        );
    }

    #[test]
    fn error_display_batch_read() {
        assert_eq!(
            RevTreeError::UnsupportedBatchRead.to_string(),
            "batch reads are not supported by the persistent page cache"
        );
    }

    #[test]
    fn convenience_constructors() {
        let err = RevTreeError::codec("unknown tag 0xff");
        assert!(matches!(err, RevTreeError::Codec { detail } if detail == "unknown tag 0xff"));

        let err = RevTreeError::store_io("flush failed");
        assert!(matches!(err, RevTreeError::StoreIo { detail } if detail == "flush failed"));

        let err = RevTreeError::internal("dangling log key");
        assert!(matches!(err, RevTreeError::Internal(msg) if msg == "dangling log key"));
    }

    #[test]
    fn transient_classification() {
        assert!(RevTreeError::Busy.is_transient());
        assert!(!RevTreeError::UnsupportedBatchRead.is_transient());
        assert!(!RevTreeError::internal("x").is_transient());
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RevTreeError = io_err.into();
        assert!(matches!(err, RevTreeError::Io(_)));
    }
}
