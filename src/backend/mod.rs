//! Backend store abstraction for the write path.
//!
//! This module provides a clean separation between storage concerns and
//! modify-protocol logic. The `BackendStore` trait hands out transactions;
//! all entry reads and writes go through a `BackendTxn`. Implementations
//! own page/row locking and report transient contention as
//! [`BackendError::Deadlock`], the one condition the transactional
//! controller retries.
//!
//! The backend is NOT responsible for:
//! - Schema validation or value normalization
//! - Replication metadata generation
//! - Access control decisions

pub mod in_memory;

pub use in_memory::{InMemoryBackend, InMemoryBackendStats};

use crate::entry::Entry;
use crate::modify::ModificationList;
use async_trait::async_trait;

/// Opaque internal identifier of an entry within the backend.
pub type EntryId = u64;

/// Transaction mode requested at begin time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnMode {
    ReadOnly,
    ReadWrite,
}

/// Lock strength for an entry read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

/// Errors surfaced by the backend store.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transient lock/deadlock contention; the caller may retry
    #[error("transaction deadlock detected")]
    Deadlock,

    /// No entry exists at the given DN
    #[error("no such entry: {dn}")]
    NoSuchEntry { dn: String },

    /// A DN-valued attribute points at an entry that does not exist
    #[error("attribute '{attribute}' references nonexistent entry '{dn}'")]
    DanglingReference { attribute: String, dn: String },

    /// Any other storage failure; never retried
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl BackendError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// A store that can open transactions over the directory tree.
#[async_trait]
pub trait BackendStore: Send + Sync {
    type Txn: BackendTxn;

    /// Begin a transaction in the given mode.
    async fn begin_txn(&self, mode: TxnMode) -> Result<Self::Txn, BackendError>;
}

/// One backend transaction.
///
/// All operations may report [`BackendError::Deadlock`]; the controller
/// aborts and retries the whole transaction when they do. A transaction
/// that is neither committed nor aborted must release its locks on drop.
#[async_trait]
pub trait BackendTxn: Send {
    /// Resolve a normalized DN to the entry's internal identifier.
    async fn dn_to_id(&mut self, dn: &str) -> Result<EntryId, BackendError>;

    /// Materialize an entry at the given lock strength.
    async fn entry_by_id(&mut self, id: EntryId, lock: LockMode) -> Result<Entry, BackendError>;

    /// Persist the mutated entry together with the modification list that
    /// produced it, so the backend can maintain its value indexes from
    /// what was actually added and removed.
    async fn write_entry(
        &mut self,
        mods: &ModificationList,
        entry: &Entry,
    ) -> Result<(), BackendError>;

    /// Whether the entry has no children.
    async fn is_leaf(&mut self, id: EntryId) -> Result<bool, BackendError>;

    /// Whether any other entry holds a membership reference to this one.
    async fn has_member_references(&mut self, id: EntryId) -> Result<bool, BackendError>;

    /// Check every DN-valued user attribute of the entry resolves to an
    /// existing entry.
    async fn check_dn_references(&mut self, entry: &Entry) -> Result<(), BackendError>;

    /// Commit staged writes.
    async fn commit(&mut self) -> Result<(), BackendError>;

    /// Discard staged writes and release locks.
    async fn abort(&mut self) -> Result<(), BackendError>;
}
