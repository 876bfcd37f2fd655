//! Replication log writer interface.
//!
//! The transactional controller hands the original modification list and
//! DN to the replication log writer before committing, for every
//! operation except derived/cascading ones (a modify triggered by another
//! modify must not independently generate a replication log entry).

use crate::backend::EntryId;
use crate::context::OperationContext;
use crate::error::{ModifyError, ModifyResult};
use crate::modify::ModificationList;
use crate::schema::SchemaRegistry;
use async_trait::async_trait;
use std::sync::Mutex;

/// Generates replication metadata for a modify about to commit.
#[async_trait]
pub trait ReplicationLogWriter: Send + Sync {
    /// Called inside the transaction, after the entry write and before
    /// commit. A failure aborts the transaction.
    async fn precommit(
        &self,
        schema: &SchemaRegistry,
        entry_id: EntryId,
        dn: &str,
        mods: &ModificationList,
        context: &OperationContext,
    ) -> ModifyResult<()>;
}

/// A writer that generates nothing; for standalone deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReplicationLog;

#[async_trait]
impl ReplicationLogWriter for NoopReplicationLog {
    async fn precommit(
        &self,
        _schema: &SchemaRegistry,
        _entry_id: EntryId,
        _dn: &str,
        _mods: &ModificationList,
        _context: &OperationContext,
    ) -> ModifyResult<()> {
        Ok(())
    }
}

/// One change handed to the replication log, captured for inspection.
#[derive(Debug, Clone)]
pub struct RecordedChange {
    pub entry_id: EntryId,
    pub dn: String,
    pub mods: ModificationList,
    pub request_id: String,
}

/// A writer that records every precommit call; used in tests to observe
/// exactly what the controller hands to replication.
#[derive(Debug, Default)]
pub struct RecordingReplicationLog {
    changes: Mutex<Vec<RecordedChange>>,
    fail_next: Mutex<bool>,
}

impl RecordingReplicationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every change recorded so far.
    pub fn changes(&self) -> Vec<RecordedChange> {
        self.changes.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Make the next precommit call fail.
    pub fn fail_next(&self) {
        if let Ok(mut flag) = self.fail_next.lock() {
            *flag = true;
        }
    }
}

#[async_trait]
impl ReplicationLogWriter for RecordingReplicationLog {
    async fn precommit(
        &self,
        _schema: &SchemaRegistry,
        entry_id: EntryId,
        dn: &str,
        mods: &ModificationList,
        context: &OperationContext,
    ) -> ModifyResult<()> {
        if let Ok(mut flag) = self.fail_next.lock() {
            if *flag {
                *flag = false;
                return Err(ModifyError::Replication {
                    detail: "injected replication failure".to_string(),
                });
            }
        }
        if let Ok(mut changes) = self.changes.lock() {
            changes.push(RecordedChange {
                entry_id,
                dn: dn.to_string(),
                mods: mods.clone(),
                request_id: context.request_id.clone(),
            });
        }
        Ok(())
    }
}
