//! In-memory backend implementation.
//!
//! A thread-safe in-memory directory tree using a HashMap DIT with a
//! normalized-DN index, protected by an async RwLock. Designed for
//! testing, development, and embedding scenarios where persistence is
//! not required.
//!
//! Transactions stage their writes and apply them atomically on commit
//! under the write lock. Transient-contention behavior can be simulated
//! with [`InMemoryBackend::inject_deadlocks`], which makes the next N
//! DN resolutions fail with [`BackendError::Deadlock`].

use super::{BackendError, BackendStore, BackendTxn, EntryId, LockMode, TxnMode};
use crate::dn::{self, Dn};
use crate::entry::{AttributeValueSet, Entry, Value};
use crate::modify::ModificationList;
use crate::schema::{ATTR_DN, SchemaRegistry};
use async_trait::async_trait;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory directory backend.
#[derive(Clone)]
pub struct InMemoryBackend {
    state: Arc<RwLock<DitState>>,
    schema: Arc<SchemaRegistry>,
}

/// Counters exposed for tests and monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryBackendStats {
    pub entry_count: usize,
    pub txn_begin_count: u64,
}

#[derive(Default)]
struct DitState {
    next_id: EntryId,
    entries: HashMap<EntryId, StoredEntry>,
    dn_index: HashMap<String, EntryId>,
    injected_deadlocks: u32,
    txn_begin_count: u64,
}

#[derive(Clone)]
struct StoredEntry {
    dn_raw: String,
    dn_norm: String,
    // attribute canonical name -> raw values, insertion-ordered
    attributes: Vec<(String, Vec<Vec<u8>>)>,
}

impl InMemoryBackend {
    /// Create an empty backend bound to a schema context.
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            state: Arc::new(RwLock::new(DitState::default())),
            schema,
        }
    }

    /// Seed an entry with text attribute values.
    ///
    /// The DN pseudo-attribute is attached automatically when absent so
    /// that materialized entries always carry it.
    pub async fn add_entry(
        &self,
        dn: &str,
        attributes: &[(&str, &[&str])],
    ) -> Result<EntryId, BackendError> {
        let parsed = Dn::parse(&self.schema, dn)
            .map_err(|e| BackendError::storage(format!("bad seed DN: {e}")))?;
        let mut stored = StoredEntry {
            dn_raw: parsed.raw().to_string(),
            dn_norm: parsed.normalized().to_string(),
            attributes: Vec::new(),
        };
        for (name, values) in attributes {
            let descriptor = self
                .schema
                .resolve(name)
                .ok_or_else(|| BackendError::storage(format!("unknown seed attribute '{name}'")))?;
            stored.attributes.push((
                descriptor.name.clone(),
                values.iter().map(|v| v.as_bytes().to_vec()).collect(),
            ));
        }
        if !stored
            .attributes
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(ATTR_DN))
        {
            stored
                .attributes
                .push((ATTR_DN.to_string(), vec![parsed.raw().as_bytes().to_vec()]));
        }

        let mut state = self.state.write().await;
        if state.dn_index.contains_key(&stored.dn_norm) {
            return Err(BackendError::storage(format!("entry '{dn}' already exists")));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.dn_index.insert(stored.dn_norm.clone(), id);
        state.entries.insert(id, stored);
        Ok(id)
    }

    /// Materialize a snapshot of an entry for test assertions.
    pub async fn entry(&self, dn: &str) -> Option<Entry> {
        let normalized = dn::normalize_dn(&self.schema, dn).ok()?;
        let state = self.state.read().await;
        let id = *state.dn_index.get(&normalized)?;
        let stored = state.entries.get(&id)?;
        let mut entry = materialize(&self.schema, stored).ok()?;
        entry.set_backend_id(id);
        Some(entry)
    }

    /// Make the next `count` DN resolutions fail with a deadlock.
    pub async fn inject_deadlocks(&self, count: u32) {
        self.state.write().await.injected_deadlocks = count;
    }

    /// Counters for tests and monitoring.
    pub async fn stats(&self) -> InMemoryBackendStats {
        let state = self.state.read().await;
        InMemoryBackendStats {
            entry_count: state.entries.len(),
            txn_begin_count: state.txn_begin_count,
        }
    }

    /// Remove all entries (useful for testing).
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.dn_index.clear();
    }
}

fn materialize(schema: &Arc<SchemaRegistry>, stored: &StoredEntry) -> Result<Entry, BackendError> {
    let dn = Dn::parse(schema, &stored.dn_raw)
        .map_err(|e| BackendError::storage(format!("stored DN unparsable: {e}")))?;
    let mut entry = Entry::new(dn, Arc::clone(schema));
    for (name, values) in &stored.attributes {
        let descriptor = schema
            .resolve(name)
            .ok_or_else(|| BackendError::storage(format!("stored attribute '{name}' unknown")))?;
        entry.insert_set(AttributeValueSet::with_values(
            descriptor,
            values.iter().map(|v| Value::new(v.clone())).collect(),
        ));
    }
    Ok(entry)
}

#[async_trait]
impl BackendStore for InMemoryBackend {
    type Txn = InMemoryTxn;

    async fn begin_txn(&self, mode: TxnMode) -> Result<Self::Txn, BackendError> {
        self.state.write().await.txn_begin_count += 1;
        trace!("beginning {mode:?} transaction");
        Ok(InMemoryTxn {
            state: Arc::clone(&self.state),
            schema: Arc::clone(&self.schema),
            mode,
            staged: Vec::new(),
        })
    }
}

/// A staged-write transaction over the in-memory DIT.
pub struct InMemoryTxn {
    state: Arc<RwLock<DitState>>,
    schema: Arc<SchemaRegistry>,
    mode: TxnMode,
    staged: Vec<StagedWrite>,
}

struct StagedWrite {
    id: EntryId,
    old_dn_norm: String,
    entry: StoredEntry,
}

#[async_trait]
impl BackendTxn for InMemoryTxn {
    async fn dn_to_id(&mut self, dn: &str) -> Result<EntryId, BackendError> {
        let mut state = self.state.write().await;
        if state.injected_deadlocks > 0 {
            state.injected_deadlocks -= 1;
            return Err(BackendError::Deadlock);
        }
        state
            .dn_index
            .get(dn)
            .copied()
            .ok_or_else(|| BackendError::NoSuchEntry { dn: dn.to_string() })
    }

    async fn entry_by_id(&mut self, id: EntryId, lock: LockMode) -> Result<Entry, BackendError> {
        trace!("reading entry {id} at {lock:?} strength");
        let state = self.state.read().await;
        let stored = state
            .entries
            .get(&id)
            .ok_or_else(|| BackendError::NoSuchEntry {
                dn: format!("#{id}"),
            })?;
        let mut entry = materialize(&self.schema, stored)?;
        entry.set_backend_id(id);
        Ok(entry)
    }

    async fn write_entry(
        &mut self,
        mods: &ModificationList,
        entry: &Entry,
    ) -> Result<(), BackendError> {
        if self.mode != TxnMode::ReadWrite {
            return Err(BackendError::storage("write in a read-only transaction"));
        }
        let normalized = entry.dn().normalized().to_string();
        // The entry may be mid-rename, so its DN can differ from the one
        // indexed; the identifier assigned at materialization is stable.
        let id = entry
            .backend_id()
            .ok_or_else(|| BackendError::storage("entry was not materialized by this backend"))?;
        debug!(
            "staging write of entry {} ({} records)",
            entry.dn().raw(),
            mods.len()
        );
        let old_dn_norm = {
            let state = self.state.read().await;
            state
                .entries
                .get(&id)
                .map(|stored| stored.dn_norm.clone())
                .unwrap_or_else(|| normalized.clone())
        };
        let stored = StoredEntry {
            dn_raw: entry.dn().raw().to_string(),
            dn_norm: normalized,
            attributes: entry
                .attribute_sets()
                .map(|set| {
                    (
                        set.name().to_string(),
                        set.values().iter().map(|v| v.raw().to_vec()).collect(),
                    )
                })
                .collect(),
        };
        self.staged.push(StagedWrite {
            id,
            old_dn_norm,
            entry: stored,
        });
        Ok(())
    }

    async fn is_leaf(&mut self, id: EntryId) -> Result<bool, BackendError> {
        let state = self.state.read().await;
        let dn_norm = match state.entries.get(&id) {
            Some(stored) => stored.dn_norm.clone(),
            None => return Err(BackendError::NoSuchEntry { dn: format!("#{id}") }),
        };
        let has_child = state.entries.values().any(|candidate| {
            parent_of(&candidate.dn_norm).is_some_and(|parent| parent == dn_norm)
        });
        Ok(!has_child)
    }

    async fn has_member_references(&mut self, id: EntryId) -> Result<bool, BackendError> {
        let state = self.state.read().await;
        let dn_norm = match state.entries.get(&id) {
            Some(stored) => stored.dn_norm.clone(),
            None => return Err(BackendError::NoSuchEntry { dn: format!("#{id}") }),
        };
        for stored in state.entries.values() {
            for (name, values) in &stored.attributes {
                if !is_membership_attribute(name) {
                    continue;
                }
                for value in values {
                    let Ok(text) = std::str::from_utf8(value) else {
                        continue;
                    };
                    if dn::normalize_dn(&self.schema, text)
                        .is_ok_and(|normalized| normalized == dn_norm)
                    {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    async fn check_dn_references(&mut self, entry: &Entry) -> Result<(), BackendError> {
        let state = self.state.read().await;
        for set in entry.attribute_sets() {
            let descriptor = set.descriptor();
            if !descriptor.is_dn_syntax()
                || descriptor.is_dn_attribute()
                || descriptor.operational
            {
                continue;
            }
            for value in set.values() {
                let Ok(text) = std::str::from_utf8(value.raw()) else {
                    return Err(BackendError::DanglingReference {
                        attribute: set.name().to_string(),
                        dn: value.display().into_owned(),
                    });
                };
                let normalized = dn::normalize_dn(&self.schema, text).map_err(|_| {
                    BackendError::DanglingReference {
                        attribute: set.name().to_string(),
                        dn: text.to_string(),
                    }
                })?;
                let resolves = state.dn_index.contains_key(&normalized)
                    || normalized == entry.dn().normalized();
                if !resolves {
                    return Err(BackendError::DanglingReference {
                        attribute: set.name().to_string(),
                        dn: text.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        for write in self.staged.drain(..) {
            if write.old_dn_norm != write.entry.dn_norm {
                state.dn_index.remove(&write.old_dn_norm);
            }
            state
                .dn_index
                .insert(write.entry.dn_norm.clone(), write.id);
            state.entries.insert(write.id, write.entry);
        }
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), BackendError> {
        self.staged.clear();
        Ok(())
    }
}

fn parent_of(dn_norm: &str) -> Option<&str> {
    let components = dn::split_unescaped(dn_norm, ',');
    if components.len() <= 1 {
        return None;
    }
    let first_len = components.first().map(|c| c.len())?;
    Some(&dn_norm[first_len + 1..])
}

fn is_membership_attribute(name: &str) -> bool {
    name.eq_ignore_ascii_case("member") || name.eq_ignore_ascii_case("uniqueMember")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::with_embedded_attributes().unwrap())
    }

    #[tokio::test]
    async fn test_seed_and_materialize() {
        let backend = InMemoryBackend::new(schema());
        backend
            .add_entry(
                "cn=Alice,ou=People,dc=x",
                &[("objectClass", &["person"]), ("mail", &["a@x.com"])],
            )
            .await
            .unwrap();

        let entry = backend.entry("CN=alice, OU=People, DC=X").await.unwrap();
        assert_eq!(entry.dn().normalized(), "cn=alice,ou=people,dc=x");
        assert!(entry.get("mail").is_some());
        assert!(entry.get(ATTR_DN).is_some(), "DN pseudo-attribute attached");
    }

    #[tokio::test]
    async fn test_txn_write_and_commit() {
        let backend = InMemoryBackend::new(schema());
        backend
            .add_entry("cn=Alice,dc=x", &[("objectClass", &["person"])])
            .await
            .unwrap();

        let mut txn = backend.begin_txn(TxnMode::ReadWrite).await.unwrap();
        let id = txn.dn_to_id("cn=alice,dc=x").await.unwrap();
        let mut entry = txn.entry_by_id(id, LockMode::Write).await.unwrap();
        entry.set_text_values("mail", &["a@x.com"]).unwrap();
        txn.write_entry(&ModificationList::new(), &entry)
            .await
            .unwrap();

        // Not visible until commit.
        assert!(backend.entry("cn=Alice,dc=x").await.unwrap().get("mail").is_none());
        txn.commit().await.unwrap();
        assert!(backend.entry("cn=Alice,dc=x").await.unwrap().get("mail").is_some());
    }

    #[tokio::test]
    async fn test_abort_discards_staged_writes() {
        let backend = InMemoryBackend::new(schema());
        backend
            .add_entry("cn=Alice,dc=x", &[("objectClass", &["person"])])
            .await
            .unwrap();

        let mut txn = backend.begin_txn(TxnMode::ReadWrite).await.unwrap();
        let id = txn.dn_to_id("cn=alice,dc=x").await.unwrap();
        let mut entry = txn.entry_by_id(id, LockMode::Write).await.unwrap();
        entry.set_text_values("mail", &["a@x.com"]).unwrap();
        txn.write_entry(&ModificationList::new(), &entry)
            .await
            .unwrap();
        txn.abort().await.unwrap();

        assert!(backend.entry("cn=Alice,dc=x").await.unwrap().get("mail").is_none());
    }

    #[tokio::test]
    async fn test_injected_deadlocks_surface_on_dn_resolution() {
        let backend = InMemoryBackend::new(schema());
        backend
            .add_entry("cn=Alice,dc=x", &[("objectClass", &["person"])])
            .await
            .unwrap();
        backend.inject_deadlocks(1).await;

        let mut txn = backend.begin_txn(TxnMode::ReadWrite).await.unwrap();
        assert!(matches!(
            txn.dn_to_id("cn=alice,dc=x").await,
            Err(BackendError::Deadlock)
        ));
        // The injection is consumed; the next resolution succeeds.
        assert!(txn.dn_to_id("cn=alice,dc=x").await.is_ok());
    }

    #[tokio::test]
    async fn test_leaf_detection() {
        let backend = InMemoryBackend::new(schema());
        let parent = backend
            .add_entry("ou=People,dc=x", &[("objectClass", &["organizationalUnit"])])
            .await
            .unwrap();
        let child = backend
            .add_entry("cn=Alice,ou=People,dc=x", &[("objectClass", &["person"])])
            .await
            .unwrap();

        let mut txn = backend.begin_txn(TxnMode::ReadOnly).await.unwrap();
        assert!(!txn.is_leaf(parent).await.unwrap());
        assert!(txn.is_leaf(child).await.unwrap());
    }

    #[tokio::test]
    async fn test_member_reference_detection() {
        let backend = InMemoryBackend::new(schema());
        let alice = backend
            .add_entry("cn=Alice,dc=x", &[("objectClass", &["person"])])
            .await
            .unwrap();
        let bob = backend
            .add_entry("cn=Bob,dc=x", &[("objectClass", &["person"])])
            .await
            .unwrap();
        backend
            .add_entry(
                "cn=Admins,dc=x",
                &[("objectClass", &["groupOfNames"]), ("member", &["CN=Alice, DC=X"])],
            )
            .await
            .unwrap();

        let mut txn = backend.begin_txn(TxnMode::ReadOnly).await.unwrap();
        assert!(txn.has_member_references(alice).await.unwrap());
        assert!(!txn.has_member_references(bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_dangling_reference_detection() {
        let backend = InMemoryBackend::new(schema());
        backend
            .add_entry("cn=Group,dc=x", &[("objectClass", &["groupOfNames"])])
            .await
            .unwrap();

        let mut entry = backend.entry("cn=Group,dc=x").await.unwrap();
        entry
            .set_text_values("member", &["cn=Ghost,dc=x"])
            .unwrap();

        let mut txn = backend.begin_txn(TxnMode::ReadWrite).await.unwrap();
        assert!(matches!(
            txn.check_dn_references(&entry).await,
            Err(BackendError::DanglingReference { .. })
        ));
    }
}
