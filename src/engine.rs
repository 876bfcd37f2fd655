//! The transactional retry controller and the `modify` entry point.
//!
//! Orchestrates one modify request end to end: acquire the
//! schema-serialization lock, then inside a bounded retry loop begin a
//! backend transaction, read the entry, generate rename modifications,
//! validate, apply, run the structural and referential guards, write, hand
//! the change to the replication log, and commit. Transient backend
//! deadlocks abort the transaction and retry; everything else surfaces
//! immediately with its context preserved.

use crate::access::{AccessCheck, AccessDecision, AccessRight, AllowAll};
use crate::backend::{BackendStore, BackendTxn, LockMode, TxnMode};
use crate::context::OperationContext;
use crate::dn::Dn;
use crate::entry::Entry;
use crate::error::{BuildError, BuildResult, ModifyError, ModifyResult, ResultCode};
use crate::hooks::{ModifyHooks, NoopHooks};
use crate::modify::{ModifyRequest, apply, generate_rename_mods, normalize_mods, sanity_check};
use crate::replication::{NoopReplicationLog, ReplicationLogWriter};
use crate::schema::{ATTR_MODIFIERS_NAME, ATTR_MODIFY_TIMESTAMP, SchemaRegistry};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum transaction attempts before a persistent deadlock is fatal
    pub max_txn_attempts: u32,
    /// Refuse every modify with `UnwillingToPerform`
    pub read_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_txn_attempts: 5,
            read_only: false,
        }
    }
}

/// Result of a successful modify.
#[derive(Debug, Clone)]
pub struct ModifyOutcome {
    /// Always `Success`; failures are reported through `ModifyError`
    pub result: ResultCode,
    /// Whether the operation renamed the entry
    pub renamed: bool,
    /// The entry's final normalized DN
    pub dn: String,
}

/// The write-path engine: validation, apply, and transactional commit of
/// entry modifications over a pluggable backend.
pub struct ModifyEngine<B: BackendStore> {
    backend: B,
    schema: Arc<SchemaRegistry>,
    hooks: Arc<dyn ModifyHooks>,
    replication: Arc<dyn ReplicationLogWriter>,
    access: Arc<dyn AccessCheck>,
    // Serializes every schema-affecting modify across the server,
    // independent of the backend's per-row locking.
    schema_lock: Mutex<()>,
    config: EngineConfig,
}

impl<B: BackendStore> std::fmt::Debug for ModifyEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModifyEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: BackendStore> ModifyEngine<B> {
    /// Create an engine with default wiring: no hooks, no replication
    /// log, allow-all access control.
    pub fn new(backend: B, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            backend,
            schema,
            hooks: Arc::new(NoopHooks),
            replication: Arc::new(NoopReplicationLog),
            access: Arc::new(AllowAll),
            schema_lock: Mutex::new(()),
            config: EngineConfig::default(),
        }
    }

    /// Start building an engine with explicit wiring.
    pub fn builder(backend: B, schema: Arc<SchemaRegistry>) -> ModifyEngineBuilder<B> {
        ModifyEngineBuilder::new(backend, schema)
    }

    /// The schema context this engine validates against.
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// The backing store.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Apply a modify request and return the outcome.
    ///
    /// This is the single entry point of the write path. The request may
    /// carry a rename (`new_rdn`); the extra modifications it implies are
    /// generated before apply. The operation runs under the server-wide
    /// schema-serialization lock and retries transparently on transient
    /// backend deadlock, up to the configured attempt bound.
    pub async fn modify(
        &self,
        request: ModifyRequest,
        context: &OperationContext,
    ) -> ModifyResult<ModifyOutcome> {
        if self.config.read_only {
            return Err(ModifyError::ReadOnly);
        }
        debug!(
            "[{}] modify '{}' ({} records, rename: {})",
            context.request_id,
            request.dn,
            request.mods.len(),
            request.new_rdn.is_some()
        );

        // Acquired once, outside the retry loop, and held until the
        // operation completes (including the backend commit).
        let _schema_guard = self.schema_lock.lock().await;

        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            match self.attempt(&request, context).await {
                Err(error) if error.is_retryable() => {
                    if attempt >= self.config.max_txn_attempts {
                        break Err(ModifyError::LockDeadlock { attempts: attempt });
                    }
                    warn!(
                        "[{}] backend contention on attempt {attempt}, retrying",
                        context.request_id
                    );
                }
                other => break other,
            }
        };

        let (result, entry) = match &outcome {
            Ok((outcome, entry)) => (outcome.result, Some(entry)),
            Err(error) => (error.result_code(), None),
        };
        self.hooks.post_commit(context, entry, result).await;

        match outcome {
            Ok((outcome, _entry)) => {
                info!(
                    "[{}] modified '{}' in {attempt} attempt(s)",
                    context.request_id, outcome.dn
                );
                Ok(outcome)
            }
            Err(error) => {
                warn!(
                    "[{}] modify of '{}' failed: {error}",
                    context.request_id, request.dn
                );
                Err(error)
            }
        }
    }

    /// One transaction attempt: commit on success, abort on any failure.
    async fn attempt(
        &self,
        request: &ModifyRequest,
        context: &OperationContext,
    ) -> ModifyResult<(ModifyOutcome, Entry)> {
        let mut txn = self.backend.begin_txn(TxnMode::ReadWrite).await?;
        match self.modify_in_txn(&mut txn, request, context).await {
            Ok(success) => {
                txn.commit().await?;
                Ok(success)
            }
            Err(error) => {
                if let Err(abort_error) = txn.abort().await {
                    warn!(
                        "[{}] abort after failure also failed: {abort_error}",
                        context.request_id
                    );
                }
                Err(error)
            }
        }
    }

    async fn modify_in_txn(
        &self,
        txn: &mut B::Txn,
        request: &ModifyRequest,
        context: &OperationContext,
    ) -> ModifyResult<(ModifyOutcome, Entry)> {
        let dn = Dn::parse(&self.schema, &request.dn)?;
        let id = txn.dn_to_id(dn.normalized()).await?;
        let mut entry = txn.entry_by_id(id, LockMode::Write).await?;

        self.hooks.pre_apply(context, request).await?;

        if context.is_client_originated()
            && self.access.check(&context.actor, &entry, AccessRight::Write)
                == AccessDecision::Deny
        {
            return Err(ModifyError::InsufficientAccessRights {
                dn: dn.raw().to_string(),
            });
        }

        // The operation owns a working copy of the caller's list; a retry
        // starts over from the original records.
        let mut mods = request.mods.clone();
        if context.is_client_originated() && request.new_rdn.is_some() {
            for record in generate_rename_mods(&self.schema, request, &entry)? {
                mods.push(record);
            }
        }

        if context.is_client_originated() {
            sanity_check(&self.schema, context, &mods)?;
        }
        normalize_mods(&self.schema, &mut mods)?;

        let renamed = apply(&self.schema, &mut mods, &mut entry)?;

        if renamed {
            if !txn.is_leaf(id).await? {
                return Err(ModifyError::NotAllowedOnNonLeaf {
                    dn: dn.raw().to_string(),
                });
            }
            if txn.has_member_references(id).await? {
                return Err(ModifyError::unwilling(format!(
                    "cannot rename '{}': it is a member of one or more groups",
                    dn.raw()
                )));
            }
        }

        if context.is_client_originated() {
            self.schema.validate_entry(&entry)?;
            txn.check_dn_references(&entry).await?;
            // Operational metadata moves with client writes; replicated
            // operations carry their origin's values untouched.
            stamp_operational_attributes(&mut entry, context)?;
        }

        self.hooks.pre_commit(context, &entry).await?;

        txn.write_entry(&mods, &entry).await?;

        if !context.options.suppress_replication_log {
            self.replication
                .precommit(&self.schema, id, dn.normalized(), &mods, context)
                .await?;
        }

        let outcome = ModifyOutcome {
            result: ResultCode::Success,
            renamed,
            dn: entry.dn().normalized().to_string(),
        };
        Ok((outcome, entry))
    }
}

/// Record who changed the entry and when, in generalized-time form.
fn stamp_operational_attributes(
    entry: &mut Entry,
    context: &OperationContext,
) -> ModifyResult<()> {
    let now = chrono::Utc::now().format("%Y%m%d%H%M%SZ").to_string();
    entry.set_text_values(ATTR_MODIFY_TIMESTAMP, &[now.as_str()])?;
    entry.set_text_values(ATTR_MODIFIERS_NAME, &[context.actor.bind_dn()])?;
    Ok(())
}

/// Builder for a fully wired engine.
pub struct ModifyEngineBuilder<B: BackendStore> {
    backend: B,
    schema: Arc<SchemaRegistry>,
    hooks: Arc<dyn ModifyHooks>,
    replication: Arc<dyn ReplicationLogWriter>,
    access: Arc<dyn AccessCheck>,
    config: EngineConfig,
}

impl<B: BackendStore> ModifyEngineBuilder<B> {
    pub fn new(backend: B, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            backend,
            schema,
            hooks: Arc::new(NoopHooks),
            replication: Arc::new(NoopReplicationLog),
            access: Arc::new(AllowAll),
            config: EngineConfig::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ModifyHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_replication_log(mut self, replication: Arc<dyn ReplicationLogWriter>) -> Self {
        self.replication = replication;
        self
    }

    pub fn with_access_check(mut self, access: Arc<dyn AccessCheck>) -> Self {
        self.access = access;
        self
    }

    /// Set the transaction attempt bound. Must be at least one.
    pub fn with_max_txn_attempts(mut self, attempts: u32) -> Self {
        self.config.max_txn_attempts = attempts;
        self
    }

    /// Put the engine in read-only mode.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    pub fn build(self) -> BuildResult<ModifyEngine<B>> {
        if self.config.max_txn_attempts == 0 {
            return Err(BuildError::InvalidConfiguration {
                message: "max_txn_attempts must be at least 1".to_string(),
            });
        }
        Ok(ModifyEngine {
            backend: self.backend,
            schema: self.schema,
            hooks: self.hooks,
            replication: self.replication,
            access: self.access,
            schema_lock: Mutex::new(()),
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn schema() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::with_embedded_attributes().unwrap())
    }

    #[test]
    fn test_builder_rejects_zero_attempts() {
        let schema = schema();
        let backend = InMemoryBackend::new(Arc::clone(&schema));
        let err = ModifyEngine::builder(backend, schema)
            .with_max_txn_attempts(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn test_read_only_engine_refuses_modifies() {
        let schema = schema();
        let backend = InMemoryBackend::new(Arc::clone(&schema));
        let engine = ModifyEngine::builder(backend, schema)
            .read_only(true)
            .build()
            .unwrap();
        let request = ModifyRequest::modify("cn=x,dc=y", crate::modify::ModificationList::new());
        let err = engine
            .modify(request, &OperationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModifyError::ReadOnly));
        assert_eq!(err.result_code(), ResultCode::UnwillingToPerform);
    }
}
