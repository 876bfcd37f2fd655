//! Directory entry modification engine.
//!
//! The write-path core of an LDAP-compatible directory server: takes a
//! client's modify request and turns it into a validated,
//! schema-conformant, durably committed change, coordinated with
//! replication metadata generation.
//!
//! # Core Components
//!
//! - [`ModifyEngine`] - Transactional controller and `modify` entry point
//! - [`BackendStore`] - Trait for implementing storage backends
//! - [`SchemaRegistry`] - Attribute-type resolution and value normalization
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dirwrite::{InMemoryBackend, ModifyEngine, SchemaRegistry};
//! use dirwrite::{ModificationList, ModificationRecord, ModifyRequest, OperationContext, Value};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Arc::new(SchemaRegistry::with_embedded_attributes()?);
//! let backend = InMemoryBackend::new(Arc::clone(&schema));
//! backend
//!     .add_entry("cn=Alice,dc=example", &[("objectClass", &["person"])])
//!     .await?;
//!
//! let engine = ModifyEngine::new(backend, schema);
//! let mods = ModificationList::from_records(vec![ModificationRecord::replace(
//!     "mail",
//!     vec![Value::text("alice@example.com")],
//! )]);
//! let outcome = engine
//!     .modify(ModifyRequest::modify("cn=Alice,dc=example", mods), &OperationContext::default())
//!     .await?;
//! assert!(!outcome.renamed);
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod backend;
pub mod context;
pub mod dn;
pub mod engine;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod modify;
pub mod replication;
pub mod schema;

// Re-export commonly used types for convenience
pub use access::{AccessCheck, AccessDecision, AccessRight, AllowAll};
pub use backend::{BackendError, BackendStore, BackendTxn, EntryId, InMemoryBackend, LockMode, TxnMode};
pub use context::{Actor, ModifyOptions, OperationContext};
pub use dn::{Dn, Rdn};
pub use engine::{EngineConfig, ModifyEngine, ModifyEngineBuilder, ModifyOutcome};
pub use entry::{AttributeValueSet, Entry, MAX_VALUES_PER_ATTRIBUTE, Value};
pub use error::{BuildError, ModifyError, ModifyResult, ResultCode, SchemaError};
pub use hooks::{ModifyHooks, NoopHooks};
pub use modify::{ModType, ModificationList, ModificationRecord, ModifyRequest};
pub use replication::{NoopReplicationLog, RecordingReplicationLog, ReplicationLogWriter};
pub use schema::{AttributeDescriptor, MatchingRule, SchemaRegistry, SystemAttribute};
