//! Operation context for modify requests.
//!
//! Provides request tracking for logging and auditing, the requesting
//! actor, and the flags that distinguish client-originated traffic from
//! internal and replicated operations.

use uuid::Uuid;

/// The identity on whose behalf a modify request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The server itself (internal and replicated operations)
    System,
    /// A directory administrator, exempt from user-modification guards
    Administrator,
    /// An authenticated client, identified by bind DN
    User(String),
}

impl Actor {
    /// The DN recorded in `modifiersName` for this actor.
    pub fn bind_dn(&self) -> &str {
        match self {
            Actor::System => "cn=system",
            Actor::Administrator => "cn=administrator",
            Actor::User(dn) => dn,
        }
    }
}

/// Flags that select which pipeline stages apply to a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifyOptions {
    /// Skip the replication-log writer (derived/cascading operations)
    pub suppress_replication_log: bool,
    /// The request was generated inside the server, not by a client
    pub is_internal: bool,
    /// The request carries already-validated replicated data
    pub is_replicated: bool,
}

/// Context for one modify operation.
///
/// Carries a unique request identifier for log correlation plus the
/// actor and option flags consulted throughout the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Unique identifier for this request
    pub request_id: String,
    /// The requesting identity
    pub actor: Actor,
    /// Pipeline selection flags
    pub options: ModifyOptions,
}

impl OperationContext {
    /// Create a context for a client-originated request.
    pub fn new(actor: Actor) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor,
            options: ModifyOptions::default(),
        }
    }

    /// Create a context with explicit options.
    pub fn with_options(actor: Actor, options: ModifyOptions) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            actor,
            options,
        }
    }

    /// Context for a server-internal operation.
    pub fn internal() -> Self {
        Self::with_options(
            Actor::System,
            ModifyOptions {
                is_internal: true,
                ..ModifyOptions::default()
            },
        )
    }

    /// Context for applying a change received from a replication partner.
    pub fn replicated() -> Self {
        Self::with_options(
            Actor::System,
            ModifyOptions {
                is_replicated: true,
                ..ModifyOptions::default()
            },
        )
    }

    /// Context for a derived/cascading operation triggered by another
    /// modify; it must not independently reach the replication log.
    pub fn derived() -> Self {
        Self::with_options(
            Actor::System,
            ModifyOptions {
                is_internal: true,
                suppress_replication_log: true,
                ..ModifyOptions::default()
            },
        )
    }

    /// Whether the request came from a client rather than the server or
    /// a replication partner. Client-originated requests get the sanity
    /// pass, rename generation, and post-apply conformance checks.
    pub fn is_client_originated(&self) -> bool {
        !self.options.is_internal && !self.options.is_replicated
    }

    /// Whether the actor is exempt from user-modification guards.
    pub fn is_administrator(&self) -> bool {
        matches!(self.actor, Actor::Administrator | Actor::System)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new(Actor::Administrator)
    }
}
