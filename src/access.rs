//! Access control decision interface.
//!
//! The controller consults this for client-originated requests after the
//! target entry has been read. The decision function itself lives outside
//! this crate; the default grants everything.

use crate::context::Actor;
use crate::entry::Entry;

/// The right being exercised against an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRight {
    Read,
    Write,
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// Access control decision function.
pub trait AccessCheck: Send + Sync {
    fn check(&self, actor: &Actor, entry: &Entry, right: AccessRight) -> AccessDecision;
}

/// Grants every request; the default wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessCheck for AllowAll {
    fn check(&self, _actor: &Actor, _entry: &Entry, _right: AccessRight) -> AccessDecision {
        AccessDecision::Allow
    }
}

/// Denies non-administrator writes; used in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminOnly;

impl AccessCheck for AdminOnly {
    fn check(&self, actor: &Actor, _entry: &Entry, right: AccessRight) -> AccessDecision {
        match (actor, right) {
            (_, AccessRight::Read) => AccessDecision::Allow,
            (Actor::Administrator | Actor::System, _) => AccessDecision::Allow,
            (Actor::User(_), AccessRight::Write) => AccessDecision::Deny,
        }
    }
}
