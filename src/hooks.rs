//! Plugin hooks around the modify pipeline.
//!
//! Hooks run at three points: before apply, immediately before the
//! backend commit, and after the operation completes. Pre-apply and
//! pre-commit failures abort the operation like any other step failure;
//! post-commit failures are logged and never override a result that
//! already succeeded.

use crate::context::OperationContext;
use crate::entry::Entry;
use crate::error::{ModifyResult, ResultCode};
use crate::modify::ModifyRequest;
use async_trait::async_trait;

/// Extension points invoked by the transactional controller.
#[async_trait]
pub trait ModifyHooks: Send + Sync {
    /// Called after the entry is read, before validation and apply.
    async fn pre_apply(
        &self,
        _context: &OperationContext,
        _request: &ModifyRequest,
    ) -> ModifyResult<()> {
        Ok(())
    }

    /// Called with the final entry image, before the backend commit.
    async fn pre_commit(&self, _context: &OperationContext, _entry: &Entry) -> ModifyResult<()> {
        Ok(())
    }

    /// Called once per operation with the entry image (when one was
    /// materialized) and the overall result. Advisory only.
    async fn post_commit(
        &self,
        _context: &OperationContext,
        _entry: Option<&Entry>,
        _result: ResultCode,
    ) {
    }
}

/// Hooks that do nothing; the default wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

#[async_trait]
impl ModifyHooks for NoopHooks {}
