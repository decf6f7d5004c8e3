//! Collaborator Interfaces
//!
//! Trait seams for the external collaborators the invocation core drives:
//! the executor that performs the actual call, the response cache, the
//! background refresh registry, and the optional per-call logging hook.
//!
//! All collaborators are assumed thread-safe; the core never holds its own
//! locks while calling into them.

use crate::messages::{OperationContext, RequestMessage, ResponseMessage};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Performs the actual (possibly remote) call.
///
/// May be slow and may fail; must be safely invocable from a background
/// task. Backend failures can be reported either as `Err` or as a response
/// carrying an error; the dispatcher normalizes both into one shape.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(
        &self,
        context: &OperationContext,
        request: &RequestMessage,
    ) -> Result<ResponseMessage>;
}

/// Key-value response store with TTL eviction. Absence is a normal,
/// frequent outcome.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<ResponseMessage>;
    async fn insert(&self, key: &str, response: ResponseMessage, ttl: Duration);
}

/// A registration for background cache refresh: everything needed to
/// re-execute the original call and re-insert its result.
#[derive(Clone)]
pub struct WorkerItem {
    pub executor: Arc<dyn Executor>,
    pub context: OperationContext,
    pub request: RequestMessage,
}

impl std::fmt::Debug for WorkerItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerItem")
            .field("service", &self.request.service_name)
            .field("method", &self.request.method_name)
            .finish()
    }
}

/// Schedules and keeps alive periodic background re-execution for cached
/// keys so entries are refreshed before they expire.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    /// Register (or replace) the refresh worker for a key.
    async fn register(&self, key: &str, item: WorkerItem);
    /// Renew the keep-alive timer for a key's worker. Unknown keys are
    /// ignored.
    async fn refresh(&self, key: &str);
}

/// Optional observer invoked around each dispatched call. Failures inside a
/// hook must never affect the call outcome, so hooks are infallible.
#[async_trait]
pub trait CallHook: Send + Sync {
    async fn begin_call(&self, request: &RequestMessage);
    async fn end_call(&self, request: &RequestMessage, response: &ResponseMessage, elapsed_ms: u64);
}
