//! Cache Gate Module
//!
//! Read/write integration between the dispatcher and the external response
//! cache. Serves hits without touching the coalescing machinery, and on the
//! executor path decides whether a freshly produced response is worth
//! caching: only error-free, non-trivial responses whose execution was
//! slower than the expensive-call threshold are inserted, and each inserted
//! key gets a background refresh worker so the entry stays warm while
//! traffic continues. Cheap calls are never cached.

use crate::messages::{OperationContext, RequestMessage, ResponseMessage};
use crate::traits::{Executor, ResponseCache, WorkerItem, WorkerRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Thresholds governing cache admission.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Executions slower than this are cached; faster ones are not.
    pub expensive_call_threshold: Duration,
    /// Expiry applied when the request carries no cache-time hint.
    pub default_ttl: Duration,
}

/// Gate in front of the external [`ResponseCache`] and [`WorkerRegistry`].
#[derive(Clone)]
pub struct CacheGate {
    cache: Arc<dyn ResponseCache>,
    workers: Arc<dyn WorkerRegistry>,
    policy: CachePolicy,
}

impl CacheGate {
    pub fn new(
        cache: Arc<dyn ResponseCache>,
        workers: Arc<dyn WorkerRegistry>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            cache,
            workers,
            policy,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Serve a cached response if present.
    ///
    /// A hit resets the reported elapsed time to zero (this caller did not
    /// pay for the work) and renews the keep-alive of the key's refresh
    /// worker.
    pub async fn try_get(&self, key: &str) -> Option<ResponseMessage> {
        let mut response = self.cache.get(key).await?;
        debug!("cache hit for key: {}", key);
        self.workers.refresh(key).await;
        response.elapsed_ms = 0;
        Some(response)
    }

    /// Executor-path admission: cache the response and register a refresh
    /// worker when the execution was expensive enough to keep warm.
    pub async fn consider_caching(
        &self,
        key: &str,
        executor: Arc<dyn Executor>,
        context: &OperationContext,
        request: &RequestMessage,
        response: &ResponseMessage,
        elapsed: Duration,
    ) {
        if response.is_error() || response.count == 0 {
            return;
        }
        if elapsed <= self.policy.expensive_call_threshold {
            debug!(
                "call ({}, {}) finished in {} ms, below caching threshold",
                request.service_name,
                request.method_name,
                elapsed.as_millis()
            );
            return;
        }

        let ttl = request.cache_time.unwrap_or(self.policy.default_ttl);
        self.cache.insert(key, response.clone(), ttl).await;
        self.workers
            .register(
                key,
                WorkerItem {
                    executor,
                    context: context.clone(),
                    request: request.clone(),
                },
            )
            .await;
        debug!(
            "cached expensive call ({}, {}) for {} s after {} ms execution",
            request.service_name,
            request.method_name,
            ttl.as_secs(),
            elapsed.as_millis()
        );
    }
}
