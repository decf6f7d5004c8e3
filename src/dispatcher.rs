//! Coalescing Dispatcher
//!
//! Decides how a request reaches the executor: served from cache, executed
//! once on behalf of every concurrent duplicate, or answered with a
//! synthesized timeout. The calling task never runs the executor itself:
//! the group leader hands execution to a spawned task and waits on its own
//! signal, which bounds backend load at one execution per call key no
//! matter how many callers pile up.

use crate::cache_gate::CacheGate;
use crate::call_key::derive_call_key;
use crate::inflight::{CallRole, ExecutionGuard, InFlightRegistry};
use crate::messages::{CallOrigin, OperationContext, RequestMessage, ResponseMessage};
use crate::metrics::DispatchMetrics;
use crate::pending::WaitOutcome;
use crate::status::STATUS_SERVICE;
use crate::timeout::TimeoutPolicy;
use crate::traits::Executor;
use crate::InvokeError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Request dispatcher with coalescing, caching and bounded waits.
pub struct CoalescingDispatcher {
    executor: Arc<dyn Executor>,
    registry: InFlightRegistry,
    cache_gate: Option<CacheGate>,
    timeout_policy: TimeoutPolicy,
    origin: CallOrigin,
    metrics: Arc<DispatchMetrics>,
}

impl CoalescingDispatcher {
    /// Dispatcher with its own registry and metrics.
    pub fn new(
        executor: Arc<dyn Executor>,
        cache_gate: Option<CacheGate>,
        timeout_policy: TimeoutPolicy,
        origin: CallOrigin,
    ) -> Self {
        Self::with_parts(
            executor,
            InFlightRegistry::new(),
            Arc::new(DispatchMetrics::new()),
            cache_gate,
            timeout_policy,
            origin,
        )
    }

    /// Dispatcher over externally shared registry/metrics (status reporting
    /// wires the same instances into its snapshot source).
    pub fn with_parts(
        executor: Arc<dyn Executor>,
        registry: InFlightRegistry,
        metrics: Arc<DispatchMetrics>,
        cache_gate: Option<CacheGate>,
        timeout_policy: TimeoutPolicy,
        origin: CallOrigin,
    ) -> Self {
        Self {
            executor,
            registry,
            cache_gate,
            timeout_policy,
            origin,
            metrics,
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn origin(&self) -> CallOrigin {
        self.origin
    }

    /// Resolve one logical call to a response.
    ///
    /// All coalesced waiters of a key receive one `Arc` of the same logical
    /// response; per-caller isolation copies are the pipeline's concern.
    pub async fn dispatch(
        &self,
        context: OperationContext,
        request: Arc<RequestMessage>,
    ) -> Arc<ResponseMessage> {
        // Liveness probes must not queue behind unrelated traffic: run the
        // status service inline, outside coalescing, caching and bounds.
        if request.service_name == STATUS_SERVICE {
            self.metrics.record_status_call();
            let response = match self.executor.run(&context, &request).await {
                Ok(response) => response,
                Err(err) => ResponseMessage::from_error(&request, err),
            };
            return Arc::new(response);
        }

        let call_key = derive_call_key(&context.caller);

        if let Some(gate) = self.active_gate(&request) {
            if let Some(hit) = gate.try_get(&call_key).await {
                self.metrics.record_cache_hit();
                return Arc::new(hit);
            }
        }

        let waiter = match self.registry.join(&call_key) {
            CallRole::Leader { guard, waiter } => {
                self.metrics.record_execution();
                debug!(
                    "executing ({}, {}) for key: {}",
                    request.service_name, request.method_name, call_key
                );
                self.spawn_execution(guard, context, Arc::clone(&request));
                waiter
            }
            CallRole::Waiter(waiter) => {
                self.metrics.record_coalesced_waiter();
                debug!(
                    "joined in-flight execution for key: {} ({} waiters)",
                    call_key,
                    self.registry.waiter_count(&call_key)
                );
                waiter
            }
        };

        let bound = self.timeout_policy.bound_for(self.origin);
        match waiter.wait(bound).await {
            WaitOutcome::Delivered(response) => response,
            WaitOutcome::TimedOut => {
                self.metrics.record_timeout();
                error!(
                    "client [{}] async call service ({}, {}) timeout ({} ms), parameters => {}",
                    request.app_name,
                    request.service_name,
                    request.method_name,
                    bound.as_millis(),
                    request.parameters_string()
                );
                Arc::new(self.timeout_policy.timeout_response(&request, bound))
            }
            WaitOutcome::Abandoned => {
                self.metrics.record_abandoned();
                Arc::new(ResponseMessage::from_error(
                    &request,
                    InvokeError::Execution(format!(
                        "execution of ({}, {}) ended without producing a response",
                        request.service_name, request.method_name
                    )),
                ))
            }
        }
    }

    fn active_gate(&self, request: &RequestMessage) -> Option<&CacheGate> {
        if request.enable_cache {
            self.cache_gate.as_ref()
        } else {
            None
        }
    }

    /// Hand the single execution for a key to a background task. The task
    /// broadcasts to all queued waiters first, then feeds the cache gate.
    fn spawn_execution(
        &self,
        guard: ExecutionGuard,
        context: OperationContext,
        request: Arc<RequestMessage>,
    ) {
        let executor = Arc::clone(&self.executor);
        let gate = self.active_gate(&request).cloned();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut response = match executor.run(&context, &request).await {
                Ok(response) => response,
                Err(err) => {
                    error!(
                        "execution of ({}, {}) failed: {}",
                        request.service_name, request.method_name, err
                    );
                    ResponseMessage::from_error(&request, err)
                }
            };
            let elapsed = started.elapsed();
            response.elapsed_ms = elapsed.as_millis() as u64;

            let call_key = guard.call_key().to_string();
            let shared = guard.complete(response);

            if let Some(gate) = gate {
                gate.consider_caching(&call_key, executor, &context, &request, &shared, elapsed)
                    .await;
            }
        });
    }
}
