//! Status Service Module
//!
//! The synthetic status service answers liveness/health queries without
//! queuing behind unrelated traffic: the dispatcher runs it inline, outside
//! coalescing, caching and timeout bounds.
//!
//! [`StatusExecutor`] is a ready-made decorator: it answers status requests
//! from shared dispatcher state and delegates everything else to the real
//! executor.

use crate::inflight::InFlightRegistry;
use crate::messages::{OperationContext, RequestMessage, ResponseMessage};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::traits::Executor;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Well-known name of the synthetic status service.
pub const STATUS_SERVICE: &str = "system.StatusService";

/// Serializable point-in-time view of the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub uptime_seconds: u64,
    pub in_flight_count: usize,
    pub metrics: MetricsSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Shared state a [`StatusExecutor`] reports on. Create it first, then wire
/// the same registry/metrics into the dispatcher via
/// [`CoalescingDispatcher::with_parts`].
///
/// [`CoalescingDispatcher::with_parts`]: crate::dispatcher::CoalescingDispatcher::with_parts
#[derive(Clone)]
pub struct StatusSource {
    started_at: Instant,
    registry: InFlightRegistry,
    metrics: Arc<DispatchMetrics>,
}

impl StatusSource {
    pub fn new(registry: InFlightRegistry, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            started_at: Instant::now(),
            registry,
            metrics,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            in_flight_count: self.registry.in_flight_count(),
            metrics: self.metrics.snapshot(),
            timestamp: Utc::now(),
        }
    }
}

/// Executor decorator that serves the status service locally.
pub struct StatusExecutor {
    inner: Arc<dyn Executor>,
    source: StatusSource,
}

impl StatusExecutor {
    pub fn new(inner: Arc<dyn Executor>, source: StatusSource) -> Self {
        Self { inner, source }
    }
}

#[async_trait]
impl Executor for StatusExecutor {
    async fn run(
        &self,
        context: &OperationContext,
        request: &RequestMessage,
    ) -> Result<ResponseMessage> {
        if request.service_name != STATUS_SERVICE {
            return self.inner.run(context, request).await;
        }

        let snapshot = self.source.snapshot();
        let mut response = ResponseMessage::for_request(request);
        response.value = Some(serde_json::to_value(&snapshot)?);
        response.count = 1;
        Ok(response)
    }
}
