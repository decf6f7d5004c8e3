//! Stale-While-Revalidate Tests
//!
//! Once an expensive call is cached, the background refresh loop keeps the
//! entry warm past its original TTL for as long as the worker stays alive,
//! without further dispatches reaching the backend.

use async_trait::async_trait;
use rpc_coalesce::cache_gate::{CacheGate, CachePolicy};
use rpc_coalesce::dispatcher::CoalescingDispatcher;
use rpc_coalesce::memory_cache::MemoryResponseCache;
use rpc_coalesce::timeout::TimeoutPolicy;
use rpc_coalesce::worker::{RefreshWorkerConfig, RefreshWorkerPool};
use rpc_coalesce::{
    CallOrigin, Executor, OperationContext, Parameter, RequestMessage, ResponseCache,
    ResponseMessage, Result, WorkerRegistry,
};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct SlowBackend {
    runs: AtomicU64,
}

#[async_trait]
impl Executor for SlowBackend {
    async fn run(
        &self,
        _context: &OperationContext,
        request: &RequestMessage,
    ) -> Result<ResponseMessage> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(120)).await;
        let mut response = ResponseMessage::for_request(request);
        response.value = Some(json!({ "run": run }));
        response.count = 1;
        Ok(response)
    }
}

fn request() -> Arc<RequestMessage> {
    Arc::new(RequestMessage {
        transaction_id: "tx".to_string(),
        service_name: "ReportService".to_string(),
        method_name: "YearlyTotals".to_string(),
        parameters: vec![Parameter::new("year", json!(2026))],
        app_name: "test".to_string(),
        app_path: "/".to_string(),
        app_version: "1.0.0".to_string(),
        host_name: "host".to_string(),
        ip_address: "127.0.0.1".to_string(),
        enable_cache: true,
        cache_time: None,
        invoke_method: false,
    })
}

/// The refresh loop re-executes the registered call and re-inserts its
/// result, so the entry outlives its original TTL and later dispatches are
/// still cache hits.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_loop_keeps_expensive_entry_warm() {
    let backend = Arc::new(SlowBackend {
        runs: AtomicU64::new(0),
    });
    let cache = Arc::new(MemoryResponseCache::new());
    let pool = Arc::new(RefreshWorkerPool::new(
        Arc::clone(&cache) as Arc<dyn ResponseCache>,
        RefreshWorkerConfig {
            refresh_interval: Duration::from_millis(100),
            keepalive_window: Duration::from_secs(60),
            max_concurrent_refreshes: 2,
            default_ttl: Duration::from_millis(300),
        },
    ));
    let gate = CacheGate::new(
        Arc::clone(&cache) as Arc<dyn ResponseCache>,
        Arc::clone(&pool) as Arc<dyn WorkerRegistry>,
        CachePolicy {
            expensive_call_threshold: Duration::from_millis(50),
            default_ttl: Duration::from_millis(300),
        },
    );
    let dispatcher = Arc::new(CoalescingDispatcher::new(
        Arc::clone(&backend) as Arc<dyn Executor>,
        Some(gate),
        TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(5)),
        CallOrigin::Client,
    ));

    let req = request();
    let context = OperationContext::for_request(&req);
    let first = dispatcher.dispatch(context, Arc::clone(&req)).await;
    assert!(!first.is_error());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.worker_count(), 1, "expensive call registered a worker");

    pool.start();
    // Sleep well past the 300 ms TTL; only the refresh loop can keep the
    // entry alive across that span.
    tokio::time::sleep(Duration::from_millis(800)).await;

    let context = OperationContext::for_request(&req);
    let later = dispatcher.dispatch(context, Arc::clone(&req)).await;
    pool.shutdown().await;

    assert!(!later.is_error());
    assert_eq!(later.elapsed_ms, 0, "served from the refreshed cache entry");
    let metrics = dispatcher.metrics().snapshot();
    assert_eq!(metrics.executions, 1, "dispatch hit the backend only once");
    assert_eq!(metrics.cache_hits, 1);
    assert!(
        backend.runs.load(Ordering::SeqCst) >= 2,
        "the refresh loop re-executed the call in the background"
    );
}

/// Without the refresh loop running, the cached entry simply expires and
/// the next dispatch pays for a new execution.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_entry_expires_when_loop_is_not_running() {
    let backend = Arc::new(SlowBackend {
        runs: AtomicU64::new(0),
    });
    let cache = Arc::new(MemoryResponseCache::new());
    let pool = Arc::new(RefreshWorkerPool::new(
        Arc::clone(&cache) as Arc<dyn ResponseCache>,
        RefreshWorkerConfig::default(),
    ));
    let gate = CacheGate::new(
        Arc::clone(&cache) as Arc<dyn ResponseCache>,
        Arc::clone(&pool) as Arc<dyn WorkerRegistry>,
        CachePolicy {
            expensive_call_threshold: Duration::from_millis(50),
            default_ttl: Duration::from_millis(200),
        },
    );
    let dispatcher = Arc::new(CoalescingDispatcher::new(
        Arc::clone(&backend) as Arc<dyn Executor>,
        Some(gate),
        TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(5)),
        CallOrigin::Client,
    ));

    let req = request();
    let context = OperationContext::for_request(&req);
    dispatcher.dispatch(context, Arc::clone(&req)).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    let context = OperationContext::for_request(&req);
    dispatcher.dispatch(context, Arc::clone(&req)).await;
    assert_eq!(
        backend.runs.load(Ordering::SeqCst),
        2,
        "expired entry forces a fresh execution"
    );
}
