//! Background Refresh Worker Pool
//!
//! Default [`WorkerRegistry`] implementation. Each registered key holds the
//! executor, context and request of an expensive cached call; a background
//! loop re-executes them periodically and re-inserts the result, so cache
//! entries are refreshed before they expire (stale-while-revalidate) for as
//! long as traffic keeps renewing their keep-alive. Workers that stop
//! receiving keep-alives are dropped and their entries age out naturally.

use crate::traits::{ResponseCache, WorkerItem, WorkerRegistry};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the refresh worker pool.
#[derive(Debug, Clone)]
pub struct RefreshWorkerConfig {
    /// Interval between refresh cycles.
    pub refresh_interval: Duration,
    /// A worker not kept alive within this window is dropped.
    pub keepalive_window: Duration,
    /// Maximum number of refreshes executed concurrently per cycle.
    pub max_concurrent_refreshes: usize,
    /// Expiry applied on re-insert when the request carries no cache-time
    /// hint. Should match the cache gate's default TTL.
    pub default_ttl: Duration,
}

impl Default for RefreshWorkerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            keepalive_window: Duration::from_secs(120),
            max_concurrent_refreshes: 3,
            default_ttl: Duration::from_secs(60),
        }
    }
}

struct RegisteredWorker {
    item: WorkerItem,
    last_keepalive: Instant,
}

/// Pool of background refresh workers over a shared response cache.
pub struct RefreshWorkerPool {
    cache: Arc<dyn ResponseCache>,
    config: RefreshWorkerConfig,
    workers: DashMap<String, RegisteredWorker>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    running: AtomicBool,
}

impl RefreshWorkerPool {
    pub fn new(cache: Arc<dyn ResponseCache>, config: RefreshWorkerConfig) -> Self {
        Self {
            cache,
            config,
            workers: DashMap::new(),
            shutdown_tx: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the refresh loop. Idempotent: a second call while the loop is
    /// running is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, mut rx) = mpsc::channel::<()>(1);
        *self.shutdown_tx.lock().unwrap() = Some(tx);

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = interval(pool.config.refresh_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; consume it so the first
            // cycle runs a full interval after start.
            tick.tick().await;
            info!(
                "refresh worker pool started (interval {} s)",
                pool.config.refresh_interval.as_secs()
            );
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = tick.tick() => pool.run_refresh_cycle().await,
                }
            }
            pool.running.store(false, Ordering::SeqCst);
            info!("refresh worker pool stopped");
        });
    }

    /// Stop the refresh loop. Idempotent and safe to call while a cycle is
    /// in progress; the cycle finishes first.
    pub async fn shutdown(&self) {
        let tx = self.shutdown_tx.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
    }

    /// One refresh pass: drop lapsed workers, then re-execute the rest and
    /// re-insert cacheable results. Exposed so integrators driving their
    /// own scheduler can trigger cycles directly.
    pub async fn run_refresh_cycle(&self) {
        let now = Instant::now();
        let lapsed: Vec<String> = self
            .workers
            .iter()
            .filter(|entry| {
                now.duration_since(entry.value().last_keepalive) > self.config.keepalive_window
            })
            .map(|entry| entry.key().clone())
            .collect();
        for key in lapsed {
            self.workers.remove(&key);
            debug!("dropped idle refresh worker for key: {}", key);
        }

        let due: Vec<(String, WorkerItem)> = self
            .workers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().item.clone()))
            .collect();
        if due.is_empty() {
            return;
        }
        debug!("refreshing {} cached calls", due.len());

        let cache = Arc::clone(&self.cache);
        let default_ttl = self.config.default_ttl;
        stream::iter(due)
            .for_each_concurrent(self.config.max_concurrent_refreshes, |(key, item)| {
                let cache = Arc::clone(&cache);
                async move {
                    match item.executor.run(&item.context, &item.request).await {
                        Ok(response) if !response.is_error() && response.count > 0 => {
                            let ttl = item.request.cache_time.unwrap_or(default_ttl);
                            cache.insert(&key, response, ttl).await;
                            debug!("refreshed cache entry for key: {}", key);
                        }
                        Ok(_) => {
                            warn!("refresh for key {} produced an uncacheable response", key);
                        }
                        Err(err) => {
                            warn!("refresh for key {} failed: {}", key, err);
                        }
                    }
                }
            })
            .await;
    }
}

#[async_trait]
impl WorkerRegistry for RefreshWorkerPool {
    async fn register(&self, key: &str, item: WorkerItem) {
        self.workers.insert(
            key.to_string(),
            RegisteredWorker {
                item,
                last_keepalive: Instant::now(),
            },
        );
    }

    async fn refresh(&self, key: &str) {
        if let Some(mut worker) = self.workers.get_mut(key) {
            worker.last_keepalive = Instant::now();
        }
    }
}
