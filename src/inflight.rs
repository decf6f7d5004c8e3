//! In-Flight Call Registry
//!
//! Coordinates concurrent callers of the same logical call so that exactly
//! one execution runs per call key while every caller waits on its own
//! signal for the shared result.
//!
//! When multiple callers arrive for the same uncached key:
//! 1. The first caller becomes the group leader and hands the execution to
//!    a background task; it then waits like everyone else.
//! 2. Later callers join the existing group as waiters.
//! 3. On completion the leader's guard removes the group and delivers one
//!    shared response to every queued waiter.
//! 4. Each waiter applies its own timeout bound; a timed-out waiter leaves
//!    the group's execution running.
//!
//! Group creation and removal are atomic with the map mutation, so a group
//! can never be orphaned: a caller either joins a live group or starts a
//! fresh one.

use crate::messages::ResponseMessage;
use crate::pending::{PendingSignal, SignalWaiter};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The set of waiters for one call key currently served by one execution.
#[derive(Debug, Default)]
struct InFlightGroup {
    signals: Vec<PendingSignal>,
}

/// Registry mapping call keys to their in-flight groups.
///
/// Cloning is cheap and shares the underlying map, so the registry can be
/// handed to status reporting alongside the dispatcher.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    groups: Arc<DashMap<String, InFlightGroup>>,
}

/// Role assigned to a caller when it joins the registry.
pub enum CallRole {
    /// First caller for this key: owns the execution via the guard and
    /// waits on its own signal like every other member.
    Leader {
        guard: ExecutionGuard,
        waiter: SignalWaiter,
    },
    /// An execution is already in flight; wait for its result.
    Waiter(SignalWaiter),
}

/// RAII guard owned by the single execution of a call key.
///
/// Completing the guard removes the group and broadcasts the response to
/// all queued waiters. If the guard is dropped without completing (executor
/// task panicked or was cancelled), the group is removed and the waiters'
/// channels close, so no waiter is ever left blocked past its bound.
pub struct ExecutionGuard {
    call_key: String,
    groups: Arc<DashMap<String, InFlightGroup>>,
    completed: bool,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the group for `call_key`, creating it if absent.
    ///
    /// The check-and-insert is atomic: concurrent callers for the same key
    /// see exactly one `Leader`.
    pub fn join(&self, call_key: &str) -> CallRole {
        let (signal, waiter) = PendingSignal::pair();

        match self.groups.entry(call_key.to_string()) {
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(InFlightGroup {
                    signals: vec![signal],
                });
                CallRole::Leader {
                    guard: ExecutionGuard {
                        call_key: call_key.to_string(),
                        groups: Arc::clone(&self.groups),
                        completed: false,
                    },
                    waiter,
                }
            }
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                occupied.get_mut().signals.push(signal);
                CallRole::Waiter(waiter)
            }
        }
    }

    /// Number of call keys currently being executed.
    pub fn in_flight_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of waiters queued for a key, including the leader.
    pub fn waiter_count(&self, call_key: &str) -> usize {
        self.groups
            .get(call_key)
            .map(|group| group.signals.len())
            .unwrap_or(0)
    }
}

impl ExecutionGuard {
    /// The call key this guard's execution serves.
    pub fn call_key(&self) -> &str {
        &self.call_key
    }

    /// Deliver the single produced response to every queued waiter and
    /// remove the group.
    ///
    /// Returns the shared response so the executor path can feed the cache
    /// gate with the same object the waiters received.
    pub fn complete(mut self, response: ResponseMessage) -> Arc<ResponseMessage> {
        self.completed = true;
        let shared = Arc::new(response);

        if let Some((_, mut group)) = self.groups.remove(&self.call_key) {
            if group.signals.len() > 1 {
                debug!(
                    "releasing {} coalesced waiters for key: {}",
                    group.signals.len(),
                    self.call_key
                );
            }
            for signal in group.signals.iter_mut() {
                signal.deliver(Arc::clone(&shared));
            }
        }

        shared
    }
}

impl Drop for ExecutionGuard {
    /// Safety net for panicked or cancelled executions: remove the group so
    /// waiters observe abandonment instead of hanging, and so the next
    /// caller starts a fresh execution.
    fn drop(&mut self) {
        if !self.completed {
            warn!(
                "execution abandoned without a response for key: {}",
                self.call_key
            );
            self.groups.remove(&self.call_key);
        }
    }
}
