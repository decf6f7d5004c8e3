//! Pending Signal Module
//!
//! One-shot rendezvous between the single executor of an in-flight call and
//! one waiting caller. The producer half delivers exactly one response; the
//! consumer half waits with a bound and never busy-spins.
//!
//! Dropping either half releases the underlying channel, so cleanup is
//! idempotent on every exit path (timeout, error, normal completion).

use crate::messages::ResponseMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Producer half: held by the in-flight group until the executor completes.
#[derive(Debug)]
pub struct PendingSignal {
    tx: Option<oneshot::Sender<Arc<ResponseMessage>>>,
}

/// Consumer half: held by the waiting caller.
#[derive(Debug)]
pub struct SignalWaiter {
    rx: oneshot::Receiver<Arc<ResponseMessage>>,
}

/// Outcome of a bounded wait.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The executor delivered the shared response in time.
    Delivered(Arc<ResponseMessage>),
    /// The bound elapsed first. The in-flight execution keeps running.
    TimedOut,
    /// The producer half was dropped without delivering (executor task
    /// failed or was cancelled before completing).
    Abandoned,
}

impl PendingSignal {
    /// Create a connected signal/waiter pair.
    pub fn pair() -> (PendingSignal, SignalWaiter) {
        let (tx, rx) = oneshot::channel();
        (PendingSignal { tx: Some(tx) }, SignalWaiter { rx })
    }

    /// Deliver the response to the waiter.
    ///
    /// Meaningful at most once; later calls are no-ops. A waiter that
    /// already gave up (timed out and dropped its half) is ignored.
    pub fn deliver(&mut self, response: Arc<ResponseMessage>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(response);
        }
    }
}

impl SignalWaiter {
    /// Block the calling task until delivery or until `bound` elapses,
    /// whichever comes first.
    pub async fn wait(self, bound: Duration) -> WaitOutcome {
        match tokio::time::timeout(bound, self.rx).await {
            Ok(Ok(response)) => WaitOutcome::Delivered(response),
            Ok(Err(_)) => WaitOutcome::Abandoned,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Parameter, RequestMessage, ResponseMessage};
    use serde_json::json;

    fn response() -> Arc<ResponseMessage> {
        let request = RequestMessage {
            transaction_id: "tx".to_string(),
            service_name: "Svc".to_string(),
            method_name: "M".to_string(),
            parameters: vec![Parameter::new("id", json!(1))],
            app_name: "app".to_string(),
            app_path: "/".to_string(),
            app_version: "1.0.0".to_string(),
            host_name: "host".to_string(),
            ip_address: "127.0.0.1".to_string(),
            enable_cache: false,
            cache_time: None,
            invoke_method: false,
        };
        Arc::new(ResponseMessage::for_request(&request))
    }

    #[tokio::test]
    async fn test_deliver_wakes_waiter() {
        let (mut signal, waiter) = PendingSignal::pair();
        signal.deliver(response());

        match waiter.wait(Duration::from_secs(1)).await {
            WaitOutcome::Delivered(resp) => assert_eq!(resp.service_name, "Svc"),
            other => panic!("expected Delivered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_deliver_is_noop() {
        let (mut signal, waiter) = PendingSignal::pair();
        signal.deliver(response());
        // Second delivery must not panic and must not change the outcome.
        signal.deliver(response());

        assert!(matches!(
            waiter.wait(Duration::from_secs(1)).await,
            WaitOutcome::Delivered(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_delivery() {
        let (_signal, waiter) = PendingSignal::pair();
        assert!(matches!(
            waiter.wait(Duration::from_millis(50)).await,
            WaitOutcome::TimedOut
        ));
    }

    #[tokio::test]
    async fn test_dropped_signal_is_abandonment() {
        let (signal, waiter) = PendingSignal::pair();
        drop(signal);
        assert!(matches!(
            waiter.wait(Duration::from_secs(1)).await,
            WaitOutcome::Abandoned
        ));
    }

    #[tokio::test]
    async fn test_deliver_after_waiter_gone_is_safe() {
        let (mut signal, waiter) = PendingSignal::pair();
        drop(waiter);
        // Must not panic.
        signal.deliver(response());
    }
}
