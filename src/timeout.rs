//! Timeout Policy Module
//!
//! Selects the wait bound for a dispatched call and synthesizes the failure
//! response delivered to a waiter whose bound elapses. A timeout abandons
//! only that waiter's wait: the in-flight execution keeps running so a
//! slow-but-successful call can still populate the cache.

use crate::messages::{CallOrigin, RequestMessage, ResponseMessage};
use crate::InvokeError;
use std::time::Duration;

/// The two named wait bounds: one for calls forwarded by a server, one for
/// direct client calls.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    pub server_call_timeout: Duration,
    pub client_call_timeout: Duration,
}

impl TimeoutPolicy {
    pub fn new(server_call_timeout: Duration, client_call_timeout: Duration) -> Self {
        Self {
            server_call_timeout,
            client_call_timeout,
        }
    }

    /// The bound applicable to a call of the given origin.
    pub fn bound_for(&self, origin: CallOrigin) -> Duration {
        match origin {
            CallOrigin::Server => self.server_call_timeout,
            CallOrigin::Client => self.client_call_timeout,
        }
    }

    /// Failure response for a waiter whose bound elapsed, carrying the
    /// service name, method name and the configured bound in milliseconds.
    pub fn timeout_response(&self, request: &RequestMessage, bound: Duration) -> ResponseMessage {
        ResponseMessage::from_error(
            request,
            InvokeError::Timeout {
                service: request.service_name.clone(),
                method: request.method_name.clone(),
                timeout_ms: bound.as_millis() as u64,
            },
        )
    }
}
