//! Invocation Pipeline
//!
//! The proxy-side handler for one service interface: builds the outbound
//! request envelope from a method call, routes it through the coalescing
//! dispatcher, materializes a per-caller copy of the response, and
//! translates carried errors into the caller-visible contract.
//!
//! Per-method options (cache time, business error message) are resolved
//! once at construction and reused for every call.

use crate::config::InvokerConfig;
use crate::dispatcher::CoalescingDispatcher;
use crate::messages::{
    deep_clone_value, CallOrigin, OperationContext, Parameter, RequestMessage, ResponseMessage,
};
use crate::traits::CallHook;
use crate::{InvokeError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

/// Per-method options declared against a service interface.
#[derive(Debug, Clone, Default)]
pub struct MethodContract {
    pub signature: String,
    /// Cache-time hint for responses of this method.
    pub cache_time: Option<Duration>,
    /// Business error message raised in place of generic failures.
    pub error_message: Option<String>,
}

/// A service interface description: the name plus its method contracts.
#[derive(Debug, Clone)]
pub struct ServiceContract {
    pub service_name: String,
    pub methods: Vec<MethodContract>,
}

impl ServiceContract {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MethodContract) -> Self {
        self.methods.push(method);
        self
    }
}

/// What a successful call hands back to the generated proxy.
#[derive(Debug, Clone)]
pub struct InvokeReturn {
    pub value: Option<serde_json::Value>,
    /// By-reference/out parameter values for the caller to apply.
    pub out_params: Vec<Parameter>,
    pub elapsed_ms: u64,
}

/// Proxy-side invocation handler for one service interface.
pub struct ServiceProxy {
    service_name: String,
    app_name: String,
    app_path: String,
    app_version: String,
    host_name: String,
    ip_address: String,
    enable_cache: bool,
    throw_error: bool,
    cache_times: HashMap<String, Duration>,
    errors: HashMap<String, String>,
    dispatcher: Arc<CoalescingDispatcher>,
    hook: Option<Arc<dyn CallHook>>,
}

impl ServiceProxy {
    pub fn new(
        config: &InvokerConfig,
        contract: ServiceContract,
        dispatcher: Arc<CoalescingDispatcher>,
    ) -> Self {
        let mut cache_times = HashMap::new();
        let mut errors = HashMap::new();
        for method in contract.methods {
            if let Some(cache_time) = method.cache_time {
                cache_times.insert(method.signature.clone(), cache_time);
            }
            if let Some(message) = method.error_message {
                errors.insert(method.signature.clone(), message);
            }
        }

        Self {
            service_name: contract.service_name,
            app_name: config.app_name.clone(),
            app_path: config.app_path.clone(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            host_name: gethostname::gethostname().to_string_lossy().to_string(),
            ip_address: local_ip_address(),
            enable_cache: config.enable_cache,
            throw_error: config.throw_error,
            cache_times,
            errors,
            dispatcher,
            hook: None,
        }
    }

    /// Attach an observer invoked around every dispatched call.
    pub fn with_hook(mut self, hook: Arc<dyn CallHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Typed proxy call: the return value is deep-copied per caller.
    pub async fn invoke(
        &self,
        method: &str,
        parameters: Vec<Parameter>,
    ) -> Result<Option<InvokeReturn>> {
        let request = Arc::new(self.build_request(method, parameters, false));
        self.invoke_request(request).await
    }

    /// Generic invoke-by-name call: the response passes through unmodified.
    pub async fn invoke_named(
        &self,
        method: &str,
        parameters: Vec<Parameter>,
    ) -> Result<Option<InvokeReturn>> {
        let request = Arc::new(self.build_request(method, parameters, true));
        self.invoke_request(request).await
    }

    async fn invoke_request(&self, request: Arc<RequestMessage>) -> Result<Option<InvokeReturn>> {
        let started = Instant::now();
        if let Some(hook) = &self.hook {
            hook.begin_call(&request).await;
        }

        let context = OperationContext::for_request(&request);
        let shared = self.dispatcher.dispatch(context, Arc::clone(&request)).await;

        let mut response = self.materialize(&request, &shared)?;
        let wall_ms = started.elapsed().as_millis() as u64;
        // A caller never reports more time than it actually spent waiting.
        response.elapsed_ms = response.elapsed_ms.min(wall_ms);

        if let Some(hook) = &self.hook {
            hook.end_call(&request, &response, wall_ms).await;
        }

        self.translate(&request, response)
    }

    fn build_request(
        &self,
        method: &str,
        parameters: Vec<Parameter>,
        invoke_method: bool,
    ) -> RequestMessage {
        RequestMessage {
            transaction_id: next_transaction_id(),
            service_name: self.service_name.clone(),
            method_name: method.to_string(),
            parameters,
            app_name: self.app_name.clone(),
            app_path: self.app_path.clone(),
            app_version: self.app_version.clone(),
            host_name: self.host_name.clone(),
            ip_address: self.ip_address.clone(),
            enable_cache: self.enable_cache,
            cache_time: self.cache_times.get(method).copied(),
            invoke_method,
        }
    }

    /// Produce this caller's private copy of the shared response.
    ///
    /// Server-side forwarding and invoke-by-name calls pass through with a
    /// plain copy; typed client calls round-trip the return value through
    /// the transport serialization so the isolation is auditable.
    fn materialize(
        &self,
        request: &RequestMessage,
        shared: &ResponseMessage,
    ) -> Result<ResponseMessage> {
        let mut response = shared.clone();
        if self.dispatcher.origin() == CallOrigin::Server || request.invoke_method {
            return Ok(response);
        }
        response.value = deep_clone_value(&shared.value)?;
        Ok(response)
    }

    /// Apply the caller-visible error contract.
    fn translate(
        &self,
        request: &RequestMessage,
        response: ResponseMessage,
    ) -> Result<Option<InvokeReturn>> {
        let mut response = response;
        if let Some(err) = response.error.take() {
            error!(
                "call ({}, {}) failed: {}",
                request.service_name, request.method_name, err
            );
            if err.is_business() {
                return Err(err);
            }
            if let Some(message) = self.errors.get(&request.method_name) {
                return Err(InvokeError::Business(message.clone()));
            }
            if self.throw_error {
                return Err(err);
            }
            // Surfacing disabled and no configured message: the failure is
            // swallowed and the call yields nothing.
            return Ok(None);
        }

        Ok(Some(InvokeReturn {
            value: response.value,
            out_params: response.out_params,
            elapsed_ms: response.elapsed_ms,
        }))
    }
}

fn next_transaction_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Best-effort local address for the caller descriptor. Never fails: falls
/// back to loopback when no route is available.
fn local_ip_address() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::CallOrigin;
    use crate::timeout::TimeoutPolicy;
    use crate::traits::Executor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct EchoExecutor;

    #[async_trait]
    impl Executor for EchoExecutor {
        async fn run(
            &self,
            _context: &OperationContext,
            request: &RequestMessage,
        ) -> Result<ResponseMessage> {
            let mut response = ResponseMessage::for_request(request);
            response.value = Some(json!({ "method": request.method_name }));
            response.count = 1;
            Ok(response)
        }
    }

    fn proxy(origin: CallOrigin) -> ServiceProxy {
        let config = InvokerConfig::default();
        let dispatcher = Arc::new(CoalescingDispatcher::new(
            Arc::new(EchoExecutor),
            None,
            TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(5)),
            origin,
        ));
        ServiceProxy::new(
            &config,
            ServiceContract::new("OrderService").with_method(MethodContract {
                signature: "GetOrder".to_string(),
                cache_time: Some(Duration::from_secs(30)),
                error_message: Some("Order not found".to_string()),
            }),
            dispatcher,
        )
    }

    #[tokio::test]
    async fn test_invoke_builds_request_identity() {
        let proxy = proxy(CallOrigin::Client);
        let result = proxy
            .invoke("GetOrder", vec![Parameter::new("id", json!(42))])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.value.unwrap()["method"], "GetOrder");
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique_per_call() {
        let a = next_transaction_id();
        let b = next_transaction_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_contract_options_resolved_once() {
        let proxy = proxy(CallOrigin::Client);
        assert_eq!(
            proxy.cache_times.get("GetOrder").copied(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            proxy.errors.get("GetOrder").map(String::as_str),
            Some("Order not found")
        );
        assert!(proxy.cache_times.get("Unknown").is_none());
    }
}
