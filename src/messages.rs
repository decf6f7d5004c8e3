//! Message Envelope Module
//!
//! Request/response envelopes for one logical remote call, plus the caller
//! descriptor used for keying and diagnostics. Envelopes are plain data:
//! the transport encoding of these structures is a collaborator concern.

use crate::{InvokeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single named argument of a call, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: serde_json::Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Whether this process forwards calls as a server or issues them as a
/// direct client. Selects the applicable wait bound and the response
/// materialization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOrigin {
    Server,
    Client,
}

/// One logical remote call. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    pub transaction_id: String,
    pub service_name: String,
    pub method_name: String,
    pub parameters: Vec<Parameter>,
    pub app_name: String,
    pub app_path: String,
    pub app_version: String,
    pub host_name: String,
    pub ip_address: String,
    /// Whether this call participates in response caching.
    pub enable_cache: bool,
    /// Per-method cache-time hint resolved at proxy construction.
    pub cache_time: Option<Duration>,
    /// Generic invoke-by-name call (as opposed to a typed proxy call).
    pub invoke_method: bool,
}

impl RequestMessage {
    /// Deterministic stringification of the parameter list, used for the
    /// call key and for diagnostics. Names and values in declaration order.
    pub fn parameters_string(&self) -> String {
        let parts: Vec<String> = self
            .parameters
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        parts.join(",")
    }
}

/// Result of a call. Produced once per underlying execution and copied per
/// waiter before being handed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub transaction_id: String,
    pub service_name: String,
    pub method_name: String,
    /// The return value, when the call produced one.
    pub value: Option<serde_json::Value>,
    /// By-reference/out parameter values to apply on the caller side.
    pub out_params: Vec<Parameter>,
    /// Wall-clock cost attributed to this caller, in milliseconds.
    pub elapsed_ms: u64,
    pub error: Option<InvokeError>,
    /// Item-count hint used for cache eligibility. Zero means the payload
    /// is too trivial to be worth caching.
    pub count: u64,
}

impl ResponseMessage {
    /// An empty successful response for the given request.
    pub fn for_request(request: &RequestMessage) -> Self {
        Self {
            transaction_id: request.transaction_id.clone(),
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            value: None,
            out_params: Vec::new(),
            elapsed_ms: 0,
            error: None,
            count: 0,
        }
    }

    /// A failure response carrying the given error.
    pub fn from_error(request: &RequestMessage, error: InvokeError) -> Self {
        let mut response = Self::for_request(request);
        response.error = Some(error);
        response
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Deep copy of a return value via a serde round-trip.
///
/// The round-trip goes through the same serialization the transport uses,
/// which makes the copy semantics auditable: the result shares no mutable
/// state with the input.
pub fn deep_clone_value(value: &Option<serde_json::Value>) -> Result<Option<serde_json::Value>> {
    match value {
        None => Ok(None),
        Some(v) => {
            let text = serde_json::to_string(v)?;
            Ok(Some(serde_json::from_str(&text)?))
        }
    }
}

/// Descriptive metadata of who is calling. Created fresh per call for
/// keying and logging; not persisted beyond the call's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppCaller {
    pub app_name: String,
    pub app_path: String,
    pub app_version: String,
    pub host_name: String,
    pub ip_address: String,
    pub service_name: String,
    pub method_name: String,
    /// Stringified parameter list (see [`RequestMessage::parameters_string`]).
    pub parameters: String,
    pub call_time: DateTime<Utc>,
}

impl AppCaller {
    /// Caller descriptor for a request, stamped with the current time.
    pub fn from_request(request: &RequestMessage) -> Self {
        Self {
            app_name: request.app_name.clone(),
            app_path: request.app_path.clone(),
            app_version: request.app_version.clone(),
            host_name: request.host_name.clone(),
            ip_address: request.ip_address.clone(),
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            parameters: request.parameters_string(),
            call_time: Utc::now(),
        }
    }
}

/// Per-call context handed to the executor alongside the request.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub caller: AppCaller,
}

impl OperationContext {
    pub fn new(caller: AppCaller) -> Self {
        Self { caller }
    }

    pub fn for_request(request: &RequestMessage) -> Self {
        Self::new(AppCaller::from_request(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> RequestMessage {
        RequestMessage {
            transaction_id: "tx-1".to_string(),
            service_name: "OrderService".to_string(),
            method_name: "GetOrder".to_string(),
            parameters: vec![Parameter::new("id", json!(42))],
            app_name: "shop".to_string(),
            app_path: "/srv/shop".to_string(),
            app_version: "1.0.0".to_string(),
            host_name: "host-1".to_string(),
            ip_address: "10.0.0.1".to_string(),
            enable_cache: true,
            cache_time: None,
            invoke_method: false,
        }
    }

    #[test]
    fn test_parameters_string_is_ordered_and_deterministic() {
        let mut req = request();
        req.parameters = vec![
            Parameter::new("b", json!("two")),
            Parameter::new("a", json!(1)),
        ];
        assert_eq!(req.parameters_string(), "b=\"two\",a=1");
        assert_eq!(req.parameters_string(), req.parameters_string());
    }

    #[test]
    fn test_from_error_carries_identity() {
        let req = request();
        let resp = ResponseMessage::from_error(&req, InvokeError::Execution("boom".into()));
        assert_eq!(resp.transaction_id, "tx-1");
        assert_eq!(resp.service_name, "OrderService");
        assert!(resp.is_error());
        assert_eq!(resp.count, 0);
    }

    #[test]
    fn test_deep_clone_value_is_independent() {
        let original = Some(json!({"order": {"id": 42, "lines": [1, 2, 3]}}));
        let mut copy = deep_clone_value(&original).unwrap();

        assert_eq!(copy, original);

        // Mutating the copy must not affect the original.
        if let Some(serde_json::Value::Object(map)) = copy.as_mut() {
            map.insert("mutated".to_string(), json!(true));
        }
        assert_ne!(copy, original);
    }

    #[test]
    fn test_deep_clone_none_is_none() {
        assert_eq!(deep_clone_value(&None).unwrap(), None);
    }

    #[test]
    fn test_app_caller_snapshots_request_identity() {
        let req = request();
        let caller = AppCaller::from_request(&req);
        assert_eq!(caller.service_name, "OrderService");
        assert_eq!(caller.method_name, "GetOrder");
        assert_eq!(caller.parameters, "id=42");
    }
}
