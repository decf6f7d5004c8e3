//! rpc-coalesce - Client-side RPC invocation core with request coalescing
//!
//! This library turns N concurrent identical calls into exactly one backend
//! execution: a dispatcher coalesces duplicate requests onto a single
//! in-flight execution, serves repeat calls from a TTL cache, keeps
//! expensive entries warm with background refresh workers, and converts
//! slow or failed calls into well-defined error responses.

pub mod cache_gate;
pub mod call_key;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod inflight;
pub mod logging;
pub mod memory_cache;
pub mod messages;
pub mod metrics;
pub mod pending;
pub mod pipeline;
pub mod status;
pub mod timeout;
pub mod traits;
pub mod worker;

pub use error::{InvokeError, Result};
pub use messages::{
    AppCaller, CallOrigin, OperationContext, Parameter, RequestMessage, ResponseMessage,
};
pub use pipeline::{InvokeReturn, MethodContract, ServiceContract, ServiceProxy};
pub use traits::{CallHook, Executor, ResponseCache, WorkerItem, WorkerRegistry};
