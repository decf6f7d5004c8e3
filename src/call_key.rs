//! Call Key Derivation
//!
//! Derives the canonical coalescing/cache key for a logical call from its
//! caller descriptor. Two requests that differ only in parameter whitespace
//! or letter case map to the same key, so they coalesce onto one execution.
//!
//! The key is a readable string, not a hash: correctness relies on the
//! parameter stringification being deterministic (stable ordering, stable
//! formatting), which [`RequestMessage::parameters_string`] guarantees.
//!
//! [`RequestMessage::parameters_string`]: crate::messages::RequestMessage::parameters_string

use crate::messages::AppCaller;

/// Derive the canonical call key for a caller descriptor.
///
/// Format: `"Caller_{service}${method}${parameters}"` with all spaces,
/// carriage returns, newlines and tabs removed, lower-cased.
pub fn derive_call_key(caller: &AppCaller) -> String {
    let raw = format!(
        "Caller_{}${}${}",
        caller.service_name, caller.method_name, caller.parameters
    );
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '\r' | '\n' | '\t'))
        .flat_map(|c| c.to_lowercase())
        .collect()
}
