// Log redaction for request and response bodies.

use serde_json::Value;

/// Keys whose values never reach the logs.
pub const SENSITIVE_KEYS: &[&str] = &[
    "access_token",
    "client_id",
    "ip",
    "lat",
    "link_id",
    "local_key",
    "lon",
    "password",
    "refresh_token",
    "uid",
];

const MASK: &str = "***";

/// Return a copy of `value` with sensitive fields masked.
///
/// Masks keys at the top level of an object, or (when the object wraps a
/// `result`) inside `result` itself and inside each item of a `result` array.
pub fn redact(value: &Value) -> Value {
    let mut copy = value.clone();
    let target = if copy.get("result").is_some() {
        &mut copy["result"]
    } else {
        &mut copy
    };

    match target {
        Value::Array(items) => items.iter_mut().for_each(mask_object),
        other => mask_object(other),
    }
    copy
}

fn mask_object(value: &mut Value) {
    if let Value::Object(map) = value {
        for key in SENSITIVE_KEYS {
            if let Some(v) = map.get_mut(*key) {
                *v = Value::String(MASK.into());
            }
        }
    }
}
