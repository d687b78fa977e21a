//! Wire framing for the kdb+ WebSocket handler.
//!
//! Requests are single text frames: the query prefixed with the current
//! pointer context (`mouseX:0.500000; mouseY:0.250000; <query>`). Replies are
//! single text frames holding JSON, or plain text when the engine sends
//! something that does not decode.

use serde_json::Value;

use crate::error::EngineFailure;
use crate::pointer::PointerPosition;

/// Discriminator the engine's handler uses for evaluation failures.
pub const EXECUTION_ERROR: &str = "ExecutionError";

/// Build the wire request for `query` with the pointer context in front.
pub fn frame_query(position: PointerPosition, query: &str) -> String {
    format!(
        "mouseX:{:.6}; mouseY:{:.6}; {}",
        position.x,
        position.y,
        query.trim()
    )
}

/// Decoded reply frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    /// Text that failed to decode as JSON; shown as-is.
    Opaque(String),
}

impl Reply {
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Reply::Json(value),
            Err(e) => {
                tracing::debug!(error = %e, "reply is not JSON, keeping raw text");
                Reply::Opaque(text.to_string())
            }
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Reply::Json(value) => value,
            Reply::Opaque(text) => Value::String(text),
        }
    }
}

/// Outcome of a delivered reply once engine errors are separated out.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(EngineFailure),
}

impl Outcome {
    pub fn from_value(value: Value) -> Self {
        match engine_failure(&value) {
            Some(failure) => Outcome::Failure(failure),
            None => Outcome::Success(value),
        }
    }
}

/// Detect a logical failure carried by a reply object: a truthy
/// `error`/`Error` field, or a `msg` field next to the execution-error
/// discriminator.
pub fn engine_failure(value: &Value) -> Option<EngineFailure> {
    let obj = value.as_object()?;
    let error = obj.get("error").filter(|v| truthy(v));
    let error_upper = obj.get("Error").filter(|v| truthy(v));
    let discriminated = obj.get("msg").is_some_and(truthy)
        && [obj.get("error"), obj.get("Error")]
            .into_iter()
            .flatten()
            .any(|v| v.as_str() == Some(EXECUTION_ERROR));

    if error.is_none() && error_upper.is_none() && !discriminated {
        return None;
    }

    let message = ["msg", "message", "error", "Error"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| truthy(v))
        .map(display_scalar)
        .unwrap_or_else(|| "Unknown KDB+ error".to_string());
    Some(EngineFailure { message })
}

/// JavaScript-style truthiness, which is what the engine's handler expects
/// clients to apply to error fields.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value the way a string coercion would: strings unquoted,
/// everything else as compact JSON.
pub fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
