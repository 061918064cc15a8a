//! The single result value handed back for every dispatched request.
//!
//! # Wire format
//!
//! A `Reply` renders as `{"err_code": <int>, "message": <string>, "data": <optional>}`.
//! `data` is `null` when the handler attached nothing, the bare value when it
//! attached one, and an array when it attached several.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error code carried by successful replies.
pub const ERR_CODE_OK: i32 = 0;

/// Error code carried by every denial the dispatcher produces on its own
/// (lookup failures, timeouts, faults, load shedding).
pub const ERR_CODE_DENIED: i32 = -1;

/// Result of one dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Zero on success, negative for denials.
    pub err_code: i32,
    /// Human-readable message. Empty on plain success.
    pub message: String,
    /// Optional payload.
    pub data: Option<Value>,
}

impl Reply {
    /// Builds a reply from trailing data arguments.
    ///
    /// Zero values leave `data` absent, one value is stored as-is, and two or
    /// more are stored as an ordered array.
    #[must_use]
    pub fn new(err_code: i32, message: impl Into<String>, mut data: Vec<Value>) -> Self {
        let data = match data.len() {
            0 => None,
            1 => data.pop(),
            _ => Some(Value::Array(data)),
        };
        Self {
            err_code,
            message: message.into(),
            data,
        }
    }

    /// Successful reply with a single payload value.
    #[must_use]
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            err_code: ERR_CODE_OK,
            message: String::new(),
            data: Some(data.into()),
        }
    }

    /// Successful reply without payload.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            err_code: ERR_CODE_OK,
            message: String::new(),
            data: None,
        }
    }

    /// Denial reply (`err_code == -1`) with the given message and no payload.
    #[must_use]
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            err_code: ERR_CODE_DENIED,
            message: message.into(),
            data: None,
        }
    }

    /// Returns `true` if `err_code` is [`ERR_CODE_OK`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.err_code == ERR_CODE_OK
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn no_trailing_data_leaves_data_absent() {
        let reply = Reply::new(0, "", vec![]);
        assert_eq!(reply.data, None);
        assert!(reply.is_ok());
    }

    #[test]
    fn single_trailing_value_is_stored_bare() {
        let reply = Reply::new(0, "", vec![json!("profile-data")]);
        assert_eq!(reply.data, Some(json!("profile-data")));
    }

    #[test]
    fn many_trailing_values_become_ordered_array() {
        let reply = Reply::new(3, "partial", vec![json!(1), json!("two"), json!({"n": 3})]);
        assert_eq!(reply.data, Some(json!([1, "two", {"n": 3}])));
        assert_eq!(reply.err_code, 3);
        assert_eq!(reply.message, "partial");
    }

    #[test]
    fn denial_renders_wire_shape() {
        let reply = Reply::denied("access denied,role not found");
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            wire,
            json!({
                "err_code": -1,
                "message": "access denied,role not found",
                "data": null,
            })
        );
    }

    #[test]
    fn ok_reply_carries_payload() {
        let reply = Reply::ok(json!({"id": 7}));
        assert!(reply.is_ok());
        assert!(reply.message.is_empty());
        assert_eq!(reply.data, Some(json!({"id": 7})));
    }
}
