//! Newline-delimited JSON framing.
//!
//! Each line from the host must hold one request or notification. Lines that
//! are valid JSON but not a message the relay accepts are rejected with
//! `Invalid request`, answered under the line's own id when it has one.

use serde_json::Value;

use crate::types::{JsonRpcMessage, RelayError, RelayResult, RequestId};

/// A line that did not yield a message, with the id to answer under.
#[derive(Debug)]
pub struct Rejected {
    pub id: RequestId,
    pub error: RelayError,
}

impl Rejected {
    fn anonymous(error: RelayError) -> Self {
        Self {
            id: RequestId::Null,
            error,
        }
    }
}

/// Parse a single line of text as a JSON-RPC message.
pub fn parse_message(line: &str) -> Result<JsonRpcMessage, Rejected> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Rejected::anonymous(RelayError::ParseError(
            "Empty message".to_string(),
        )));
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| Rejected::anonymous(RelayError::ParseError(e.to_string())))?;

    let Value::Object(fields) = &value else {
        let reason = if value.is_array() {
            "Batch requests are not supported"
        } else {
            "Message must be a JSON object"
        };
        return Err(Rejected::anonymous(RelayError::InvalidRequest(
            reason.to_string(),
        )));
    };

    let id = match fields.get("id") {
        None => RequestId::Null,
        Some(raw) => serde_json::from_value(raw.clone()).map_err(|_| {
            Rejected::anonymous(RelayError::InvalidRequest(format!(
                "Request id must be a string, integer or null, got {raw}"
            )))
        })?,
    };
    if !fields.contains_key("method") {
        return Err(Rejected {
            id,
            error: RelayError::InvalidRequest(
                "Only requests and notifications are accepted".to_string(),
            ),
        });
    }

    serde_json::from_value(value).map_err(|e| Rejected {
        id,
        error: RelayError::InvalidRequest(e.to_string()),
    })
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message(value: &Value) -> RelayResult<String> {
    let mut json = serde_json::to_string(value).map_err(RelayError::Json)?;
    json.push('\n');
    Ok(json)
}
