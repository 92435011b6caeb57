//! Request checks run before dispatch: protocol version, known method, and
//! the shape of `params`.

use serde_json::Value;

use crate::types::{JsonRpcRequest, RelayError, RelayResult, JSONRPC_VERSION};

/// Relay methods and whether they need a params object.
pub const METHODS: &[(&str, bool)] = &[
    ("getSettings", false),
    ("updateSettings", true),
    ("toggleModule", true),
    ("toggleExtension", false),
    ("getStatus", false),
    ("openPage", true),
    ("closePage", true),
    ("renderPage", true),
    ("appendHtml", true),
    ("dispatchEvent", true),
    ("ping", false),
];

/// Validate a request against the relay's method table.
pub fn validate_request(request: &JsonRpcRequest) -> RelayResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(RelayError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(RelayError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    let Some(&(_, needs_params)) = METHODS.iter().find(|(name, _)| *name == request.method) else {
        return Err(RelayError::MethodNotFound(request.method.clone()));
    };

    match &request.params {
        Some(Value::Object(_)) => Ok(()),
        None | Some(Value::Null) if !needs_params => Ok(()),
        None | Some(Value::Null) => Err(RelayError::InvalidParams(format!(
            "{} requires a params object",
            request.method
        ))),
        Some(_) => Err(RelayError::InvalidParams(format!(
            "{} params must be an object",
            request.method
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: RequestId::Number(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_param_free_methods_accept_missing_params() {
        for method in ["ping", "getSettings", "getStatus", "toggleExtension"] {
            assert!(validate_request(&request(method, None)).is_ok());
            assert!(validate_request(&request(method, Some(json!({})))).is_ok());
        }
    }

    #[test]
    fn test_page_methods_need_an_object() {
        let err = validate_request(&request("openPage", None)).unwrap_err();
        assert!(matches!(err, RelayError::InvalidParams(_)));
        let err = validate_request(&request("dispatchEvent", Some(json!(["p", "button"])))).unwrap_err();
        assert_eq!(err.code(), -32602);
        assert!(validate_request(&request("closePage", Some(json!({"pageId": "p"})))).is_ok());
    }

    #[test]
    fn test_unknown_method_and_version() {
        let err = validate_request(&request("tools/list", None)).unwrap_err();
        assert!(matches!(err, RelayError::MethodNotFound(m) if m == "tools/list"));

        let mut old = request("ping", None);
        old.jsonrpc = "1.0".to_string();
        assert!(matches!(validate_request(&old), Err(RelayError::InvalidRequest(_))));
    }
}
