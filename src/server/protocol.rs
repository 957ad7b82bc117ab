//! JSON-RPC 2.0 wire types for the stdio tool server

use serde::Serialize;
use serde_json::{Value, json};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision announced in the `initialize` reply
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Failure of a single request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("{0}")]
    NotFound(String),

    /// Detail, when present, is sent to the client as `data`
    #[error("Internal error")]
    Internal(Option<String>),
}

impl ToolError {
    pub fn code(&self) -> i64 {
        match self {
            ToolError::MethodNotFound(_) => -32601,
            ToolError::InvalidParams(_) => -32602,
            ToolError::Internal(_) => -32603,
            ToolError::NotFound(_) => -32001,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ToolError::MethodNotFound(_) => "method_not_found",
            ToolError::InvalidParams(_) => "invalid_params",
            ToolError::Internal(_) => "internal_error",
            ToolError::NotFound(_) => "not_found",
        }
    }

    fn data(&self) -> Value {
        match self {
            ToolError::Internal(Some(detail)) => Value::String(detail.clone()),
            _ => Value::String(self.tag().to_string()),
        }
    }
}

/// The `error` member of a failed response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Value,
}

impl From<&ToolError> for RpcError {
    fn from(err: &ToolError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            data: err.data(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    #[serde(rename = "result")]
    Success(Value),
    #[serde(rename = "error")]
    Failure(RpcError),
}

/// One response line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Success(result),
        }
    }

    pub fn failure(id: Value, err: &ToolError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Failure(err.into()),
        }
    }

    /// Wrap tool output as a single text content block
    pub fn text(id: Value, text: impl Into<String>) -> Self {
        Self::success(
            id,
            json!({ "content": [{ "type": "text", "text": text.into() }] }),
        )
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Failure(err) => Some(err),
            Outcome::Success(_) => None,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_tags() {
        let cases = [
            (ToolError::MethodNotFound("x".into()), -32601, "method_not_found"),
            (ToolError::InvalidParams("x".into()), -32602, "invalid_params"),
            (ToolError::Internal(None), -32603, "internal_error"),
            (ToolError::NotFound("x".into()), -32001, "not_found"),
        ];
        for (err, code, tag) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.tag(), tag);
        }
    }

    #[test]
    fn test_failure_serializes_error_member() {
        let response = Response::failure(json!(7), &ToolError::InvalidParams("className is required".into()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {
                    "code": -32602,
                    "message": "Invalid params: className is required",
                    "data": "invalid_params"
                }
            })
        );
    }

    #[test]
    fn test_internal_detail_becomes_data() {
        let response = Response::failure(Value::Null, &ToolError::Internal(Some("expected value".into())));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], -32603);
        assert_eq!(value["error"]["data"], "expected value");
    }

    #[test]
    fn test_text_result_shape() {
        let value = serde_json::to_value(Response::text(json!("a"), "hello")).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": "a",
                "result": { "content": [{ "type": "text", "text": "hello" }] }
            })
        );
    }
}
