//! Request parsing and the tool catalogue
//!
//! Every incoming message is turned into a closed [`Request`] before any
//! backend is touched, so argument validation never reaches the store.

use serde_json::{Map, Value, json};

use super::protocol::ToolError;
use crate::query::DEFAULT_SEARCH_LIMIT;

pub const SEARCH_CLASS: &str = "search_class";
pub const GET_CLASS_DETAIL: &str = "get_class_detail";
pub const GET_CLASS_CONTENT: &str = "get_class_content";
pub const UPDATE_CACHE: &str = "update_cache";

/// Prefix of methods that never get a response
pub const NOTIFICATION_PREFIX: &str = "notifications/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Initialize,
    ListTools,
    CallTool(ToolCall),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    SearchClass { query: String, limit: usize },
    GetClassDetail { class_name: String },
    GetClassContent { class_name: String, jar_path: Option<String> },
    UpdateCache { force: bool },
}

impl Request {
    /// Parse a method name and its `params` member
    pub fn parse(method: &str, params: Option<&Value>) -> Result<Self, ToolError> {
        match method {
            "initialize" => Ok(Request::Initialize),
            "tools/list" => Ok(Request::ListTools),
            "tools/call" => ToolCall::parse(params).map(Request::CallTool),
            other => Err(ToolError::MethodNotFound(other.to_string())),
        }
    }
}

impl ToolCall {
    fn parse(params: Option<&Value>) -> Result<Self, ToolError> {
        let empty = Map::new();
        let params = match params {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(invalid("params must be an object")),
        };

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("tool name is required"))?;

        let args = match params.get("arguments") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => return Err(invalid("arguments must be an object")),
        };

        match name {
            SEARCH_CLASS => Ok(ToolCall::SearchClass {
                query: required_str(args, "query")?,
                limit: optional_limit(args, "limit")?.unwrap_or(DEFAULT_SEARCH_LIMIT),
            }),
            GET_CLASS_DETAIL => Ok(ToolCall::GetClassDetail {
                class_name: required_str(args, "className")?,
            }),
            GET_CLASS_CONTENT => Ok(ToolCall::GetClassContent {
                class_name: required_str(args, "className")?,
                jar_path: optional_str(args, "jarPath")?,
            }),
            UPDATE_CACHE => Ok(ToolCall::UpdateCache {
                force: optional_bool(args, "force")?.unwrap_or(false),
            }),
            other => Err(invalid(format!("unknown tool: {}", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::SearchClass { .. } => SEARCH_CLASS,
            ToolCall::GetClassDetail { .. } => GET_CLASS_DETAIL,
            ToolCall::GetClassContent { .. } => GET_CLASS_CONTENT,
            ToolCall::UpdateCache { .. } => UPDATE_CACHE,
        }
    }
}

fn invalid(message: impl Into<String>) -> ToolError {
    ToolError::InvalidParams(message.into())
}

/// A present, non-blank string; surrounding whitespace is trimmed
fn required_str(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(invalid(format!("{} must not be blank", key))),
        Some(Value::Null) | None => Err(invalid(format!("{} is required", key))),
        Some(_) => Err(invalid(format!("{} must be a string", key))),
    }
}

/// Absent, null and blank strings all read as `None`
fn optional_str(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(invalid(format!("{} must be a string", key))),
    }
}

fn optional_limit(args: &Map<String, Value>, key: &str) -> Result<Option<usize>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| Some(usize::try_from(n).unwrap_or(usize::MAX)))
            .ok_or_else(|| invalid(format!("{} must be a positive integer", key))),
    }
}

fn optional_bool(args: &Map<String, Value>, key: &str) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(invalid(format!("{} must be a boolean", key))),
    }
}

/// Static catalogue returned by `tools/list`
pub fn tool_catalogue() -> Value {
    json!([
        {
            "name": SEARCH_CLASS,
            "description": "Search the local Maven repository for classes. Matches the query as a substring, ignoring case, of the fully qualified class name or package name; exact and prefix matches rank first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Class name, package name or any fragment of them" },
                    "limit": { "type": "integer", "description": "Maximum number of results. Default: 50" }
                },
                "required": ["query"]
            }
        },
        {
            "name": GET_CLASS_DETAIL,
            "description": "Get the details of one class: package, containing jar, methods and fields.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "className": { "type": "string", "description": "Fully qualified class name" }
                },
                "required": ["className"]
            }
        },
        {
            "name": GET_CLASS_CONTENT,
            "description": "Get the raw class file of a class, base64 encoded.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "className": { "type": "string", "description": "Fully qualified class name" },
                    "jarPath": { "type": "string", "description": "Jar to read from. Default: the first jar containing the class" }
                },
                "required": ["className"]
            }
        },
        {
            "name": UPDATE_CACHE,
            "description": "Rescan the Maven repository for new or modified jars.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "force": { "type": "boolean", "description": "Rescan every jar, not just modified ones. Default: false" }
                }
            }
        }
    ])
}
