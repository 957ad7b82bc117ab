//! Routes protocol requests to the scanner and the query service

use serde_json::{Value, json};
use std::fmt::Write as _;

use super::protocol::{PROTOCOL_VERSION, Response, ToolError};
use super::tools::{NOTIFICATION_PREFIX, Request, ToolCall, tool_catalogue};
use crate::config::Config;
use crate::query::{QueryService, UnitDetail, UnitPayload, UnitSummary};
use crate::scanner::{ScanStats, Scanner};
use crate::Result;

/// Owns both store handles for the lifetime of a session
pub struct Dispatcher {
    scanner: Scanner,
    queries: QueryService,
}

impl Dispatcher {
    pub fn new(scanner: Scanner, queries: QueryService) -> Self {
        Self { scanner, queries }
    }

    /// Open the writer first so the schema exists for the read-only handle
    pub fn open(config: &Config) -> Result<Self> {
        let scanner = Scanner::open(config)?;
        let queries = QueryService::open(config)?;
        Ok(Self::new(scanner, queries))
    }

    /// Handle one input line; `None` means nothing is written back
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) if message.is_object() => {
                let method = message.get("method").and_then(Value::as_str).unwrap_or("");
                if method.starts_with(NOTIFICATION_PREFIX) {
                    tracing::debug!("Ignoring notification {}", method);
                    return None;
                }
                self.dispatch(message)
            }
            Ok(_) => Response::failure(
                Value::Null,
                &ToolError::Internal(Some("message must be a JSON object".to_string())),
            ),
            Err(e) => {
                tracing::warn!("Unparseable request line: {}", e);
                Response::failure(Value::Null, &ToolError::Internal(Some(e.to_string())))
            }
        };

        match serde_json::to_string(&response) {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::error!("Failed to encode response: {}", e);
                None
            }
        }
    }

    /// Handle one decoded request object
    pub fn dispatch(&mut self, message: Value) -> Response {
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let method = message.get("method").and_then(Value::as_str).unwrap_or("");
        tracing::debug!("Request {} (id {})", method, id);

        let outcome = Request::parse(method, message.get("params")).and_then(|request| match request {
            Request::Initialize => Ok(Response::success(id.clone(), initialize_result())),
            Request::ListTools => Ok(Response::success(id.clone(), json!({ "tools": tool_catalogue() }))),
            Request::CallTool(call) => self.call_tool(call).map(|text| Response::text(id.clone(), text)),
        });

        outcome.unwrap_or_else(|err| {
            tracing::debug!("Request {} failed: {}", method, err);
            Response::failure(id, &err)
        })
    }

    fn call_tool(&mut self, call: ToolCall) -> std::result::Result<String, ToolError> {
        let tool = call.name();
        let backend = |e: crate::Error| {
            tracing::error!("Tool {} failed: {}", tool, e);
            ToolError::Internal(None)
        };

        match call {
            ToolCall::SearchClass { query, limit } => {
                let results = self.queries.search(&query, limit).map_err(backend)?;
                Ok(render_search(&results))
            }
            ToolCall::GetClassDetail { class_name } => {
                let detail = self.queries.detail(&class_name).map_err(backend)?;
                detail
                    .map(|d| render_detail(&d))
                    .ok_or_else(|| ToolError::NotFound(format!("Class not found: {}", class_name)))
            }
            ToolCall::GetClassContent { class_name, jar_path } => {
                let payload = self
                    .queries
                    .payload(&class_name, jar_path.as_deref())
                    .map_err(backend)?;
                payload.map(|p| render_payload(&p)).ok_or_else(|| {
                    ToolError::NotFound(format!("Class file not found: {}", class_name))
                })
            }
            ToolCall::UpdateCache { force } => {
                let stats = self.scanner.scan(force).map_err(backend)?;
                Ok(render_scan(&stats))
            }
        }
    }

    /// Release both store handles. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        self.queries.close()?;
        self.scanner.close()
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn render_search(results: &[UnitSummary]) -> String {
    let mut text = format!("Found {} matching classes:", results.len());
    for (i, unit) in results.iter().enumerate() {
        let _ = write!(
            text,
            "\n\n{}. **{}**\n   Package: {}\n   Jar: {}",
            i + 1,
            unit.qualified_name,
            unit.package_name,
            unit.archive_path
        );
        if let Some(tier) = unit.tier {
            let _ = write!(text, "\n   Match: {}", tier.as_str());
        }
    }
    text
}

fn render_detail(detail: &UnitDetail) -> String {
    let mut text = format!("# Class: {}\n\n", detail.qualified_name);
    let _ = writeln!(text, "**Package**: {}", detail.package_name);
    let _ = writeln!(text, "**Jar**: {}", detail.archive_path);

    let others: Vec<_> = detail
        .archives
        .iter()
        .filter(|a| **a != detail.archive_path)
        .collect();
    if !others.is_empty() {
        let _ = writeln!(text, "**Also in**:");
        for archive in others {
            let _ = writeln!(text, "- {}", archive);
        }
    }

    for (title, items) in [("Methods", &detail.members.methods), ("Fields", &detail.members.fields)] {
        if items.is_empty() {
            continue;
        }
        let _ = write!(text, "\n## {} ({})\n\n", title, items.len());
        for (i, item) in items.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", i + 1, item);
        }
    }
    text
}

fn render_payload(payload: &UnitPayload) -> String {
    format!(
        "Class file content ({}, from {}):\n{}",
        payload.encoding.as_str(),
        payload.archive_path,
        payload.data
    )
}

fn render_scan(stats: &ScanStats) -> String {
    format!(
        "Cache update complete:\nJars scanned: {}\nNew classes: {}\nUpdated classes: {}",
        stats.scanned_archives, stats.new_units, stats.updated_units
    )
}
