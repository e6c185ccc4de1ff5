use crate::core::error::SessionError;
use crate::core::session::{CommandCategory, CommandResult};
use rust_mcp_schema::{CallToolResult, ContentBlock, TextContent};
use serde_json::{Map, Value};

/// What a tool handler produces: one text block, optional structured
/// payload, and the error flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub text: String,
    pub structured: Option<Map<String, Value>>,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
            is_error: true,
        }
    }

    /// Attaches a structured payload. Non-object values are ignored.
    pub fn with_structured(mut self, value: Value) -> Self {
        if let Value::Object(map) = value {
            self.structured = Some(map);
        }
        self
    }

    pub fn from_session_error(err: &SessionError) -> Self {
        Self::error(format!("Error: {err}"))
    }

    pub fn into_call_result(self) -> CallToolResult {
        CallToolResult {
            content: vec![ContentBlock::TextContent(TextContent::new(
                self.text, None, None,
            ))],
            is_error: self.is_error.then_some(true),
            meta: None,
            structured_content: self.structured,
        }
    }
}

pub fn command_text(result: &CommandResult) -> String {
    let response = result.matched_response.as_deref().unwrap_or("(no response)");
    match result.category {
        CommandCategory::Timeout => format!(
            "Command executed but no matching feedback within timeout: {}",
            result.command
        ),
        CommandCategory::PermissionDenied => format!(
            "Permission error while executing command: {}\nResponse: {response}",
            result.command
        ),
        CommandCategory::UnknownCommand => format!(
            "Unknown/invalid command: {}\nResponse: {response}",
            result.command
        ),
        CommandCategory::Failed => {
            format!("Command failed: {}\nResponse: {response}", result.command)
        }
        CommandCategory::Success => {
            format!("Command executed: {}\nResponse: {response}", result.command)
        }
    }
}

/// Wraps a classified command outcome with the tool name and the effective
/// parameters (defaults filled in).
pub fn command_response(tool: &str, parameters: Value, result: CommandResult) -> ToolResponse {
    let is_error = matches!(
        result.category,
        CommandCategory::PermissionDenied | CommandCategory::UnknownCommand
    );
    let mut structured = Map::new();
    structured.insert("tool".to_string(), Value::String(tool.to_string()));
    structured.insert("parameters".to_string(), parameters);
    if let Ok(Value::Object(fields)) = serde_json::to_value(&result) {
        structured.extend(fields);
    }
    ToolResponse {
        text: command_text(&result),
        structured: Some(structured),
        is_error,
    }
}
