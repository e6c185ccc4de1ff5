//! Tool catalogue and dispatch.
//!
//! The common tools are always registered; creative or survival tools are
//! added according to the configured mode. Arguments are checked against each
//! tool's JSON Schema before being deserialized into the handler's typed
//! argument struct.

mod common;
mod creative;
mod survival;


use super::response::ToolResponse;
use crate::core::config::Mode;
use crate::core::error::SessionError;
use crate::core::session::MinecraftSession;
use rust_mcp_schema::Tool;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Number, Value};
use tracing::debug;

/// Static description of one tool.
pub(crate) struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Why a handler did not produce its own response.
#[derive(Debug)]
pub(crate) enum ToolFailure {
    Session(SessionError),
    Arguments(String),
}

impl From<SessionError> for ToolFailure {
    fn from(err: SessionError) -> Self {
        ToolFailure::Session(err)
    }
}

pub(crate) type ToolOutcome = Result<ToolResponse, ToolFailure>;

struct RegisteredTool {
    definition: ToolDefinition,
    validator: jsonschema::Validator,
}

pub struct ToolRegistry {
    mode: Mode,
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn for_mode(mode: Mode) -> Result<Self, String> {
        let mut definitions = common::definitions();
        match mode {
            Mode::Creative => definitions.extend(creative::definitions()),
            Mode::Survival => definitions.extend(survival::definitions()),
        }

        let tools = definitions
            .into_iter()
            .map(|definition| {
                let validator = jsonschema::validator_for(&definition.input_schema)
                    .map_err(|err| format!("Invalid schema for tool {}: {err}", definition.name))?;
                Ok(RegisteredTool {
                    definition,
                    validator,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { mode, tools })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.definition.name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|tool| tool.definition.name == name)
    }

    /// Tool descriptors for `tools/list`.
    pub fn list(&self) -> Result<Vec<Tool>, String> {
        self.tools
            .iter()
            .map(|tool| {
                serde_json::from_value(json!({
                    "name": tool.definition.name,
                    "description": tool.definition.description,
                    "inputSchema": tool.definition.input_schema,
                }))
                .map_err(|err| format!("Unable to describe tool {}: {err}", tool.definition.name))
            })
            .collect()
    }

    /// Runs a tool. `None` when the name is not registered for this mode.
    pub async fn call(
        &self,
        session: &MinecraftSession,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Option<ToolResponse> {
        let tool = self.find(name)?;
        let arguments = Value::Object(arguments.unwrap_or_default());

        let violations: Vec<String> = tool
            .validator
            .iter_errors(&arguments)
            .map(|err| err.to_string())
            .collect();
        if !violations.is_empty() {
            debug!(tool = name, violations = ?violations, "Rejected tool arguments");
            return Some(ToolResponse::error(format!(
                "Invalid arguments for {name}: {}",
                violations.join("; ")
            )));
        }

        let outcome = match self.mode {
            Mode::Creative => match creative::dispatch(session, name, arguments.clone()).await {
                Some(outcome) => outcome,
                None => common::dispatch(session, name, arguments).await?,
            },
            Mode::Survival => match survival::dispatch(session, name, arguments.clone()).await {
                Some(outcome) => outcome,
                None => common::dispatch(session, name, arguments).await?,
            },
        };

        Some(match outcome {
            Ok(response) => response,
            Err(ToolFailure::Session(err)) => {
                debug!(tool = name, error = %err, "Tool failed");
                ToolResponse::from_session_error(&err)
            }
            Err(ToolFailure::Arguments(message)) => {
                ToolResponse::error(format!("Invalid arguments for {name}: {message}"))
            }
        })
    }
}

pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolFailure> {
    serde_json::from_value(arguments).map_err(|err| ToolFailure::Arguments(err.to_string()))
}

/// JSON Schema's `integer` admits integral floats such as `1.0`, so integer
/// arguments are read through `Number` rather than straight into `i64`/`u32`.
pub(crate) fn whole_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let number = Number::deserialize(deserializer)?;
    integral(&number)
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| D::Error::custom(format!("expected an integer in range, got {number}")))
}

pub(crate) fn optional_whole_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(None),
        Some(number) => integral(&number)
            .and_then(|value| T::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer in range, got {number}"))),
    }
}

fn integral(number: &Number) -> Option<i64> {
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|value| value.fract() == 0.0 && value.abs() < i64::MAX as f64)
            .map(|value| value as i64)
    })
}

/// `{"type": "object", ...}` with the given properties and required keys.
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub(crate) fn no_arguments() -> Value {
    object_schema(json!({}), &[])
}

pub(crate) fn number(description: &str) -> Value {
    json!({"type": "number", "description": description})
}

pub(crate) fn integer(description: &str) -> Value {
    json!({"type": "integer", "description": description})
}

pub(crate) fn text(description: &str) -> Value {
    json!({"type": "string", "minLength": 1, "description": description})
}

pub(crate) fn one_of(values: &[&str], description: &str) -> Value {
    json!({"type": "string", "enum": values, "description": description})
}
