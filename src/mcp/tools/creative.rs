//! Creative-mode tools. Everything except `fly_to` is a slash command whose
//! outcome is classified from the server's feedback.

use super::{
    integer, number, object_schema, one_of, optional_whole_number, parse_args, text,
    whole_number, ToolDefinition, ToolOutcome,
};
use crate::core::error::SessionError;
use crate::core::session::MinecraftSession;
use crate::game::Vec3;
use crate::mcp::response::{command_response, ToolResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

const SETBLOCK_MODES: &[&str] = &["replace", "destroy", "keep"];
const FILL_MODES: &[&str] = &["replace", "destroy", "keep", "hollow", "outline"];
const MASK_MODES: &[&str] = &["replace", "masked", "filtered"];
const CLONE_MODES: &[&str] = &["normal", "force", "move"];
const TIME_PRESETS: &[&str] = &["day", "noon", "night", "midnight", "sunrise", "sunset"];
const WEATHER_TYPES: &[&str] = &["clear", "rain", "thunder"];

#[derive(Debug, Deserialize)]
struct SetblockArgs {
    #[serde(deserialize_with = "whole_number")]
    x: i64,
    #[serde(deserialize_with = "whole_number")]
    y: i64,
    #[serde(deserialize_with = "whole_number")]
    z: i64,
    block: String,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FillArgs {
    #[serde(deserialize_with = "whole_number")]
    x1: i64,
    #[serde(deserialize_with = "whole_number")]
    y1: i64,
    #[serde(deserialize_with = "whole_number")]
    z1: i64,
    #[serde(deserialize_with = "whole_number")]
    x2: i64,
    #[serde(deserialize_with = "whole_number")]
    y2: i64,
    #[serde(deserialize_with = "whole_number")]
    z2: i64,
    block: String,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloneAreaArgs {
    #[serde(deserialize_with = "whole_number")]
    x1: i64,
    #[serde(deserialize_with = "whole_number")]
    y1: i64,
    #[serde(deserialize_with = "whole_number")]
    z1: i64,
    #[serde(deserialize_with = "whole_number")]
    x2: i64,
    #[serde(deserialize_with = "whole_number")]
    y2: i64,
    #[serde(deserialize_with = "whole_number")]
    z2: i64,
    #[serde(deserialize_with = "whole_number")]
    dx: i64,
    #[serde(deserialize_with = "whole_number")]
    dy: i64,
    #[serde(deserialize_with = "whole_number")]
    dz: i64,
    mask_mode: Option<String>,
    clone_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GiveItemArgs {
    item: String,
    #[serde(default, deserialize_with = "optional_whole_number")]
    count: Option<u32>,
    target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeleportArgs {
    x: f64,
    y: f64,
    z: f64,
    yaw: Option<f64>,
    pitch: Option<f64>,
}

/// A named preset or an absolute tick.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
enum TimeValue {
    Tick(#[serde(deserialize_with = "whole_number")] u64),
    Preset(String),
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Tick(tick) => write!(f, "{tick}"),
            TimeValue::Preset(preset) => f.write_str(preset),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetTimeArgs {
    value: TimeValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetWeatherArgs {
    weather: String,
    #[serde(default, deserialize_with = "optional_whole_number")]
    duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
enum GameruleValue {
    Flag(bool),
    Number(#[serde(deserialize_with = "whole_number")] i64),
    Text(String),
}

impl fmt::Display for GameruleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameruleValue::Flag(flag) => write!(f, "{flag}"),
            GameruleValue::Number(number) => write!(f, "{number}"),
            GameruleValue::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SetGameruleArgs {
    rule: String,
    value: GameruleValue,
}

#[derive(Debug, Deserialize)]
struct SummonArgs {
    entity: String,
    x: f64,
    y: f64,
    z: f64,
    nbt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlyToArgs {
    x: f64,
    y: f64,
    z: f64,
}

fn corner(label: &str, axis: &str) -> Value {
    integer(&format!("{label} {axis}"))
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "setblock",
            description: "Place a block at a specific position with optional mode.",
            input_schema: object_schema(
                json!({
                    "x": integer("Target X coordinate"),
                    "y": integer("Target Y coordinate"),
                    "z": integer("Target Z coordinate"),
                    "block": text("Minecraft block id/state string"),
                    "mode": one_of(SETBLOCK_MODES, "setblock mode (default replace)"),
                }),
                &["x", "y", "z", "block"],
            ),
        },
        ToolDefinition {
            name: "fill",
            description: "Fill a cuboid region with a block type and optional mode.",
            input_schema: object_schema(
                json!({
                    "x1": corner("First corner", "X coordinate"),
                    "y1": corner("First corner", "Y coordinate"),
                    "z1": corner("First corner", "Z coordinate"),
                    "x2": corner("Second corner", "X coordinate"),
                    "y2": corner("Second corner", "Y coordinate"),
                    "z2": corner("Second corner", "Z coordinate"),
                    "block": text("Minecraft block id/state string"),
                    "mode": one_of(FILL_MODES, "fill mode (default replace)"),
                }),
                &["x1", "y1", "z1", "x2", "y2", "z2", "block"],
            ),
        },
        ToolDefinition {
            name: "clone_area",
            description: "Clone a cuboid region from a source to a destination position.",
            input_schema: object_schema(
                json!({
                    "x1": corner("Source region first corner", "X"),
                    "y1": corner("Source region first corner", "Y"),
                    "z1": corner("Source region first corner", "Z"),
                    "x2": corner("Source region second corner", "X"),
                    "y2": corner("Source region second corner", "Y"),
                    "z2": corner("Source region second corner", "Z"),
                    "dx": corner("Destination lower-NW corner", "X"),
                    "dy": corner("Destination lower-NW corner", "Y"),
                    "dz": corner("Destination lower-NW corner", "Z"),
                    "maskMode": one_of(MASK_MODES, "Mask mode (default replace)"),
                    "cloneMode": one_of(CLONE_MODES, "Clone mode (default normal)"),
                }),
                &["x1", "y1", "z1", "x2", "y2", "z2", "dx", "dy", "dz"],
            ),
        },
        ToolDefinition {
            name: "give_item",
            description: "Give an item to a player (default: the bot itself).",
            input_schema: object_schema(
                json!({
                    "item": text("Minecraft item id (e.g. 'diamond', 'minecraft:stone')"),
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 6400,
                        "description": "Number of items (default 1, max 6400)"
                    },
                    "target": {
                        "type": "string",
                        "description": "Target player selector or name (default: bot itself, '@s')"
                    }
                }),
                &["item"],
            ),
        },
        ToolDefinition {
            name: "teleport_to",
            description: "Teleport the bot to specific coordinates with optional rotation.",
            input_schema: object_schema(
                json!({
                    "x": number("Destination X coordinate"),
                    "y": number("Destination Y coordinate"),
                    "z": number("Destination Z coordinate"),
                    "yaw": number("Horizontal rotation in degrees (optional)"),
                    "pitch": number("Vertical rotation in degrees (optional)"),
                }),
                &["x", "y", "z"],
            ),
        },
        ToolDefinition {
            name: "set_time",
            description: "Set the world time to a preset (day, noon, night, etc.) or a tick value.",
            input_schema: object_schema(
                json!({
                    "value": {
                        "description": "Time preset name (day, noon, night, midnight, sunrise, sunset) or tick value (0+)",
                        "oneOf": [
                            {"type": "string", "enum": TIME_PRESETS},
                            {"type": "integer", "minimum": 0}
                        ]
                    }
                }),
                &["value"],
            ),
        },
        ToolDefinition {
            name: "set_weather",
            description: "Set the weather to clear, rain, or thunder with optional duration.",
            input_schema: object_schema(
                json!({
                    "weather": one_of(WEATHER_TYPES, "Weather type to set"),
                    "durationSeconds": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 1_000_000,
                        "description": "Duration in seconds (optional)"
                    }
                }),
                &["weather"],
            ),
        },
        ToolDefinition {
            name: "set_gamerule",
            description: "Set a game rule to a specific value.",
            input_schema: object_schema(
                json!({
                    "rule": text("Game rule name (e.g. 'doDaylightCycle', 'keepInventory')"),
                    "value": {
                        "description": "Game rule value (string, integer, or boolean)",
                        "type": ["string", "integer", "boolean"]
                    }
                }),
                &["rule", "value"],
            ),
        },
        ToolDefinition {
            name: "summon_entity",
            description: "Summon an entity at specific coordinates with optional NBT data.",
            input_schema: object_schema(
                json!({
                    "entity": text("Entity type id (e.g. 'zombie', 'minecraft:creeper')"),
                    "x": number("Spawn X coordinate"),
                    "y": number("Spawn Y coordinate"),
                    "z": number("Spawn Z coordinate"),
                    "nbt": {
                        "type": "string",
                        "description": "Optional NBT data tag string (e.g. '{NoAI:1b}')"
                    }
                }),
                &["entity", "x", "y", "z"],
            ),
        },
        ToolDefinition {
            name: "fly_to",
            description: "Fly the bot to specific coordinates using creative flight.",
            input_schema: object_schema(
                json!({
                    "x": number("Destination X coordinate"),
                    "y": number("Destination Y coordinate"),
                    "z": number("Destination Z coordinate"),
                }),
                &["x", "y", "z"],
            ),
        },
    ]
}

pub(super) async fn dispatch(
    session: &MinecraftSession,
    name: &str,
    arguments: Value,
) -> Option<ToolOutcome> {
    let outcome = match name {
        "setblock" => run(arguments, |args| setblock(session, args)).await,
        "fill" => run(arguments, |args| fill(session, args)).await,
        "clone_area" => run(arguments, |args| clone_area(session, args)).await,
        "give_item" => run(arguments, |args| give_item(session, args)).await,
        "teleport_to" => run(arguments, |args| teleport_to(session, args)).await,
        "set_time" => run(arguments, |args| set_time(session, args)).await,
        "set_weather" => run(arguments, |args| set_weather(session, args)).await,
        "set_gamerule" => run(arguments, |args| set_gamerule(session, args)).await,
        "summon_entity" => run(arguments, |args| summon_entity(session, args)).await,
        "fly_to" => run(arguments, |args| fly_to(session, args)).await,
        _ => return None,
    };
    Some(outcome)
}

async fn run<T, F, Fut>(arguments: Value, handler: F) -> ToolOutcome
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Fut,
    Fut: std::future::Future<Output = ToolOutcome>,
{
    handler(parse_args(arguments)?).await
}

async fn execute(
    session: &MinecraftSession,
    tool: &str,
    command: String,
    parameters: Value,
) -> ToolOutcome {
    let result = session.execute_command(&command).await?;
    Ok(command_response(tool, parameters, result))
}

async fn setblock(session: &MinecraftSession, args: SetblockArgs) -> ToolOutcome {
    let mode = args.mode.unwrap_or_else(|| "replace".to_string());
    let command = format!(
        "/setblock {} {} {} {} {mode}",
        args.x, args.y, args.z, args.block
    );
    let parameters = json!({
        "x": args.x, "y": args.y, "z": args.z,
        "block": args.block, "mode": mode,
    });
    execute(session, "setblock", command, parameters).await
}

async fn fill(session: &MinecraftSession, args: FillArgs) -> ToolOutcome {
    let mode = args.mode.unwrap_or_else(|| "replace".to_string());
    let command = format!(
        "/fill {} {} {} {} {} {} {} {mode}",
        args.x1, args.y1, args.z1, args.x2, args.y2, args.z2, args.block
    );
    let parameters = json!({
        "x1": args.x1, "y1": args.y1, "z1": args.z1,
        "x2": args.x2, "y2": args.y2, "z2": args.z2,
        "block": args.block, "mode": mode,
    });
    execute(session, "fill", command, parameters).await
}

async fn clone_area(session: &MinecraftSession, args: CloneAreaArgs) -> ToolOutcome {
    let mask_mode = args.mask_mode.unwrap_or_else(|| "replace".to_string());
    let clone_mode = args.clone_mode.unwrap_or_else(|| "normal".to_string());
    let command = format!(
        "/clone {} {} {} {} {} {} {} {} {} {mask_mode} {clone_mode}",
        args.x1, args.y1, args.z1, args.x2, args.y2, args.z2, args.dx, args.dy, args.dz
    );
    let parameters = json!({
        "x1": args.x1, "y1": args.y1, "z1": args.z1,
        "x2": args.x2, "y2": args.y2, "z2": args.z2,
        "dx": args.dx, "dy": args.dy, "dz": args.dz,
        "maskMode": mask_mode, "cloneMode": clone_mode,
    });
    execute(session, "clone_area", command, parameters).await
}

async fn give_item(session: &MinecraftSession, args: GiveItemArgs) -> ToolOutcome {
    let target = args.target.unwrap_or_else(|| "@s".to_string());
    let count = args.count.unwrap_or(1);
    let command = format!("/give {target} {} {count}", args.item);
    let parameters = json!({"item": args.item, "count": count, "target": target});
    execute(session, "give_item", command, parameters).await
}

async fn teleport_to(session: &MinecraftSession, args: TeleportArgs) -> ToolOutcome {
    let mut command = format!("/tp @s {} {} {}", args.x, args.y, args.z);
    match (args.yaw, args.pitch) {
        (Some(yaw), Some(pitch)) => command.push_str(&format!(" {yaw} {pitch}")),
        (Some(yaw), None) => command.push_str(&format!(" {yaw} 0")),
        _ => {}
    }

    let mut parameters = Map::new();
    parameters.insert("x".to_string(), json!(args.x));
    parameters.insert("y".to_string(), json!(args.y));
    parameters.insert("z".to_string(), json!(args.z));
    if let Some(yaw) = args.yaw {
        parameters.insert("yaw".to_string(), json!(yaw));
    }
    if let Some(pitch) = args.pitch {
        parameters.insert("pitch".to_string(), json!(pitch));
    }
    execute(session, "teleport_to", command, Value::Object(parameters)).await
}

async fn set_time(session: &MinecraftSession, args: SetTimeArgs) -> ToolOutcome {
    let command = format!("/time set {}", args.value);
    let parameters = json!({"value": args.value});
    execute(session, "set_time", command, parameters).await
}

async fn set_weather(session: &MinecraftSession, args: SetWeatherArgs) -> ToolOutcome {
    let mut command = format!("/weather {}", args.weather);
    let mut parameters = Map::new();
    parameters.insert("weather".to_string(), json!(args.weather));
    if let Some(duration) = args.duration_seconds {
        command.push_str(&format!(" {duration}"));
        parameters.insert("durationSeconds".to_string(), json!(duration));
    }
    execute(session, "set_weather", command, Value::Object(parameters)).await
}

async fn set_gamerule(session: &MinecraftSession, args: SetGameruleArgs) -> ToolOutcome {
    let command = format!("/gamerule {} {}", args.rule, args.value);
    let parameters = json!({"rule": args.rule, "value": args.value});
    execute(session, "set_gamerule", command, parameters).await
}

async fn summon_entity(session: &MinecraftSession, args: SummonArgs) -> ToolOutcome {
    let mut command = format!("/summon {} {} {} {}", args.entity, args.x, args.y, args.z);
    let mut parameters = Map::new();
    parameters.insert("entity".to_string(), json!(args.entity));
    parameters.insert("x".to_string(), json!(args.x));
    parameters.insert("y".to_string(), json!(args.y));
    parameters.insert("z".to_string(), json!(args.z));
    if let Some(nbt) = args.nbt.filter(|nbt| !nbt.is_empty()) {
        command.push_str(&format!(" {nbt}"));
        parameters.insert("nbt".to_string(), json!(nbt));
    }
    execute(session, "summon_entity", command, Value::Object(parameters)).await
}

async fn fly_to(session: &MinecraftSession, args: FlyToArgs) -> ToolOutcome {
    let client = session.ready_client().await?;
    let creative = client
        .creative()
        .ok_or(SessionError::CapabilityUnavailable("Creative flight"))?;
    creative
        .fly_to(Vec3::new(args.x, args.y, args.z))
        .await
        .map_err(SessionError::Protocol)?;

    let position = session.position().await?;
    Ok(ToolResponse::text(format!(
        "Flew to ({}, {}, {}). Current position: ({}, {}, {}).",
        args.x, args.y, args.z, position.x, position.y, position.z
    ))
    .with_structured(json!({
        "tool": "fly_to",
        "parameters": {"x": args.x, "y": args.y, "z": args.z},
        "arrivedAt": {"x": position.x, "y": position.y, "z": position.z},
    })))
}
