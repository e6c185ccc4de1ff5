use super::{
    no_arguments, number, object_schema, one_of, optional_whole_number, parse_args,
    ToolDefinition, ToolOutcome,
};
use crate::core::session::{MinecraftSession, SessionState};
use crate::game::{ControlDirection, Vec3};
use crate::mcp::response::ToolResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SendChatArgs {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LookAtArgs {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveControlArgs {
    direction: ControlDirection,
    active: bool,
    #[serde(default, deserialize_with = "optional_whole_number")]
    duration_ms: Option<u64>,
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    let directions: Vec<&str> = ControlDirection::ALL
        .iter()
        .map(|direction| direction.as_str())
        .collect();
    vec![
        ToolDefinition {
            name: "reconnect_bot",
            description: "Reconnect the bot to the configured Minecraft server.",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "get_bot_status",
            description: "Get the current bot status including state, position, health, food, and recent chat messages.",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "send_chat",
            description: "Send a chat message in-game.",
            input_schema: object_schema(
                json!({
                    "message": {
                        "type": "string",
                        "minLength": 1,
                        "maxLength": 256,
                        "description": "Chat message to send (max 256 chars)"
                    }
                }),
                &["message"],
            ),
        },
        ToolDefinition {
            name: "get_position",
            description: "Get the bot's current position and orientation.",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "look_at",
            description: "Make the bot look at specific world coordinates.",
            input_schema: object_schema(
                json!({
                    "x": number("Target X coordinate"),
                    "y": number("Target Y coordinate"),
                    "z": number("Target Z coordinate"),
                }),
                &["x", "y", "z"],
            ),
        },
        ToolDefinition {
            name: "move_control",
            description: "Set a movement control state (forward, back, left, right, jump, sprint, sneak). Optionally auto-deactivate after durationMs.",
            input_schema: object_schema(
                json!({
                    "direction": one_of(&directions, "Movement control to set"),
                    "active": {
                        "type": "boolean",
                        "description": "Whether to activate (true) or deactivate (false) the control"
                    },
                    "durationMs": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 30000,
                        "description": "If provided, automatically deactivate the control after this many milliseconds (max 30 s)"
                    }
                }),
                &["direction", "active"],
            ),
        },
        ToolDefinition {
            name: "stop_all_controls",
            description: "Immediately stop all movement controls (forward, back, left, right, jump, sprint, sneak).",
            input_schema: no_arguments(),
        },
        ToolDefinition {
            name: "get_inventory",
            description: "List all items in the bot's inventory.",
            input_schema: no_arguments(),
        },
    ]
}

pub(super) async fn dispatch(
    session: &MinecraftSession,
    name: &str,
    arguments: Value,
) -> Option<ToolOutcome> {
    let outcome = match name {
        "reconnect_bot" => reconnect_bot(session).await,
        "get_bot_status" => get_bot_status(session).await,
        "send_chat" => match parse_args(arguments) {
            Ok(args) => send_chat(session, args).await,
            Err(failure) => Err(failure),
        },
        "get_position" => get_position(session).await,
        "look_at" => match parse_args(arguments) {
            Ok(args) => look_at(session, args).await,
            Err(failure) => Err(failure),
        },
        "move_control" => match parse_args(arguments) {
            Ok(args) => move_control(session, args).await,
            Err(failure) => Err(failure),
        },
        "stop_all_controls" => stop_all_controls(session).await,
        "get_inventory" => get_inventory(session).await,
        _ => return None,
    };
    Some(outcome)
}

fn describe_position(position: Option<Vec3>) -> String {
    match position {
        Some(position) => format!("({}, {}, {})", position.x, position.y, position.z),
        None => "(unknown)".to_string(),
    }
}

fn describe_number(value: Option<f64>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn reconnect_bot(session: &MinecraftSession) -> ToolOutcome {
    session.reconnect().await?;
    let status = session.status().await;
    Ok(ToolResponse::text(format!(
        "Connected to {}:{} as {}. Position: {}. Health: {}, Food: {}.",
        status.host,
        status.port,
        status.username,
        describe_position(status.position),
        describe_number(status.health),
        describe_number(status.food),
    )))
}

async fn get_bot_status(session: &MinecraftSession) -> ToolOutcome {
    let status = session.status().await;
    let summary = if status.state == SessionState::Ready {
        "Bot is connected and ready."
    } else {
        "Bot is disconnected or connecting. Reconnect may be required."
    };
    let details = serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string());
    Ok(ToolResponse::text(format!("{summary}\n{details}")))
}

async fn send_chat(session: &MinecraftSession, args: SendChatArgs) -> ToolOutcome {
    session.send_chat(&args.message).await?;
    Ok(ToolResponse::text(format!("Chat sent: \"{}\"", args.message)))
}

async fn get_position(session: &MinecraftSession) -> ToolOutcome {
    let position = session.position().await?;
    Ok(ToolResponse::text(format!(
        "Position: ({}, {}, {}), Yaw: {}, Pitch: {}",
        position.x, position.y, position.z, position.yaw, position.pitch
    )))
}

async fn look_at(session: &MinecraftSession, args: LookAtArgs) -> ToolOutcome {
    session.look_at(Vec3::new(args.x, args.y, args.z)).await?;
    let position = session.position().await?;
    Ok(ToolResponse::text(format!(
        "Now looking at ({}, {}, {}). New orientation: yaw {}, pitch {}.",
        args.x, args.y, args.z, position.yaw, position.pitch
    )))
}

async fn move_control(session: &MinecraftSession, args: MoveControlArgs) -> ToolOutcome {
    session
        .set_control(
            args.direction,
            args.active,
            args.duration_ms.map(Duration::from_millis),
        )
        .await?;
    let verb = if args.active {
        "activated"
    } else {
        "deactivated"
    };
    let mut text = format!("Control '{}' {verb}.", args.direction);
    if let (true, Some(duration_ms)) = (args.active, args.duration_ms) {
        text.push_str(&format!(" Will auto-deactivate after {duration_ms}ms."));
    }
    Ok(ToolResponse::text(text))
}

async fn stop_all_controls(session: &MinecraftSession) -> ToolOutcome {
    session.stop_all_controls().await?;
    Ok(ToolResponse::text("All movement controls stopped."))
}

async fn get_inventory(session: &MinecraftSession) -> ToolOutcome {
    let items = session.inventory().await?;
    if items.is_empty() {
        return Ok(ToolResponse::text("Inventory is empty."));
    }
    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            format!(
                "Slot {}: {} ({}) \u{d7}{}",
                item.slot,
                item.label(),
                item.name,
                item.count
            )
        })
        .collect();
    Ok(ToolResponse::text(format!(
        "Inventory ({} items):\n{}",
        items.len(),
        lines.join("\n")
    )))
}
