//! Survival-mode tools backed by the client's automation capability.
//! Automation failures are reported as error results that keep the
//! parameters and the failure message in the structured payload.

use super::{
    integer, number, object_schema, one_of, optional_whole_number, parse_args, text,
    whole_number, ToolDefinition, ToolOutcome,
};
use crate::core::error::SessionError;
use crate::core::session::MinecraftSession;
use crate::game::{BlockPos, EquipDestination, GameClient, SurvivalCapability, Vec3};
use crate::mcp::response::ToolResponse;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_RANGE: f64 = 1.0;
const DEFAULT_MAX_DISTANCE: f64 = 64.0;

#[derive(Debug, Deserialize)]
struct GoToArgs {
    x: f64,
    y: f64,
    z: f64,
    range: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DigBlockArgs {
    #[serde(deserialize_with = "whole_number")]
    x: i64,
    #[serde(deserialize_with = "whole_number")]
    y: i64,
    #[serde(deserialize_with = "whole_number")]
    z: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceBlockArgs {
    #[serde(deserialize_with = "whole_number")]
    x: i64,
    #[serde(deserialize_with = "whole_number")]
    y: i64,
    #[serde(deserialize_with = "whole_number")]
    z: i64,
    item_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectBlockArgs {
    block_name: String,
    #[serde(deserialize_with = "whole_number")]
    count: u32,
    max_distance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CraftItemArgs {
    item_name: String,
    #[serde(default, deserialize_with = "optional_whole_number")]
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EquipItemArgs {
    item_name: String,
    #[serde(default)]
    destination: EquipDestination,
}

pub(super) fn definitions() -> Vec<ToolDefinition> {
    let destinations = [
        EquipDestination::Hand,
        EquipDestination::Head,
        EquipDestination::Torso,
        EquipDestination::Legs,
        EquipDestination::Feet,
        EquipDestination::OffHand,
    ]
    .map(EquipDestination::as_str);

    vec![
        ToolDefinition {
            name: "go_to",
            description: "Navigate to a specific coordinate using pathfinding. Automatically handles obstacles and terrain.",
            input_schema: object_schema(
                json!({
                    "x": number("Target X coordinate"),
                    "y": number("Target Y coordinate"),
                    "z": number("Target Z coordinate"),
                    "range": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": 32,
                        "description": "How close to get to target (default: 1)"
                    }
                }),
                &["x", "y", "z"],
            ),
        },
        ToolDefinition {
            name: "dig_block",
            description: "Dig/mine a block at specific coordinates. Automatically equips the best tool.",
            input_schema: object_schema(
                json!({
                    "x": integer("Block X coordinate"),
                    "y": integer("Block Y coordinate"),
                    "z": integer("Block Z coordinate"),
                }),
                &["x", "y", "z"],
            ),
        },
        ToolDefinition {
            name: "place_block",
            description: "Place a block at specific coordinates. Item must be in inventory.",
            input_schema: object_schema(
                json!({
                    "x": integer("Target X coordinate for new block"),
                    "y": integer("Target Y coordinate for new block"),
                    "z": integer("Target Z coordinate for new block"),
                    "itemName": text("Item name to place (e.g. 'cobblestone', 'dirt')"),
                }),
                &["x", "y", "z", "itemName"],
            ),
        },
        ToolDefinition {
            name: "collect_block",
            description: "Find, navigate to, mine, and collect blocks of a specific type. Handles everything automatically.",
            input_schema: object_schema(
                json!({
                    "blockName": text("Block type to collect (e.g. 'oak_log', 'stone')"),
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 64,
                        "description": "Number of blocks to collect"
                    },
                    "maxDistance": {
                        "type": "number",
                        "minimum": 1,
                        "maximum": 256,
                        "description": "Maximum search distance (default: 64)"
                    }
                }),
                &["blockName", "count"],
            ),
        },
        ToolDefinition {
            name: "craft_item",
            description: "Craft an item using available materials. Uses a nearby crafting table when the recipe needs one.",
            input_schema: object_schema(
                json!({
                    "itemName": text("Item name to craft (e.g. 'stick', 'crafting_table')"),
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 64,
                        "description": "Number to craft (default: 1)"
                    }
                }),
                &["itemName"],
            ),
        },
        ToolDefinition {
            name: "equip_item",
            description: "Equip an item from inventory to a specific slot (hand, head, torso, legs, feet, off-hand).",
            input_schema: object_schema(
                json!({
                    "itemName": text("Item name to equip from inventory"),
                    "destination": one_of(&destinations, "Equipment slot (default: 'hand')"),
                }),
                &["itemName"],
            ),
        },
    ]
}

pub(super) async fn dispatch(
    session: &MinecraftSession,
    name: &str,
    arguments: Value,
) -> Option<ToolOutcome> {
    if !matches!(
        name,
        "go_to" | "dig_block" | "place_block" | "collect_block" | "craft_item" | "equip_item"
    ) {
        return None;
    }
    Some(run(session, name, arguments).await)
}

async fn run(session: &MinecraftSession, name: &str, arguments: Value) -> ToolOutcome {
    let client = session.ready_client().await?;
    let automation = client
        .survival()
        .ok_or(SessionError::CapabilityUnavailable("Survival automation"))?;

    match name {
        "go_to" => go_to(session, automation, parse_args(arguments)?).await,
        "dig_block" => dig_block(automation, parse_args(arguments)?).await,
        "place_block" => place_block(&client, automation, parse_args(arguments)?).await,
        "collect_block" => collect_block(automation, parse_args(arguments)?).await,
        "craft_item" => craft_item(automation, parse_args(arguments)?).await,
        _ => equip_item(&client, automation, parse_args(arguments)?).await,
    }
}

/// Error result carrying the tool name, its parameters and the failure.
fn automation_failure(tool: &str, text: String, parameters: Value, error: &str) -> ToolResponse {
    ToolResponse::error(text).with_structured(json!({
        "tool": tool,
        "parameters": parameters,
        "error": error,
    }))
}

fn holds_item(client: &Arc<dyn GameClient>, item_name: &str) -> bool {
    let namespaced = format!("minecraft:{item_name}");
    client
        .inventory()
        .iter()
        .any(|item| item.name == item_name || item.name == namespaced)
}

async fn go_to(
    session: &MinecraftSession,
    automation: &dyn SurvivalCapability,
    args: GoToArgs,
) -> ToolOutcome {
    let range = args.range.unwrap_or(DEFAULT_RANGE);
    let parameters = json!({"x": args.x, "y": args.y, "z": args.z, "range": range});
    let target = Vec3::new(args.x, args.y, args.z);

    if let Err(message) = automation.go_to(target, range).await {
        return Ok(automation_failure(
            "go_to",
            format!("Failed to navigate: {message}"),
            parameters,
            &message,
        ));
    }

    let position = session.position().await?;
    let distance = Vec3::new(position.x, position.y, position.z).distance_to(&target);
    Ok(ToolResponse::text(format!(
        "Navigated to ({}, {}, {}). Current position: ({}, {}, {}), distance: {distance:.2} blocks.",
        args.x, args.y, args.z, position.x, position.y, position.z
    ))
    .with_structured(json!({
        "tool": "go_to",
        "parameters": parameters,
        "finalPosition": {"x": position.x, "y": position.y, "z": position.z},
        "distanceToGoal": distance,
    })))
}

async fn dig_block(automation: &dyn SurvivalCapability, args: DigBlockArgs) -> ToolOutcome {
    let position = BlockPos {
        x: args.x,
        y: args.y,
        z: args.z,
    };
    let parameters = json!({"x": args.x, "y": args.y, "z": args.z});

    match automation.dig_block(position).await {
        Ok(outcome) => Ok(ToolResponse::text(format!(
            "Successfully dug {} at {position}. Dig time: {}ms.",
            outcome.block_type, outcome.dig_time_ms
        ))
        .with_structured(json!({
            "tool": "dig_block",
            "parameters": parameters,
            "blockType": outcome.block_type,
            "digTimeMs": outcome.dig_time_ms,
        }))),
        Err(message) => Ok(automation_failure(
            "dig_block",
            format!("Failed to dig block at {position}: {message}"),
            parameters,
            &message,
        )),
    }
}

async fn place_block(
    client: &Arc<dyn GameClient>,
    automation: &dyn SurvivalCapability,
    args: PlaceBlockArgs,
) -> ToolOutcome {
    if !holds_item(client, &args.item_name) {
        return Ok(ToolResponse::error(format!(
            "Error: Item '{}' not found in inventory.",
            args.item_name
        )));
    }

    let position = BlockPos {
        x: args.x,
        y: args.y,
        z: args.z,
    };
    let parameters = json!({
        "x": args.x, "y": args.y, "z": args.z,
        "itemName": args.item_name,
    });

    match automation.place_block(position, &args.item_name).await {
        Ok(()) => Ok(ToolResponse::text(format!(
            "Successfully placed {} at {position}.",
            args.item_name
        ))
        .with_structured(json!({
            "tool": "place_block",
            "parameters": parameters,
            "placedBlock": args.item_name,
        }))),
        Err(message) => Ok(automation_failure(
            "place_block",
            format!("Failed to place {}: {message}", args.item_name),
            parameters,
            &message,
        )),
    }
}

async fn collect_block(automation: &dyn SurvivalCapability, args: CollectBlockArgs) -> ToolOutcome {
    let max_distance = args.max_distance.unwrap_or(DEFAULT_MAX_DISTANCE);
    let parameters = json!({
        "blockName": args.block_name,
        "count": args.count,
        "maxDistance": max_distance,
    });

    let outcome = match automation
        .collect_block(&args.block_name, args.count, max_distance)
        .await
    {
        Ok(outcome) => outcome,
        Err(message) => {
            return Ok(automation_failure(
                "collect_block",
                format!("Failed to collect {}: {message}", args.block_name),
                parameters,
                &message,
            ))
        }
    };

    let text = if outcome.blocks_found == 0 {
        format!(
            "No {} blocks found within {max_distance} blocks.",
            args.block_name
        )
    } else {
        format!(
            "Successfully collected {} {} block(s).",
            outcome.collected, args.block_name
        )
    };
    Ok(ToolResponse::text(text).with_structured(json!({
        "tool": "collect_block",
        "parameters": parameters,
        "blocksFound": outcome.blocks_found,
        "collected": outcome.collected,
    })))
}

async fn craft_item(automation: &dyn SurvivalCapability, args: CraftItemArgs) -> ToolOutcome {
    let count = args.count.unwrap_or(1);
    let parameters = json!({"itemName": args.item_name, "count": count});

    match automation.craft_item(&args.item_name, count).await {
        Ok(outcome) => Ok(ToolResponse::text(format!(
            "Successfully crafted {count}x {}.",
            args.item_name
        ))
        .with_structured(json!({
            "tool": "craft_item",
            "parameters": parameters,
            "craftedItem": args.item_name,
            "craftedCount": outcome.crafted_count,
            "usedCraftingTable": outcome.used_crafting_table,
        }))),
        Err(message) => Ok(automation_failure(
            "craft_item",
            format!("Failed to craft {}: {message}", args.item_name),
            parameters,
            &message,
        )),
    }
}

async fn equip_item(
    client: &Arc<dyn GameClient>,
    automation: &dyn SurvivalCapability,
    args: EquipItemArgs,
) -> ToolOutcome {
    let destination = args.destination.as_str();
    let parameters = json!({"itemName": args.item_name, "destination": destination});

    if !holds_item(client, &args.item_name) {
        return Ok(automation_failure(
            "equip_item",
            format!("Error: Item '{}' not found in inventory.", args.item_name),
            parameters,
            "Item not in inventory",
        ));
    }

    match automation
        .equip_item(&args.item_name, args.destination)
        .await
    {
        Ok(()) => Ok(ToolResponse::text(format!(
            "Successfully equipped {} to {destination}.",
            args.item_name
        ))
        .with_structured(json!({
            "tool": "equip_item",
            "parameters": parameters,
            "equippedItem": args.item_name,
            "slot": destination,
        }))),
        Err(message) => Ok(automation_failure(
            "equip_item",
            format!("Failed to equip {}: {message}", args.item_name),
            parameters,
            &message,
        )),
    }
}
