use crate::core::config::Mode;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// Rounds every component to two decimals for display.
    pub fn rounded(&self) -> Vec3 {
        Vec3::new(round2(self.x), round2(self.y), round2(self.z))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Entity position plus look orientation, in raw (unrounded) units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityPose {
    pub position: Vec3,
    pub yaw: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: f64,
    pub food: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub slot: u32,
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl InventoryItem {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// A single movement control flag on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlDirection {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Sprint,
    Sneak,
}

impl ControlDirection {
    pub const ALL: [ControlDirection; 7] = [
        ControlDirection::Forward,
        ControlDirection::Back,
        ControlDirection::Left,
        ControlDirection::Right,
        ControlDirection::Jump,
        ControlDirection::Sprint,
        ControlDirection::Sneak,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControlDirection::Forward => "forward",
            ControlDirection::Back => "back",
            ControlDirection::Left => "left",
            ControlDirection::Right => "right",
            ControlDirection::Jump => "jump",
            ControlDirection::Sprint => "sprint",
            ControlDirection::Sneak => "sneak",
        }
    }
}

impl fmt::Display for ControlDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EquipDestination {
    #[default]
    #[serde(rename = "hand")]
    Hand,
    #[serde(rename = "head")]
    Head,
    #[serde(rename = "torso")]
    Torso,
    #[serde(rename = "legs")]
    Legs,
    #[serde(rename = "feet")]
    Feet,
    #[serde(rename = "off-hand")]
    OffHand,
}

impl EquipDestination {
    pub fn as_str(self) -> &'static str {
        match self {
            EquipDestination::Hand => "hand",
            EquipDestination::Head => "head",
            EquipDestination::Torso => "torso",
            EquipDestination::Legs => "legs",
            EquipDestination::Feet => "feet",
            EquipDestination::OffHand => "off-hand",
        }
    }
}

/// Display channel metadata that may accompany an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelMarker {
    /// Modern protocol: `"chat"`, `"system"`, `"game_info"`, ...
    Named(String),
    /// Legacy protocol position byte: 0 = chat, 1 = system, 2 = game info.
    Legacy(i64),
}

/// Everything the connection can report to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Spawn,
    Error(String),
    Kicked(String),
    End(String),
    /// Player chat with an attributed sender.
    Chat { sender: String, text: String },
    /// Any rendered message, with optional channel marker and sender.
    Message {
        text: String,
        marker: Option<ChannelMarker>,
        sender: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub version: Option<String>,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigOutcome {
    pub block_type: String,
    pub dig_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutcome {
    pub blocks_found: u32,
    pub collected: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CraftOutcome {
    pub crafted_count: u32,
    pub used_crafting_table: bool,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
