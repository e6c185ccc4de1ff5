//! Boundary to the game-protocol client.
//!
//! The session never speaks the wire protocol itself. It opens connections
//! through a [`GameConnector`], drives the resulting [`GameClient`], and reads
//! [`GameEvent`]s from the receiver handed back by `open`. Mode-specific
//! automation (creative flight, pathfinding, digging, crafting) is exposed as
//! optional capability traits that callers check for explicitly.

pub mod bridge;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use types::{
    BlockPos, ChannelMarker, CollectOutcome, ControlDirection, CraftOutcome, DigOutcome,
    EntityPose, EquipDestination, GameEvent, InventoryItem, OpenOptions, Vec3, Vitals,
};

/// Inbound events for one connection, in arrival order.
pub type GameEventStream = mpsc::UnboundedReceiver<GameEvent>;

#[async_trait]
pub trait GameConnector: Send + Sync {
    /// Starts a connection attempt. The first terminal event on the returned
    /// stream (`Spawn`, `Error`, `Kicked`, `End`) decides the login outcome.
    async fn open(
        &self,
        options: &OpenOptions,
    ) -> Result<(Arc<dyn GameClient>, GameEventStream), String>;
}

/// A live connection handle. Only the session issues lifecycle calls on it.
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Name the server assigned, once known.
    fn username(&self) -> Option<String>;

    /// Sends a chat line; command text is sent the same way.
    fn chat(&self, text: &str) -> Result<(), String>;

    fn quit(&self);

    fn set_control_state(&self, control: ControlDirection, active: bool) -> Result<(), String>;

    fn clear_control_states(&self) -> Result<(), String>;

    fn pose(&self) -> Option<EntityPose>;

    fn vitals(&self) -> Option<Vitals>;

    fn inventory(&self) -> Vec<InventoryItem>;

    async fn look_at(&self, target: Vec3) -> Result<(), String>;

    fn creative(&self) -> Option<&dyn CreativeCapability> {
        None
    }

    fn survival(&self) -> Option<&dyn SurvivalCapability> {
        None
    }
}

#[async_trait]
pub trait CreativeCapability: Send + Sync {
    async fn fly_to(&self, destination: Vec3) -> Result<(), String>;
}

/// Pathfinding, block interaction, and crafting automation.
#[async_trait]
pub trait SurvivalCapability: Send + Sync {
    async fn go_to(&self, target: Vec3, range: f64) -> Result<(), String>;

    async fn dig_block(&self, position: BlockPos) -> Result<DigOutcome, String>;

    async fn place_block(&self, position: BlockPos, item_name: &str) -> Result<(), String>;

    async fn collect_block(
        &self,
        block_name: &str,
        count: u32,
        max_distance: f64,
    ) -> Result<CollectOutcome, String>;

    async fn craft_item(&self, item_name: &str, count: u32) -> Result<CraftOutcome, String>;

    async fn equip_item(
        &self,
        item_name: &str,
        destination: EquipDestination,
    ) -> Result<(), String>;
}
