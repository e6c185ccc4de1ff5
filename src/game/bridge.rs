//! JSON-lines TCP bridge to an external game-protocol sidecar.
//!
//! Each connection attempt opens its own socket. Outbound messages are tagged
//! by `op`, inbound ones by `event`; automation calls are `request`s whose
//! `reply` is matched back by id.

use super::{
    BlockPos, ChannelMarker, CollectOutcome, ControlDirection, CraftOutcome, CreativeCapability,
    DigOutcome, EntityPose, EquipDestination, GameClient, GameConnector, GameEvent,
    GameEventStream, InventoryItem, OpenOptions, SurvivalCapability, Vec3, Vitals,
};
use crate::core::config::Mode;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const BRIDGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Outbound {
    Open {
        host: String,
        port: u16,
        username: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
        mode: Mode,
    },
    Chat {
        text: String,
    },
    Quit,
    SetControl {
        control: ControlDirection,
        state: bool,
    },
    ClearControls,
    Request {
        id: u64,
        action: BridgeAction,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
enum BridgeAction {
    LookAt {
        x: f64,
        y: f64,
        z: f64,
    },
    FlyTo {
        x: f64,
        y: f64,
        z: f64,
    },
    GoTo {
        x: f64,
        y: f64,
        z: f64,
        range: f64,
    },
    DigBlock {
        x: i64,
        y: i64,
        z: i64,
    },
    PlaceBlock {
        x: i64,
        y: i64,
        z: i64,
        item_name: String,
    },
    CollectBlock {
        block_name: String,
        count: u32,
        max_distance: f64,
    },
    CraftItem {
        item_name: String,
        count: u32,
    },
    EquipItem {
        item_name: String,
        destination: EquipDestination,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Inbound {
    Spawn,
    Error {
        #[serde(default)]
        reason: String,
    },
    Kicked {
        #[serde(default)]
        reason: String,
    },
    End {
        #[serde(default)]
        reason: String,
    },
    Chat {
        sender: String,
        text: String,
    },
    Message {
        text: String,
        #[serde(default)]
        position: Option<ChannelMarker>,
        #[serde(default)]
        sender: Option<String>,
    },
    State(TelemetryUpdate),
    Inventory {
        #[serde(default)]
        items: Vec<InventoryItem>,
    },
    Reply {
        id: u64,
        ok: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Partial telemetry snapshot; absent fields keep their cached value.
#[derive(Debug, Default, Deserialize)]
struct TelemetryUpdate {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    health: Option<f64>,
    #[serde(default)]
    food: Option<f64>,
    #[serde(default)]
    position: Option<Vec3>,
    #[serde(default)]
    yaw: Option<f64>,
    #[serde(default)]
    pitch: Option<f64>,
}

#[derive(Debug, Default)]
struct Telemetry {
    username: Option<String>,
    health: Option<f64>,
    food: Option<f64>,
    position: Option<Vec3>,
    yaw: f64,
    pitch: f64,
    inventory: Vec<InventoryItem>,
}

impl Telemetry {
    fn merge(&mut self, update: TelemetryUpdate) {
        if update.username.is_some() {
            self.username = update.username;
        }
        if update.health.is_some() {
            self.health = update.health;
        }
        if update.food.is_some() {
            self.food = update.food;
        }
        if update.position.is_some() {
            self.position = update.position;
        }
        if let Some(yaw) = update.yaw {
            self.yaw = yaw;
        }
        if let Some(pitch) = update.pitch {
            self.pitch = pitch;
        }
    }
}

type SharedTelemetry = Arc<std::sync::Mutex<Telemetry>>;

fn read_telemetry<T>(telemetry: &SharedTelemetry, read: impl FnOnce(&Telemetry) -> T) -> T {
    let guard = telemetry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    read(&guard)
}

/// Opens bridge connections to a fixed sidecar address.
pub struct BridgeConnector {
    address: String,
    request_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            request_timeout: BRIDGE_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl GameConnector for BridgeConnector {
    async fn open(
        &self,
        options: &OpenOptions,
    ) -> Result<(Arc<dyn GameClient>, GameEventStream), String> {
        debug!(bridge = %self.address, "Opening game bridge connection");
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address))
            .await
            .map_err(|_| format!("Timed out reaching game bridge at {}.", self.address))?
            .map_err(|err| format!("Unable to reach game bridge at {}: {err}", self.address))?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, "Unable to disable Nagle on bridge socket");
        }
        let (read_half, write_half) = stream.into_split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        spawn_writer(write_half, outbound_rx);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let client = Arc::new(BridgeClient {
            mode: options.mode,
            outbound: outbound_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_request_id: AtomicU64::new(0),
            telemetry: Arc::new(std::sync::Mutex::new(Telemetry::default())),
            request_timeout: self.request_timeout,
        });
        spawn_reader(
            read_half,
            client.pending.clone(),
            client.telemetry.clone(),
            event_tx,
        );

        client.send(Outbound::Open {
            host: options.host.clone(),
            port: options.port,
            username: options.username.clone(),
            version: options.version.clone(),
            mode: options.mode,
        })?;
        Ok((client, event_rx))
    }
}

pub struct BridgeClient {
    mode: Mode,
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingReplies,
    next_request_id: AtomicU64,
    telemetry: SharedTelemetry,
    request_timeout: Duration,
}

impl BridgeClient {
    fn send(&self, message: Outbound) -> Result<(), String> {
        let mut line = serde_json::to_string(&message).map_err(|err| err.to_string())?;
        line.push('\n');
        self.outbound
            .send(line)
            .map_err(|_| "Bridge connection is closed.".to_string())
    }

    async fn request(&self, action: BridgeAction) -> Result<Value, String> {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        debug!(request_id = id, action = ?action, "Sending bridge request");
        if let Err(err) = self.send(Outbound::Request { id, action }) {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err("Bridge connection closed before the request completed.".to_string()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                debug!(request_id = id, "Bridge request timed out");
                Err(format!(
                    "Bridge request timed out after {}s.",
                    self.request_timeout.as_secs()
                ))
            }
        }
    }

    async fn request_typed<T: DeserializeOwned>(&self, action: BridgeAction) -> Result<T, String> {
        let value = self.request(action).await?;
        serde_json::from_value(value).map_err(|err| format!("Malformed bridge reply: {err}"))
    }
}

#[async_trait]
impl GameClient for BridgeClient {
    fn username(&self) -> Option<String> {
        read_telemetry(&self.telemetry, |telemetry| telemetry.username.clone())
    }

    fn chat(&self, text: &str) -> Result<(), String> {
        self.send(Outbound::Chat {
            text: text.to_string(),
        })
    }

    fn quit(&self) {
        if self.send(Outbound::Quit).is_err() {
            debug!("Bridge already closed when quitting");
        }
    }

    fn set_control_state(&self, control: ControlDirection, active: bool) -> Result<(), String> {
        self.send(Outbound::SetControl {
            control,
            state: active,
        })
    }

    fn clear_control_states(&self) -> Result<(), String> {
        self.send(Outbound::ClearControls)
    }

    fn pose(&self) -> Option<EntityPose> {
        read_telemetry(&self.telemetry, |telemetry| {
            telemetry.position.map(|position| EntityPose {
                position,
                yaw: telemetry.yaw,
                pitch: telemetry.pitch,
            })
        })
    }

    fn vitals(&self) -> Option<Vitals> {
        read_telemetry(&self.telemetry, |telemetry| {
            match (telemetry.health, telemetry.food) {
                (Some(health), Some(food)) => Some(Vitals { health, food }),
                _ => None,
            }
        })
    }

    fn inventory(&self) -> Vec<InventoryItem> {
        read_telemetry(&self.telemetry, |telemetry| telemetry.inventory.clone())
    }

    async fn look_at(&self, target: Vec3) -> Result<(), String> {
        self.request(BridgeAction::LookAt {
            x: target.x,
            y: target.y,
            z: target.z,
        })
        .await
        .map(|_| ())
    }

    fn creative(&self) -> Option<&dyn CreativeCapability> {
        match self.mode {
            Mode::Creative => Some(self),
            Mode::Survival => None,
        }
    }

    fn survival(&self) -> Option<&dyn SurvivalCapability> {
        match self.mode {
            Mode::Survival => Some(self),
            Mode::Creative => None,
        }
    }
}

#[async_trait]
impl CreativeCapability for BridgeClient {
    async fn fly_to(&self, destination: Vec3) -> Result<(), String> {
        self.request(BridgeAction::FlyTo {
            x: destination.x,
            y: destination.y,
            z: destination.z,
        })
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl SurvivalCapability for BridgeClient {
    async fn go_to(&self, target: Vec3, range: f64) -> Result<(), String> {
        self.request(BridgeAction::GoTo {
            x: target.x,
            y: target.y,
            z: target.z,
            range,
        })
        .await
        .map(|_| ())
    }

    async fn dig_block(&self, position: BlockPos) -> Result<DigOutcome, String> {
        self.request_typed(BridgeAction::DigBlock {
            x: position.x,
            y: position.y,
            z: position.z,
        })
        .await
    }

    async fn place_block(&self, position: BlockPos, item_name: &str) -> Result<(), String> {
        self.request(BridgeAction::PlaceBlock {
            x: position.x,
            y: position.y,
            z: position.z,
            item_name: item_name.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn collect_block(
        &self,
        block_name: &str,
        count: u32,
        max_distance: f64,
    ) -> Result<CollectOutcome, String> {
        self.request_typed(BridgeAction::CollectBlock {
            block_name: block_name.to_string(),
            count,
            max_distance,
        })
        .await
    }

    async fn craft_item(&self, item_name: &str, count: u32) -> Result<CraftOutcome, String> {
        self.request_typed(BridgeAction::CraftItem {
            item_name: item_name.to_string(),
            count,
        })
        .await
    }

    async fn equip_item(
        &self,
        item_name: &str,
        destination: EquipDestination,
    ) -> Result<(), String> {
        self.request(BridgeAction::EquipItem {
            item_name: item_name.to_string(),
            destination,
        })
        .await
        .map(|_| ())
    }
}

fn spawn_writer(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<String>) {
    tokio::spawn(async move {
        while let Some(line) = outbound.recv().await {
            if let Err(err) = writer.write_all(line.as_bytes()).await {
                warn!(error = %err, "Failed writing to game bridge");
                break;
            }
            if let Err(err) = writer.flush().await {
                warn!(error = %err, "Failed flushing game bridge");
                break;
            }
        }
        let _ = writer.shutdown().await;
    });
}

fn spawn_reader(
    reader: OwnedReadHalf,
    pending: PendingReplies,
    telemetry: SharedTelemetry,
    events: mpsc::UnboundedSender<GameEvent>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut ended = false;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "Game bridge read failed");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Inbound>(trimmed) {
                Ok(message) => {
                    ended |= dispatch_inbound(message, &pending, &telemetry, &events).await;
                }
                Err(err) => warn!(error = %err, "Ignoring malformed bridge line"),
            }
        }

        pending.lock().await.clear();
        if !ended {
            let _ = events.send(GameEvent::End("bridge connection closed".to_string()));
        }
        debug!("Game bridge reader stopped");
    });
}

/// Routes one inbound message. Returns `true` once the connection has ended.
async fn dispatch_inbound(
    message: Inbound,
    pending: &PendingReplies,
    telemetry: &SharedTelemetry,
    events: &mpsc::UnboundedSender<GameEvent>,
) -> bool {
    let event = match message {
        Inbound::Spawn => GameEvent::Spawn,
        Inbound::Error { reason } => GameEvent::Error(reason),
        Inbound::Kicked { reason } => GameEvent::Kicked(reason),
        Inbound::End { reason } => {
            let _ = events.send(GameEvent::End(reason));
            return true;
        }
        Inbound::Chat { sender, text } => GameEvent::Chat { sender, text },
        Inbound::Message {
            text,
            position,
            sender,
        } => GameEvent::Message {
            text,
            marker: position,
            sender,
        },
        Inbound::State(update) => {
            telemetry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .merge(update);
            return false;
        }
        Inbound::Inventory { items } => {
            telemetry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .inventory = items;
            return false;
        }
        Inbound::Reply {
            id,
            ok,
            result,
            error,
        } => {
            debug!(request_id = id, ok, "Received bridge reply");
            if let Some(tx) = pending.lock().await.remove(&id) {
                let reply = if ok {
                    Ok(result.unwrap_or(Value::Null))
                } else {
                    Err(error.unwrap_or_else(|| "request failed".to_string()))
                };
                let _ = tx.send(reply);
            }
            return false;
        }
    };
    let _ = events.send(event);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::Lines;
    use tokio::net::TcpListener;

    fn options(mode: Mode) -> OpenOptions {
        OpenOptions {
            host: "mc.test".to_string(),
            port: 25565,
            username: "mcp-bot".to_string(),
            version: None,
            mode,
        }
    }

    async fn next_json(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Value {
        let line = lines.next_line().await.unwrap().expect("line from client");
        serde_json::from_str(&line).unwrap()
    }

    async fn write_json(writer: &mut OwnedWriteHalf, value: Value) {
        let mut line = value.to_string();
        line.push('\n');
        writer.write_all(line.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn open_streams_events_and_answers_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            let open = next_json(&mut lines).await;
            assert_eq!(open["op"], "open");
            assert_eq!(open["username"], "mcp-bot");
            assert_eq!(open["mode"], "survival");
            assert!(open.get("version").is_none());

            write_json(
                &mut write,
                json!({"event": "state", "username": "Bot_1", "health": 19.5, "food": 20.0,
                       "position": {"x": 1.0, "y": 64.0, "z": -2.5}, "yaw": 0.5}),
            )
            .await;
            write_json(
                &mut write,
                json!({"event": "inventory", "items": [{"slot": 36, "name": "stone", "count": 12}]}),
            )
            .await;
            write_json(&mut write, json!({"event": "spawn"})).await;
            write_json(
                &mut write,
                json!({"event": "message", "text": "Saved the game", "position": 1}),
            )
            .await;

            let chat = next_json(&mut lines).await;
            assert_eq!(chat, json!({"op": "chat", "text": "/save-all"}));

            let request = next_json(&mut lines).await;
            assert_eq!(request["op"], "request");
            assert_eq!(request["action"]["name"], "dig_block");
            assert_eq!(request["action"]["x"], 3);
            write_json(
                &mut write,
                json!({"event": "reply", "id": request["id"], "ok": true,
                       "result": {"blockType": "stone", "digTimeMs": 750}}),
            )
            .await;

            let request = next_json(&mut lines).await;
            assert_eq!(request["action"]["name"], "craft_item");
            write_json(
                &mut write,
                json!({"event": "reply", "id": request["id"], "ok": false,
                       "error": "No recipe for stick"}),
            )
            .await;

            let quit = next_json(&mut lines).await;
            assert_eq!(quit["op"], "quit");
        });

        let connector = BridgeConnector::new(address);
        let (client, mut events) = connector.open(&options(Mode::Survival)).await.unwrap();

        assert_eq!(events.recv().await, Some(GameEvent::Spawn));
        assert_eq!(
            events.recv().await,
            Some(GameEvent::Message {
                text: "Saved the game".to_string(),
                marker: Some(ChannelMarker::Legacy(1)),
                sender: None,
            })
        );
        assert_eq!(client.username().as_deref(), Some("Bot_1"));
        assert_eq!(
            client.vitals(),
            Some(Vitals {
                health: 19.5,
                food: 20.0
            })
        );
        let pose = client.pose().unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 64.0, -2.5));
        assert_eq!(pose.yaw, 0.5);
        assert_eq!(pose.pitch, 0.0);
        assert_eq!(client.inventory()[0].label(), "stone");

        assert!(client.creative().is_none());
        let survival = client.survival().expect("survival capability");

        client.chat("/save-all").unwrap();
        let dug = survival
            .dig_block(BlockPos { x: 3, y: 63, z: -2 })
            .await
            .unwrap();
        assert_eq!(dug.block_type, "stone");
        assert_eq!(dug.dig_time_ms, 750);

        let err = survival.craft_item("stick", 4).await.unwrap_err();
        assert_eq!(err, "No recipe for stick");

        client.quit();
        server.await.unwrap();
        assert!(matches!(events.recv().await, Some(GameEvent::End(_))));
    }

    #[tokio::test]
    async fn closed_socket_fails_pending_requests_and_ends_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            next_json(&mut lines).await;
            write_json(&mut write, json!({"event": "spawn"})).await;
            let request = next_json(&mut lines).await;
            assert_eq!(request["action"]["name"], "fly_to");
            // drop both halves without replying
        });

        let connector = BridgeConnector::new(address);
        let (client, mut events) = connector.open(&options(Mode::Creative)).await.unwrap();
        assert_eq!(events.recv().await, Some(GameEvent::Spawn));

        let creative = client.creative().expect("creative capability");
        let err = creative
            .fly_to(Vec3::new(0.0, 100.0, 0.0))
            .await
            .unwrap_err();
        assert!(err.contains("closed"), "{err}");
        server.await.unwrap();

        assert_eq!(
            events.recv().await,
            Some(GameEvent::End("bridge connection closed".to_string()))
        );
    }

    #[tokio::test]
    async fn unanswered_request_times_out_and_is_forgotten() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            next_json(&mut lines).await;
            write_json(&mut write, json!({"event": "spawn"})).await;
            let request = next_json(&mut lines).await;
            assert_eq!(request["action"]["name"], "go_to");
            let _ = done_rx.await;
            // a late reply for a forgotten request is ignored
            write_json(
                &mut write,
                json!({"event": "reply", "id": request["id"], "ok": true}),
            )
            .await;
        });

        let connector =
            BridgeConnector::new(address).with_request_timeout(Duration::from_millis(50));
        let (client, mut events) = connector.open(&options(Mode::Survival)).await.unwrap();
        assert_eq!(events.recv().await, Some(GameEvent::Spawn));

        let survival = client.survival().expect("survival capability");
        let err = survival
            .go_to(Vec3::new(5.0, 64.0, 5.0), 1.0)
            .await
            .unwrap_err();
        assert!(err.contains("timed out"), "{err}");

        let _ = done_tx.send(());
        server.await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(GameEvent::End("bridge connection closed".to_string()))
        );
    }

    #[tokio::test]
    async fn unreachable_bridge_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let connector = BridgeConnector::new(address.clone());
        let err = match connector.open(&options(Mode::Creative)).await {
            Ok(_) => panic!("connection should fail"),
            Err(err) => err,
        };
        assert!(err.contains(&address), "{err}");
    }

    #[test]
    fn kicked_and_reply_lines_parse() {
        let kicked: Inbound =
            serde_json::from_str(r#"{"event":"kicked","reason":"Banned"}"#).unwrap();
        assert!(matches!(kicked, Inbound::Kicked { reason } if reason == "Banned"));

        let message: Inbound =
            serde_json::from_str(r#"{"event":"message","text":"hi","position":"chat"}"#).unwrap();
        assert!(matches!(
            message,
            Inbound::Message { position: Some(ChannelMarker::Named(ref name)), .. } if name == "chat"
        ));
    }

    #[test]
    fn outbound_lines_are_op_tagged() {
        let line = serde_json::to_value(Outbound::SetControl {
            control: ControlDirection::Jump,
            state: true,
        })
        .unwrap();
        assert_eq!(line, json!({"op": "set_control", "control": "jump", "state": true}));

        let line = serde_json::to_value(Outbound::Request {
            id: 7,
            action: BridgeAction::EquipItem {
                item_name: "iron_helmet".to_string(),
                destination: EquipDestination::Head,
            },
        })
        .unwrap();
        assert_eq!(
            line,
            json!({"op": "request", "id": 7,
                   "action": {"name": "equip_item", "item_name": "iron_helmet", "destination": "head"}})
        );
    }
}
