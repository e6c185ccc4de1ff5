use crate::core::config::{ConnectionConfig, Mode};
use crate::core::session::MinecraftSession;
use crate::game::{
    BlockPos, CollectOutcome, ControlDirection, CraftOutcome, CreativeCapability, DigOutcome,
    EntityPose, EquipDestination, GameClient, GameConnector, GameEvent, GameEventStream,
    InventoryItem, OpenOptions, SurvivalCapability, Vec3, Vitals,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Maps an outbound chat line to the events the fake server answers with.
pub type Responder = Arc<dyn Fn(&str) -> Vec<GameEvent> + Send + Sync>;

/// What the next `open()` does before handing the stream back.
#[derive(Debug, Clone)]
pub enum LoginScript {
    Spawn,
    Kick(String),
    End(String),
    Error(String),
    /// Never reports anything; used for spawn-timeout and cancellation tests.
    Silent,
    /// `open()` itself fails.
    Refuse(String),
}

pub fn test_connection() -> ConnectionConfig {
    ConnectionConfig {
        host: "mc.test".to_string(),
        port: 25565,
        username: "mcp-bot".to_string(),
        version: None,
    }
}

pub fn create_test_session(mode: Mode, connector: Arc<ScriptedConnector>) -> MinecraftSession {
    MinecraftSession::new(mode, test_connection(), connector)
}

/// Answers any outbound line equal to `command` with one system message.
pub fn reply_to(command: &'static str, feedback: &'static str) -> Responder {
    Arc::new(move |text: &str| {
        if text == command {
            vec![system_message(feedback)]
        } else {
            Vec::new()
        }
    })
}

pub fn system_message(text: &str) -> GameEvent {
    GameEvent::Message {
        text: text.to_string(),
        marker: Some(crate::game::ChannelMarker::Named("system".to_string())),
        sender: None,
    }
}

pub struct ScriptedConnector {
    script: Mutex<VecDeque<LoginScript>>,
    responder: Mutex<Option<Responder>>,
    opened: Mutex<Vec<Arc<FakeClient>>>,
}

impl ScriptedConnector {
    pub fn new() -> Arc<Self> {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<LoginScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            responder: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn set_responder(&self, responder: Responder) {
        *self.responder.lock().unwrap() = Some(responder);
    }

    pub fn push_script(&self, step: LoginScript) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn last_client(&self) -> Arc<FakeClient> {
        self.opened
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection was opened")
    }
}

#[async_trait]
impl GameConnector for ScriptedConnector {
    async fn open(
        &self,
        options: &OpenOptions,
    ) -> Result<(Arc<dyn GameClient>, GameEventStream), String> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(LoginScript::Spawn);
        if let LoginScript::Refuse(reason) = step {
            return Err(reason);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let client = Arc::new(FakeClient::new(
            options.username.clone(),
            options.mode,
            tx,
            self.responder.lock().unwrap().clone(),
        ));
        match step {
            LoginScript::Spawn => client.emit(GameEvent::Spawn),
            LoginScript::Kick(reason) => client.emit(GameEvent::Kicked(reason)),
            LoginScript::End(reason) => client.emit(GameEvent::End(reason)),
            LoginScript::Error(reason) => client.emit(GameEvent::Error(reason)),
            LoginScript::Silent | LoginScript::Refuse(_) => {}
        }
        self.opened.lock().unwrap().push(client.clone());
        Ok((client, rx))
    }
}

/// In-memory client that records every call the session makes.
pub struct FakeClient {
    username: String,
    mode: Mode,
    events: mpsc::UnboundedSender<GameEvent>,
    responder: Option<Responder>,
    pub sent: Mutex<Vec<String>>,
    pub controls: Mutex<Vec<(ControlDirection, bool)>>,
    pub clear_count: AtomicUsize,
    pub quit_called: AtomicBool,
    pub looked_at: Mutex<Vec<Vec3>>,
    pub pose: Mutex<Option<EntityPose>>,
    pub vitals: Mutex<Option<Vitals>>,
    pub items: Mutex<Vec<InventoryItem>>,
    pub automation: Mutex<Vec<String>>,
    pub fail_automation: Mutex<Option<String>>,
    /// Hides both capability accessors, as a client without automation would.
    pub capabilities_withheld: AtomicBool,
}

impl FakeClient {
    fn new(
        username: String,
        mode: Mode,
        events: mpsc::UnboundedSender<GameEvent>,
        responder: Option<Responder>,
    ) -> Self {
        Self {
            username,
            mode,
            events,
            responder,
            sent: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            clear_count: AtomicUsize::new(0),
            quit_called: AtomicBool::new(false),
            looked_at: Mutex::new(Vec::new()),
            pose: Mutex::new(Some(EntityPose {
                position: Vec3::new(10.456, 64.0, -3.0049),
                yaw: 1.23456,
                pitch: -0.5,
            })),
            vitals: Mutex::new(Some(Vitals {
                health: 20.0,
                food: 18.0,
            })),
            items: Mutex::new(Vec::new()),
            automation: Mutex::new(Vec::new()),
            fail_automation: Mutex::new(None),
            capabilities_withheld: AtomicBool::new(false),
        }
    }

    /// Injects an inbound event as if the server had sent it.
    pub fn emit(&self, event: GameEvent) {
        let _ = self.events.send(event);
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn control_log(&self) -> Vec<(ControlDirection, bool)> {
        self.controls.lock().unwrap().clone()
    }

    pub fn automation_log(&self) -> Vec<String> {
        self.automation.lock().unwrap().clone()
    }

    pub fn was_quit(&self) -> bool {
        self.quit_called.load(Ordering::SeqCst)
    }

    fn record_automation(&self, call: String) -> Result<(), String> {
        self.automation.lock().unwrap().push(call);
        match self.fail_automation.lock().unwrap().clone() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GameClient for FakeClient {
    fn username(&self) -> Option<String> {
        Some(self.username.clone())
    }

    fn chat(&self, text: &str) -> Result<(), String> {
        if self.was_quit() {
            return Err("client has quit".to_string());
        }
        self.sent.lock().unwrap().push(text.to_string());
        if let Some(responder) = &self.responder {
            for event in responder(text) {
                self.emit(event);
            }
        }
        Ok(())
    }

    fn quit(&self) {
        self.quit_called.store(true, Ordering::SeqCst);
    }

    fn set_control_state(&self, control: ControlDirection, active: bool) -> Result<(), String> {
        self.controls.lock().unwrap().push((control, active));
        Ok(())
    }

    fn clear_control_states(&self) -> Result<(), String> {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pose(&self) -> Option<EntityPose> {
        *self.pose.lock().unwrap()
    }

    fn vitals(&self) -> Option<Vitals> {
        *self.vitals.lock().unwrap()
    }

    fn inventory(&self) -> Vec<InventoryItem> {
        self.items.lock().unwrap().clone()
    }

    async fn look_at(&self, target: Vec3) -> Result<(), String> {
        self.looked_at.lock().unwrap().push(target);
        Ok(())
    }

    fn creative(&self) -> Option<&dyn CreativeCapability> {
        if self.capabilities_withheld.load(Ordering::SeqCst) {
            return None;
        }
        match self.mode {
            Mode::Creative => Some(self),
            Mode::Survival => None,
        }
    }

    fn survival(&self) -> Option<&dyn SurvivalCapability> {
        if self.capabilities_withheld.load(Ordering::SeqCst) {
            return None;
        }
        match self.mode {
            Mode::Survival => Some(self),
            Mode::Creative => None,
        }
    }
}

#[async_trait]
impl CreativeCapability for FakeClient {
    async fn fly_to(&self, destination: Vec3) -> Result<(), String> {
        self.record_automation(format!(
            "fly_to {} {} {}",
            destination.x, destination.y, destination.z
        ))
    }
}

#[async_trait]
impl SurvivalCapability for FakeClient {
    async fn go_to(&self, target: Vec3, range: f64) -> Result<(), String> {
        self.record_automation(format!(
            "go_to {} {} {} range {range}",
            target.x, target.y, target.z
        ))
    }

    async fn dig_block(&self, position: BlockPos) -> Result<DigOutcome, String> {
        self.record_automation(format!("dig_block {position}"))?;
        Ok(DigOutcome {
            block_type: "stone".to_string(),
            dig_time_ms: 750,
        })
    }

    async fn place_block(&self, position: BlockPos, item_name: &str) -> Result<(), String> {
        self.record_automation(format!("place_block {item_name} {position}"))
    }

    async fn collect_block(
        &self,
        block_name: &str,
        count: u32,
        max_distance: f64,
    ) -> Result<CollectOutcome, String> {
        self.record_automation(format!("collect_block {block_name} x{count} within {max_distance}"))?;
        Ok(CollectOutcome {
            blocks_found: count,
            collected: count,
        })
    }

    async fn craft_item(&self, item_name: &str, count: u32) -> Result<CraftOutcome, String> {
        self.record_automation(format!("craft_item {item_name} x{count}"))?;
        Ok(CraftOutcome {
            crafted_count: count,
            used_crafting_table: true,
        })
    }

    async fn equip_item(
        &self,
        item_name: &str,
        destination: EquipDestination,
    ) -> Result<(), String> {
        self.record_automation(format!("equip_item {item_name} {}", destination.as_str()))
    }
}
