//! Session engine for one game connection.
//!
//! [`MinecraftSession`] owns the live client handle, the recent-chat buffer,
//! the active feedback waiters, and the movement-control timers. All of that
//! state sits behind a single async mutex; inbound events, timer expiries and
//! caller operations each take it for one short, non-suspending turn, which
//! keeps event handling serialized in arrival order.

pub mod chat;
pub mod command;
pub(crate) mod controls;
pub mod waiters;

#[cfg(test)]
mod tests;

pub use chat::{is_system_feedback, ChatBuffer, ChatEntry, MAX_CHAT_BUFFER};
pub use command::{
    classify_feedback, feedback_pool, normalize_command, CommandCategory, CommandResult,
    COMMAND_TIMEOUT,
};
pub use waiters::PatternSet;

use crate::core::config::{ConnectionConfig, Mode};
use crate::core::error::SessionError;
use crate::game::{
    ControlDirection, GameClient, GameConnector, GameEvent, GameEventStream, InventoryItem,
    OpenOptions, Vec3,
};
use controls::ControlTimers;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use waiters::{WaiterId, WaiterRegistry};

pub const SPAWN_TIMEOUT: Duration = Duration::from_secs(30);

const DISCONNECTED_BY_REQUEST: &str = "disconnected by request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the session for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub state: SessionState,
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub health: Option<f64>,
    pub food: Option<f64>,
    pub position: Option<Vec3>,
    pub recent_messages: Vec<ChatEntry>,
}

/// Position and orientation rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionReadout {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
}

pub struct MinecraftSession {
    shared: Arc<SessionShared>,
}

struct SessionShared {
    mode: Mode,
    connection: ConnectionConfig,
    connector: Arc<dyn GameConnector>,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: SessionState,
    client: Option<Arc<dyn GameClient>>,
    chat: ChatBuffer,
    waiters: WaiterRegistry,
    controls: ControlTimers,
    /// Bumped per `connect()`; events and timers from older attempts are ignored.
    attempt: u64,
    /// Cancelled on teardown; stops the event pump and any pending login wait.
    lifetime: Option<CancellationToken>,
    username: String,
}

impl SessionInner {
    fn require_ready(&self) -> Result<Arc<dyn GameClient>, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::NotReady(self.state));
        }
        self.client.clone().ok_or(SessionError::NoConnection)
    }

    fn push_chat(&mut self, sender: &str, text: &str, is_system: bool) {
        let entry = ChatEntry::new(sender, text);
        if let Some(waiter) = self.waiters.dispatch(&entry, is_system) {
            debug!(waiter, text = %entry.text, "Resolved feedback waiter");
        }
        self.chat.push(entry);
    }

    /// Cancels timers, releases waiters with `None`, and drops the client.
    /// Returns the client so the caller can quit it outside the lock.
    fn teardown(&mut self) -> Option<Arc<dyn GameClient>> {
        let timers = self.controls.cancel_all();
        let waiters = self.waiters.resolve_all();
        if let Some(lifetime) = self.lifetime.take() {
            lifetime.cancel();
        }
        self.state = SessionState::Disconnected;
        debug!(timers, waiters, "Session torn down");
        self.client.take()
    }
}

impl MinecraftSession {
    pub fn new(mode: Mode, connection: ConnectionConfig, connector: Arc<dyn GameConnector>) -> Self {
        let username = connection.username.clone();
        Self {
            shared: Arc::new(SessionShared {
                mode,
                connection,
                connector,
                inner: Mutex::new(SessionInner {
                    state: SessionState::Disconnected,
                    client: None,
                    chat: ChatBuffer::default(),
                    waiters: WaiterRegistry::default(),
                    controls: ControlTimers::default(),
                    attempt: 0,
                    lifetime: None,
                    username,
                }),
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        self.shared.mode
    }

    pub async fn state(&self) -> SessionState {
        self.shared.inner.lock().await.state
    }

    /// Opens a connection and waits up to [`SPAWN_TIMEOUT`] for spawn.
    ///
    /// Any other terminal outcome tears the attempt down and leaves the
    /// session `disconnected`.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let (attempt, lifetime) = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state != SessionState::Disconnected {
                return Err(SessionError::InvalidState {
                    action: "connect",
                    state: inner.state,
                });
            }
            inner.state = SessionState::Connecting;
            inner.chat.clear();
            inner.attempt += 1;
            let lifetime = CancellationToken::new();
            inner.lifetime = Some(lifetime.clone());
            (inner.attempt, lifetime)
        };

        let options = self.shared.open_options();
        info!(
            endpoint = %self.shared.connection.endpoint(),
            username = %options.username,
            attempt,
            "Connecting"
        );

        let (client, mut events) = match self.shared.connector.open(&options).await {
            Ok(opened) => opened,
            Err(err) => {
                warn!(error = %err, "Connection attempt failed");
                self.shared.teardown_attempt(attempt).await;
                return Err(SessionError::Protocol(err));
            }
        };

        {
            let mut inner = self.shared.inner.lock().await;
            if inner.attempt != attempt || lifetime.is_cancelled() {
                drop(inner);
                client.quit();
                return Err(SessionError::ConnectionEndedDuringLogin(
                    DISCONNECTED_BY_REQUEST.to_string(),
                ));
            }
            inner.client = Some(client.clone());
        }

        let login = tokio::select! {
            _ = lifetime.cancelled() => Err(SessionError::ConnectionEndedDuringLogin(
                DISCONNECTED_BY_REQUEST.to_string(),
            )),
            outcome = tokio::time::timeout(SPAWN_TIMEOUT, await_spawn(&mut events)) => {
                outcome.unwrap_or(Err(SessionError::SpawnTimeout(SPAWN_TIMEOUT)))
            }
        };

        if let Err(err) = login {
            warn!(error = %err, attempt, "Login aborted");
            client.quit();
            self.shared.teardown_attempt(attempt).await;
            return Err(err);
        }

        let username = {
            let mut inner = self.shared.inner.lock().await;
            if inner.attempt != attempt || inner.state != SessionState::Connecting {
                drop(inner);
                client.quit();
                return Err(SessionError::ConnectionEndedDuringLogin(
                    DISCONNECTED_BY_REQUEST.to_string(),
                ));
            }
            inner.state = SessionState::Ready;
            if let Some(name) = client.username() {
                inner.username = name;
            }
            inner.username.clone()
        };

        match self.shared.mode {
            Mode::Creative if client.creative().is_none() => {
                warn!("Client exposes no creative capability; fly_to will be unavailable")
            }
            Mode::Survival if client.survival().is_none() => {
                warn!("Client exposes no survival capability; automation tools will be unavailable")
            }
            _ => {}
        }

        info!(username = %username, "Connected and spawned");
        spawn_event_pump(Arc::downgrade(&self.shared), attempt, lifetime, events);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let client = {
            let mut inner = self.shared.inner.lock().await;
            if inner.state == SessionState::Disconnected {
                return Err(SessionError::AlreadyDisconnected);
            }
            inner.teardown()
        };
        if let Some(client) = client {
            client.quit();
        }
        info!("Disconnected by request.");
        Ok(())
    }

    /// Disconnects when needed, then runs a fresh connect cycle.
    pub async fn reconnect(&self) -> Result<(), SessionError> {
        match self.disconnect().await {
            Ok(()) | Err(SessionError::AlreadyDisconnected) => {}
            Err(err) => return Err(err),
        }
        self.connect().await
    }

    /// Graceful-shutdown hook: tears down whatever is live.
    pub async fn shutdown(&self) {
        if self.state().await != SessionState::Disconnected {
            if let Err(err) = self.disconnect().await {
                warn!(error = %err, "Error during shutdown disconnect");
            }
        }
    }

    pub async fn status(&self) -> BotStatus {
        let inner = self.shared.inner.lock().await;
        let client = inner.client.as_ref();
        let vitals = client.and_then(|client| client.vitals());
        BotStatus {
            state: inner.state,
            mode: self.shared.mode,
            host: self.shared.connection.host.clone(),
            port: self.shared.connection.port,
            username: client
                .and_then(|client| client.username())
                .unwrap_or_else(|| inner.username.clone()),
            health: vitals.map(|vitals| vitals.health),
            food: vitals.map(|vitals| vitals.food),
            position: client
                .and_then(|client| client.pose())
                .map(|pose| pose.position.rounded()),
            recent_messages: inner.chat.snapshot(),
        }
    }

    pub async fn send_chat(&self, message: &str) -> Result<(), SessionError> {
        let client = self.shared.inner.lock().await.require_ready()?;
        client.chat(message).map_err(SessionError::Protocol)
    }

    /// Sends a slash command and classifies the first system feedback that
    /// matches any known signature within [`COMMAND_TIMEOUT`].
    pub async fn execute_command(&self, command: &str) -> Result<CommandResult, SessionError> {
        let (client, normalized, waiter, rx) = {
            let mut inner = self.shared.inner.lock().await;
            let client = inner.require_ready()?;
            let normalized = normalize_command(command)?;
            let (waiter, rx) = inner.waiters.register(feedback_pool(), true);
            (client, normalized, waiter, rx)
        };

        debug!(command = %normalized, waiter, "Sending command");
        if let Err(err) = client.chat(&normalized) {
            self.shared.inner.lock().await.waiters.expire(waiter);
            return Err(SessionError::Protocol(err));
        }

        let result = match self.shared.wait_for(waiter, rx, COMMAND_TIMEOUT).await {
            Some(entry) => CommandResult::from_feedback(normalized, entry.text),
            None => CommandResult::timed_out(normalized),
        };
        info!(
            command = %result.command,
            category = %result.category,
            "Command finished"
        );
        Ok(result)
    }

    /// Waits for the next inbound entry matching `patterns`; `None` on
    /// deadline or teardown.
    pub async fn await_message(
        &self,
        patterns: Arc<PatternSet>,
        timeout: Duration,
        system_only: bool,
    ) -> Option<ChatEntry> {
        let (waiter, rx) = self
            .shared
            .inner
            .lock()
            .await
            .waiters
            .register(patterns, system_only);
        self.shared.wait_for(waiter, rx, timeout).await
    }

    pub async fn position(&self) -> Result<PositionReadout, SessionError> {
        let client = self.shared.inner.lock().await.require_ready()?;
        let pose = client
            .pose()
            .ok_or_else(|| SessionError::Protocol("Position is not available yet.".to_string()))?;
        let position = pose.position.rounded();
        Ok(PositionReadout {
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: crate::game::types::round2(pose.yaw),
            pitch: crate::game::types::round2(pose.pitch),
        })
    }

    pub async fn look_at(&self, target: Vec3) -> Result<(), SessionError> {
        let client = self.shared.inner.lock().await.require_ready()?;
        client.look_at(target).await.map_err(SessionError::Protocol)
    }

    pub async fn inventory(&self) -> Result<Vec<InventoryItem>, SessionError> {
        let client = self.shared.inner.lock().await.require_ready()?;
        Ok(client.inventory())
    }

    /// The live client, for capability-gated operations.
    pub async fn ready_client(&self) -> Result<Arc<dyn GameClient>, SessionError> {
        self.shared.inner.lock().await.require_ready()
    }

    /// Applies a control flag immediately. With `active` and a non-zero
    /// `duration`, the flag is released automatically once it elapses,
    /// unless replaced, stopped, or torn down first.
    pub async fn set_control(
        &self,
        direction: ControlDirection,
        active: bool,
        duration: Option<Duration>,
    ) -> Result<(), SessionError> {
        let mut inner = self.shared.inner.lock().await;
        let client = inner.require_ready()?;

        inner.controls.cancel(direction);
        client
            .set_control_state(direction, active)
            .map_err(SessionError::Protocol)?;

        if let Some(duration) = duration.filter(|duration| active && !duration.is_zero()) {
            let id = inner.controls.next_id();
            let shared = Arc::downgrade(&self.shared);
            let task = tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                if let Some(shared) = shared.upgrade() {
                    shared.release_control(direction, id).await;
                }
            });
            inner.controls.insert(direction, id, task.abort_handle());
            debug!(
                direction = %direction,
                duration_ms = duration.as_millis() as u64,
                "Scheduled control release"
            );
        }
        Ok(())
    }

    pub async fn stop_all_controls(&self) -> Result<(), SessionError> {
        let mut inner = self.shared.inner.lock().await;
        let client = inner.require_ready()?;
        inner.controls.cancel_all();
        client.clear_control_states().map_err(SessionError::Protocol)
    }

    #[cfg(test)]
    pub(crate) async fn pending_waiters(&self) -> usize {
        self.shared.inner.lock().await.waiters.len()
    }

    #[cfg(test)]
    pub(crate) async fn control_pending(&self, direction: ControlDirection) -> bool {
        self.shared.inner.lock().await.controls.is_pending(direction)
    }

    #[cfg(test)]
    pub(crate) async fn pending_controls(&self) -> usize {
        self.shared.inner.lock().await.controls.len()
    }
}

impl SessionShared {
    fn open_options(&self) -> OpenOptions {
        OpenOptions {
            host: self.connection.host.clone(),
            port: self.connection.port,
            username: self.connection.username.clone(),
            version: self.connection.version.clone(),
            mode: self.mode,
        }
    }

    /// Tears down only if `attempt` is still the live one.
    async fn teardown_attempt(&self, attempt: u64) {
        let mut inner = self.inner.lock().await;
        if inner.attempt == attempt && inner.state != SessionState::Disconnected {
            inner.teardown();
        }
    }

    async fn wait_for(
        &self,
        waiter: WaiterId,
        mut rx: oneshot::Receiver<Option<ChatEntry>>,
        timeout: Duration,
    ) -> Option<ChatEntry> {
        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(_)) => None,
            Err(_) => {
                let mut inner = self.inner.lock().await;
                if inner.waiters.expire(waiter) {
                    debug!(waiter, "Feedback waiter timed out");
                    None
                } else {
                    // resolved between the deadline firing and taking the lock
                    rx.try_recv().ok().flatten()
                }
            }
        }
    }

    async fn release_control(&self, direction: ControlDirection, id: u64) {
        let mut inner = self.inner.lock().await;
        if !inner.controls.take_if_current(direction, id) {
            return;
        }
        let Ok(client) = inner.require_ready() else {
            return;
        };
        if let Err(err) = client.set_control_state(direction, false) {
            warn!(direction = %direction, error = %err, "Failed to release control");
        } else {
            debug!(direction = %direction, "Control released by timer");
        }
    }

    async fn handle_event(&self, attempt: u64, event: GameEvent) {
        let mut inner = self.inner.lock().await;
        if inner.attempt != attempt || inner.state != SessionState::Ready {
            trace!(?event, "Ignoring event from a finished connection");
            return;
        }

        match event {
            GameEvent::Chat { sender, text } => inner.push_chat(&sender, &text, false),
            GameEvent::Message {
                text,
                marker,
                sender,
            } => {
                let sender = sender.unwrap_or_default();
                let is_system = is_system_feedback(&sender, marker.as_ref(), &text);
                inner.push_chat(&sender, &text, is_system);
            }
            GameEvent::Kicked(reason) => {
                warn!(reason = %reason, "Kicked");
                inner.push_chat("", &format!("[Kicked] {reason}"), true);
                inner.teardown();
            }
            GameEvent::Error(reason) => {
                warn!(reason = %reason, "Client error");
                inner.push_chat("", &format!("[Error] {reason}"), true);
            }
            GameEvent::End(reason) => {
                info!(reason = %reason, "Connection ended");
                inner.push_chat("", &format!("[Disconnected] {reason}"), true);
                inner.teardown();
            }
            GameEvent::Spawn => debug!("Respawned"),
        }
    }
}

async fn await_spawn(events: &mut GameEventStream) -> Result<(), SessionError> {
    while let Some(event) = events.recv().await {
        match event {
            GameEvent::Spawn => return Ok(()),
            GameEvent::Error(reason) => return Err(SessionError::Protocol(reason)),
            GameEvent::Kicked(reason) => return Err(SessionError::KickedDuringLogin(reason)),
            GameEvent::End(reason) => {
                return Err(SessionError::ConnectionEndedDuringLogin(reason));
            }
            GameEvent::Chat { .. } | GameEvent::Message { .. } => {
                trace!("Dropping message received before spawn");
            }
        }
    }
    Err(SessionError::ConnectionEndedDuringLogin(
        "connection closed".to_string(),
    ))
}

/// Feeds post-spawn events into the session until teardown or connection end.
fn spawn_event_pump(
    shared: Weak<SessionShared>,
    attempt: u64,
    lifetime: CancellationToken,
    mut events: GameEventStream,
) {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = lifetime.cancelled() => break,
                event = events.recv() => {
                    event.unwrap_or_else(|| GameEvent::End("connection closed".to_string()))
                }
            };
            let terminal = matches!(event, GameEvent::Kicked(_) | GameEvent::End(_));
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.handle_event(attempt, event).await;
            if terminal {
                break;
            }
        }
        debug!(attempt, "Event pump stopped");
    });
}
