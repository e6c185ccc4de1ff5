//! Line-delimited JSON-RPC server exposing the tool registry over stdio.
//!
//! One reader loop parses inbound lines; `tools/call` requests each run on
//! their own task so several commands can be awaiting feedback at once. All
//! responses funnel through a single writer task.

use super::tools::ToolRegistry;
use crate::core::session::MinecraftSession;
use rust_mcp_schema::{
    CallToolRequestParams, Implementation, InitializeResult, ListToolsResult, RequestId,
    RpcError, ServerCapabilities, ServerCapabilitiesTools, LATEST_PROTOCOL_VERSION,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "minecraft-mcp";

const INSTRUCTIONS: &str = "Controls a Minecraft bot. Use get_bot_status to check the \
connection and reconnect_bot if it is not ready. Command tools report the server's feedback \
and its category.";

/// Anything that looks like a JSON-RPC message. Responses sent to us
/// (no `method`) are ignored.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

enum Reply {
    Result(Value),
    Error(RpcError),
}

#[derive(Clone)]
pub struct McpServer {
    session: Arc<MinecraftSession>,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(session: Arc<MinecraftSession>, registry: Arc<ToolRegistry>) -> Self {
        Self { session, registry }
    }

    /// Serves until `reader` reaches EOF or `shutdown` fires. On EOF the
    /// in-flight tool calls are allowed to finish; on shutdown, including one
    /// that arrives while draining, they are aborted.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        writer: W,
        shutdown: CancellationToken,
    ) -> Result<(), String>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Value>();
        let writer_task = tokio::spawn(write_loop(writer, out_rx));
        let mut in_flight = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(in_flight = in_flight.len(), "Shutdown requested; aborting tool calls");
                    in_flight.abort_all();
                    break;
                }
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            debug!(in_flight = in_flight.len(), "Input closed; draining tool calls");
                            drain(&mut in_flight, &shutdown).await;
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "Failed to read MCP input");
                            in_flight.abort_all();
                            break;
                        }
                    };
                    self.handle_line(&line, &out_tx, &mut in_flight).await;
                }
            }
        }

        drop(out_tx);
        writer_task
            .await
            .map_err(|err| format!("MCP writer task failed: {err}"))?
    }

    async fn handle_line(
        &self,
        line: &str,
        out: &mpsc::UnboundedSender<Value>,
        in_flight: &mut JoinSet<()>,
    ) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        let envelope = match serde_json::from_str::<Envelope>(trimmed) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(error = %err, "Unparseable MCP message");
                let _ = out.send(json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": {"code": -32700, "message": "Parse error"},
                }));
                return;
            }
        };

        let Some(method) = envelope.method else {
            return;
        };
        let Some(id) = envelope.id else {
            debug!(method = %method, "Received MCP notification");
            return;
        };
        debug!(method = %method, request_id = ?id, "Received MCP request");

        if method == "tools/call" {
            let server = self.clone();
            let out = out.clone();
            in_flight.spawn(async move {
                let reply = server.call_tool(envelope.params).await;
                let _ = out.send(encode(id, reply));
            });
            return;
        }

        let reply = match method.as_str() {
            "initialize" => self.initialize(envelope.params.as_ref()),
            "ping" => Reply::Result(json!({})),
            "tools/list" => self.list_tools(),
            other => Reply::Error(
                RpcError::method_not_found().with_message(&format!("Method not found: {other}")),
            ),
        };
        let _ = out.send(encode(id, reply));
    }

    fn initialize(&self, params: Option<&Value>) -> Reply {
        let protocol_version = params
            .and_then(|params| params.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(LATEST_PROTOCOL_VERSION)
            .to_string();
        info!(
            protocol_version = %protocol_version,
            mode = %self.registry.mode(),
            "MCP client initialized"
        );

        let result = InitializeResult {
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools::default()),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            meta: None,
            protocol_version,
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                description: None,
                icons: Vec::new(),
                website_url: None,
            },
        };
        to_reply(&result)
    }

    fn list_tools(&self) -> Reply {
        match self.registry.list() {
            Ok(tools) => to_reply(&ListToolsResult {
                meta: None,
                next_cursor: None,
                tools,
            }),
            Err(message) => Reply::Error(RpcError::internal_error().with_message(&message)),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> Reply {
        let params = match params.map(serde_json::from_value::<CallToolRequestParams>) {
            Some(Ok(params)) => params,
            Some(Err(err)) => {
                return Reply::Error(
                    RpcError::invalid_params().with_message(&format!("Invalid tool call: {err}")),
                )
            }
            None => {
                return Reply::Error(
                    RpcError::invalid_params().with_message("Missing tool call parameters"),
                )
            }
        };

        let started = std::time::Instant::now();
        match self
            .registry
            .call(&self.session, &params.name, params.arguments)
            .await
        {
            Some(response) => {
                debug!(
                    tool = %params.name,
                    is_error = response.is_error,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool call finished"
                );
                to_reply(&response.into_call_result())
            }
            None => Reply::Error(
                RpcError::invalid_params().with_message(&format!("Unknown tool: {}", params.name)),
            ),
        }
    }
}

fn to_reply<T: serde::Serialize>(result: &T) -> Reply {
    match serde_json::to_value(result) {
        Ok(value) => Reply::Result(value),
        Err(err) => Reply::Error(RpcError::internal_error().with_message(&err.to_string())),
    }
}

fn encode(id: RequestId, reply: Reply) -> Value {
    match reply {
        Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Reply::Error(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
    }
}

/// Waits for in-flight calls after input closes, unless shutdown cuts it short.
async fn drain(in_flight: &mut JoinSet<()>, shutdown: &CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(in_flight = in_flight.len(), "Shutdown during drain; aborting tool calls");
                in_flight.abort_all();
                return;
            }
            joined = in_flight.join_next() => {
                if joined.is_none() {
                    return;
                }
            }
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> Result<(), String>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut payload = serde_json::to_string(&message).map_err(|err| err.to_string())?;
        payload.push('\n');
        writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|err| format!("Failed to write MCP response: {err}"))?;
        writer
            .flush()
            .await
            .map_err(|err| format!("Failed to flush MCP response: {err}"))?;
    }
    Ok(())
}
