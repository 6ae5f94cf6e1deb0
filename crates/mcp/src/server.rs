//! MCP server implementation.
//!
//! Wraps a `ToolRegistry` and exposes its tools over the MCP protocol.
//! Requests are read on a dedicated task; each `tools/call` runs as its own
//! task so slow queries never block `ping` or other calls. Responses are
//! written in completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, Id as TaskId, JoinSet};

use athena_mcp_tool_runtime::{Tool, ToolContext, ToolRegistry};

use crate::error::McpError;
use crate::transport::{McpTransport, MessageReader, MessageWriter};
use crate::types::*;

/// Lines buffered between the reader task and the dispatch loop.
const INBOX_CAPACITY: usize = 64;

/// What to do with one inbound request.
enum Route {
    /// Answer right away.
    Reply(JsonRpcResponse),
    /// Run a tool in the background.
    Call {
        id: RpcId,
        name: String,
        tool: Arc<dyn Tool>,
        arguments: Value,
    },
}

/// In-flight `tools/call` tasks.
#[derive(Default)]
struct Inflight {
    tasks: JoinSet<JsonRpcResponse>,
    by_task: HashMap<TaskId, (RpcId, String)>,
    by_request: HashMap<RpcId, AbortHandle>,
}

impl Inflight {
    fn spawn(&mut self, id: RpcId, name: String, tool: Arc<dyn Tool>, arguments: Value) {
        let task_name = name.clone();
        let task_id = id.clone();
        let handle = self
            .tasks
            .spawn(async move { call_tool(task_id, &task_name, tool, arguments).await });
        self.by_task.insert(handle.id(), (id.clone(), name));
        self.by_request.insert(id, handle);
    }

    /// Abort a running call. Its response is suppressed.
    fn cancel(&mut self, id: &RpcId) -> bool {
        match self.by_request.get(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Wait for the next call to finish. `None` for cancelled calls.
    async fn next(&mut self) -> Option<Option<JsonRpcResponse>> {
        let joined = self.tasks.join_next_with_id().await?;
        let task = match &joined {
            Ok((task, _)) => *task,
            Err(e) => e.id(),
        };
        let (id, name) = self.by_task.remove(&task)?;
        self.by_request.remove(&id);

        Some(match joined {
            Ok((_, response)) => Some(response),
            Err(e) if e.is_cancelled() => {
                tracing::info!(id = %id, tool = %name, "Tool call cancelled");
                None
            }
            Err(e) => {
                tracing::error!(id = %id, tool = %name, error = %e, "Tool task panicked");
                let err = McpError::ToolAborted(name);
                Some(error_response(id, &err))
            }
        })
    }

    fn contains(&self, id: &RpcId) -> bool {
        self.by_request.contains_key(id)
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// MCP server that bridges a `ToolRegistry` to MCP clients.
pub struct McpServer {
    registry: ToolRegistry,
    server_name: String,
    server_version: String,
    initialized: bool,
}

impl McpServer {
    /// Create a new MCP server wrapping the given tool registry.
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            server_name: "athena-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: false,
        }
    }

    /// Set the version reported by `initialize`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    /// Run the server until the client closes its side and every
    /// in-flight tool call has answered.
    pub async fn run<T: McpTransport>(&mut self, transport: T) -> Result<(), McpError> {
        tracing::info!(
            server = %self.server_name,
            tools = self.registry.len(),
            "MCP server starting"
        );

        let (reader, mut writer) = transport.split();
        let (inbox_tx, mut inbox) = mpsc::channel(INBOX_CAPACITY);
        let reader_task = tokio::spawn(read_loop(reader, inbox_tx));

        let mut inflight = Inflight::default();
        let mut input_open = true;

        loop {
            tokio::select! {
                line = inbox.recv(), if input_open => match line {
                    Some(Ok(line)) => {
                        if let Some(response) = self.dispatch(&line, &mut inflight) {
                            send(&mut writer, &response).await?;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Unreadable message");
                        send(&mut writer, &error_response(RpcId::Null, &e)).await?;
                    }
                    None => {
                        tracing::info!(pending = inflight.tasks.len(), "Transport closed, draining");
                        input_open = false;
                    }
                },
                Some(done) = inflight.next(), if !inflight.is_empty() => {
                    if let Some(response) = done {
                        send(&mut writer, &response).await?;
                    }
                },
                else => break,
            }
        }

        reader_task.abort();
        tracing::info!("MCP server stopped");
        Ok(())
    }

    /// Handle one inbound line. Returns the immediate reply, if any.
    fn dispatch(&mut self, line: &str, inflight: &mut Inflight) -> Option<JsonRpcResponse> {
        tracing::debug!(message = %line, "Received message");

        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON");
                return Some(error_response(RpcId::Null, &McpError::JsonParse(e)));
            }
        };

        // Distinguish requests (have "id") from notifications (no "id").
        if raw.get("id").is_none() {
            match serde_json::from_value::<JsonRpcNotification>(raw) {
                Ok(notif) => self.handle_notification(&notif, inflight),
                Err(e) => tracing::warn!(error = %e, "Ignoring malformed notification"),
            }
            return None;
        }

        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON-RPC request");
                let id = raw
                    .get("id")
                    .and_then(|id| serde_json::from_value(id.clone()).ok())
                    .unwrap_or(RpcId::Null);
                return Some(error_response(id, &McpError::InvalidRequest(e.to_string())));
            }
        };

        match self.route(&request) {
            Route::Reply(response) => Some(response),
            Route::Call {
                id,
                name,
                tool,
                arguments,
            } => {
                if inflight.contains(&id) {
                    tracing::warn!(id = %id, tool = %name, "Request id already in flight");
                    let err = McpError::InvalidRequest(format!("request id {id} is already in flight"));
                    return Some(error_response(id, &err));
                }
                inflight.spawn(id, name, tool, arguments);
                None
            }
        }
    }

    fn route(&mut self, request: &JsonRpcRequest) -> Route {
        let id = request.id.clone();

        let reply = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, &request.params),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => return self.route_call_tool(id, &request.params),
            method => {
                tracing::warn!(method = %method, "Unknown method");
                error_response(id, &McpError::MethodNotFound(method.to_string()))
            }
        };
        Route::Reply(reply)
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification, inflight: &mut Inflight) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!("Client confirmed initialization");
            }
            "notifications/cancelled" => {
                let params = notif
                    .params
                    .clone()
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok());
                match params {
                    Some(p) => {
                        let found = inflight.cancel(&p.request_id);
                        tracing::info!(
                            id = %p.request_id,
                            reason = p.reason.as_deref().unwrap_or(""),
                            found,
                            "Client cancelled a request"
                        );
                    }
                    None => tracing::debug!("Cancellation without a request id, ignoring"),
                }
            }
            method => {
                tracing::debug!(method = %method, "Unknown notification, ignoring");
            }
        }
    }

    fn handle_initialize(&mut self, id: RpcId, params: &Option<Value>) -> JsonRpcResponse {
        match params
            .clone()
            .and_then(|p| serde_json::from_value::<InitializeParams>(p).ok())
        {
            Some(p) => tracing::info!(
                client = %p.client_info.name,
                client_version = p.client_info.version.as_deref().unwrap_or("unknown"),
                requested_protocol = %p.protocol_version,
                "Handling initialize"
            ),
            None => tracing::info!("Handling initialize"),
        }
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: Some(self.server_version.clone()),
            },
        };

        to_response(id, &result)
    }

    fn handle_list_tools(&self, id: RpcId) -> JsonRpcResponse {
        tracing::debug!("Handling tools/list");
        let result = ListToolsResult {
            tools: self.registry.list(),
        };
        to_response(id, &result)
    }

    fn route_call_tool(&self, id: RpcId, params: &Option<Value>) -> Route {
        let Some(params) = params else {
            let err = McpError::InvalidParams("missing params".to_string());
            return Route::Reply(error_response(id, &err));
        };

        let call_params: CallToolParams = match serde_json::from_value(params.clone()) {
            Ok(p) => p,
            Err(e) => {
                let err = McpError::InvalidParams(e.to_string());
                return Route::Reply(error_response(id, &err));
            }
        };

        if !self.initialized {
            tracing::warn!(tool = %call_params.name, "tools/call before initialize");
        }

        match self.registry.get(&call_params.name) {
            Some(tool) => Route::Call {
                id,
                name: call_params.name,
                tool,
                arguments: call_params.arguments,
            },
            None => {
                let err = McpError::ToolNotFound(call_params.name);
                Route::Reply(error_response(id, &err))
            }
        }
    }
}

/// Body of one spawned `tools/call`.
async fn call_tool(id: RpcId, name: &str, tool: Arc<dyn Tool>, arguments: Value) -> JsonRpcResponse {
    let started = Instant::now();
    tracing::info!(id = %id, tool = %name, "Handling tools/call");

    let ctx = ToolContext::new(id.to_string());
    let result: CallToolResult = match tool.execute(arguments, &ctx).await {
        Ok(response) => response.into(),
        Err(e) => CallToolResult {
            content: vec![ToolContent::Text {
                text: e.to_string(),
            }],
            is_error: true,
        },
    };

    tracing::info!(
        id = %id,
        tool = %name,
        is_error = result.is_error,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Tool call finished"
    );
    to_response(id, &result)
}

/// Forward inbound lines until the transport closes or the server stops.
async fn read_loop<R: MessageReader>(mut reader: R, inbox: mpsc::Sender<Result<String, McpError>>) {
    loop {
        let message = match reader.receive().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => break,
            Err(e @ McpError::InvalidUtf8(_)) => Err(e),
            Err(e) => {
                tracing::error!(error = %e, "Transport read failed");
                break;
            }
        };
        if inbox.send(message).await.is_err() {
            break;
        }
    }
}

async fn send<W: MessageWriter>(writer: &mut W, response: &JsonRpcResponse) -> Result<(), McpError> {
    let json = serde_json::to_string(response)?;
    tracing::debug!(response = %json, "Sending response");
    writer.send(&json).await
}

fn to_response<T: serde::Serialize>(id: RpcId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(val) => JsonRpcResponse::success(id, val),
        Err(e) => error_response(id, &McpError::JsonParse(e)),
    }
}

fn error_response(id: RpcId, err: &McpError) -> JsonRpcResponse {
    let rpc = err.to_rpc_error();
    JsonRpcResponse::error(id, rpc.code, rpc.message)
}
