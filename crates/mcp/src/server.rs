// MCP server: line-delimited JSON-RPC over stdio, backed by the dispatcher

use crate::protocol::*;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use toolhost_core::{DiscoveryReport, Dispatcher, RawArgs, ToolError, ToolOutput, ToolRegistry, ToolResult};

/// Rebuilds the registry from the same inputs used at startup
pub type Reloader = Arc<dyn Fn() -> (ToolRegistry, DiscoveryReport) + Send + Sync>;

/// Server identity and per-call limits
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub name: String,
    pub version: String,
    pub call_timeout: Option<Duration>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "toolhost".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            call_timeout: None,
        }
    }
}

type Outbox = mpsc::UnboundedSender<String>;

#[derive(Clone)]
pub struct McpServer {
    dispatcher: Dispatcher,
    settings: ServerSettings,
    reloader: Option<Reloader>,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher, settings: ServerSettings) -> Self {
        Self {
            dispatcher,
            settings,
            reloader: None,
        }
    }

    /// Enable `toolhost/reload`
    pub fn with_reloader(mut self, reloader: Reloader) -> Self {
        self.reloader = Some(reloader);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serve on stdin/stdout until stdin closes
    pub async fn start(&self) -> Result<()> {
        tracing::info!(
            "MCP server '{}' ready with {} tools",
            self.settings.name,
            self.dispatcher.registry().len()
        );
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
        tracing::info!("MCP server input closed, shutting down");
        Ok(())
    }

    /// Read requests line by line and answer each on its own task.
    ///
    /// Responses may arrive out of request order; clients match them by id.
    /// Returns once the input ends and every in-flight request is answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(writer, rx));

        let mut lines = BufReader::new(reader).lines();
        let mut in_flight = JoinSet::new();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request = match parse_request(line) {
                Ok(request) => request,
                Err(response) => {
                    send(&tx, &response);
                    continue;
                }
            };

            let server = self.clone();
            let outbox = tx.clone();
            in_flight.spawn(async move {
                let id = request.id.clone();
                let response = server.handle(request, &outbox).await;
                if let (Some(id), Some(response)) = (id, response) {
                    send(&outbox, &response.with_id(id));
                }
            });

            // Reap finished tasks so the set does not grow without bound
            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }

        drop(tx);
        writer_task.await??;
        Ok(())
    }

    /// Handle one request. Returns `None` for notifications.
    async fn handle(&self, request: JsonRpcRequest, outbox: &Outbox) -> Option<JsonRpcResponse> {
        tracing::debug!("Handling '{}'", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.initialize(&request),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.list_tools(),
            "tools/describe" => self.describe_tool(&request),
            "tools/call" => self.call_tool(&request).await,
            "toolhost/reload" => self.reload(outbox).await,
            method if method.starts_with("notifications/") && request.is_notification() => {
                tracing::debug!("Notification '{}'", method);
                return None;
            }
            method => Err(JsonRpcError::method_not_found(method)),
        };

        if request.is_notification() {
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(serde_json::Value::Null, value),
            Err(error) => JsonRpcResponse::error(serde_json::Value::Null, error),
        })
    }

    fn initialize(&self, request: &JsonRpcRequest) -> Result<serde_json::Value, JsonRpcError> {
        let params: InitializeParams = request.parse_params()?;
        if let Some(client) = &params.client_info {
            tracing::info!("Client connected: {} {}", client.name, client.version);
        }

        to_result(InitializeResult {
            protocol_version: params
                .protocol_version
                .unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: self.reloader.is_some(),
                }),
            },
            server_info: ServerInfo {
                name: self.settings.name.clone(),
                version: self.settings.version.clone(),
            },
        })
    }

    fn list_tools(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = self.dispatcher.list().iter().map(ToolSchema::from).collect();
        to_result(ListToolsResult { tools })
    }

    fn describe_tool(&self, request: &JsonRpcRequest) -> Result<serde_json::Value, JsonRpcError> {
        let params: DescribeToolParams = request.parse_params()?;
        let descriptor = self
            .dispatcher
            .describe(&params.name)
            .map_err(|e| JsonRpcError::from(&e))?;
        let input_schema = descriptor.input_schema();
        to_result(DescribeToolResult {
            descriptor,
            input_schema,
        })
    }

    async fn call_tool(&self, request: &JsonRpcRequest) -> Result<serde_json::Value, JsonRpcError> {
        let params: CallToolParams = request.parse_params()?;
        let raw: RawArgs = match params.arguments {
            serde_json::Value::Null => RawArgs::new(),
            serde_json::Value::Object(map) => map.into_iter().collect(),
            other => {
                return Err(JsonRpcError::from(&ToolError::validation(
                    "arguments",
                    format!("must be an object, got {}", other),
                )))
            }
        };

        match self.invoke(&params.name, &raw).await {
            Ok(output) => to_result(CallToolResult::from(output)),
            Err(e) => {
                tracing::warn!("Call to '{}' failed: {}", params.name, e);
                Err(JsonRpcError::from(&e))
            }
        }
    }

    /// Invoke with the configured timeout. Expiry drops the tool future.
    async fn invoke(&self, name: &str, raw: &RawArgs) -> ToolResult<ToolOutput> {
        let call = self.dispatcher.invoke(name, raw);
        match self.settings.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(ToolError::execution(format!(
                    "tool '{}' timed out after {}s",
                    name,
                    limit.as_secs_f64()
                )))
            }),
            None => call.await,
        }
    }

    async fn reload(&self, outbox: &Outbox) -> Result<serde_json::Value, JsonRpcError> {
        let reloader = self
            .reloader
            .clone()
            .ok_or_else(|| JsonRpcError::method_not_found("toolhost/reload"))?;

        let (registry, report) = tokio::task::spawn_blocking(move || reloader())
            .await
            .map_err(|e| JsonRpcError::internal_error(format!("reload failed: {}", e)))?;

        let tools = registry.names();
        self.dispatcher.shared().replace(registry);
        tracing::info!(
            "Registry reloaded: {} tools, {} failures",
            tools.len(),
            report.failures.len()
        );

        send(
            outbox,
            &JsonRpcRequest::notification("notifications/tools/list_changed", serde_json::json!({})),
        );

        to_result(ReloadResult {
            tools,
            failures: report.failures.iter().map(ToString::to_string).collect(),
        })
    }
}

impl JsonRpcResponse {
    fn with_id(mut self, id: serde_json::Value) -> Self {
        self.id = id;
        self
    }
}

/// Parse one input line, or produce the error response for it
fn parse_request(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
        tracing::warn!("Unparseable request: {}", e);
        JsonRpcResponse::error(serde_json::Value::Null, JsonRpcError::parse_error())
    })?;

    let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
    match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(request) if request.jsonrpc == "2.0" => Ok(request),
        _ => Err(JsonRpcResponse::error(id, JsonRpcError::invalid_request())),
    }
}

fn to_result(value: impl serde::Serialize) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

fn send(outbox: &Outbox, message: &impl serde::Serialize) {
    match serde_json::to_string(message) {
        Ok(line) => {
            // A closed outbox means the writer already failed and reported it
            let _ = outbox.send(line);
        }
        Err(e) => tracing::error!("Failed to serialize message: {}", e),
    }
}

async fn write_lines<W: AsyncWrite + Unpin>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> Result<()> {
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("Request task failed: {}", e);
    }
}
