// MCP protocol types and definitions (JSON-RPC 2.0 over stdio)

use serde::{Deserialize, Serialize};
use toolhost_core::{ErrorKind, ErrorPayload, ToolDescriptor, ToolError, ToolOutput};

/// Protocol revision advertised when the client does not ask for one
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server-defined code for a call naming a tool that is not registered
pub const UNKNOWN_TOOL: i32 = -32001;
/// Server-defined code for a tool whose own logic failed
pub const EXECUTION_FAILED: i32 = -32000;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn notification(method: impl Into<String>, params: impl Serialize) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.into(),
            params: serde_json::to_value(params).ok(),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Deserialize the params into a typed struct; absent params read as `{}`
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        let params = self
            .params
            .clone()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
        serde_json::from_value(params).map_err(|e| JsonRpcError::malformed_params(&e))
    }
}

/// Field named by a serde "missing field `x`" error
fn missing_field(message: &str) -> Option<String> {
    let (_, rest) = message.split_once("missing field `")?;
    let (field, _) = rest.split_once('`')?;
    Some(field.to_string())
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<serde_json::Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self {
                jsonrpc: "2.0".to_string(),
                id: id.into(),
                result: Some(result),
                error: None,
            },
            Err(e) => Self::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    pub fn error(id: impl Into<serde_json::Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "Invalid Request".to_string(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Params that do not match the method's shape, with a validation payload
    pub fn malformed_params(err: &serde_json::Error) -> Self {
        let message = format!("invalid params: {}", err);
        let payload = ErrorPayload {
            kind: ErrorKind::Validation,
            parameter: missing_field(&message),
            message: message.clone(),
        };
        Self {
            code: -32602,
            message,
            data: serde_json::to_value(payload).ok(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&ToolError> for JsonRpcError {
    fn from(err: &ToolError) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => -32602,
            ErrorKind::UnknownTool => UNKNOWN_TOOL,
            ErrorKind::Execution => EXECUTION_FAILED,
            ErrorKind::DiscoveryLoad => -32603,
        };
        Self {
            code,
            message: err.to_string(),
            data: serde_json::to_value(err.to_payload()).ok(),
        }
    }
}

// MCP-specific protocol messages

/// Tool definition for MCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl From<&ToolDescriptor> for ToolSchema {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
        }
    }
}

/// List tools response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolSchema>,
}

/// Describe tool request params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeToolParams {
    pub name: String,
}

/// Describe tool response: the full descriptor plus its JSON Schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeToolResult {
    #[serde(flatten)]
    pub descriptor: ToolDescriptor,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Call tool request params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Call tool response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "structuredContent", skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
}

impl From<ToolOutput> for CallToolResult {
    fn from(output: ToolOutput) -> Self {
        Self {
            content: vec![ToolContent::text(output.to_string())],
            structured_content: output.structured().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Reload response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResult {
    pub tools: Vec<String>,
    pub failures: Vec<String>,
}

/// Initialize request params. Only the requested protocol revision is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion", default)]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Initialize response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}
