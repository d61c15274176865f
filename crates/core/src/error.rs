//! Error types shared by discovery, validation and dispatch.

use serde::{Deserialize, Serialize};

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while discovering, validating or running a tool.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    /// A plugin candidate failed to load. Recorded per candidate, never fatal
    /// to a whole discovery pass.
    #[error("failed to load tool from {origin}: {message}")]
    DiscoveryLoad { origin: String, message: String },

    /// No tool with this name is registered.
    #[error("{}", unknown_tool_message(.name, .suggestions))]
    UnknownTool {
        name: String,
        suggestions: Vec<String>,
    },

    /// Caller input does not satisfy the tool's parameter schema.
    #[error("invalid parameter '{parameter}': {message}")]
    Validation { parameter: String, message: String },

    /// The tool's own logic failed.
    #[error("{0}")]
    Execution(String),
}

fn unknown_tool_message(name: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        format!("unknown tool '{}'", name)
    } else {
        format!(
            "unknown tool '{}' (did you mean: {}?)",
            name,
            suggestions.join(", ")
        )
    }
}

impl ToolError {
    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn missing(parameter: impl Into<String>) -> Self {
        Self::validation(parameter, "missing required parameter")
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DiscoveryLoad { .. } => ErrorKind::DiscoveryLoad,
            Self::UnknownTool { .. } => ErrorKind::UnknownTool,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Execution(_) => ErrorKind::Execution,
        }
    }

    /// The offending parameter, for validation failures.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::Validation { parameter, .. } => Some(parameter),
            _ => None,
        }
    }

    /// Render as the structured payload returned to remote callers.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
            parameter: self.parameter().map(str::to_string),
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        Self::Execution(format!("{:#}", err))
    }
}

/// Error classification, stable across the CLI and server paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DiscoveryLoad,
    UnknownTool,
    Validation,
    Execution,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DiscoveryLoad => "discovery_load",
            Self::UnknownTool => "unknown_tool",
            Self::Validation => "validation",
            Self::Execution => "execution",
        };
        f.write_str(s)
    }
}

/// Structured error returned by the server bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}
