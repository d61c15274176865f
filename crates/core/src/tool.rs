// Plugin contract: the trait every tool satisfies, plus the adapter for
// function-shaped tools

use crate::descriptor::ToolDescriptor;
use crate::error::{ToolError, ToolResult};
use crate::schema::ArgumentMap;
use serde::{Deserialize, Serialize};

/// Result of a successful tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    Text(String),
    Json(serde_json::Value),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn json(value: impl Serialize) -> ToolResult<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ToolError::execution(format!("failed to serialize result: {}", e)))
    }

    /// Structured value, if the tool returned one
    pub fn structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Json(value) => match serde_json::to_string_pretty(value) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{}", value),
            },
        }
    }
}

/// A tool that can be described and executed.
///
/// `describe` must be pure and stable for the lifetime of the process.
/// `execute` must re-validate its arguments (see [`ArgumentMap::conform`])
/// since it can be called without going through the dispatcher.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's descriptor
    fn describe(&self) -> ToolDescriptor;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: ArgumentMap) -> ToolResult<ToolOutput>;
}

/// Signature of a function-shaped tool's `describe`
pub type DescribeFn = fn() -> ToolDescriptor;

/// Signature of a function-shaped tool's `execute`
pub type ExecuteFn = fn(ArgumentMap) -> ToolResult<ToolOutput>;

/// Adapter turning a pair of free functions into a [`Tool`].
///
/// The execute function runs on the blocking pool, after the adapter has
/// validated the arguments against the descriptor.
#[derive(Clone, Copy)]
pub struct FnTool {
    describe: DescribeFn,
    execute: ExecuteFn,
}

impl FnTool {
    pub fn new(describe: DescribeFn, execute: ExecuteFn) -> Self {
        Self { describe, execute }
    }
}

#[async_trait::async_trait]
impl Tool for FnTool {
    fn describe(&self) -> ToolDescriptor {
        (self.describe)()
    }

    async fn execute(&self, args: ArgumentMap) -> ToolResult<ToolOutput> {
        let descriptor = (self.describe)();
        let args = args.conform(&descriptor.parameters)?;
        let execute = self.execute;

        tokio::task::spawn_blocking(move || execute(args))
            .await
            .map_err(|e| ToolError::execution(format!("tool '{}' panicked: {}", descriptor.name, e)))?
    }
}

/// Build a [`FnTool`] from any module exposing `describe()` and `execute(args)`.
///
/// ```ignore
/// let tool = toolhost_core::fn_tool!(system_info);
/// ```
#[macro_export]
macro_rules! fn_tool {
    ($($module:ident)::+) => {
        $crate::tool::FnTool::new($($module)::+::describe, $($module)::+::execute)
    };
}
