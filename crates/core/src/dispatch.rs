// Dispatch core shared by the CLI front-end and the server bridge

use crate::descriptor::ToolDescriptor;
use crate::error::{ToolError, ToolResult};
use crate::registry::{SharedRegistry, ToolRegistry};
use crate::schema::RawArgs;
use crate::tool::{Tool, ToolOutput};
use std::sync::Arc;

/// Resolves tools by name and runs the validate-then-execute pipeline.
///
/// Cheap to clone; every clone reads the same shared registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<SharedRegistry>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self::with_shared(Arc::new(SharedRegistry::new(registry)))
    }

    pub fn with_shared(registry: Arc<SharedRegistry>) -> Self {
        Self { registry }
    }

    pub fn shared(&self) -> &Arc<SharedRegistry> {
        &self.registry
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.snapshot()
    }

    /// Descriptors of every registered tool, sorted by name
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.registry().descriptors()
    }

    /// Descriptor of one tool
    pub fn describe(&self, name: &str) -> ToolResult<ToolDescriptor> {
        Ok(self.resolve(&self.registry(), name)?.describe())
    }

    /// Validate raw arguments and execute the named tool
    pub async fn invoke(&self, name: &str, raw: &RawArgs) -> ToolResult<ToolOutput> {
        let registry = self.registry();
        let tool = self.resolve(&registry, name)?;
        let descriptor = tool.describe();
        let args = descriptor.validate_args(raw)?;

        tracing::debug!("Invoking '{}' with {} argument(s)", name, args.len());

        tool.execute(args).await.map_err(|e| {
            tracing::debug!("Tool '{}' failed: {}", name, e);
            e
        })
    }

    fn resolve(&self, registry: &ToolRegistry, name: &str) -> ToolResult<Arc<dyn Tool>> {
        registry.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
            suggestions: registry.suggestions(name),
        })
    }
}
