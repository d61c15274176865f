// Core of the tool host: parameter schemas, the tool contract, discovery,
// dispatch and the CLI front-end

pub mod cli;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod help;
pub mod manifest;
pub mod registry;
pub mod schema;
pub mod tool;

pub use descriptor::ToolDescriptor;
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, ErrorPayload, ToolError, ToolResult};
pub use registry::{Discovery, DiscoveryReport, SharedRegistry, ToolCandidate, ToolRegistry};
pub use schema::{ArgumentMap, ParamSpec, ParamType, ParamValue, RawArgs};
pub use tool::{FnTool, Tool, ToolOutput};
