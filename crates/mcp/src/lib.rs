// MCP (Model Context Protocol) server exposing the tool registry to agent clients

pub mod protocol;
pub mod server;

pub use server::{McpServer, Reloader, ServerSettings};
