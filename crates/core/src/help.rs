// Help text rendered from tool descriptors

use crate::descriptor::ToolDescriptor;
use std::fmt::Write;

const RULE_WIDTH: usize = 50;
const MIN_NAME_WIDTH: usize = 15;

/// Aggregate help: every tool with its one-line description, sorted by name
pub fn render_overview(program: &str, title: &str, tools: &[ToolDescriptor]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out);

    if tools.is_empty() {
        let _ = writeln!(out, "No tools available.");
    } else {
        let mut sorted: Vec<&ToolDescriptor> = tools.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let width = sorted
            .iter()
            .map(|t| t.name.len())
            .max()
            .unwrap_or_default()
            .max(MIN_NAME_WIDTH);

        let _ = writeln!(out, "Available tools:");
        for tool in sorted {
            let _ = writeln!(out, "  {:<width$} - {}", tool.name, tool.summary(), width = width);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "  {} -h                               Show this help", program);
    let _ = writeln!(out, "  {} <tool> -h                        Show help for a tool", program);
    let _ = writeln!(out, "  {} <tool> [-<param> <value>]...     Run a tool", program);
    let _ = writeln!(out, "  {} --mcp-server                     Serve tools over MCP (stdio)", program);
    out
}

/// Detailed help for one tool. `invocation` is how the tool is started,
/// e.g. `toolhost code_counter` or just `code_counter` for a standalone binary.
pub fn render_tool(invocation: &str, tool: &ToolDescriptor) -> String {
    let mut out = String::new();
    let header = format!("Tool: {}", tool.name);
    let _ = writeln!(out, "{}", header);
    let _ = writeln!(out, "{}", "=".repeat(header.len()));
    let _ = writeln!(out, "Description: {}", tool.description);
    let _ = writeln!(out);

    if tool.parameters.is_empty() {
        let _ = writeln!(out, "This tool takes no parameters.");
        let _ = writeln!(out);
    } else {
        let _ = writeln!(out, "Parameters:");
        for param in tool.required_params().chain(tool.optional_params()) {
            let mut line = format!("  -{} ({})", param.name, param.param_type);
            if param.required {
                line.push_str(" [required]");
            } else {
                line.push_str(" [optional]");
                if let Some(default) = param.effective_default() {
                    let _ = write!(line, " (default: {})", default);
                }
            }
            let _ = writeln!(out, "{}", line);
            if !param.description.is_empty() {
                let _ = writeln!(out, "    {}", param.description);
            }
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out, "Usage:");
    let _ = writeln!(out, "  {}", usage_line(invocation, tool));
    out
}

fn usage_line(invocation: &str, tool: &ToolDescriptor) -> String {
    let mut usage = invocation.to_string();
    for param in tool.required_params() {
        let _ = write!(usage, " -{} <value>", param.name);
    }
    for param in tool.optional_params() {
        let _ = write!(usage, " [-{} <value>]", param.name);
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamSpec, ParamType};

    fn counter() -> ToolDescriptor {
        ToolDescriptor::new("code_counter", "Count lines of code in a folder")
            .param(ParamSpec::required("folder", ParamType::String, "Folder to scan"))
            .param(ParamSpec::optional("recursive", ParamType::Bool, true, "Descend into subfolders"))
    }

    #[test]
    fn test_overview_sorted() {
        let tools = vec![
            ToolDescriptor::new("system_info", "Report system information"),
            counter(),
        ];
        let help = render_overview("toolhost", "Toolhost", &tools);
        let counter_at = help.find("code_counter").unwrap();
        let info_at = help.find("system_info").unwrap();
        assert!(counter_at < info_at);
        assert!(help.contains("  code_counter    - Count lines of code in a folder"));
        assert!(help.contains("toolhost --mcp-server"));
    }

    #[test]
    fn test_overview_empty() {
        let help = render_overview("toolhost", "Toolhost", &[]);
        assert!(help.contains("No tools available."));
    }

    #[test]
    fn test_tool_help_lists_parameters() {
        let help = render_tool("toolhost code_counter", &counter());
        assert!(help.starts_with("Tool: code_counter\n=================="));
        assert!(help.contains("  -folder (string) [required]\n    Folder to scan"));
        assert!(help.contains("  -recursive (bool) [optional] (default: true)"));
        assert!(help.contains("  toolhost code_counter -folder <value> [-recursive <value>]"));
    }

    #[test]
    fn test_tool_help_without_parameters() {
        let help = render_tool("lock", &ToolDescriptor::new("lock", "Lock now"));
        assert!(help.contains("This tool takes no parameters."));
        assert!(help.ends_with("Usage:\n  lock\n"));
    }
}
