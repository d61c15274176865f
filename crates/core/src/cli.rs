// CLI front-end: argv state machine, flag parsing and the standalone entry point

use crate::dispatch::Dispatcher;
use crate::error::{ErrorKind, ToolError, ToolResult};
use crate::help;
use crate::registry::ToolRegistry;
use crate::schema::RawArgs;
use crate::tool::Tool;
use std::io::Write;
use std::sync::Arc;

/// Top-level flag that hands control to the server bridge
pub const SERVER_FLAG: &str = "--mcp-server";

const HELP_FLAGS: &[&str] = &["-h", "--help"];

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Server,
    Cli(Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every tool
    Overview,
    /// Detailed help for one tool
    ToolHelp(String),
    /// Run a tool with the remaining raw tokens
    Invoke { tool: String, args: Vec<String> },
}

impl Mode {
    /// Select the mode from the tokens after the program name
    pub fn parse(tokens: &[String]) -> Self {
        match tokens.first().map(String::as_str) {
            None => Self::Cli(Command::Overview),
            Some(SERVER_FLAG) => Self::Server,
            Some(first) if HELP_FLAGS.contains(&first) || first == "help" => {
                Self::Cli(Command::Overview)
            }
            Some(tool) => Self::Cli(Command::for_tool(tool, &tokens[1..])),
        }
    }
}

impl Command {
    /// Command for a known tool name and its trailing tokens
    pub fn for_tool(tool: &str, rest: &[String]) -> Self {
        match rest.first() {
            Some(flag) if HELP_FLAGS.contains(&flag.as_str()) => Self::ToolHelp(tool.to_string()),
            _ => Self::Invoke {
                tool: tool.to_string(),
                args: rest.to_vec(),
            },
        }
    }
}

/// Parse `-key value` tokens into a raw, untyped argument map.
///
/// Accepts `-key value`, `--key value` and `-key=value`. A flag followed by
/// another flag or by nothing is recorded as `true`. A value may itself start
/// with `-` when it is a number, e.g. `-offset -5`.
pub fn parse_flags(tokens: &[String]) -> ToolResult<RawArgs> {
    let mut raw = RawArgs::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let name = flag_name(token).ok_or_else(|| {
            ToolError::validation(token.clone(), "unexpected argument, expected -<param> <value>")
        })?;

        if let Some((key, value)) = name.split_once('=') {
            raw.insert(key.to_string(), serde_json::Value::String(value.to_string()));
            continue;
        }

        let value = match iter.peek() {
            Some(next) if flag_name(next).is_none() => {
                serde_json::Value::String(iter.next().cloned().unwrap_or_default())
            }
            _ => serde_json::Value::Bool(true),
        };
        raw.insert(name.to_string(), value);
    }

    Ok(raw)
}

/// Parameter name of a flag token, or `None` if the token is a value
fn flag_name(token: &str) -> Option<&str> {
    let stripped = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    let looks_numeric = stripped.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if stripped.is_empty() || looks_numeric {
        None
    } else {
        Some(stripped)
    }
}

/// Process exit status for a failed call
pub fn exit_code(err: &ToolError) -> i32 {
    match err.kind() {
        ErrorKind::Execution => 1,
        ErrorKind::UnknownTool | ErrorKind::Validation | ErrorKind::DiscoveryLoad => 2,
    }
}

/// Runs argv commands against a dispatcher and renders results for a terminal
pub struct Frontend {
    dispatcher: Dispatcher,
    program: String,
    title: String,
    standalone: bool,
}

impl Frontend {
    pub fn new(dispatcher: Dispatcher, program: impl Into<String>) -> Self {
        Self {
            dispatcher,
            program: program.into(),
            title: "Toolhost".to_string(),
            standalone: false,
        }
    }

    /// Front-end for a single tool run as its own binary
    pub fn standalone(tool: Arc<dyn Tool>) -> Self {
        let name = tool.describe().name;
        Self {
            dispatcher: Dispatcher::new(ToolRegistry::from_tools([tool])),
            program: name.clone(),
            title: name,
            standalone: true,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn invocation(&self, tool: &str) -> String {
        if self.standalone {
            tool.to_string()
        } else {
            format!("{} {}", self.program, tool)
        }
    }

    /// Run one command, writing results to `out` and errors to `err`.
    /// Returns the process exit status.
    pub async fn run<O: Write, E: Write>(&self, command: Command, out: &mut O, err: &mut E) -> i32 {
        match command {
            Command::Overview => {
                let text = help::render_overview(&self.program, &self.title, &self.dispatcher.list());
                let _ = write!(out, "{}", text);
                0
            }
            Command::ToolHelp(tool) => match self.dispatcher.describe(&tool) {
                Ok(descriptor) => {
                    let _ = write!(out, "{}", help::render_tool(&self.invocation(&tool), &descriptor));
                    0
                }
                Err(e) => self.report(&tool, &e, err),
            },
            Command::Invoke { tool, args } => {
                let result = match parse_flags(&args) {
                    Ok(raw) => self.dispatcher.invoke(&tool, &raw).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(output) => {
                        let _ = writeln!(out, "{}", output);
                        0
                    }
                    Err(e) => self.report(&tool, &e, err),
                }
            }
        }
    }

    /// Standalone binaries: `-h` shows tool help, anything else invokes
    pub async fn run_standalone<O: Write, E: Write>(
        &self,
        tokens: &[String],
        out: &mut O,
        err: &mut E,
    ) -> i32 {
        let command = Command::for_tool(&self.program, tokens);
        self.run(command, out, err).await
    }

    fn report<E: Write>(&self, tool: &str, error: &ToolError, err: &mut E) -> i32 {
        let _ = writeln!(err, "Error: {}", error);
        match error {
            ToolError::UnknownTool { .. } => {
                let names = self.dispatcher.registry().names();
                if !names.is_empty() {
                    let _ = writeln!(err, "\nAvailable tools:");
                    for name in names {
                        let _ = writeln!(err, "  {}", name);
                    }
                }
                let _ = writeln!(err, "\nRun '{} -h' to list all tools.", self.program);
            }
            ToolError::Validation { .. } => {
                let _ = writeln!(err, "\nRun '{} -h' for usage.", self.invocation(tool));
            }
            _ => {}
        }
        exit_code(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ToolDescriptor;
    use crate::schema::{ArgumentMap, ParamSpec, ParamType};
    use crate::tool::ToolOutput;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    struct Counter;

    #[async_trait::async_trait]
    impl Tool for Counter {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor::new("code_counter", "Count lines of code")
                .param(ParamSpec::required("folder", ParamType::String, "Folder to scan"))
                .param(ParamSpec::optional("recursive", ParamType::Bool, true, "Recurse"))
        }

        async fn execute(&self, args: ArgumentMap) -> ToolResult<ToolOutput> {
            let args = args.conform(&self.describe().parameters)?;
            let folder = args.require_str("folder")?;
            if folder == "missing" {
                return Err(ToolError::execution("folder does not exist: missing"));
            }
            Ok(ToolOutput::text(format!(
                "counted {} (recursive: {})",
                folder,
                args.get_bool("recursive").unwrap_or_default()
            )))
        }
    }

    struct Info;

    #[async_trait::async_trait]
    impl Tool for Info {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor::new("system_info", "Report system information")
        }

        async fn execute(&self, _args: ArgumentMap) -> ToolResult<ToolOutput> {
            Ok(ToolOutput::text("linux"))
        }
    }

    fn frontend() -> Frontend {
        let registry = ToolRegistry::from_tools([
            Arc::new(Info) as Arc<dyn Tool>,
            Arc::new(Counter) as Arc<dyn Tool>,
        ]);
        Frontend::new(Dispatcher::new(registry), "toolhost")
    }

    async fn run(line: &str) -> (i32, String, String) {
        let frontend = frontend();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = match Mode::parse(&tokens(line)) {
            Mode::Cli(command) => frontend.run(command, &mut out, &mut err).await,
            Mode::Server => panic!("unexpected server mode"),
        };
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(Mode::parse(&[]), Mode::Cli(Command::Overview));
        assert_eq!(Mode::parse(&tokens("-h")), Mode::Cli(Command::Overview));
        assert_eq!(Mode::parse(&tokens("--mcp-server")), Mode::Server);
        assert_eq!(
            Mode::parse(&tokens("code_counter --help")),
            Mode::Cli(Command::ToolHelp("code_counter".to_string()))
        );
        assert_eq!(
            Mode::parse(&tokens("code_counter -folder .")),
            Mode::Cli(Command::Invoke {
                tool: "code_counter".to_string(),
                args: tokens("-folder ."),
            })
        );
    }

    #[test]
    fn test_parse_flags() {
        let raw = parse_flags(&tokens("-folder src --pattern \\.rs$ -offset -5 -verbose -x=1")).unwrap();
        assert_eq!(raw["folder"], "src");
        assert_eq!(raw["pattern"], "\\.rs$");
        assert_eq!(raw["offset"], "-5");
        assert_eq!(raw["verbose"], true);
        assert_eq!(raw["x"], "1");

        let trailing = parse_flags(&tokens("-recursive")).unwrap();
        assert_eq!(trailing["recursive"], true);

        let err = parse_flags(&tokens("stray")).unwrap_err();
        assert_eq!(err.parameter(), Some("stray"));
    }

    #[tokio::test]
    async fn test_overview_lists_tools_sorted() {
        let (code, out, _) = run("-h").await;
        assert_eq!(code, 0);
        let listed: Vec<&str> = out
            .lines()
            .filter(|l| l.contains(" - "))
            .map(|l| l.trim().split_whitespace().next().unwrap())
            .collect();
        assert_eq!(listed, vec!["code_counter", "system_info"]);
        assert!(out.contains("Report system information"));
    }

    #[tokio::test]
    async fn test_tool_help() {
        let (code, out, _) = run("code_counter -h").await;
        assert_eq!(code, 0);
        assert!(out.contains("-folder (string) [required]"));
        assert!(out.contains("toolhost code_counter -folder <value>"));
    }

    #[tokio::test]
    async fn test_invoke_success_uses_defaults() {
        let (code, out, err) = run("code_counter -folder .").await;
        assert_eq!(code, 0, "stderr: {}", err);
        assert_eq!(out, "counted . (recursive: true)\n");
    }

    #[tokio::test]
    async fn test_invoke_missing_required() {
        let (code, out, err) = run("code_counter").await;
        assert_eq!(code, 2);
        assert!(out.is_empty());
        assert!(err.contains("invalid parameter 'folder': missing required parameter"));
        assert!(err.contains("toolhost code_counter -h"));
    }

    #[tokio::test]
    async fn test_invoke_bad_bool() {
        let (code, _, err) = run("code_counter -folder . -recursive maybe").await;
        assert_eq!(code, 2);
        assert!(err.contains("'recursive'"));
    }

    #[tokio::test]
    async fn test_execution_failure() {
        let (code, _, err) = run("code_counter -folder missing").await;
        assert_eq!(code, 1);
        assert_eq!(err, "Error: folder does not exist: missing\n");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (code, _, err) = run("nonexistent_tool -a b").await;
        assert_eq!(code, 2);
        assert!(err.contains("unknown tool 'nonexistent_tool'"));
        assert!(err.contains("  code_counter\n  system_info"));

        let (code, _, err) = run("nonexistent_tool -h").await;
        assert_eq!(code, 2);
        assert!(err.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_standalone() {
        let frontend = Frontend::standalone(Arc::new(Counter));
        let mut out = Vec::new();
        let mut err = Vec::new();

        let code = frontend.run_standalone(&tokens("-h"), &mut out, &mut err).await;
        assert_eq!(code, 0);
        let help = String::from_utf8(out).unwrap();
        assert!(help.contains("  code_counter -folder <value> [-recursive <value>]"));

        let mut out = Vec::new();
        let code = frontend
            .run_standalone(&tokens("-folder src -recursive false"), &mut out, &mut err)
            .await;
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "counted src (recursive: false)\n");
    }
}
