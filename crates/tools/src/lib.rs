// Built-in tools shipped with the host, and the entry point their standalone
// binaries share

pub mod code_counter;
pub mod screen_lock;
pub mod system_info;

use std::io::Write;
use std::sync::Arc;
use toolhost_core::cli::Frontend;
use toolhost_core::{Discovery, Tool};

pub use code_counter::CodeCounterTool;
pub use screen_lock::ScreenLockTool;

/// Every built-in tool, in registration order
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CodeCounterTool::new()),
        Arc::new(toolhost_core::fn_tool!(system_info)),
        Arc::new(ScreenLockTool::new()),
    ]
}

/// Add the built-ins as the first discovery candidates
pub fn register_builtins(discovery: &mut Discovery) {
    for tool in builtin_tools() {
        discovery.add_tool(tool);
    }
}

/// Log to stderr. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one tool as its own program: `<tool> -h` or `<tool> [-<param> <value>]...`.
/// Returns the process exit status.
pub async fn run_standalone(tool: Arc<dyn Tool>) -> i32 {
    let tokens: Vec<String> = std::env::args().skip(1).collect();
    let frontend = Frontend::standalone(tool);
    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let code = frontend.run_standalone(&tokens, &mut out, &mut err).await;
    let _ = out.flush();
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_discover_cleanly() {
        let mut discovery = Discovery::new();
        register_builtins(&mut discovery);
        let (registry, report) = discovery.discover();

        assert!(report.is_clean(), "{:?}", report);
        assert_eq!(registry.names(), vec!["code_counter", "screen_lock", "system_info"]);
    }

    #[test]
    fn test_builtin_descriptors_pass_self_check() {
        for tool in builtin_tools() {
            let descriptor = tool.describe();
            descriptor.check().unwrap();
            assert_eq!(descriptor, tool.describe());
        }
    }

    #[tokio::test]
    async fn test_function_shaped_builtin_dispatches() {
        let dispatcher = toolhost_core::Dispatcher::new(toolhost_core::ToolRegistry::from_tools(builtin_tools()));
        let mut raw = toolhost_core::RawArgs::new();
        raw.insert("info_type".to_string(), serde_json::json!("system"));
        raw.insert("format".to_string(), serde_json::json!("json"));

        let output = dispatcher.invoke("system_info", &raw).await.unwrap();
        assert_eq!(output.structured().unwrap()["system"]["arch"], std::env::consts::ARCH);
    }
}
