use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use toolhost_core::cli::{Frontend, Mode};
use toolhost_core::{Discovery, DiscoveryReport, Dispatcher, ToolRegistry};
use toolhost_mcp::{McpServer, Reloader, ServerSettings};

mod config;

use config::ToolhostConfig;

#[derive(Parser, Debug)]
#[command(name = "toolhost")]
#[command(about = "Pluggable tool host: run tools from the command line or serve them over MCP", long_about = None)]
#[command(disable_help_flag = true)]
struct Args {
    /// Path to configuration file
    #[arg(long, env = "TOOLHOST_CONFIG", default_value = "toolhost.toml")]
    config: PathBuf,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Extra directory to scan for tool manifests (repeatable)
    #[arg(long = "plugin-dir")]
    plugin_dirs: Vec<PathBuf>,

    /// Serve tools over MCP on stdin/stdout
    #[arg(long)]
    mcp_server: bool,

    /// `-h`, `<tool> -h` or `<tool> [-<param> <value>]...`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

/// Built-ins first, then every plugin directory in order, minus disabled tools
fn build_registry(plugin_dirs: &[PathBuf], disabled: &[String]) -> (ToolRegistry, DiscoveryReport) {
    let mut discovery = Discovery::new();
    toolhost_tools::register_builtins(&mut discovery);
    for dir in plugin_dirs {
        discovery.scan_dir(dir);
    }

    let (registry, report) = discovery.discover();
    tracing::debug!(
        "Discovered {} tools ({} failures, {} overrides)",
        report.loaded.len(),
        report.failures.len(),
        report.overrides.len()
    );
    (registry.without(disabled), report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ToolhostConfig::load(&args.config)?;
    let level = args
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    toolhost_tools::init_tracing(&level);

    if !args.config.exists() {
        tracing::info!("Configuration file {} not found, using defaults", args.config.display());
    }

    let plugin_dirs = config.plugin_dirs_with(&args.plugin_dirs);
    let (registry, _report) = build_registry(&plugin_dirs, &config.disabled);
    let dispatcher = Dispatcher::new(registry);

    let mode = if args.mcp_server {
        Mode::Server
    } else {
        Mode::parse(&args.command)
    };

    match mode {
        Mode::Server => {
            let disabled = config.disabled.clone();
            let reloader: Reloader = Arc::new(move || build_registry(&plugin_dirs, &disabled));
            let settings = ServerSettings {
                name: config.server.name.clone(),
                call_timeout: config.server.call_timeout(),
                ..ServerSettings::default()
            };

            McpServer::new(dispatcher, settings)
                .with_reloader(reloader)
                .start()
                .await?;
            Ok(())
        }
        Mode::Cli(command) => {
            let frontend = Frontend::new(dispatcher, "toolhost");
            let mut out = std::io::stdout();
            let mut err = std::io::stderr();
            let code = frontend.run(command, &mut out, &mut err).await;
            out.flush()?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
    }
}
