// Standalone screen_lock binary

use std::sync::Arc;
use toolhost_tools::ScreenLockTool;

#[tokio::main]
async fn main() {
    toolhost_tools::init_tracing("warn");
    let code = toolhost_tools::run_standalone(Arc::new(ScreenLockTool::new())).await;
    std::process::exit(code);
}
