// Standalone system_info binary

use std::sync::Arc;
use toolhost_tools::system_info;

#[tokio::main]
async fn main() {
    toolhost_tools::init_tracing("warn");
    let tool = toolhost_core::fn_tool!(system_info);
    let code = toolhost_tools::run_standalone(Arc::new(tool)).await;
    std::process::exit(code);
}
