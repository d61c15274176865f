// Standalone code_counter binary

use std::sync::Arc;
use toolhost_tools::CodeCounterTool;

#[tokio::main]
async fn main() {
    toolhost_tools::init_tracing("warn");
    let code = toolhost_tools::run_standalone(Arc::new(CodeCounterTool::new())).await;
    std::process::exit(code);
}
