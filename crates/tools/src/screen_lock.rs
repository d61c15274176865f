// Delayed screen lock

use std::time::Duration;
use toolhost_core::{
    ArgumentMap, ParamSpec, ParamType, Tool, ToolDescriptor, ToolError, ToolOutput, ToolResult,
};

const DEFAULT_MESSAGE: &str = "Locking screen...";

/// Platform command that locks the current session
#[cfg(target_os = "linux")]
const LOCK_COMMAND: Option<(&str, &[&str])> = Some(("loginctl", &["lock-session"]));
#[cfg(target_os = "macos")]
const LOCK_COMMAND: Option<(&str, &[&str])> = Some(("pmset", &["displaysleepnow"]));
#[cfg(target_os = "windows")]
const LOCK_COMMAND: Option<(&str, &[&str])> = Some(("rundll32.exe", &["user32.dll,LockWorkStation"]));
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const LOCK_COMMAND: Option<(&str, &[&str])> = None;

/// Locks the screen, optionally after a delay.
///
/// The delay is an async sleep, so dropping the call (e.g. on a server
/// timeout) abandons the lock.
pub struct ScreenLockTool;

impl ScreenLockTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScreenLockTool {
    fn default() -> Self {
        Self::new()
    }
}

fn command_line() -> ToolResult<String> {
    let (program, args) = LOCK_COMMAND
        .ok_or_else(|| ToolError::execution("screen locking is not supported on this platform"))?;
    Ok(std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" "))
}

async fn lock() -> ToolResult<()> {
    let (program, args) = LOCK_COMMAND
        .ok_or_else(|| ToolError::execution("screen locking is not supported on this platform"))?;

    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| ToolError::execution(format!("lock command '{}' unavailable: {}", program, e)))?;

    if !output.status.success() {
        return Err(ToolError::execution(format!(
            "lock command '{}' exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl Tool for ScreenLockTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("screen_lock", "Lock the screen, immediately or after a delay")
            .param(ParamSpec::optional(
                "delay",
                ParamType::Int,
                0i64,
                "Seconds to wait before locking; 0 locks immediately",
            ))
            .param(ParamSpec::optional(
                "message",
                ParamType::String,
                DEFAULT_MESSAGE,
                "Message shown before locking",
            ))
            .param(ParamSpec::optional(
                "dry_run",
                ParamType::Bool,
                false,
                "Report the lock command without running it",
            ))
    }

    async fn execute(&self, args: ArgumentMap) -> ToolResult<ToolOutput> {
        let args = args.conform(&self.describe().parameters)?;
        let delay = args.get_int("delay").unwrap_or(0);
        let message = args.get_str("message").unwrap_or(DEFAULT_MESSAGE).to_string();
        let dry_run = args.get_bool("dry_run").unwrap_or(false);

        let delay = u64::try_from(delay)
            .map_err(|_| ToolError::validation("delay", format!("must not be negative, got {}", delay)))?;

        let mut report = Vec::new();
        if delay > 0 {
            tracing::info!("{} (in {}s)", message, delay);
            report.push(format!("{} (waited {}s)", message, delay));
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }

        if dry_run {
            report.push(format!("Dry run: would run '{}'", command_line()?));
        } else {
            lock().await?;
            report.push("Screen locked".to_string());
        }

        Ok(ToolOutput::text(report.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_delay() {
        let start = Instant::now();
        let output = ScreenLockTool
            .execute(ArgumentMap::new().with("delay", 30i64).with("dry_run", true))
            .await
            .unwrap()
            .to_string();

        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(output.starts_with("Locking screen... (waited 30s)"));
        #[cfg(target_os = "linux")]
        assert!(output.ends_with("would run 'loginctl lock-session'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_never_locks() {
        let call = ScreenLockTool.execute(ArgumentMap::new().with("delay", 60i64));
        let result = tokio::time::timeout(Duration::from_secs(5), call).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_negative_delay_rejected() {
        let err = ScreenLockTool
            .execute(ArgumentMap::new().with("delay", -1i64))
            .await
            .unwrap_err();
        assert_eq!(err.parameter(), Some("delay"));
    }

    #[tokio::test]
    async fn test_immediate_dry_run() {
        let output = ScreenLockTool
            .execute(ArgumentMap::new().with("dry_run", true).with("message", "bye"))
            .await
            .unwrap()
            .to_string();
        assert!(output.starts_with("Dry run"));
        assert!(!output.contains("bye"));
    }
}
