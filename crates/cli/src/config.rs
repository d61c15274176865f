use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolhostConfig {
    /// Log filter used when `RUST_LOG` and `--log-level` are absent
    #[serde(default)]
    pub log_level: Option<String>,

    /// Directories scanned for tool manifests, in order
    #[serde(default)]
    pub plugin_dirs: Vec<PathBuf>,

    /// Tool names removed after discovery
    #[serde(default)]
    pub disabled: Vec<String>,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Upper bound on a single tool call in server mode
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
}

fn default_server_name() -> String {
    "toolhost".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            call_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

impl ToolhostConfig {
    /// Load the config file if it exists, otherwise use defaults.
    ///
    /// Relative plugin directories are resolved against the file's own
    /// directory, and a leading `~` against `$HOME`.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read configuration file {}", config_path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", config_path.display()))?;

        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        config.plugin_dirs = config
            .plugin_dirs
            .iter()
            .map(|dir| {
                let dir = expand_home(dir);
                if dir.is_relative() {
                    base.join(dir)
                } else {
                    dir
                }
            })
            .collect();

        Ok(config)
    }

    /// Configured plugin directories followed by the ones given on the command line
    pub fn plugin_dirs_with(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        self.plugin_dirs
            .iter()
            .cloned()
            .chain(extra.iter().map(|dir| expand_home(dir)))
            .collect()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ToolhostConfig::load(&dir.path().join("toolhost.toml")).unwrap();
        assert!(config.plugin_dirs.is_empty());
        assert_eq!(config.server.name, "toolhost");
        assert!(config.server.call_timeout().is_none());
    }

    #[test]
    fn test_load_resolves_plugin_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolhost.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"
plugin_dirs = ["plugins", "/opt/tools"]
disabled = ["screen_lock"]

[server]
call_timeout_secs = 30
"#,
        )
        .unwrap();

        let config = ToolhostConfig::load(&path).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(
            config.plugin_dirs,
            vec![dir.path().join("plugins"), PathBuf::from("/opt/tools")]
        );
        assert_eq!(config.disabled, vec!["screen_lock"]);
        assert_eq!(config.server.call_timeout(), Some(Duration::from_secs(30)));

        let all = config.plugin_dirs_with(&[PathBuf::from("extra")]);
        assert_eq!(all.last(), Some(&PathBuf::from("extra")));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolhost.toml");
        std::fs::write(&path, "plugin_dirs = 3").unwrap();
        assert!(ToolhostConfig::load(&path).is_err());
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home(Path::new("~/tools"));
        assert_eq!(expanded, PathBuf::from(shellexpand::tilde("~/tools").into_owned()));
        assert!(expanded.ends_with("tools"));
        assert_eq!(expand_home(Path::new("/abs")), PathBuf::from("/abs"));
        assert_eq!(expand_home(Path::new("plugins")), PathBuf::from("plugins"));
    }

    #[test]
    fn test_load_expands_tilde_plugin_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toolhost.toml");
        std::fs::write(&path, "plugin_dirs = [\"~/toolhost-plugins\"]\n").unwrap();

        let config = ToolhostConfig::load(&path).unwrap();
        assert_eq!(
            config.plugin_dirs,
            vec![PathBuf::from(shellexpand::tilde("~/toolhost-plugins").into_owned())]
        );
    }
}
