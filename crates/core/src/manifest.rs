// Command-manifest plugins: external tools described by a TOML file and
// executed as a child process

use crate::descriptor::ToolDescriptor;
use crate::error::{ToolError, ToolResult};
use crate::schema::{ArgumentMap, ParamSpec, ParamType, ParamValue};
use crate::tool::{Tool, ToolOutput};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

/// File extension recognised as a tool manifest
pub const MANIFEST_EXTENSION: &str = "toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolManifest {
    pub name: String,
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ManifestParam>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestParam {
    #[serde(rename = "type", default = "default_param_type")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<ParamValue>,
}

fn default_param_type() -> String {
    "string".to_string()
}

impl ToolManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    fn descriptor(&self) -> Result<ToolDescriptor> {
        let mut descriptor = ToolDescriptor::new(&self.name, &self.description);
        for (name, param) in &self.parameters {
            let param_type: ParamType = param
                .param_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("parameter '{}': {}", name, e))?;
            // TOML integers are valid float defaults
            let default = match (param_type, &param.default) {
                (ParamType::Float, Some(ParamValue::Int(i))) => Some(ParamValue::Float(*i as f64)),
                (_, other) => other.clone(),
            };
            descriptor = descriptor.param(ParamSpec {
                name: name.clone(),
                param_type,
                description: param.description.clone(),
                required: param.required,
                default,
            });
        }
        Ok(descriptor)
    }
}

/// A tool backed by an external command
#[derive(Debug, Clone)]
pub struct CommandTool {
    manifest: ToolManifest,
    descriptor: ToolDescriptor,
    base_dir: PathBuf,
}

impl CommandTool {
    /// Load and self-check a manifest file
    pub fn from_file(path: &Path) -> Result<Self> {
        let manifest = ToolManifest::load(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_manifest(manifest, base_dir)
    }

    pub fn from_manifest(manifest: ToolManifest, base_dir: PathBuf) -> Result<Self> {
        if manifest.command.trim().is_empty() {
            anyhow::bail!("manifest for '{}' has an empty command", manifest.name);
        }
        let descriptor = manifest.descriptor()?;
        descriptor.check().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(Self {
            manifest,
            descriptor,
            base_dir,
        })
    }

    /// Command line for a set of validated arguments
    fn command_line(&self, args: &ArgumentMap) -> Vec<String> {
        let mut argv = self.manifest.args.clone();
        for (name, value) in args.iter() {
            argv.push(format!("-{}", name));
            argv.push(value.to_string());
        }
        argv
    }

    /// Relative commands with a path component resolve against the manifest's directory
    fn program(&self) -> PathBuf {
        let command = Path::new(&self.manifest.command);
        if command.is_relative() && command.components().count() > 1 {
            self.base_dir.join(command)
        } else {
            command.to_path_buf()
        }
    }
}

#[async_trait::async_trait]
impl Tool for CommandTool {
    fn describe(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn execute(&self, args: ArgumentMap) -> ToolResult<ToolOutput> {
        let args = args.conform(&self.descriptor.parameters)?;
        let argv = self.command_line(&args);
        let program = self.program();

        tracing::debug!("Running {} {:?}", program.display(), argv);

        let child = tokio::process::Command::new(&program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", program.display()))?;

        let output = match self.manifest.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
                .await
                .map_err(|_| {
                    ToolError::execution(format!(
                        "'{}' timed out after {} seconds",
                        self.manifest.name, secs
                    ))
                })?,
            None => child.wait_with_output().await,
        }
        .with_context(|| format!("Failed to run {}", program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::execution(format!(
                "'{}' exited with {}: {}",
                self.manifest.name,
                output.status,
                stderr.trim()
            )));
        }

        Ok(ToolOutput::text(
            String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
        ))
    }
}

/// List manifest files in a directory, sorted by file name
pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read plugin directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == MANIFEST_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
