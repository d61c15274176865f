// Tool registry and discovery

use crate::descriptor::ToolDescriptor;
use crate::error::ToolError;
use crate::manifest::{manifest_files, CommandTool};
use crate::tool::Tool;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A registered tool and where it came from
#[derive(Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub origin: String,
    pub tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Authoritative name-to-tool mapping. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegistryEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from tool instances in order, last name wins
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut discovery = Discovery::new();
        for tool in tools {
            discovery.add_tool(tool);
        }
        discovery.discover().0
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| e.tool.clone())
    }

    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.tools.get(name)
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Fresh descriptors for every tool, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|e| e.tool.describe()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Drop tools by name, e.g. ones disabled in configuration
    pub fn without(mut self, names: &[String]) -> Self {
        for name in names {
            if self.tools.remove(name).is_some() {
                tracing::info!("Tool '{}' disabled by configuration", name);
            }
        }
        self
    }

    /// Registered names closest to an unknown one
    pub fn suggestions(&self, name: &str) -> Vec<String> {
        let mut scored: Vec<(usize, &String)> = self
            .tools
            .keys()
            .filter_map(|candidate| {
                let distance = edit_distance(name, candidate);
                let related = candidate.starts_with(name)
                    || name.starts_with(candidate.as_str())
                    || distance <= 3;
                related.then_some((distance, candidate))
            })
            .collect();
        scored.sort();
        scored.into_iter().take(3).map(|(_, n)| n.clone()).collect()
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        prev = current;
    }
    prev[b.len()]
}

type Loader = Box<dyn Fn() -> anyhow::Result<Arc<dyn Tool>> + Send + Sync>;

/// One place a tool may be loaded from
pub struct ToolCandidate {
    origin: String,
    loader: Loader,
}

impl ToolCandidate {
    pub fn new(
        origin: impl Into<String>,
        loader: impl Fn() -> anyhow::Result<Arc<dyn Tool>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            origin: origin.into(),
            loader: Box::new(loader),
        }
    }

    /// Load and self-check the tool. Panics in the loader become errors.
    fn load(&self) -> Result<(ToolDescriptor, Arc<dyn Tool>), ToolError> {
        let fail = |message: String| ToolError::DiscoveryLoad {
            origin: self.origin.clone(),
            message,
        };

        let tool = catch_unwind(AssertUnwindSafe(|| (self.loader)()))
            .map_err(|panic| fail(format!("loader panicked: {}", panic_message(&*panic))))?
            .map_err(|e| fail(format!("{:#}", e)))?;

        let descriptor = catch_unwind(AssertUnwindSafe(|| tool.describe()))
            .map_err(|panic| fail(format!("describe panicked: {}", panic_message(&*panic))))?;
        descriptor.check().map_err(|e| match e {
            ToolError::DiscoveryLoad { message, .. } => fail(message),
            other => fail(other.to_string()),
        })?;

        Ok((descriptor, tool))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A duplicate name resolved during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub name: String,
    pub replaced: String,
    pub by: String,
}

/// What a discovery pass found
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub loaded: Vec<String>,
    pub failures: Vec<ToolError>,
    pub overrides: Vec<Override>,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.overrides.is_empty()
    }
}

/// Ordered list of candidates. Later candidates win name collisions.
#[derive(Default)]
pub struct Discovery {
    candidates: Vec<ToolCandidate>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, candidate: ToolCandidate) -> &mut Self {
        self.candidates.push(candidate);
        self
    }

    /// Register an already-constructed tool.
    ///
    /// The origin is positional; `describe` only runs inside `discover`.
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let origin = format!("builtin#{}", self.candidates.len());
        self.add(ToolCandidate::new(origin, move || Ok(tool.clone())))
    }

    /// Add one candidate per manifest file in a plugin directory.
    ///
    /// An unreadable directory becomes a single candidate that fails to load,
    /// so it is reported like any other broken plugin.
    pub fn scan_dir(&mut self, dir: &Path) -> &mut Self {
        match manifest_files(dir) {
            Ok(files) => {
                for path in files {
                    self.add(manifest_candidate(path));
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                self.add(ToolCandidate::new(dir.display().to_string(), move || {
                    Err(anyhow::anyhow!("{}", message))
                }));
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Load every candidate in order and build the registry.
    ///
    /// A broken candidate is recorded in the report and skipped.
    pub fn discover(&self) -> (ToolRegistry, DiscoveryReport) {
        let mut tools: BTreeMap<String, RegistryEntry> = BTreeMap::new();
        let mut report = DiscoveryReport::default();

        for candidate in &self.candidates {
            let (descriptor, tool) = match candidate.load() {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!("{}", e);
                    report.failures.push(e);
                    continue;
                }
            };

            let entry = RegistryEntry {
                name: descriptor.name.clone(),
                origin: candidate.origin.clone(),
                tool,
            };

            if let Some(previous) = tools.insert(descriptor.name.clone(), entry) {
                tracing::warn!(
                    "Tool '{}' from {} overrides the one from {}",
                    descriptor.name,
                    candidate.origin,
                    previous.origin
                );
                report.overrides.push(Override {
                    name: descriptor.name.clone(),
                    replaced: previous.origin,
                    by: candidate.origin.clone(),
                });
            } else {
                tracing::debug!("Loaded tool '{}' from {}", descriptor.name, candidate.origin);
            }
            report.loaded.push(descriptor.name);
        }

        (ToolRegistry { tools }, report)
    }
}

fn manifest_candidate(path: PathBuf) -> ToolCandidate {
    ToolCandidate::new(path.display().to_string(), move || {
        Ok(Arc::new(CommandTool::from_file(&path)?) as Arc<dyn Tool>)
    })
}

/// Registry handle shared by the dispatcher and server.
///
/// Readers take a snapshot; a rebuild swaps the whole registry at once, so
/// nobody observes a partially populated map.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: RwLock<Arc<ToolRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn snapshot(&self) -> Arc<ToolRegistry> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the registry, returning the previous snapshot
    pub fn replace(&self, registry: ToolRegistry) -> Arc<ToolRegistry> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *current, Arc::new(registry))
    }
}
