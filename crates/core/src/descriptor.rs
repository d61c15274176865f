// Tool descriptor: the self-description every tool produces

use crate::error::{ToolError, ToolResult};
use crate::schema::{validate, ArgumentMap, ParamSpec, RawArgs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name, description and parameter schema of a tool.
///
/// Built fresh on every `describe()` call; never cached by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter, keyed by its name
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.parameters.insert(param.name.clone(), param);
        self
    }

    /// First line of the description, for aggregate listings
    pub fn summary(&self) -> &str {
        self.description.lines().next().unwrap_or_default().trim()
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.values().filter(|p| p.required)
    }

    pub fn optional_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.values().filter(|p| !p.required)
    }

    /// Validate and coerce raw caller input against this descriptor
    pub fn validate_args(&self, raw: &RawArgs) -> ToolResult<ArgumentMap> {
        validate(&self.parameters, raw)
    }

    /// Structural self-check, run once per tool at discovery time
    pub fn check(&self) -> ToolResult<()> {
        let fail = |message: String| ToolError::DiscoveryLoad {
            origin: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(fail("tool name is empty".to_string()));
        }
        if self.name.starts_with('-') || self.name.chars().any(char::is_whitespace) {
            return Err(fail(format!("tool name '{}' is not a valid command name", self.name)));
        }

        for (key, spec) in &self.parameters {
            if key != &spec.name {
                return Err(fail(format!(
                    "parameter key '{}' does not match its name '{}'",
                    key, spec.name
                )));
            }
            if key.is_empty() || key.starts_with('-') {
                return Err(fail(format!("invalid parameter name '{}'", key)));
            }
            match &spec.default {
                Some(_) if spec.required => {
                    tracing::warn!(
                        "Tool '{}': default of required parameter '{}' is ignored",
                        self.name,
                        key
                    );
                }
                Some(default) if default.param_type() != spec.param_type => {
                    return Err(fail(format!(
                        "default for '{}' is {}, declared type is {}",
                        key,
                        default.param_type(),
                        spec.param_type
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// JSON Schema for the parameters, as advertised over the server protocol
    pub fn input_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .values()
            .map(|p| {
                let mut prop = json_schema_property(p.param_type.json_schema_type(), &p.description);
                if let Some(default) = p.effective_default() {
                    prop["default"] = default.to_json();
                }
                (p.name.clone(), prop)
            })
            .collect();
        let required: Vec<&str> = self.required_params().map(|p| p.name.as_str()).collect();

        json_schema_object(serde_json::Value::Object(properties), required)
    }
}

fn json_schema_object(properties: serde_json::Value, required: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn json_schema_property(schema_type: &str, description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": schema_type,
        "description": description
    })
}
