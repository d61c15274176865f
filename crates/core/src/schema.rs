// Parameter schema, typed values and argument coercion

use crate::error::{ToolError, ToolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw caller input: parameter name to an untyped value.
///
/// CLI tokens arrive as JSON strings, remote payloads as whatever JSON the
/// caller sent. All type knowledge lives in [`ParamSpec::coerce`].
pub type RawArgs = BTreeMap<String, serde_json::Value>;

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
}

impl ParamType {
    /// JSON Schema type name for this parameter type
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "integer",
            Self::Float => "number",
            Self::Bool => "boolean",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            other => Err(format!("unsupported parameter type: {}", other)),
        }
    }
}

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Bool(_) => ParamType::Bool,
            Self::Int(_) => ParamType::Int,
            Self::Float(_) => ParamType::Float,
            Self::String(_) => ParamType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Declarative description of one accepted argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    /// Create a required parameter
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// Create an optional parameter with a default value
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        default: impl Into<ParamValue>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: Some(default.into()),
        }
    }

    /// Create an optional parameter that resolves to absent when not supplied
    pub fn optional_without_default(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// Default that applies at call time. Required parameters never default.
    pub fn effective_default(&self) -> Option<&ParamValue> {
        if self.required {
            None
        } else {
            self.default.as_ref()
        }
    }

    /// Coerce a raw input value to this parameter's declared type
    pub fn coerce(&self, raw: &serde_json::Value) -> ToolResult<ParamValue> {
        use serde_json::Value;

        let mismatch = || {
            ToolError::validation(
                &self.name,
                format!("expected {}, got {}", self.param_type, describe_raw(raw)),
            )
        };

        match (self.param_type, raw) {
            (ParamType::String, Value::String(s)) => Ok(ParamValue::String(s.clone())),
            (ParamType::String, Value::Number(n)) => Ok(ParamValue::String(n.to_string())),

            (ParamType::Int, Value::Number(n)) => n.as_i64().map(ParamValue::Int).ok_or_else(mismatch),
            (ParamType::Int, Value::String(s)) => {
                s.trim().parse::<i64>().map(ParamValue::Int).map_err(|_| mismatch())
            }

            (ParamType::Float, Value::Number(n)) => n.as_f64().map(ParamValue::Float).ok_or_else(mismatch),
            (ParamType::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(ParamValue::Float(f)),
                _ => Err(mismatch()),
            },

            (ParamType::Bool, Value::Bool(b)) => Ok(ParamValue::Bool(*b)),
            (ParamType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(ParamValue::Bool(true)),
                "false" | "0" => Ok(ParamValue::Bool(false)),
                _ => Err(mismatch()),
            },

            _ => Err(mismatch()),
        }
    }
}

fn describe_raw(raw: &serde_json::Value) -> String {
    match raw {
        serde_json::Value::String(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

/// Arguments after schema validation: every present value has its declared type.
///
/// Optional parameters with no supplied value and no default are simply
/// absent; tools apply any further defaulting themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentMap {
    values: BTreeMap<String, ParamValue>,
}

impl ArgumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for callers that construct arguments directly
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    /// Get a required string, failing with a validation error naming it
    pub fn require_str(&self, name: &str) -> ToolResult<&str> {
        self.get_str(name).ok_or_else(|| ToolError::missing(name))
    }

    /// Convert back to raw form, e.g. to re-run validation
    pub fn to_raw(&self) -> RawArgs {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    /// Re-validate these arguments against a parameter schema.
    ///
    /// Tools call this at the top of `execute` because they can be invoked
    /// directly, bypassing the dispatcher. Already-coerced values pass through
    /// unchanged and missing defaults are filled in.
    pub fn conform(&self, parameters: &BTreeMap<String, ParamSpec>) -> ToolResult<ArgumentMap> {
        validate(parameters, &self.to_raw())
    }
}

impl FromIterator<(String, ParamValue)> for ArgumentMap {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Validate raw input against a parameter schema, producing typed arguments.
///
/// Unknown parameters are ignored (logged at debug). A `null` value counts as
/// not supplied.
pub fn validate(
    parameters: &BTreeMap<String, ParamSpec>,
    raw: &RawArgs,
) -> ToolResult<ArgumentMap> {
    let mut values = BTreeMap::new();

    for (name, spec) in parameters {
        match raw.get(name).filter(|v| !v.is_null()) {
            Some(value) => {
                values.insert(name.clone(), spec.coerce(value)?);
            }
            None if spec.required => return Err(ToolError::missing(name)),
            None => {
                if let Some(default) = spec.effective_default() {
                    values.insert(name.clone(), default.clone());
                }
            }
        }
    }

    for name in raw.keys().filter(|k| !parameters.contains_key(*k)) {
        tracing::debug!("Ignoring unknown parameter '{}'", name);
    }

    Ok(ArgumentMap { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_schema() -> BTreeMap<String, ParamSpec> {
        [
            ParamSpec::required("folder", ParamType::String, "Folder to scan"),
            ParamSpec::optional("recursive", ParamType::Bool, true, "Descend into subfolders"),
            ParamSpec::optional("limit", ParamType::Int, 10i64, "Max files"),
            ParamSpec::optional_without_default("ratio", ParamType::Float, "Sampling ratio"),
        ]
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect()
    }

    fn raw(pairs: &[(&str, serde_json::Value)]) -> RawArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_bool_coercion() {
        let spec = ParamSpec::required("flag", ParamType::Bool, "");
        for (input, expected) in [("true", true), ("TRUE", true), ("1", true), ("False", false), ("0", false)] {
            assert_eq!(spec.coerce(&json!(input)).unwrap(), ParamValue::Bool(expected));
        }
        assert_eq!(spec.coerce(&json!(true)).unwrap(), ParamValue::Bool(true));

        let err = spec.coerce(&json!("yes")).unwrap_err();
        assert_eq!(err.parameter(), Some("flag"));
        assert!(err.to_string().contains("expected bool"));
        assert!(err.to_string().contains("'yes'"));
    }

    #[test]
    fn test_numeric_coercion() {
        let int = ParamSpec::required("n", ParamType::Int, "");
        assert_eq!(int.coerce(&json!("10")).unwrap(), ParamValue::Int(10));
        assert_eq!(int.coerce(&json!(-3)).unwrap(), ParamValue::Int(-3));
        assert!(int.coerce(&json!("ten")).is_err());
        assert!(int.coerce(&json!(1.5)).is_err());
        assert!(int.coerce(&json!(true)).is_err());

        let float = ParamSpec::required("x", ParamType::Float, "");
        assert_eq!(float.coerce(&json!("2.5")).unwrap(), ParamValue::Float(2.5));
        assert_eq!(float.coerce(&json!(4)).unwrap(), ParamValue::Float(4.0));
        assert!(float.coerce(&json!("NaN")).is_err());
        assert!(float.coerce(&json!("abc")).is_err());
    }

    #[test]
    fn test_string_passes_through() {
        let spec = ParamSpec::required("s", ParamType::String, "");
        assert_eq!(spec.coerce(&json!(" a b ")).unwrap(), ParamValue::from(" a b "));
        assert_eq!(spec.coerce(&json!(42)).unwrap(), ParamValue::from("42"));
        // a bare CLI flag arrives as `true` and is not a string value
        assert!(spec.coerce(&json!(true)).is_err());
        assert!(spec.coerce(&json!(["a"])).is_err());
    }

    #[test]
    fn test_validate_applies_defaults() {
        let args = validate(&counter_schema(), &raw(&[("folder", json!("."))])).unwrap();
        assert_eq!(args.get_str("folder"), Some("."));
        assert_eq!(args.get_bool("recursive"), Some(true));
        assert_eq!(args.get_int("limit"), Some(10));
        assert!(!args.contains("ratio"));
    }

    #[test]
    fn test_validate_missing_required() {
        let err = validate(&counter_schema(), &raw(&[("recursive", json!("false"))])).unwrap_err();
        assert_eq!(err.parameter(), Some("folder"));
        assert!(err.to_string().contains("missing required parameter"));
    }

    #[test]
    fn test_validate_ignores_unknown_and_null() {
        let args = validate(
            &counter_schema(),
            &raw(&[
                ("folder", json!("src")),
                ("verbose", json!("true")),
                ("limit", serde_json::Value::Null),
            ]),
        )
        .unwrap();
        assert!(!args.contains("verbose"));
        assert_eq!(args.get_int("limit"), Some(10));
    }

    #[test]
    fn test_validation_totality() {
        // Every outcome is either a fully typed map or a named validation error
        let schema = counter_schema();
        let inputs = [
            json!("x"),
            json!("1"),
            json!("0.5"),
            json!("true"),
            json!(7),
            json!(false),
            json!(null),
            json!({}),
        ];
        for folder in &inputs {
            for recursive in &inputs {
                for ratio in &inputs {
                    let input = raw(&[
                        ("folder", folder.clone()),
                        ("recursive", recursive.clone()),
                        ("ratio", ratio.clone()),
                    ]);
                    match validate(&schema, &input) {
                        Ok(args) => {
                            for (name, spec) in &schema {
                                if spec.required {
                                    assert!(args.contains(name));
                                }
                                if let Some(value) = args.get(name) {
                                    assert_eq!(value.param_type(), spec.param_type);
                                }
                            }
                        }
                        Err(err) => {
                            let param = err.parameter().expect("validation error names a parameter");
                            assert!(schema.contains_key(param));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_conform_is_idempotent() {
        let schema = counter_schema();
        let args = validate(&schema, &raw(&[("folder", json!("."))])).unwrap();
        assert_eq!(args.conform(&schema).unwrap(), args);

        let direct = ArgumentMap::new().with("folder", "src").with("limit", "5");
        let conformed = direct.conform(&schema).unwrap();
        assert_eq!(conformed.get_int("limit"), Some(5));
        assert_eq!(conformed.get_bool("recursive"), Some(true));
    }

    #[test]
    fn test_required_ignores_default() {
        let mut spec = ParamSpec::required("name", ParamType::String, "");
        spec.default = Some(ParamValue::from("ignored"));
        let schema: BTreeMap<_, _> = [(spec.name.clone(), spec)].into_iter().collect();
        assert!(validate(&schema, &RawArgs::new()).is_err());
    }

    #[test]
    fn test_param_type_parsing() {
        assert_eq!("integer".parse::<ParamType>().unwrap(), ParamType::Int);
        assert_eq!("BOOL".parse::<ParamType>().unwrap(), ParamType::Bool);
        assert!("list".parse::<ParamType>().is_err());
    }
}
