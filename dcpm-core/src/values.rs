//! Configuration values.
//!
//! Values are loaded from YAML documents into a [`Value`] tree. A project's
//! `values.yaml` provides defaults; an override document supplied at render
//! or install time is deep-merged on top of it:
//!
//! - mapping over mapping merges key by key, recursively
//! - any other override leaf (scalar or sequence) replaces the default wholesale
//! - a `null` override leaf keeps the default

use crate::error::{DcpmError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument};

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    /// Truthiness used by template conditionals.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Sequence(items) => !items.is_empty(),
            Self::Mapping(map) => !map.is_empty(),
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Follow one path segment: a mapping key, or an index into a sequence.
    pub fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Self::Mapping(map) => map.get(segment),
            Self::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Text substituted for this value in a template.
    ///
    /// Scalars render bare, `null` renders empty, and collections render as
    /// inline JSON (valid YAML flow syntax).
    pub fn to_template_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::String(s) => s.clone(),
            Self::Sequence(_) | Self::Mapping(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Deep-merge `overrides` on top of `self`.
    pub fn merge(self, overrides: Value) -> Value {
        match (self, overrides) {
            (Self::Mapping(mut base), Self::Mapping(overrides)) => {
                for (key, value) in overrides {
                    let merged = match base.remove(&key) {
                        Some(existing) => existing.merge(value),
                        None => value,
                    };
                    base.insert(key, merged);
                }
                Self::Mapping(base)
            }
            (base, Self::Null) => base,
            (_, overrides) => overrides,
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::String(n.to_string())
                }
            }
            serde_yaml::Value::String(s) => Self::String(s),
            serde_yaml::Value::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Self::Mapping(
                map.into_iter().map(|(k, v)| (key_to_string(k), Value::from(v))).collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_template_string())
    }
}

/// Mapping keys are always strings; other YAML scalars are stringified.
fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        other => Value::from(other).to_template_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() && f > 0.0 {
        ".inf".to_string()
    } else if f.is_infinite() {
        "-.inf".to_string()
    } else {
        f.to_string()
    }
}

/// Effective values for one render: always a mapping at the top level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueTree {
    root: BTreeMap<String, Value>,
}

impl ValueTree {
    /// Load a values document.
    ///
    /// An empty document yields an empty tree. Syntax errors and documents
    /// whose top level is not a mapping fail with `ConfigParse` naming the file.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DcpmError::io(path, e))?;
        let tree = Self::parse(&content).map_err(|reason| DcpmError::ConfigParse {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(path = %path.display(), keys = tree.root.len(), "Loaded values");
        Ok(tree)
    }

    /// Load an override document supplied by the caller.
    ///
    /// Unlike project defaults, a missing override file is reported as
    /// `ValuesFileNotFound`.
    pub fn load_override(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DcpmError::ValuesFileNotFound { path: path.to_path_buf() });
        }
        Self::load(path)
    }

    /// Parse a values document from a string.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        match Value::from(raw) {
            Value::Null => Ok(Self::default()),
            Value::Mapping(root) => Ok(Self { root }),
            _ => Err("top-level value must be a mapping".to_string()),
        }
    }

    /// Deep-merge `overrides` on top of this tree.
    pub fn merge(self, overrides: ValueTree) -> ValueTree {
        match Value::Mapping(self.root).merge(Value::Mapping(overrides.root)) {
            Value::Mapping(root) => Self { root },
            // merging two mappings always yields a mapping
            _ => Self::default(),
        }
    }

    /// Merge with an optional override tree.
    pub fn merge_opt(self, overrides: Option<ValueTree>) -> ValueTree {
        match overrides {
            Some(overrides) => self.merge(overrides),
            None => self,
        }
    }

    /// Look up a dotted key path such as `web.ports.0`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Values scoped to a dependency: the mapping stored under its name, if any.
    pub fn scoped(&self, name: &str) -> Option<ValueTree> {
        self.root.get(name).and_then(Value::as_mapping).map(|map| Self { root: map.clone() })
    }

    /// The tree as a single mapping value.
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.root.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}
