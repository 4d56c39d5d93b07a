//! Loading default values from bundled resources.
//!
//! Resources are JSON objects whose values are booleans, numbers or strings:
//!
//! ```json
//! { "welcome_message": "Hello", "experiment_enabled": false, "max_items": 20 }
//! ```
//!
//! Nested objects, arrays and `null` are rejected as parse errors rather than coerced.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value as JsonValue;

use crate::remote_config::constants::RESOURCE_FILE_EXTENSION;
use crate::remote_config::error::{
    internal_error, resource_not_found, resource_parse_error, RemoteConfigResult,
};
use crate::remote_config::lock;
use crate::remote_config::value::{ConfigDefaults, ParameterValue};

/// Platform collaborator resolving a resource name to a set of defaults.
#[async_trait::async_trait]
pub trait DefaultsResourceLoader: Send + Sync {
    async fn load_defaults(&self, resource_name: &str) -> RemoteConfigResult<ConfigDefaults>;
}

/// Parses a JSON defaults document.
pub fn parse_defaults_json(resource_name: &str, raw: &str) -> RemoteConfigResult<ConfigDefaults> {
    let document: JsonValue = serde_json::from_str(raw).map_err(|err| {
        resource_parse_error(format!("resource '{resource_name}' is not valid JSON: {err}"))
    })?;

    let JsonValue::Object(entries) = document else {
        return Err(resource_parse_error(format!(
            "resource '{resource_name}' must contain a JSON object"
        )));
    };

    let mut defaults = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let parsed = match value {
            JsonValue::Bool(flag) => ParameterValue::Boolean(flag),
            JsonValue::Number(number) => match number.as_f64() {
                Some(number) => ParameterValue::Number(number),
                None => {
                    return Err(resource_parse_error(format!(
                        "resource '{resource_name}': value for '{key}' is out of range"
                    )))
                }
            },
            JsonValue::String(text) => ParameterValue::String(text),
            other => {
                return Err(resource_parse_error(format!(
                    "resource '{resource_name}': value for '{key}' must be a boolean, number or string, found {other}"
                )))
            }
        };
        defaults.insert(key, parsed);
    }
    Ok(defaults)
}

/// Loader backed by an in-process table of resource name to JSON text.
#[derive(Default)]
pub struct InMemoryResourceLoader {
    resources: Mutex<HashMap<String, String>>,
}

impl InMemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&self, name: impl Into<String>, contents: impl Into<String>) {
        lock(&self.resources).insert(name.into(), contents.into());
    }
}

#[async_trait::async_trait]
impl DefaultsResourceLoader for InMemoryResourceLoader {
    async fn load_defaults(&self, resource_name: &str) -> RemoteConfigResult<ConfigDefaults> {
        let raw = lock(&self.resources)
            .get(resource_name)
            .cloned()
            .ok_or_else(|| resource_not_found(format!("resource '{resource_name}' not found")))?;
        parse_defaults_json(resource_name, &raw)
    }
}

/// Loader reading `<root>/<name>` (or `<root>/<name>.json` when `name` has no extension).
#[derive(Clone, Debug)]
pub struct DirectoryResourceLoader {
    root: PathBuf,
}

impl DirectoryResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, resource_name: &str) -> RemoteConfigResult<PathBuf> {
        let relative = Path::new(resource_name);
        let is_plain = !resource_name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(resource_not_found(format!(
                "resource name '{resource_name}' does not name a file inside {}",
                self.root.display()
            )));
        }

        let mut path = self.root.join(relative);
        if path.extension().is_none() {
            path.set_extension(RESOURCE_FILE_EXTENSION);
        }
        Ok(path)
    }
}

#[async_trait::async_trait]
impl DefaultsResourceLoader for DirectoryResourceLoader {
    async fn load_defaults(&self, resource_name: &str) -> RemoteConfigResult<ConfigDefaults> {
        let path = self.resolve(resource_name)?;
        let raw = fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => {
                resource_not_found(format!("resource file {} not found", path.display()))
            }
            ErrorKind::InvalidData => resource_parse_error(format!(
                "resource file {} is not valid UTF-8",
                path.display()
            )),
            _ => internal_error(format!(
                "failed to read resource file {}: {err}",
                path.display()
            )),
        })?;
        parse_defaults_json(resource_name, &raw)
    }
}
