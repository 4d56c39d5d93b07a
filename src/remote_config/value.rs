//! Remote Config value helpers.
//!
//! A [`RemoteConfigValue`] couples the raw parameter (if any) with the place it was resolved
//! from. Values are rebuilt on every read so the reported source always matches the state that
//! was committed when the read happened.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::remote_config::error::{invalid_argument, RemoteConfigError};

/// A primitive parameter value as delivered by the backend or supplied as a default.
///
/// Equality is reflexive: two `NaN` numbers compare equal, so an unchanged template never
/// looks different from itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParameterValue::Boolean(a), ParameterValue::Boolean(b)) => a == b,
            (ParameterValue::Number(a), ParameterValue::Number(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (ParameterValue::String(a), ParameterValue::String(b)) => a == b,
            _ => false,
        }
    }
}

/// Mapping from parameter key to value, used for defaults, fetched and active sets alike.
pub type ParameterMap = HashMap<String, ParameterValue>;

/// Defaults supplied wholesale through `set_defaults`.
pub type ConfigDefaults = ParameterMap;

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Boolean(flag) => write!(f, "{flag}"),
            ParameterValue::Number(number) => write!(f, "{number}"),
            ParameterValue::String(text) => f.write_str(text),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Boolean(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Number(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Number(value as f64)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Number(f64::from(value))
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

/// Indicates where a Remote Config value originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteConfigValueSource {
    /// Value fetched from the backend and activated.
    Remote,
    /// Default value supplied by the client via `set_defaults`.
    Default,
    /// Static fallback used when the key has no remote or default entry.
    Static,
}

impl RemoteConfigValueSource {
    /// Returns the wire identifier (`remote`, `default`, or `static`).
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteConfigValueSource::Remote => "remote",
            RemoteConfigValueSource::Default => "default",
            RemoteConfigValueSource::Static => "static",
        }
    }
}

impl fmt::Display for RemoteConfigValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteConfigValueSource {
    type Err = RemoteConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(RemoteConfigValueSource::Remote),
            "default" => Ok(RemoteConfigValueSource::Default),
            "static" => Ok(RemoteConfigValueSource::Static),
            other => Err(invalid_argument(format!(
                "unrecognized value source '{other}'"
            ))),
        }
    }
}

/// Represents a Remote Config parameter value with typed accessors.
///
/// Missing keys map to a [`RemoteConfigValueSource::Static`] value with no payload; its typed
/// accessors return `""`, `false` and `0.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteConfigValue {
    source: RemoteConfigValueSource,
    value: Option<ParameterValue>,
}

impl RemoteConfigValue {
    const DEFAULT_BOOLEAN: bool = false;
    const DEFAULT_NUMBER: f64 = 0.0;
    const BOOLEAN_TRUTHY_VALUES: [&'static str; 6] = ["1", "true", "t", "yes", "y", "on"];

    pub(crate) fn new(source: RemoteConfigValueSource, value: ParameterValue) -> Self {
        Self {
            source,
            value: Some(value),
        }
    }

    pub(crate) fn static_value() -> Self {
        Self {
            source: RemoteConfigValueSource::Static,
            value: None,
        }
    }

    /// Returns the underlying parameter, or `None` for static fallbacks.
    pub fn value(&self) -> Option<&ParameterValue> {
        self.value.as_ref()
    }

    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the value rendered as a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use remote_config_client::remote_config::value::RemoteConfigValue;
    ///
    /// let value = RemoteConfigValue::default();
    /// assert_eq!(value.as_string(), "");
    /// ```
    pub fn as_string(&self) -> String {
        self.value
            .as_ref()
            .map(ParameterValue::to_string)
            .unwrap_or_default()
    }

    /// Returns the value interpreted as a boolean.
    ///
    /// Booleans are returned as-is. Other values are `true` when their string form
    /// case-insensitively equals one of `{"1", "true", "t", "yes", "y", "on"}`.
    pub fn as_bool(&self) -> bool {
        match &self.value {
            None => Self::DEFAULT_BOOLEAN,
            Some(ParameterValue::Boolean(flag)) => *flag,
            Some(other) => {
                let text = other.to_string();
                Self::BOOLEAN_TRUTHY_VALUES
                    .iter()
                    .any(|truthy| text.eq_ignore_ascii_case(truthy))
            }
        }
    }

    /// Returns the value interpreted as a number.
    ///
    /// Parsing failures and `NaN` fall back to `0.0`; booleans map to `1.0` and `0.0`.
    pub fn as_number(&self) -> f64 {
        match &self.value {
            None => Self::DEFAULT_NUMBER,
            Some(ParameterValue::Number(number)) if number.is_nan() => Self::DEFAULT_NUMBER,
            Some(ParameterValue::Number(number)) => *number,
            Some(ParameterValue::Boolean(true)) => 1.0,
            Some(ParameterValue::Boolean(false)) => 0.0,
            Some(ParameterValue::String(text)) => match text.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_nan() => Self::DEFAULT_NUMBER,
                Ok(parsed) => parsed,
                Err(_) => Self::DEFAULT_NUMBER,
            },
        }
    }

    /// Returns the source of the value (`remote`, `default`, `static`).
    pub fn source(&self) -> RemoteConfigValueSource {
        self.source
    }
}

impl Default for RemoteConfigValue {
    fn default() -> Self {
        Self::static_value()
    }
}
