//! Remote Config settings surface.
//!
//! [`RemoteConfigSettings`] is a read-only snapshot combining the caller-writable flags with
//! the fetch telemetry recorded by the client. Changes go through
//! [`RemoteConfigSettingsUpdate`], which is validated as a whole before anything is applied.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::remote_config::error::{invalid_settings, RemoteConfigResult};
use crate::remote_config::storage::FetchStatus;

/// Default timeout for fetch operations (60 seconds).
pub const DEFAULT_FETCH_TIMEOUT_MILLIS: u64 = 60_000;
/// Default minimum interval between successful fetches (12 hours).
pub const DEFAULT_MINIMUM_FETCH_INTERVAL_MILLIS: u64 = 12 * 60 * 60 * 1_000;

/// Snapshot of the client-wide behaviour flags and fetch telemetry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfigSettings {
    developer_mode_enabled: bool,
    fetch_timeout_millis: u64,
    minimum_fetch_interval_millis: u64,
    last_fetch_time_millis: Option<u64>,
    last_fetch_status: FetchStatus,
}

impl RemoteConfigSettings {
    /// Returns `true` when fetch throttling is disabled.
    pub fn is_developer_mode_enabled(&self) -> bool {
        self.developer_mode_enabled
    }

    /// Returns the fetch timeout in milliseconds.
    pub fn fetch_timeout_millis(&self) -> u64 {
        self.fetch_timeout_millis
    }

    /// Returns the cache window applied when `fetch` is called without an explicit expiration.
    pub fn minimum_fetch_interval_millis(&self) -> u64 {
        self.minimum_fetch_interval_millis
    }

    /// Epoch milliseconds of the most recent successful fetch.
    pub fn last_fetch_time_millis(&self) -> Option<u64> {
        self.last_fetch_time_millis
    }

    pub fn last_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.last_fetch_time_millis
            .and_then(|millis| i64::try_from(millis).ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
    }

    pub fn last_fetch_status(&self) -> FetchStatus {
        self.last_fetch_status
    }

    pub(crate) fn with_fetch_metadata(
        mut self,
        last_fetch_time_millis: Option<u64>,
        last_fetch_status: FetchStatus,
    ) -> Self {
        self.last_fetch_time_millis = last_fetch_time_millis;
        self.last_fetch_status = last_fetch_status;
        self
    }

    /// Validates every field of `update` and applies it, or leaves `self` untouched.
    pub(crate) fn apply(&mut self, update: &RemoteConfigSettingsUpdate) -> RemoteConfigResult<()> {
        if let Some(fetch_timeout) = update.fetch_timeout_millis {
            validate_fetch_timeout(fetch_timeout)?;
        }

        if let Some(enabled) = update.developer_mode_enabled {
            self.developer_mode_enabled = enabled;
        }
        if let Some(fetch_timeout) = update.fetch_timeout_millis {
            self.fetch_timeout_millis = fetch_timeout;
        }
        if let Some(min_interval) = update.minimum_fetch_interval_millis {
            self.minimum_fetch_interval_millis = min_interval;
        }
        Ok(())
    }
}

impl Default for RemoteConfigSettings {
    fn default() -> Self {
        Self {
            developer_mode_enabled: false,
            fetch_timeout_millis: DEFAULT_FETCH_TIMEOUT_MILLIS,
            minimum_fetch_interval_millis: DEFAULT_MINIMUM_FETCH_INTERVAL_MILLIS,
            last_fetch_time_millis: None,
            last_fetch_status: FetchStatus::NoFetchYet,
        }
    }
}

/// Partial update to apply on top of existing settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoteConfigSettingsUpdate {
    #[serde(default, alias = "isDeveloperModeEnabled")]
    pub developer_mode_enabled: Option<bool>,
    #[serde(default)]
    pub fetch_timeout_millis: Option<u64>,
    #[serde(default)]
    pub minimum_fetch_interval_millis: Option<u64>,
}

impl RemoteConfigSettingsUpdate {
    pub fn developer_mode(enabled: bool) -> Self {
        Self {
            developer_mode_enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.developer_mode_enabled.is_none()
            && self.fetch_timeout_millis.is_none()
            && self.minimum_fetch_interval_millis.is_none()
    }

    /// Parses a settings object such as `{"isDeveloperModeEnabled": true}`.
    ///
    /// Unknown fields, wrong types and out-of-range values are rejected with
    /// `remote-config/invalid-settings`.
    pub fn from_json(value: &JsonValue) -> RemoteConfigResult<Self> {
        if !value.is_object() {
            return Err(invalid_settings("settings must be a JSON object"));
        }
        let update = Self::deserialize(value)
            .map_err(|err| invalid_settings(format!("malformed settings: {err}")))?;
        if let Some(fetch_timeout) = update.fetch_timeout_millis {
            validate_fetch_timeout(fetch_timeout)?;
        }
        Ok(update)
    }

    pub fn from_json_str(raw: &str) -> RemoteConfigResult<Self> {
        let value: JsonValue = serde_json::from_str(raw)
            .map_err(|err| invalid_settings(format!("settings are not valid JSON: {err}")))?;
        Self::from_json(&value)
    }
}

pub(crate) fn validate_fetch_timeout(value: u64) -> RemoteConfigResult<()> {
    if value == 0 {
        return Err(invalid_settings("fetch_timeout_millis must be greater than zero"));
    }
    Ok(())
}
