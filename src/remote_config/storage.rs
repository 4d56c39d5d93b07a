//! Remote Config storage cache and metadata handling.
//!
//! [`RemoteConfigStorage`] is the persistence seam; [`RemoteConfigStorageCache`] mirrors the
//! committed state in memory so reads never wait on storage or on an in-flight fetch. Writes go
//! to storage first and are published to the cache only once storage accepted them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::remote_config::constants::{
    RC_CUSTOM_SIGNAL_KEY_MAX_LENGTH, RC_CUSTOM_SIGNAL_MAX_ALLOWED_SIGNALS,
    RC_CUSTOM_SIGNAL_VALUE_MAX_LENGTH,
};
use crate::remote_config::error::{invalid_argument, RemoteConfigError, RemoteConfigResult};
use crate::remote_config::lock;
use crate::remote_config::value::ParameterMap;

pub type CustomSignals = HashMap<String, JsonValue>;

/// Outcome of the last fetch attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStatus {
    #[default]
    NoFetchYet,
    Success,
    Failure,
    Throttled,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::NoFetchYet => "no-fetch-yet",
            FetchStatus::Success => "success",
            FetchStatus::Failure => "failure",
            FetchStatus::Throttled => "throttled",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchStatus {
    type Err = RemoteConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-fetch-yet" => Ok(FetchStatus::NoFetchYet),
            "success" => Ok(FetchStatus::Success),
            "failure" => Ok(FetchStatus::Failure),
            "throttled" => Ok(FetchStatus::Throttled),
            other => Err(invalid_argument(format!("unrecognized fetch status '{other}'"))),
        }
    }
}

/// A complete parameter set together with the backend metadata that identified it.
///
/// Used both for the staged (fetched) set and for the served (active) set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub parameters: ParameterMap,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub template_version: Option<u64>,
}

impl ConfigSnapshot {
    pub fn new(parameters: ParameterMap) -> Self {
        Self {
            parameters,
            etag: None,
            template_version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Abstraction over the persistence layer used to store Remote Config state.
#[async_trait::async_trait]
pub trait RemoteConfigStorage: Send + Sync {
    async fn get_last_fetch_status(&self) -> RemoteConfigResult<Option<FetchStatus>>;
    async fn set_last_fetch_status(&self, status: FetchStatus) -> RemoteConfigResult<()>;

    async fn get_last_successful_fetch_timestamp_millis(&self) -> RemoteConfigResult<Option<u64>>;
    async fn set_last_successful_fetch_timestamp_millis(
        &self,
        timestamp: u64,
    ) -> RemoteConfigResult<()>;

    async fn get_active_config(&self) -> RemoteConfigResult<Option<ConfigSnapshot>>;
    async fn set_active_config(&self, config: ConfigSnapshot) -> RemoteConfigResult<()>;

    async fn get_custom_signals(&self) -> RemoteConfigResult<Option<CustomSignals>>;
    async fn set_custom_signals(&self, signals: CustomSignals) -> RemoteConfigResult<()>;
}

/// Storage backend that keeps everything in process memory.
#[derive(Default)]
pub struct InMemoryRemoteConfigStorage {
    inner: Mutex<StorageRecord>,
}

#[derive(Clone, Debug, Default)]
struct StorageRecord {
    last_fetch_status: Option<FetchStatus>,
    last_successful_fetch_timestamp_millis: Option<u64>,
    active_config: Option<ConfigSnapshot>,
    custom_signals: Option<CustomSignals>,
}

impl InMemoryRemoteConfigStorage {
    fn record(&self) -> std::sync::MutexGuard<'_, StorageRecord> {
        lock(&self.inner)
    }
}

#[async_trait::async_trait]
impl RemoteConfigStorage for InMemoryRemoteConfigStorage {
    async fn get_last_fetch_status(&self) -> RemoteConfigResult<Option<FetchStatus>> {
        Ok(self.record().last_fetch_status)
    }

    async fn set_last_fetch_status(&self, status: FetchStatus) -> RemoteConfigResult<()> {
        self.record().last_fetch_status = Some(status);
        Ok(())
    }

    async fn get_last_successful_fetch_timestamp_millis(&self) -> RemoteConfigResult<Option<u64>> {
        Ok(self.record().last_successful_fetch_timestamp_millis)
    }

    async fn set_last_successful_fetch_timestamp_millis(
        &self,
        timestamp: u64,
    ) -> RemoteConfigResult<()> {
        self.record().last_successful_fetch_timestamp_millis = Some(timestamp);
        Ok(())
    }

    async fn get_active_config(&self) -> RemoteConfigResult<Option<ConfigSnapshot>> {
        Ok(self.record().active_config.clone())
    }

    async fn set_active_config(&self, config: ConfigSnapshot) -> RemoteConfigResult<()> {
        self.record().active_config = Some(config);
        Ok(())
    }

    async fn get_custom_signals(&self) -> RemoteConfigResult<Option<CustomSignals>> {
        Ok(self.record().custom_signals.clone())
    }

    async fn set_custom_signals(&self, signals: CustomSignals) -> RemoteConfigResult<()> {
        self.record().custom_signals = Some(signals);
        Ok(())
    }
}

/// In-memory mirror of the committed state held by a [`RemoteConfigStorage`].
pub struct RemoteConfigStorageCache {
    storage: Arc<dyn RemoteConfigStorage>,
    last_fetch_status: Mutex<FetchStatus>,
    last_successful_fetch_timestamp_millis: Mutex<Option<u64>>,
    active_config: Mutex<Arc<ConfigSnapshot>>,
    custom_signals: Mutex<Option<CustomSignals>>,
}

impl fmt::Debug for RemoteConfigStorageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfigStorageCache")
            .field("last_fetch_status", &self.last_fetch_status())
            .field(
                "last_successful_fetch_timestamp_millis",
                &self.last_successful_fetch_timestamp_millis(),
            )
            .field("active_config_size", &self.active_config().parameters.len())
            .field("active_config_etag", &self.active_config().etag)
            .field(
                "custom_signals_count",
                &self.custom_signals().map(|signals| signals.len()).unwrap_or(0),
            )
            .finish()
    }
}

impl RemoteConfigStorageCache {
    pub fn new(storage: Arc<dyn RemoteConfigStorage>) -> Self {
        Self {
            storage,
            last_fetch_status: Mutex::new(FetchStatus::NoFetchYet),
            last_successful_fetch_timestamp_millis: Mutex::new(None),
            active_config: Mutex::new(Arc::new(ConfigSnapshot::default())),
            custom_signals: Mutex::new(None),
        }
    }

    pub async fn hydrate_from_storage(&self) -> RemoteConfigResult<()> {
        if let Some(status) = self.storage.get_last_fetch_status().await? {
            *lock(&self.last_fetch_status) = status;
        }
        if let Some(timestamp) = self
            .storage
            .get_last_successful_fetch_timestamp_millis()
            .await?
        {
            *lock(&self.last_successful_fetch_timestamp_millis) = Some(timestamp);
        }
        if let Some(config) = self.storage.get_active_config().await? {
            *lock(&self.active_config) = Arc::new(config);
        }
        if let Some(signals) = self.storage.get_custom_signals().await? {
            *lock(&self.custom_signals) = Some(signals);
        }
        Ok(())
    }

    pub fn last_fetch_status(&self) -> FetchStatus {
        *lock(&self.last_fetch_status)
    }

    pub async fn set_last_fetch_status(&self, status: FetchStatus) -> RemoteConfigResult<()> {
        self.storage.set_last_fetch_status(status).await?;
        *lock(&self.last_fetch_status) = status;
        Ok(())
    }

    pub fn last_successful_fetch_timestamp_millis(&self) -> Option<u64> {
        *lock(&self.last_successful_fetch_timestamp_millis)
    }

    /// Records a successful fetch time. Never moves the timestamp backwards.
    pub async fn set_last_successful_fetch_timestamp_millis(
        &self,
        timestamp: u64,
    ) -> RemoteConfigResult<()> {
        let timestamp = self
            .last_successful_fetch_timestamp_millis()
            .map_or(timestamp, |previous| previous.max(timestamp));
        self.storage
            .set_last_successful_fetch_timestamp_millis(timestamp)
            .await?;
        *lock(&self.last_successful_fetch_timestamp_millis) = Some(timestamp);
        Ok(())
    }

    /// Returns the committed active set. The snapshot is shared, never partially updated.
    pub fn active_config(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&lock(&self.active_config))
    }

    pub async fn set_active_config(&self, config: ConfigSnapshot) -> RemoteConfigResult<()> {
        self.storage.set_active_config(config.clone()).await?;
        *lock(&self.active_config) = Arc::new(config);
        Ok(())
    }

    pub fn custom_signals(&self) -> Option<CustomSignals> {
        lock(&self.custom_signals).clone()
    }

    /// Merges `updates` into the stored signals and returns the resulting set.
    pub async fn set_custom_signals(&self, updates: CustomSignals) -> RemoteConfigResult<CustomSignals> {
        let merged = merge_custom_signals(self.custom_signals(), &updates)?;
        self.storage.set_custom_signals(merged.clone()).await?;
        *lock(&self.custom_signals) = Some(merged.clone());
        Ok(merged)
    }
}

fn merge_custom_signals(
    existing: Option<CustomSignals>,
    updates: &CustomSignals,
) -> RemoteConfigResult<CustomSignals> {
    let mut merged = existing.unwrap_or_default();

    for (key, value) in updates {
        if key.chars().count() > RC_CUSTOM_SIGNAL_KEY_MAX_LENGTH {
            return Err(invalid_argument(format!(
                "custom signal key '{key}' exceeds {RC_CUSTOM_SIGNAL_KEY_MAX_LENGTH} characters"
            )));
        }

        let normalized = match value {
            JsonValue::Null => {
                merged.remove(key);
                continue;
            }
            JsonValue::Number(number) => JsonValue::String(number.to_string()),
            JsonValue::String(text) => {
                if text.chars().count() > RC_CUSTOM_SIGNAL_VALUE_MAX_LENGTH {
                    return Err(invalid_argument(format!(
                        "custom signal '{key}' exceeds {RC_CUSTOM_SIGNAL_VALUE_MAX_LENGTH} characters"
                    )));
                }
                JsonValue::String(text.clone())
            }
            _ => {
                return Err(invalid_argument(format!(
                    "custom signal '{key}' must be a string or a number"
                )))
            }
        };
        merged.insert(key.clone(), normalized);
    }

    if merged.len() > RC_CUSTOM_SIGNAL_MAX_ALLOWED_SIGNALS {
        return Err(invalid_argument(format!(
            "custom signals limit of {} exceeded",
            RC_CUSTOM_SIGNAL_MAX_ALLOWED_SIGNALS
        )));
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_config::value::ParameterValue;

    #[tokio::test(flavor = "current_thread")]
    async fn cache_roundtrips_metadata() {
        let storage: Arc<dyn RemoteConfigStorage> = Arc::new(InMemoryRemoteConfigStorage::default());
        let cache = RemoteConfigStorageCache::new(storage.clone());

        cache.hydrate_from_storage().await.unwrap();

        assert_eq!(cache.last_fetch_status(), FetchStatus::NoFetchYet);
        assert_eq!(cache.last_successful_fetch_timestamp_millis(), None);
        assert!(cache.active_config().is_empty());

        cache.set_last_fetch_status(FetchStatus::Success).await.unwrap();
        cache.set_last_successful_fetch_timestamp_millis(1234).await.unwrap();
        cache
            .set_active_config(ConfigSnapshot {
                parameters: HashMap::from([(String::from("feature"), ParameterValue::from("on"))]),
                etag: Some(String::from("etag")),
                template_version: Some(42),
            })
            .await
            .unwrap();
        cache
            .set_custom_signals(HashMap::from([(String::from("tier"), JsonValue::from("gold"))]))
            .await
            .unwrap();

        // A second cache over the same storage sees the committed state once hydrated.
        let cache2 = RemoteConfigStorageCache::new(storage);
        cache2.hydrate_from_storage().await.unwrap();
        assert_eq!(cache2.last_fetch_status(), FetchStatus::Success);
        assert_eq!(cache2.last_successful_fetch_timestamp_millis(), Some(1234));
        let active = cache2.active_config();
        assert_eq!(active.parameters.get("feature"), Some(&ParameterValue::from("on")));
        assert_eq!(active.etag.as_deref(), Some("etag"));
        assert_eq!(active.template_version, Some(42));
        assert_eq!(
            cache2.custom_signals().and_then(|signals| signals.get("tier").cloned()),
            Some(JsonValue::from("gold"))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn fetch_timestamp_never_moves_backwards() {
        let cache = RemoteConfigStorageCache::new(Arc::new(InMemoryRemoteConfigStorage::default()));
        cache.set_last_successful_fetch_timestamp_millis(5_000).await.unwrap();
        cache.set_last_successful_fetch_timestamp_millis(4_000).await.unwrap();
        assert_eq!(cache.last_successful_fetch_timestamp_millis(), Some(5_000));
        cache.set_last_successful_fetch_timestamp_millis(6_000).await.unwrap();
        assert_eq!(cache.last_successful_fetch_timestamp_millis(), Some(6_000));
    }

    #[test]
    fn merge_normalizes_numbers_and_removes_nulls() {
        let existing = HashMap::from([
            (String::from("keep"), JsonValue::from("yes")),
            (String::from("drop"), JsonValue::from("soon")),
        ]);
        let updates = HashMap::from([
            (String::from("drop"), JsonValue::Null),
            (String::from("level"), JsonValue::from(7)),
        ]);

        let merged = merge_custom_signals(Some(existing), &updates).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["keep"], JsonValue::from("yes"));
        assert_eq!(merged["level"], JsonValue::from("7"));
    }

    #[test]
    fn merge_enforces_limits() {
        let long_key = "k".repeat(RC_CUSTOM_SIGNAL_KEY_MAX_LENGTH + 1);
        let err = merge_custom_signals(None, &HashMap::from([(long_key, JsonValue::from("v"))]))
            .unwrap_err();
        assert_eq!(err.code_str(), "remote-config/invalid-argument");

        let long_value = "v".repeat(RC_CUSTOM_SIGNAL_VALUE_MAX_LENGTH + 1);
        assert!(merge_custom_signals(
            None,
            &HashMap::from([(String::from("k"), JsonValue::from(long_value))])
        )
        .is_err());

        assert!(merge_custom_signals(
            None,
            &HashMap::from([(String::from("k"), JsonValue::Bool(true))])
        )
        .is_err());

        let too_many: CustomSignals = (0..=RC_CUSTOM_SIGNAL_MAX_ALLOWED_SIGNALS)
            .map(|index| (format!("signal_{index}"), JsonValue::from(index as u64)))
            .collect();
        assert!(merge_custom_signals(None, &too_many).is_err());
    }

    #[test]
    fn fetch_status_parses_known_tags_only() {
        for status in [
            FetchStatus::NoFetchYet,
            FetchStatus::Success,
            FetchStatus::Failure,
            FetchStatus::Throttled,
        ] {
            assert_eq!(status.as_str().parse::<FetchStatus>().unwrap(), status);
        }
        assert!("throttle".parse::<FetchStatus>().is_err());
    }
}
