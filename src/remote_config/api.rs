use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_lock::{Mutex as AsyncMutex, OnceCell};

use crate::remote_config::clock::{Clock, SystemClock};
use crate::remote_config::constants::{HTTP_STATUS_NOT_MODIFIED, HTTP_STATUS_OK};
use crate::remote_config::error::{
    fetch_failed, RemoteConfigError, RemoteConfigErrorCode, RemoteConfigResult,
};
use crate::remote_config::fetch::{FetchRequest, NoopFetchClient, RemoteConfigFetchClient};
use crate::remote_config::lock;
use crate::remote_config::options::RemoteConfigOptions;
use crate::remote_config::resource::{DefaultsResourceLoader, DirectoryResourceLoader};
use crate::remote_config::settings::{RemoteConfigSettings, RemoteConfigSettingsUpdate};
use crate::remote_config::storage::{
    ConfigSnapshot, CustomSignals, FetchStatus, InMemoryRemoteConfigStorage, RemoteConfigStorage,
    RemoteConfigStorageCache,
};
use crate::remote_config::value::{
    ConfigDefaults, ParameterValue, RemoteConfigValue, RemoteConfigValueSource,
};

/// Non-failing result of [`RemoteConfig::fetch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The backend answered and the fetched set (and fetch time) were updated.
    Success,
    /// A previous successful fetch is still inside the cache window; the backend was not called.
    Throttled,
}

/// Remote configuration client for one application context.
///
/// Cloning is cheap and every clone shares the same state, so a single instance can be created at
/// start-up and handed to every consumer.
#[derive(Clone)]
pub struct RemoteConfig {
    inner: Arc<RemoteConfigInner>,
}

struct RemoteConfigInner {
    options: RemoteConfigOptions,
    defaults: Mutex<Arc<ConfigDefaults>>,
    fetched_config: Mutex<Option<ConfigSnapshot>>,
    settings: Mutex<RemoteConfigSettings>,
    fetch_client: Mutex<Arc<dyn RemoteConfigFetchClient>>,
    resource_loader: Mutex<Arc<dyn DefaultsResourceLoader>>,
    clock: Mutex<Arc<dyn Clock>>,
    storage_cache: RemoteConfigStorageCache,
    // Serializes fetch, activation and signal updates. Reads never take it.
    operation_lock: AsyncMutex<()>,
    initialized: OnceCell<()>,
}

impl RemoteConfig {
    pub fn new(options: RemoteConfigOptions) -> Self {
        Self::with_storage(options, Arc::new(InMemoryRemoteConfigStorage::default()))
    }

    /// Creates a client whose fetch metadata, active config and custom signals live in `storage`.
    ///
    /// Previously persisted state is loaded on the first fetch or activation, or eagerly via
    /// [`ensure_initialized`](Self::ensure_initialized).
    pub fn with_storage(options: RemoteConfigOptions, storage: Arc<dyn RemoteConfigStorage>) -> Self {
        let fetch_client: Arc<dyn RemoteConfigFetchClient> = Arc::new(NoopFetchClient);
        let resource_loader: Arc<dyn DefaultsResourceLoader> =
            Arc::new(DirectoryResourceLoader::new("."));

        Self {
            inner: Arc::new(RemoteConfigInner {
                options,
                defaults: Mutex::new(Arc::new(HashMap::new())),
                fetched_config: Mutex::new(None),
                settings: Mutex::new(RemoteConfigSettings::default()),
                fetch_client: Mutex::new(fetch_client),
                resource_loader: Mutex::new(resource_loader),
                clock: Mutex::new(Arc::new(SystemClock)),
                storage_cache: RemoteConfigStorageCache::new(storage),
                operation_lock: AsyncMutex::new(()),
                initialized: OnceCell::new(),
            }),
        }
    }

    pub fn options(&self) -> &RemoteConfigOptions {
        &self.inner.options
    }

    /// Replaces the backend collaborator used by [`fetch`](Self::fetch).
    pub fn set_fetch_client(&self, fetch_client: Arc<dyn RemoteConfigFetchClient>) {
        *lock(&self.inner.fetch_client) = fetch_client;
    }

    /// Replaces the loader used by [`set_defaults_from_resource`](Self::set_defaults_from_resource).
    ///
    /// Defaults to a [`DirectoryResourceLoader`] rooted at the working directory.
    pub fn set_resource_loader(&self, loader: Arc<dyn DefaultsResourceLoader>) {
        *lock(&self.inner.resource_loader) = loader;
    }

    /// Replaces the time source used for throttling and fetch timestamps.
    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        *lock(&self.inner.clock) = clock;
    }

    /// Loads persisted state from storage. Runs at most once per client.
    pub async fn ensure_initialized(&self) -> RemoteConfigResult<()> {
        self.inner
            .initialized
            .get_or_try_init(|| self.inner.storage_cache.hydrate_from_storage())
            .await?;
        Ok(())
    }

    /// Replaces all defaults with `defaults`. Keys missing from the new set are dropped.
    pub fn set_defaults<I, K, V>(&self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParameterValue>,
    {
        let defaults: ConfigDefaults = defaults
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        log::debug!(
            "remote config '{}': replacing defaults with {} keys",
            self.inner.options.app_name,
            defaults.len()
        );
        *lock(&self.inner.defaults) = Arc::new(defaults);
    }

    /// Loads defaults through the configured resource loader and applies them like
    /// [`set_defaults`](Self::set_defaults). On failure the current defaults are kept.
    pub async fn set_defaults_from_resource(&self, resource_name: &str) -> RemoteConfigResult<()> {
        let loader = lock(&self.inner.resource_loader).clone();
        match loader.load_defaults(resource_name).await {
            Ok(defaults) => {
                self.set_defaults(defaults);
                Ok(())
            }
            Err(err) => {
                log::warn!(
                    "remote config '{}': failed to load defaults from '{resource_name}': {err}",
                    self.inner.options.app_name
                );
                Err(err)
            }
        }
    }

    /// Returns a snapshot of the settings and fetch telemetry.
    pub fn config_settings(&self) -> RemoteConfigSettings {
        let cache = &self.inner.storage_cache;
        lock(&self.inner.settings).clone().with_fetch_metadata(
            cache.last_successful_fetch_timestamp_millis(),
            cache.last_fetch_status(),
        )
    }

    /// Applies the writable subset of the settings and returns the resulting snapshot.
    ///
    /// The update is validated as a whole; an invalid field rejects the entire update.
    ///
    /// # Examples
    ///
    /// ```
    /// use remote_config_client::remote_config::settings::RemoteConfigSettingsUpdate;
    /// use remote_config_client::remote_config::{RemoteConfig, RemoteConfigOptions};
    ///
    /// let rc = RemoteConfig::new(RemoteConfigOptions::new("docs"));
    /// let settings = rc
    ///     .set_config_settings(RemoteConfigSettingsUpdate {
    ///         developer_mode_enabled: Some(true),
    ///         fetch_timeout_millis: Some(90_000),
    ///         minimum_fetch_interval_millis: None,
    ///     })
    ///     .unwrap();
    /// assert!(settings.is_developer_mode_enabled());
    /// assert_eq!(settings.fetch_timeout_millis(), 90_000);
    /// ```
    pub fn set_config_settings(
        &self,
        update: RemoteConfigSettingsUpdate,
    ) -> RemoteConfigResult<RemoteConfigSettings> {
        if !update.is_empty() {
            let mut settings = lock(&self.inner.settings);
            settings.apply(&update)?;
            log::debug!(
                "remote config '{}': settings updated (developer mode: {})",
                self.inner.options.app_name,
                settings.is_developer_mode_enabled()
            );
        }
        Ok(self.config_settings())
    }

    /// Fetches a fresh snapshot from the backend into the staging area.
    ///
    /// `cache_expiration` defaults to the configured minimum fetch interval. Unless developer
    /// mode is enabled or the expiration is zero, a fetch within that window of the last
    /// successful one returns [`FetchOutcome::Throttled`] without contacting the backend.
    /// Served values do not change until [`activate_fetched`](Self::activate_fetched).
    pub async fn fetch(&self, cache_expiration: Option<Duration>) -> RemoteConfigResult<FetchOutcome> {
        self.ensure_initialized().await?;
        let _guard = self.inner.operation_lock.lock().await;
        self.fetch_locked(cache_expiration).await
    }

    /// Promotes the fetched set to the active set.
    ///
    /// Returns `true` when a non-empty fetched set differing from the active parameters was
    /// promoted, `false` when there was nothing new to activate.
    pub async fn activate_fetched(&self) -> RemoteConfigResult<bool> {
        self.ensure_initialized().await?;
        let _guard = self.inner.operation_lock.lock().await;
        self.activate_locked().await
    }

    /// Fetches and, unless the fetch failed, activates.
    ///
    /// A failed fetch yields `false` and leaves both the fetched and the active sets untouched;
    /// the failure is still recorded in [`last_fetch_status`](Self::last_fetch_status). Storage
    /// errors are returned.
    pub async fn fetch_and_activate(
        &self,
        cache_expiration: Option<Duration>,
    ) -> RemoteConfigResult<bool> {
        self.ensure_initialized().await?;
        let _guard = self.inner.operation_lock.lock().await;
        match self.fetch_locked(cache_expiration).await {
            Ok(_) => self.activate_locked().await,
            Err(err) if err.code == RemoteConfigErrorCode::FetchFailed => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn fetch_locked(&self, cache_expiration: Option<Duration>) -> RemoteConfigResult<FetchOutcome> {
        let settings = lock(&self.inner.settings).clone();
        let cache = &self.inner.storage_cache;
        let now = lock(&self.inner.clock).now_millis();
        let cache_max_age_millis = cache_expiration
            .map(|expiration| u64::try_from(expiration.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_else(|| settings.minimum_fetch_interval_millis());
        let cache_bust = settings.is_developer_mode_enabled() || cache_max_age_millis == 0;

        if !cache_bust {
            if let Some(last_fetch) = cache.last_successful_fetch_timestamp_millis() {
                let elapsed = now.saturating_sub(last_fetch);
                if elapsed < cache_max_age_millis {
                    log::debug!(
                        "remote config '{}': fetch throttled, last success {elapsed} ms ago (window {cache_max_age_millis} ms)",
                        self.inner.options.app_name
                    );
                    cache.set_last_fetch_status(FetchStatus::Throttled).await?;
                    return Ok(FetchOutcome::Throttled);
                }
            }
        }

        let request = FetchRequest {
            app: self.inner.options.clone(),
            cache_bust,
            cache_max_age_millis,
            timeout_millis: settings.fetch_timeout_millis(),
            e_tag: cache.active_config().etag.clone(),
            custom_signals: cache.custom_signals(),
        };

        let fetch_client = lock(&self.inner.fetch_client).clone();
        let response = match fetch_client.fetch(request).await {
            Ok(response) => response,
            Err(err) => {
                log::warn!(
                    "remote config '{}': fetch failed: {err}",
                    self.inner.options.app_name
                );
                let err = if err.code == RemoteConfigErrorCode::FetchFailed {
                    err
                } else {
                    fetch_failed(format!("backend request failed: {}", err.message()))
                };
                return Err(self.record_fetch_failure(err).await);
            }
        };

        match response.status {
            HTTP_STATUS_OK => {
                let snapshot = ConfigSnapshot {
                    parameters: response.config.unwrap_or_default(),
                    etag: response.etag,
                    template_version: response.template_version,
                };
                log::debug!(
                    "remote config '{}': fetched {} parameters (template version {:?})",
                    self.inner.options.app_name,
                    snapshot.parameters.len(),
                    snapshot.template_version
                );
                // Status goes last so SUCCESS never sits next to a stale fetch time.
                cache.set_last_successful_fetch_timestamp_millis(now).await?;
                *lock(&self.inner.fetched_config) = Some(snapshot);
                cache.set_last_fetch_status(FetchStatus::Success).await?;
                Ok(FetchOutcome::Success)
            }
            HTTP_STATUS_NOT_MODIFIED => {
                log::debug!(
                    "remote config '{}': template not modified",
                    self.inner.options.app_name
                );
                cache.set_last_successful_fetch_timestamp_millis(now).await?;
                cache.set_last_fetch_status(FetchStatus::Success).await?;
                Ok(FetchOutcome::Success)
            }
            status => {
                log::warn!(
                    "remote config '{}': fetch returned unexpected status {status}",
                    self.inner.options.app_name
                );
                let err = fetch_failed(format!("fetch returned unexpected status {status}"));
                Err(self.record_fetch_failure(err).await)
            }
        }
    }

    /// Records FAILURE and hands back the fetch error, which wins over a storage error.
    async fn record_fetch_failure(&self, err: RemoteConfigError) -> RemoteConfigError {
        if let Err(storage_err) = self
            .inner
            .storage_cache
            .set_last_fetch_status(FetchStatus::Failure)
            .await
        {
            log::warn!(
                "remote config '{}': could not record fetch failure: {storage_err}",
                self.inner.options.app_name
            );
        }
        err
    }

    async fn activate_locked(&self) -> RemoteConfigResult<bool> {
        let fetched = lock(&self.inner.fetched_config).clone();
        let Some(fetched) = fetched else {
            return Ok(false);
        };
        if fetched.is_empty() {
            return Ok(false);
        }

        let active = self.inner.storage_cache.active_config();
        if active.parameters == fetched.parameters {
            // Same values under a new template: keep the entity tag current, report no change.
            if *active != fetched {
                self.inner.storage_cache.set_active_config(fetched).await?;
            }
            return Ok(false);
        }

        log::info!(
            "remote config '{}': activating {} parameters (template version {:?})",
            self.inner.options.app_name,
            fetched.parameters.len(),
            fetched.template_version
        );
        self.inner.storage_cache.set_active_config(fetched).await?;
        Ok(true)
    }

    /// Merges custom signals into the set sent with every fetch. A `null` value removes a key.
    pub async fn set_custom_signals(&self, signals: CustomSignals) -> RemoteConfigResult<CustomSignals> {
        self.ensure_initialized().await?;
        let _guard = self.inner.operation_lock.lock().await;
        self.inner.storage_cache.set_custom_signals(signals).await
    }

    pub fn custom_signals(&self) -> CustomSignals {
        self.inner.storage_cache.custom_signals().unwrap_or_default()
    }

    /// Returns the timestamp (in milliseconds since epoch) of the last successful fetch, or
    /// `-1` when no fetch has succeeded yet.
    pub fn fetch_time_millis(&self) -> i64 {
        self.inner
            .storage_cache
            .last_successful_fetch_timestamp_millis()
            .map(|millis| millis as i64)
            .unwrap_or(-1)
    }

    pub fn last_fetch_status(&self) -> FetchStatus {
        self.inner.storage_cache.last_fetch_status()
    }

    /// Returns the template version of the currently active config, if known.
    pub fn active_template_version(&self) -> Option<u64> {
        self.inner.storage_cache.active_config().template_version
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get_value(key).as_string()
    }

    pub fn get_boolean(&self, key: &str) -> bool {
        self.get_value(key).as_bool()
    }

    pub fn get_number(&self, key: &str) -> f64 {
        self.get_value(key).as_number()
    }

    /// Resolves `key` against the active set, then the defaults, then the static fallback.
    pub fn get_value(&self, key: &str) -> RemoteConfigValue {
        let active = self.inner.storage_cache.active_config();
        if let Some(value) = active.parameters.get(key) {
            return RemoteConfigValue::new(RemoteConfigValueSource::Remote, value.clone());
        }
        if let Some(value) = self.defaults().get(key) {
            return RemoteConfigValue::new(RemoteConfigValueSource::Default, value.clone());
        }
        RemoteConfigValue::static_value()
    }

    /// Returns the keys of the active set and the defaults starting with `prefix`.
    ///
    /// `None` or an empty prefix returns every key.
    pub fn get_keys_by_prefix(&self, prefix: Option<&str>) -> HashSet<String> {
        let prefix = prefix.unwrap_or_default();
        let active = self.inner.storage_cache.active_config();
        let defaults = self.defaults();
        active
            .parameters
            .keys()
            .chain(defaults.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Resolves every key of the active set and the defaults starting with `prefix`.
    pub fn get_values_by_keys_prefix(&self, prefix: Option<&str>) -> HashMap<String, RemoteConfigValue> {
        let prefix = prefix.unwrap_or_default();
        let active = self.inner.storage_cache.active_config();
        let defaults = self.defaults();

        let mut values = HashMap::new();
        for (key, value) in defaults.iter().filter(|(key, _)| key.starts_with(prefix)) {
            values.insert(
                key.clone(),
                RemoteConfigValue::new(RemoteConfigValueSource::Default, value.clone()),
            );
        }
        for (key, value) in active
            .parameters
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
        {
            values.insert(
                key.clone(),
                RemoteConfigValue::new(RemoteConfigValueSource::Remote, value.clone()),
            );
        }
        values
    }

    /// Returns the union of default and active values, with active values taking precedence.
    pub fn get_all(&self) -> HashMap<String, RemoteConfigValue> {
        self.get_values_by_keys_prefix(None)
    }

    fn defaults(&self) -> Arc<ConfigDefaults> {
        Arc::clone(&lock(&self.inner.defaults))
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("app", &self.inner.options.app_name)
            .field("defaults", &self.defaults().len())
            .field("storage", &self.inner.storage_cache)
            .finish()
    }
}
