use std::ops::Deref;
use std::time::Duration;

use crate::remote_config::error::RemoteConfigResult;
use crate::remote_config::storage::CustomSignals;
use crate::remote_config::{FetchOutcome, RemoteConfig};

/// Blocking facade over [`RemoteConfig`].
///
/// Reads (`get_value`, `get_keys_by_prefix`, `config_settings`, ...) are already synchronous and
/// are reached through `Deref`.
#[derive(Clone, Debug)]
pub struct BlockingRemoteConfig {
    inner: RemoteConfig,
}

impl BlockingRemoteConfig {
    pub fn new(inner: RemoteConfig) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> RemoteConfig {
        self.inner
    }

    block_on_methods! {
        fn ensure_initialized() -> RemoteConfigResult<()>;
        fn fetch(cache_expiration: Option<Duration>) -> RemoteConfigResult<FetchOutcome>;
        fn activate_fetched() -> RemoteConfigResult<bool>;
        fn fetch_and_activate(cache_expiration: Option<Duration>) -> RemoteConfigResult<bool>;
        fn set_defaults_from_resource(resource_name: &str) -> RemoteConfigResult<()>;
        fn set_custom_signals(signals: CustomSignals) -> RemoteConfigResult<CustomSignals>;
    }
}

impl Deref for BlockingRemoteConfig {
    type Target = RemoteConfig;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<RemoteConfig> for BlockingRemoteConfig {
    fn from(inner: RemoteConfig) -> Self {
        Self::new(inner)
    }
}
