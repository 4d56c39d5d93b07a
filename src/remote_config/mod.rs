#![doc = include_str!("README.md")]
mod api;
pub mod clock;
mod constants;
pub mod error;
pub mod fetch;
pub mod options;
pub mod resource;
pub mod settings;
pub mod storage;
pub mod value;

use std::sync::{Mutex, MutexGuard};

pub use api::{FetchOutcome, RemoteConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{RemoteConfigError, RemoteConfigErrorCode, RemoteConfigResult};
pub use fetch::{FetchRequest, FetchResponse, NoopFetchClient, RemoteConfigFetchClient};
pub use options::RemoteConfigOptions;
pub use resource::{DefaultsResourceLoader, DirectoryResourceLoader, InMemoryResourceLoader};
pub use settings::{RemoteConfigSettings, RemoteConfigSettingsUpdate};
pub use storage::{
    ConfigSnapshot, CustomSignals, FetchStatus, InMemoryRemoteConfigStorage, RemoteConfigStorage,
};
pub use value::{ConfigDefaults, ParameterValue, RemoteConfigValue, RemoteConfigValueSource};

// A panic while holding one of these locks cannot leave the guarded value half-written, so a
// poisoned lock is still safe to read.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
