use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remote_config_client::remote_config::{
    ConfigSnapshot, CustomSignals, FetchOutcome, FetchRequest, FetchResponse, FetchStatus,
    ManualClock, ParameterValue, RemoteConfig, RemoteConfigErrorCode, RemoteConfigFetchClient,
    RemoteConfigOptions, RemoteConfigResult, RemoteConfigStorage, RemoteConfigValueSource,
};
use serde::{Deserialize, Serialize};

fn unique_options(name: &str) -> RemoteConfigOptions {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    RemoteConfigOptions::new(format!("{name}-{}", COUNTER.fetch_add(1, Ordering::SeqCst)))
        .with_project_id("lifecycle-tests")
}

/// Backend returning whatever template is currently published.
#[derive(Default)]
struct TemplateBackend {
    template: Mutex<HashMap<String, ParameterValue>>,
    version: AtomicUsize,
    calls: AtomicUsize,
    fail: Mutex<bool>,
}

impl TemplateBackend {
    fn publish(&self, entries: &[(&str, ParameterValue)]) {
        *self.template.lock().unwrap() = entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

#[async_trait::async_trait]
impl RemoteConfigFetchClient for TemplateBackend {
    async fn fetch(&self, _request: FetchRequest) -> RemoteConfigResult<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock().unwrap() {
            return Ok(FetchResponse {
                status: 500,
                ..Default::default()
            });
        }
        let version = self.version.load(Ordering::SeqCst) as u64;
        Ok(
            FetchResponse::ok(self.template.lock().unwrap().clone())
                .with_etag(format!("etag-{version}"))
                .with_template_version(version),
        )
    }
}

#[tokio::test(flavor = "current_thread")]
async fn defaults_fetch_activate_lifecycle() {
    let rc = RemoteConfig::new(unique_options("lifecycle"));
    let clock = ManualClock::new(1_000_000);
    rc.set_clock(Arc::new(clock.clone()));
    let backend = Arc::new(TemplateBackend::default());
    backend.publish(&[
        ("experiment_enabled", ParameterValue::from(true)),
        ("beta", ParameterValue::from("on")),
    ]);
    rc.set_fetch_client(backend.clone());
    rc.set_defaults([("experiment_enabled", false)]);

    let value = rc.get_value("experiment_enabled");
    assert_eq!(value.source(), RemoteConfigValueSource::Default);
    assert!(!value.as_bool());

    assert_eq!(rc.fetch(None).await.unwrap(), FetchOutcome::Success);
    assert!(rc.activate_fetched().await.unwrap());

    let value = rc.get_value("experiment_enabled");
    assert_eq!(value.source(), RemoteConfigValueSource::Remote);
    assert!(value.as_bool());
    assert_eq!(rc.get_string("beta"), "on");
    assert_eq!(rc.active_template_version(), Some(1));
    assert_eq!(
        rc.get_keys_by_prefix(None),
        HashSet::from([String::from("experiment_enabled"), String::from("beta")])
    );

    // A new template is not picked up while the cache window is open.
    backend.publish(&[("beta", ParameterValue::from("off"))]);
    clock.advance(Duration::from_secs(10));
    assert!(!rc.fetch_and_activate(Some(Duration::from_secs(300))).await.unwrap());
    assert_eq!(rc.last_fetch_status(), FetchStatus::Throttled);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(300));
    assert!(rc.fetch_and_activate(Some(Duration::from_secs(300))).await.unwrap());
    assert_eq!(rc.get_string("beta"), "off");
    // experiment_enabled vanished from the template, so the default is served again.
    assert_eq!(
        rc.get_value("experiment_enabled").source(),
        RemoteConfigValueSource::Default
    );

    backend.set_failing(true);
    assert!(!rc.fetch_and_activate(Some(Duration::ZERO)).await.unwrap());
    assert_eq!(rc.last_fetch_status(), FetchStatus::Failure);
    assert_eq!(rc.active_template_version(), Some(2));
    let err = rc.fetch(Some(Duration::ZERO)).await.unwrap_err();
    assert_eq!(err.code, RemoteConfigErrorCode::FetchFailed);
    assert_eq!(rc.last_fetch_status(), FetchStatus::Failure);
    assert_eq!(rc.get_string("beta"), "off");
    assert_eq!(rc.fetch_time_millis(), 1_310_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_always_see_a_complete_active_set() {
    let rc = RemoteConfig::new(unique_options("readers"));
    rc.set_defaults([("a", "default"), ("b", "default")]);
    let backend = Arc::new(TemplateBackend::default());
    rc.set_fetch_client(backend.clone());

    let mut readers = Vec::new();
    for _ in 0..4 {
        let reader = rc.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                // Both keys always come from the same template.
                let values = reader.get_values_by_keys_prefix(None);
                assert_eq!(values["a"].as_string(), values["b"].as_string());
                tokio::task::yield_now().await;
            }
        }));
    }

    for round in 0..20i64 {
        backend.publish(&[
            ("a", ParameterValue::from(round)),
            ("b", ParameterValue::from(round)),
        ]);
        rc.fetch_and_activate(Some(Duration::ZERO)).await.unwrap();
    }

    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(rc.get_number("a"), 19.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_forced_fetches_each_reach_the_backend() {
    let rc = RemoteConfig::new(unique_options("concurrent"));
    let backend = Arc::new(TemplateBackend::default());
    backend.publish(&[("flag", ParameterValue::from("on"))]);
    rc.set_fetch_client(backend.clone());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let rc = rc.clone();
        tasks.push(tokio::spawn(async move {
            rc.fetch(Some(Duration::ZERO)).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), FetchOutcome::Success);
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 8);
    assert!(rc.activate_fetched().await.unwrap());
    assert!(!rc.activate_fetched().await.unwrap());
}

#[derive(Default, Serialize, Deserialize)]
struct PersistedState {
    last_fetch_status: Option<FetchStatus>,
    last_successful_fetch_timestamp_millis: Option<u64>,
    active_config: Option<ConfigSnapshot>,
    custom_signals: Option<CustomSignals>,
}

/// Storage persisting everything to one JSON document.
struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    fn read(&self) -> RemoteConfigResult<PersistedState> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                remote_config_client::remote_config::error::storage_error(err.to_string())
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(err) => Err(remote_config_client::remote_config::error::storage_error(
                err.to_string(),
            )),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut PersistedState)) -> RemoteConfigResult<()> {
        let mut state = self.read()?;
        apply(&mut state);
        let raw = serde_json::to_string_pretty(&state).map_err(|err| {
            remote_config_client::remote_config::error::storage_error(err.to_string())
        })?;
        std::fs::write(&self.path, raw)
            .map_err(|err| remote_config_client::remote_config::error::storage_error(err.to_string()))
    }
}

#[async_trait::async_trait]
impl RemoteConfigStorage for JsonFileStorage {
    async fn get_last_fetch_status(&self) -> RemoteConfigResult<Option<FetchStatus>> {
        Ok(self.read()?.last_fetch_status)
    }

    async fn set_last_fetch_status(&self, status: FetchStatus) -> RemoteConfigResult<()> {
        self.update(|state| state.last_fetch_status = Some(status))
    }

    async fn get_last_successful_fetch_timestamp_millis(&self) -> RemoteConfigResult<Option<u64>> {
        Ok(self.read()?.last_successful_fetch_timestamp_millis)
    }

    async fn set_last_successful_fetch_timestamp_millis(
        &self,
        timestamp: u64,
    ) -> RemoteConfigResult<()> {
        self.update(|state| state.last_successful_fetch_timestamp_millis = Some(timestamp))
    }

    async fn get_active_config(&self) -> RemoteConfigResult<Option<ConfigSnapshot>> {
        Ok(self.read()?.active_config)
    }

    async fn set_active_config(&self, config: ConfigSnapshot) -> RemoteConfigResult<()> {
        self.update(|state| state.active_config = Some(config))
    }

    async fn get_custom_signals(&self) -> RemoteConfigResult<Option<CustomSignals>> {
        Ok(self.read()?.custom_signals)
    }

    async fn set_custom_signals(&self, signals: CustomSignals) -> RemoteConfigResult<()> {
        self.update(|state| state.custom_signals = Some(signals))
    }
}

#[tokio::test(flavor = "current_thread")]
async fn active_config_survives_restart_through_custom_storage() {
    let path = std::env::temp_dir().join(format!(
        "remote-config-lifecycle-{}.json",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    let options = unique_options("persisted");

    {
        let rc = RemoteConfig::with_storage(
            options.clone(),
            Arc::new(JsonFileStorage { path: path.clone() }),
        );
        let backend = Arc::new(TemplateBackend::default());
        backend.publish(&[
            ("motd", ParameterValue::from("persisted")),
            ("max_items", ParameterValue::from(12i64)),
        ]);
        rc.set_fetch_client(backend);
        rc.set_custom_signals(HashMap::from([(
            String::from("build"),
            serde_json::json!(42),
        )]))
        .await
        .unwrap();
        assert!(rc.fetch_and_activate(None).await.unwrap());
    }

    let rc = RemoteConfig::with_storage(options, Arc::new(JsonFileStorage { path: path.clone() }));
    // Nothing is served from storage until state has been loaded.
    assert_eq!(rc.get_value("motd").source(), RemoteConfigValueSource::Static);
    rc.ensure_initialized().await.unwrap();

    assert_eq!(rc.get_string("motd"), "persisted");
    assert_eq!(rc.get_number("max_items"), 12.0);
    assert_eq!(rc.last_fetch_status(), FetchStatus::Success);
    assert!(rc.fetch_time_millis() > 0);
    assert_eq!(rc.custom_signals()["build"], serde_json::json!("42"));

    // The persisted fetch time keeps the cache window closed after the restart.
    let backend = Arc::new(TemplateBackend::default());
    rc.set_fetch_client(backend.clone());
    assert_eq!(rc.fetch(None).await.unwrap(), FetchOutcome::Throttled);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    let _ = std::fs::remove_file(path);
}
