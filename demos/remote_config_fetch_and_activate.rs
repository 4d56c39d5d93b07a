//! Fetch a template from a backend, activate it, and read typed values.
//!
//! The backend here is an in-process stand-in. Swap `DemoBackend` for a client that talks to your
//! configuration service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use remote_config_client::remote_config::{
    FetchRequest, FetchResponse, ParameterValue, RemoteConfig, RemoteConfigFetchClient,
    RemoteConfigOptions, RemoteConfigResult,
};

struct DemoBackend;

#[async_trait::async_trait]
impl RemoteConfigFetchClient for DemoBackend {
    async fn fetch(&self, request: FetchRequest) -> RemoteConfigResult<FetchResponse> {
        println!(
            "backend: fetch for {} (cache bust: {}, timeout: {} ms)",
            request.app.app_name, request.cache_bust, request.timeout_millis
        );
        Ok(FetchResponse::ok(HashMap::from([
            (
                String::from("welcome_message"),
                ParameterValue::from("Hello from the backend"),
            ),
            (String::from("feature_enabled"), ParameterValue::from(true)),
            (String::from("max_items"), ParameterValue::from(25i64)),
        ]))
        .with_etag("demo-etag")
        .with_template_version(7))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = RemoteConfigOptions::new("demo-app")
        .with_project_id("your-project-id")
        .with_api_key("your-api-key");
    let remote_config = RemoteConfig::new(options);
    remote_config.set_fetch_client(Arc::new(DemoBackend));

    // Local defaults apply immediately and are used when the backend has no value for a key.
    remote_config.set_defaults([
        ("welcome_message", ParameterValue::from("Hello from defaults")),
        ("feature_enabled", ParameterValue::from(false)),
    ]);

    if remote_config.fetch_and_activate(None).await? {
        println!("Fetched and activated fresh parameters");
    } else {
        println!("Using cached or default parameters");
    }

    let welcome = remote_config.get_string("welcome_message");
    let feature_enabled = remote_config.get_boolean("feature_enabled");
    let max_items = remote_config.get_number("max_items");
    let source = remote_config.get_value("welcome_message").source();

    println!("welcome_message ({source}): {welcome}");
    println!("feature_enabled: {feature_enabled}");
    println!("max_items: {max_items}");
    println!(
        "template version: {:?}",
        remote_config.active_template_version()
    );

    // Inside the default 12 hour window the next fetch is served from cache.
    let outcome = remote_config.fetch(None).await?;
    println!("second fetch: {outcome:?}");
    let outcome = remote_config.fetch(Some(Duration::ZERO)).await?;
    println!("forced fetch: {outcome:?}");

    Ok(())
}
