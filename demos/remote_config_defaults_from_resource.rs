//! Load defaults from a JSON file, then inspect them by prefix.
//!
//! Pass a directory containing `remote_config_defaults.json` as the first argument, or run
//! without arguments to use a generated file in the temp directory.

use std::path::PathBuf;
use std::sync::Arc;

use remote_config_client::blocking::remote_config::BlockingRemoteConfig;
use remote_config_client::remote_config::settings::RemoteConfigSettingsUpdate;
use remote_config_client::remote_config::{
    DirectoryResourceLoader, RemoteConfig, RemoteConfigOptions,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let dir = std::env::temp_dir().join("remote-config-demo");
            std::fs::create_dir_all(&dir)?;
            std::fs::write(
                dir.join("remote_config_defaults.json"),
                r#"{"ui_theme": "light", "ui_font_scale": 1.0, "checkout_enabled": true}"#,
            )?;
            dir
        }
    };

    let remote_config = BlockingRemoteConfig::new(RemoteConfig::new(RemoteConfigOptions::new(
        "resource-demo",
    )));
    remote_config.set_resource_loader(Arc::new(DirectoryResourceLoader::new(&root)));
    remote_config.set_defaults_from_resource("remote_config_defaults")?;

    let settings = remote_config.set_config_settings(RemoteConfigSettingsUpdate::from_json_str(
        r#"{"minimumFetchIntervalMillis": 60000}"#,
    )?)?;
    println!(
        "minimum fetch interval: {} ms",
        settings.minimum_fetch_interval_millis()
    );

    let mut keys: Vec<_> = remote_config.get_keys_by_prefix(Some("ui_")).into_iter().collect();
    keys.sort();
    for key in keys {
        let value = remote_config.get_value(&key);
        println!("{key} = {} ({})", value.as_string(), value.source());
    }
    println!("checkout_enabled = {}", remote_config.get_boolean("checkout_enabled"));

    Ok(())
}
