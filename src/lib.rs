#![doc = include_str!("RUSTDOC.md")]

pub mod blocking;
pub mod remote_config;

pub use remote_config::{
    FetchOutcome, RemoteConfig, RemoteConfigError, RemoteConfigOptions, RemoteConfigResult,
};
