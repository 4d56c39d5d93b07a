//! Remote Config fetch client abstractions.
//!
//! The backend collaborator is reached through [`RemoteConfigFetchClient`]. Transport, request
//! deadlines and authentication are the implementation's business; the client only interprets
//! the returned status and snapshot.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::remote_config::constants::HTTP_STATUS_OK;
use crate::remote_config::error::RemoteConfigResult;
use crate::remote_config::options::RemoteConfigOptions;
use crate::remote_config::value::ParameterMap;

/// Parameters describing a fetch attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    /// Identity of the application context issuing the request.
    pub app: RemoteConfigOptions,
    /// `true` when the caller forced the fetch, so intermediaries must not serve a cached copy.
    pub cache_bust: bool,
    /// Cache window that was in effect for this request.
    pub cache_max_age_millis: u64,
    /// Timeout budget for the request.
    pub timeout_millis: u64,
    /// Entity tag of the active config, suitable for `If-None-Match`.
    pub e_tag: Option<String>,
    /// Optional custom signals payload forwarded to the backend.
    pub custom_signals: Option<HashMap<String, JsonValue>>,
}

/// Backend answer to a [`FetchRequest`].
///
/// `200` carries a snapshot (a missing `config` means an empty template), `304` means the
/// active template is still current. Any other status is treated as a failed fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub config: Option<ParameterMap>,
    pub template_version: Option<u64>,
}

impl FetchResponse {
    pub fn ok(config: ParameterMap) -> Self {
        Self {
            status: HTTP_STATUS_OK,
            etag: None,
            config: Some(config),
            template_version: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_template_version(mut self, template_version: u64) -> Self {
        self.template_version = Some(template_version);
        self
    }
}

/// Abstraction over the network layer used to retrieve Remote Config templates.
#[async_trait::async_trait]
pub trait RemoteConfigFetchClient: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> RemoteConfigResult<FetchResponse>;
}

/// Default fetch client: answers every request with an empty template.
#[derive(Default)]
pub struct NoopFetchClient;

#[async_trait::async_trait]
impl RemoteConfigFetchClient for NoopFetchClient {
    async fn fetch(&self, request: FetchRequest) -> RemoteConfigResult<FetchResponse> {
        let _ = request;
        Ok(FetchResponse::ok(HashMap::new()))
    }
}
