use crate::remote_config::constants::{DEFAULT_APP_NAME, DEFAULT_NAMESPACE};

/// Identity of the application context a [`RemoteConfig`](crate::remote_config::RemoteConfig)
/// client serves. Forwarded verbatim to the backend with every fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfigOptions {
    pub app_name: String,
    pub project_id: Option<String>,
    pub app_id: Option<String>,
    pub api_key: Option<String>,
    /// Parameter namespace within the project.
    pub namespace: String,
}

impl RemoteConfigOptions {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl Default for RemoteConfigOptions {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            project_id: None,
            app_id: None,
            api_key: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}
