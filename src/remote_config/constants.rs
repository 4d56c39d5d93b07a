pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";
pub const RC_CUSTOM_SIGNAL_MAX_ALLOWED_SIGNALS: usize = 100;
pub const RC_CUSTOM_SIGNAL_KEY_MAX_LENGTH: usize = 250;
pub const RC_CUSTOM_SIGNAL_VALUE_MAX_LENGTH: usize = 500;
pub const RESOURCE_FILE_EXTENSION: &str = "json";
pub const HTTP_STATUS_OK: u16 = 200;
pub const HTTP_STATUS_NOT_MODIFIED: u16 = 304;
