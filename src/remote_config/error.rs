use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteConfigErrorCode {
    /// The backend rejected the request, timed out or answered with an unexpected status.
    FetchFailed,
    /// `set_defaults_from_resource` was given a name the loader does not know.
    ResourceNotFound,
    /// The named resource exists but is not a flat map of primitive values.
    ResourceParseError,
    /// A settings update was malformed; nothing was applied.
    InvalidSettings,
    InvalidArgument,
    /// The storage collaborator failed to read or write state.
    Storage,
    Internal,
}

impl RemoteConfigErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteConfigErrorCode::FetchFailed => "remote-config/fetch-failed",
            RemoteConfigErrorCode::ResourceNotFound => "remote-config/resource-not-found",
            RemoteConfigErrorCode::ResourceParseError => "remote-config/resource-parse-error",
            RemoteConfigErrorCode::InvalidSettings => "remote-config/invalid-settings",
            RemoteConfigErrorCode::InvalidArgument => "remote-config/invalid-argument",
            RemoteConfigErrorCode::Storage => "remote-config/storage",
            RemoteConfigErrorCode::Internal => "remote-config/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RemoteConfigError {
    pub code: RemoteConfigErrorCode,
    message: String,
}

impl RemoteConfigError {
    pub fn new(code: RemoteConfigErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` when the caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            RemoteConfigErrorCode::FetchFailed | RemoteConfigErrorCode::Storage
        )
    }
}

impl Display for RemoteConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for RemoteConfigError {}

pub type RemoteConfigResult<T> = Result<T, RemoteConfigError>;

pub fn fetch_failed(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::FetchFailed, message)
}

pub fn resource_not_found(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::ResourceNotFound, message)
}

pub fn resource_parse_error(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::ResourceParseError, message)
}

pub fn invalid_settings(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::InvalidSettings, message)
}

pub fn invalid_argument(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::InvalidArgument, message)
}

pub fn storage_error(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::Storage, message)
}

pub fn internal_error(message: impl Into<String>) -> RemoteConfigError {
    RemoteConfigError::new(RemoteConfigErrorCode::Internal, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_code() {
        let err = fetch_failed("backend returned status 503");
        assert_eq!(
            err.to_string(),
            "backend returned status 503 (remote-config/fetch-failed)"
        );
        assert_eq!(err.message(), "backend returned status 503");
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(fetch_failed("timeout").is_retryable());
        assert!(storage_error("disk full").is_retryable());
        assert!(!resource_not_found("defaults").is_retryable());
        assert!(!invalid_settings("fetchTimeoutMillis").is_retryable());
    }
}
