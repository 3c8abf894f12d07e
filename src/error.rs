use aws_sdk_sns::config::http::HttpResponse;
use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::fmt;
use thiserror::Error;

/// Which side of the wire a remote failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request was rejected (4xx, `Sender` faults).
    Client,
    /// The service failed to handle a valid request (5xx, `Receiver` faults).
    Server,
    /// No response was received at all.
    Transport,
    Unknown,
}

impl ErrorCategory {
    pub fn from_status(status: u16) -> Self {
        match status {
            400..=499 => ErrorCategory::Client,
            500..=599 => ErrorCategory::Server,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Client => "client",
            ErrorCategory::Server => "server",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A failed call to the notification service.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct RemoteServiceError {
    pub operation: &'static str,
    pub message: String,
    pub status_code: Option<u16>,
    pub error_code: Option<String>,
    pub category: ErrorCategory,
    pub request_id: Option<String>,
}

impl RemoteServiceError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            status_code: None,
            error_code: None,
            category: ErrorCategory::Unknown,
            request_id: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self.category = ErrorCategory::from_status(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Translates an SDK failure, keeping every field an operator needs to
    /// correlate it with the provider.
    pub fn from_sdk<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        let raw = err.raw_response();
        let status_code = raw.map(|raw| raw.status().as_u16());
        let request_id = raw
            .and_then(|raw| {
                raw.headers()
                    .get("x-amzn-requestid")
                    .or_else(|| raw.headers().get("x-amz-request-id"))
            })
            .map(str::to_owned);

        let service_error = err.as_service_error();
        let error_code = service_error.and_then(|e| e.code()).map(str::to_owned);
        let message = service_error
            .and_then(|e| e.message())
            .map(str::to_owned)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

        let category = match (&err, status_code) {
            (SdkError::DispatchFailure(_) | SdkError::TimeoutError(_), _) => ErrorCategory::Transport,
            (SdkError::ConstructionFailure(_), _) => ErrorCategory::Client,
            (_, Some(status)) => ErrorCategory::from_status(status),
            (_, None) => ErrorCategory::Unknown,
        };

        Self {
            operation,
            message,
            status_code,
            error_code,
            category,
            request_id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.error_code.as_deref(), Some("NotFound" | "NotFoundException"))
            || self.status_code == Some(404)
    }
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("missing {0}: pass it on the command line or set it in the config file")]
    MissingSetting(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = NotifierError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_follows_status_class() {
        assert_eq!(ErrorCategory::from_status(400), ErrorCategory::Client);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::Client);
        assert_eq!(ErrorCategory::from_status(500), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(503), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(302), ErrorCategory::Unknown);
    }

    #[test]
    fn builder_sets_category_from_status() {
        let err = RemoteServiceError::new("Publish", "Topic does not exist")
            .with_status(404)
            .with_code("NotFound")
            .with_request_id("req-1");

        assert_eq!(err.category, ErrorCategory::Client);
        assert_eq!(err.request_id.as_deref(), Some("req-1"));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Publish failed: Topic does not exist");
    }

    #[test]
    fn server_fault_is_not_not_found() {
        let err = RemoteServiceError::new("DeleteTopic", "boom")
            .with_status(500)
            .with_code("InternalError");
        assert_eq!(err.category, ErrorCategory::Server);
        assert!(!err.is_not_found());
    }
}
