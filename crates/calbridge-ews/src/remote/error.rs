//! Error types for remote calendar calls.
//!
//! Every collaborator (discovery, the calendar transport) reports failures as
//! a [`TransportError`]. The adapter never inspects anything but the code;
//! the message and source are carried through to the caller untouched.

use std::fmt;
use thiserror::Error;

/// Service response codes meaning the referenced item does not exist.
pub const ITEM_NOT_FOUND_CODES: &[&str] = &[
    "ErrorItemNotFound",
    "ErrorInvalidIdMalformed",
    "ErrorInvalidIdNotAnItemAttachmentId",
];

/// The category of a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorCode {
    /// Credentials were rejected.
    AuthenticationFailed,
    /// The mailbox exists but the account may not touch it.
    AuthorizationFailed,
    /// Connection failed, timed out, DNS resolution, etc.
    NetworkError,
    /// The service is throttling the account.
    RateLimited,
    /// The server failed (5xx or a SOAP fault without detail).
    ServerError,
    /// The response could not be parsed or misses mandatory data.
    InvalidResponse,
    /// The referenced item or endpoint does not exist.
    NotFound,
    /// The request was rejected as malformed.
    BadRequest,
    /// Local transport setup failed.
    ConfigurationError,
    /// The service answered with an error response code.
    ServiceError,
    /// Unexpected state, bug.
    InternalError,
}

impl TransportErrorCode {
    /// Returns true if the failure is transient.
    ///
    /// The adapter itself never retries; this is a hint for callers that own
    /// a retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::ConfigurationError => "configuration_error",
            Self::ServiceError => "service_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure reported by a remote collaborator.
#[derive(Debug, Error)]
pub struct TransportError {
    code: TransportErrorCode,
    message: String,
    /// Service-specific response code, e.g. `ErrorItemNotFound`.
    response_code: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            response_code: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::AuthenticationFailed, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::AuthorizationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::InvalidResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::BadRequest, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::ConfigurationError, message)
    }

    /// Creates an error from a service response code and its message text.
    pub fn service(response_code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(TransportErrorCode::ServiceError, message);
        err.response_code = Some(response_code.into());
        err
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::InternalError, message)
    }

    /// Attaches the service response code to an error of any category.
    pub fn with_response_code(mut self, response_code: impl Into<String>) -> Self {
        self.response_code = Some(response_code.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> TransportErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn response_code(&self) -> Option<&str> {
        self.response_code.as_deref()
    }

    /// The classification reported to callers: the service response code
    /// when there is one, the category otherwise.
    pub fn classification(&self) -> &str {
        self.response_code
            .as_deref()
            .unwrap_or_else(|| self.code.as_str())
    }

    pub fn is_not_found(&self) -> bool {
        self.code == TransportErrorCode::NotFound
    }

    /// Returns true only when the service reported that the item itself
    /// does not exist. A missing endpoint or mailbox is not an item miss.
    pub fn is_item_not_found(&self) -> bool {
        self.response_code
            .as_deref()
            .is_some_and(|code| ITEM_NOT_FOUND_CODES.contains(&code))
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.classification(), self.message)
    }
}

/// A specialized Result type for remote calls.
pub type TransportResult<T> = Result<T, TransportError>;
