//! The uniform error surfaced by every adapter operation.
//!
//! Each failure is an [`AdapterError`]: one [`ErrorKind`], the kind's fixed
//! human-readable message, and the wrapped cause's classification and
//! message. Remote failures go through [`AdapterError::remote`], local
//! validation failures through [`AdapterError::local`]; both log a warning
//! before the error is returned.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::remote::TransportError;

/// What went wrong, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A calendar operation was called before the session was ready.
    SessionNotInitialized,
    /// An empty address or secret was supplied.
    InvalidCredentials,
    /// The endpoint URI could not be parsed.
    InvalidEndpoint,
    /// Endpoint discovery failed.
    DiscoveryFailed,
    /// A timestamp is not in the canonical form.
    InvalidDateFormat,
    /// Listing events failed.
    QueryFailed,
    /// The target event id does not resolve.
    EventNotFound,
    /// Updating an event failed.
    UpdateFailed,
    /// Deleting an event failed.
    DeleteFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionNotInitialized => "session_not_initialized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidEndpoint => "invalid_endpoint",
            Self::DiscoveryFailed => "discovery_failed",
            Self::InvalidDateFormat => "invalid_date_format",
            Self::QueryFailed => "query_failed",
            Self::EventNotFound => "event_not_found",
            Self::UpdateFailed => "update_failed",
            Self::DeleteFailed => "delete_failed",
        }
    }

    /// The fixed message every error of this kind starts with.
    pub fn message(&self) -> &'static str {
        match self {
            Self::SessionNotInitialized => "The calendar session is not initialized.",
            Self::InvalidCredentials => "The session credentials are invalid.",
            Self::InvalidEndpoint => "The service endpoint is invalid.",
            Self::DiscoveryFailed => "The service endpoint could not be discovered.",
            Self::InvalidDateFormat => "A timestamp is not in the expected format.",
            Self::QueryFailed => "The calendar query failed.",
            Self::EventNotFound => "The event was not found.",
            Self::UpdateFailed => "The event update failed.",
            Self::DeleteFailed => "The event deletion failed.",
        }
    }

    /// Kinds detected before any remote call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::SessionNotInitialized
                | Self::InvalidCredentials
                | Self::InvalidEndpoint
                | Self::InvalidDateFormat
        )
    }

    /// Kinds for which a remote not-found means the target event is gone.
    fn targets_event(&self) -> bool {
        matches!(self, Self::UpdateFailed | Self::DeleteFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The wrapped cause of an [`AdapterError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cause {
    classification: String,
    message: String,
}

impl Cause {
    /// The cause's type or service response code.
    pub fn classification(&self) -> &str {
        &self.classification
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.classification, self.message)
    }
}

/// An adapter operation failure.
///
/// Renders as `<fixed message> Cause: [<classification>: <message>]`.
#[derive(Debug, Error)]
pub struct AdapterError {
    kind: ErrorKind,
    cause: Cause,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AdapterError {
    /// Wraps a failure of a remote call.
    ///
    /// An item-level not-found reported while updating or deleting becomes
    /// [`ErrorKind::EventNotFound`]; every other failure keeps `kind`,
    /// including a not-found about the endpoint or mailbox.
    pub fn remote(kind: ErrorKind, err: TransportError) -> Self {
        let kind = if err.is_item_not_found() && kind.targets_event() {
            ErrorKind::EventNotFound
        } else {
            kind
        };
        let cause = Cause {
            classification: err.classification().to_string(),
            message: err.message().to_string(),
        };
        Self::logged(kind, cause, Some(Box::new(err)))
    }

    /// Creates an error for a failure detected without any remote call.
    pub fn local(
        kind: ErrorKind,
        classification: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let cause = Cause {
            classification: classification.into(),
            message: message.into(),
        };
        Self::logged(kind, cause, None)
    }

    /// Wraps a local error value, classified by its type name.
    pub fn local_from<E>(kind: ErrorKind, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let cause = Cause {
            classification: short_type_name::<E>().to_string(),
            message: err.to_string(),
        };
        Self::logged(kind, cause, Some(Box::new(err)))
    }

    /// Shorthand for an operation attempted before the session is ready.
    pub fn session_not_initialized(detail: impl Into<String>) -> Self {
        Self::local(ErrorKind::SessionNotInitialized, "SessionState", detail)
    }

    fn logged(
        kind: ErrorKind,
        cause: Cause,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        warn!(kind = %kind, cause = %cause, "{}", kind.message());
        Self {
            kind,
            cause,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The kind's fixed message.
    pub fn message(&self) -> &'static str {
        self.kind.message()
    }

    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Cause: [{}]", self.kind.message(), self.cause)
    }
}

/// A specialized Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Last path segment of a type name, e.g. `TimestampError`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn remote_error_keeps_classification_and_message() {
        let err = AdapterError::remote(
            ErrorKind::QueryFailed,
            TransportError::network("connection refused"),
        );
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
        assert_eq!(err.cause().classification(), "network_error");
        assert_eq!(err.cause().message(), "connection refused");
        assert_eq!(
            err.to_string(),
            "The calendar query failed. Cause: [network_error: connection refused]"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn not_found_becomes_event_not_found_for_item_operations() {
        for kind in [ErrorKind::UpdateFailed, ErrorKind::DeleteFailed] {
            let err = AdapterError::remote(
                kind,
                TransportError::not_found("gone").with_response_code("ErrorItemNotFound"),
            );
            assert_eq!(err.kind(), ErrorKind::EventNotFound);
            assert_eq!(err.cause().classification(), "ErrorItemNotFound");
        }
    }

    #[test]
    fn endpoint_not_found_keeps_kind_for_item_operations() {
        for kind in [ErrorKind::UpdateFailed, ErrorKind::DeleteFailed] {
            let err =
                AdapterError::remote(kind, TransportError::not_found("Service endpoint not found"));
            assert_eq!(err.kind(), kind);
            assert_eq!(err.cause().classification(), "not_found");
        }
    }

    #[test]
    fn not_found_while_querying_stays_query_failed() {
        let err = AdapterError::remote(ErrorKind::QueryFailed, TransportError::not_found("gone"));
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
    }

    #[test]
    fn other_failures_keep_kind() {
        let err = AdapterError::remote(
            ErrorKind::DeleteFailed,
            TransportError::service("ErrorAccessDenied", "no"),
        );
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);
    }

    #[test]
    fn local_from_uses_short_type_name() {
        let parse_err = calbridge_core::parse_canonical("soon").unwrap_err();
        let err = AdapterError::local_from(ErrorKind::InvalidDateFormat, parse_err);
        assert_eq!(err.kind(), ErrorKind::InvalidDateFormat);
        assert_eq!(err.cause().classification(), "TimestampError");
        assert!(err.cause().message().contains("soon"));
    }

    #[test]
    fn local_kinds() {
        assert!(ErrorKind::SessionNotInitialized.is_local());
        assert!(ErrorKind::InvalidDateFormat.is_local());
        assert!(!ErrorKind::QueryFailed.is_local());
        assert!(!ErrorKind::DiscoveryFailed.is_local());
    }

    #[test]
    fn session_not_initialized_display() {
        let err = AdapterError::session_not_initialized("no session");
        assert_eq!(
            err.to_string(),
            "The calendar session is not initialized. Cause: [SessionState: no session]"
        );
        assert!(err.source().is_none());
    }
}
