//! Session lifecycle.
//!
//! A [`SessionManager`] holds at most one session and walks it through
//! `Uninitialized → SessionCreated → Ready`:
//!
//! - [`SessionManager::create_session`] works from any state and discards
//!   whatever session existed before.
//! - [`SessionManager::resolve_endpoint`] or [`SessionManager::set_endpoint`]
//!   binds an endpoint and makes the session ready.
//! - [`SessionManager::service`] hands out the bound handle, and refuses to
//!   before the session is ready.
//!
//! Transitions take `&mut self`, so a manager cannot change state while an
//! operation borrows its service handle.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::error::{AdapterError, AdapterResult, ErrorKind};
use crate::remote::{Backend, Credentials, ExchangeService};

/// The observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials yet.
    Uninitialized,
    /// Credentials set, no endpoint.
    SessionCreated,
    /// Endpoint bound; calendar operations are allowed.
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::SessionCreated => "session_created",
            Self::Ready => "ready",
        };
        write!(f, "{}", name)
    }
}

enum Session {
    Uninitialized,
    Created {
        credentials: Credentials,
    },
    Ready {
        credentials: Credentials,
        service: Box<dyn ExchangeService>,
    },
}

/// Owner of the single session of one adapter instance.
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    session: Session,
}

impl SessionManager {
    /// Creates a manager in the `Uninitialized` state.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            session: Session::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.session {
            Session::Uninitialized => SessionState::Uninitialized,
            Session::Created { .. } => SessionState::SessionCreated,
            Session::Ready { .. } => SessionState::Ready,
        }
    }

    /// Returns the bound endpoint once the session is ready.
    pub fn endpoint(&self) -> Option<&Url> {
        match &self.session {
            Session::Ready { service, .. } => Some(service.endpoint()),
            _ => None,
        }
    }

    /// Returns the session credentials, if a session was created.
    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.session {
            Session::Uninitialized => None,
            Session::Created { credentials } | Session::Ready { credentials, .. } => {
                Some(credentials)
            }
        }
    }

    /// Starts a new session, discarding any previous one.
    ///
    /// Credentials are only checked for emptiness here; the service validates
    /// them on first use. On failure the previous session is left intact.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidCredentials`] if the address or secret is empty.
    pub fn create_session(&mut self, address: &str, secret: &str) -> AdapterResult<()> {
        if address.trim().is_empty() {
            return Err(AdapterError::local(
                ErrorKind::InvalidCredentials,
                "Credentials",
                "address must not be empty",
            ));
        }
        if secret.is_empty() {
            return Err(AdapterError::local(
                ErrorKind::InvalidCredentials,
                "Credentials",
                "secret must not be empty",
            ));
        }

        let previous = self.state();
        self.session = Session::Created {
            credentials: Credentials::new(address.trim(), secret),
        };
        info!(address = %address.trim(), previous = %previous, "Session created");
        Ok(())
    }

    /// Discovers the endpoint for `address` and makes the session ready.
    ///
    /// Discovery authenticates with the session credentials.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::SessionNotInitialized`] without a session,
    /// [`ErrorKind::DiscoveryFailed`] when no endpoint can be located.
    pub async fn resolve_endpoint(&mut self, address: &str) -> AdapterResult<Url> {
        let credentials = self.require_credentials("resolve_endpoint")?.clone();

        debug!(address = %address, backend = %self.backend.name(), "Resolving endpoint");

        let endpoint = self
            .backend
            .discover(address, &credentials)
            .await
            .map_err(|e| AdapterError::remote(ErrorKind::DiscoveryFailed, e))?;

        self.bind(credentials, &endpoint, ErrorKind::DiscoveryFailed)?;
        info!(endpoint = %endpoint, "Endpoint discovered");
        Ok(endpoint)
    }

    /// Sets an explicit endpoint and makes the session ready.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::SessionNotInitialized`] without a session,
    /// [`ErrorKind::InvalidEndpoint`] if `uri` is not an absolute http(s) URL.
    pub fn set_endpoint(&mut self, uri: &str) -> AdapterResult<()> {
        let credentials = self.require_credentials("set_endpoint")?.clone();
        let endpoint = parse_endpoint(uri)?;

        self.bind(credentials, &endpoint, ErrorKind::InvalidEndpoint)?;
        info!(endpoint = %endpoint, "Endpoint set");
        Ok(())
    }

    /// Returns the bound service handle.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::SessionNotInitialized`] unless the session is ready.
    pub fn service(&self) -> AdapterResult<&dyn ExchangeService> {
        match &self.session {
            Session::Ready { service, .. } => Ok(service.as_ref()),
            Session::Uninitialized => Err(AdapterError::session_not_initialized(
                "no session; call create_session first",
            )),
            Session::Created { .. } => Err(AdapterError::session_not_initialized(
                "no endpoint; call resolve_endpoint or set_endpoint first",
            )),
        }
    }

    fn require_credentials(&self, operation: &str) -> AdapterResult<&Credentials> {
        self.credentials().ok_or_else(|| {
            AdapterError::session_not_initialized(format!(
                "{} requires a session; call create_session first",
                operation
            ))
        })
    }

    fn bind(
        &mut self,
        credentials: Credentials,
        endpoint: &Url,
        failure: ErrorKind,
    ) -> AdapterResult<()> {
        let service = self
            .backend
            .connect(endpoint, &credentials)
            .map_err(|e| AdapterError::remote(failure, e))?;
        self.session = Session::Ready {
            credentials,
            service,
        };
        Ok(())
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("endpoint", &self.endpoint().map(Url::as_str))
            .finish()
    }
}

/// Parses an endpoint URI, requiring an absolute http(s) URL with a host.
fn parse_endpoint(uri: &str) -> AdapterResult<Url> {
    let url = Url::parse(uri.trim())
        .map_err(|e| AdapterError::local_from(ErrorKind::InvalidEndpoint, e))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AdapterError::local(
            ErrorKind::InvalidEndpoint,
            "Url",
            format!("`{}` is not an http(s) URL", uri),
        ));
    }
    Ok(url)
}
