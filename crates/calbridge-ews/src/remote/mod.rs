//! Collaborator interfaces consumed by the adapter.
//!
//! The adapter talks to the scheduling service only through two traits:
//!
//! - [`Backend`] - endpoint discovery and binding credentials to an endpoint
//! - [`ExchangeService`] - the calendar operations of one bound session
//!
//! ```text
//!   SessionManager ──discover/connect──▶ Backend
//!         │                                 │
//!         ▼                                 ▼
//!   CalendarAdapter ──find/bind/update/delete──▶ ExchangeService
//! ```
//!
//! The EWS transport (feature `ews`) and the in-memory mailbox both
//! implement these traits.

mod error;
mod model;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use url::Url;

pub use error::{
    ITEM_NOT_FOUND_CODES, TransportError, TransportErrorCode, TransportResult,
};
pub use model::{
    Appointment, AppointmentUpdate, Attendee, CalendarView, ConflictResolution, DeleteMode,
    FieldChange, ItemId, PropertySet, SendCancellations, SendInvitations, WellKnownFolder,
};

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Account credentials: mailbox address and secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    address: String,
    secret: String,
}

impl Credentials {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: secret.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Discovery and session binding.
pub trait Backend: Send + Sync {
    /// Returns the name of this backend (e.g. "ews", "memory").
    fn name(&self) -> &str;

    /// Locates the calendar service endpoint for an account address.
    ///
    /// # Errors
    ///
    /// Fails on network errors, malformed discovery responses, or when no
    /// endpoint is published for the address.
    fn discover<'a>(
        &'a self,
        address: &'a str,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, TransportResult<Url>>;

    /// Binds credentials to an endpoint, producing a session handle.
    ///
    /// Connecting is local: no request is sent until the first operation.
    fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> TransportResult<Box<dyn ExchangeService>>;
}

/// Calendar operations of one bound session.
pub trait ExchangeService: Send + Sync {
    /// Returns the endpoint this session talks to.
    fn endpoint(&self) -> &Url;

    /// Finds the items of `folder` overlapping the view, in service order.
    ///
    /// Only ids are returned; callers bind each one for its properties.
    fn find_appointments<'a>(
        &'a self,
        folder: WellKnownFolder,
        view: &'a CalendarView,
    ) -> BoxFuture<'a, TransportResult<Vec<ItemId>>>;

    /// Loads one item.
    ///
    /// Fails with a not-found error if the id does not resolve.
    fn bind_appointment<'a>(
        &'a self,
        id: &'a ItemId,
        properties: PropertySet,
    ) -> BoxFuture<'a, TransportResult<Appointment>>;

    /// Applies field-level changes to one item.
    fn update_appointment<'a>(
        &'a self,
        update: &'a AppointmentUpdate,
        conflict: ConflictResolution,
        invitations: SendInvitations,
    ) -> BoxFuture<'a, TransportResult<()>>;

    /// Removes one item.
    fn delete_appointment<'a>(
        &'a self,
        id: &'a ItemId,
        mode: DeleteMode,
        cancellations: SendCancellations,
    ) -> BoxFuture<'a, TransportResult<()>>;
}
