//! Calendar operations over a ready session.
//!
//! [`CalendarAdapter`] is the entry point hosts use: it owns the
//! [`SessionManager`] and exposes the session transitions next to the three
//! calendar operations. Every operation checks the session first, validates
//! its input locally, and only then talks to the service.

use std::num::NonZeroUsize;
use std::sync::Arc;

use calbridge_core::{EventPatch, EventRecord, EventRef};
use tracing::{debug, info};
use url::Url;

use crate::error::{AdapterError, AdapterResult, ErrorKind};
use crate::remote::{
    Backend, CalendarView, ConflictResolution, DeleteMode, ItemId, PropertySet,
    SendCancellations, SendInvitations, WellKnownFolder,
};
use crate::session::{SessionManager, SessionState};
use crate::translate::{appointment_to_record, build_update, parse_patch, parse_range};

/// Confirmation returned by [`CalendarAdapter::delete_event`].
pub const DELETE_CONFIRMATION: &str = "OK";

/// Calendar adapter bound to one backend.
#[derive(Debug)]
pub struct CalendarAdapter {
    session: SessionManager,
}

impl CalendarAdapter {
    /// Creates an adapter with no session.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            session: SessionManager::new(backend),
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.session.endpoint()
    }

    /// See [`SessionManager::create_session`].
    pub fn create_session(&mut self, address: &str, secret: &str) -> AdapterResult<()> {
        self.session.create_session(address, secret)
    }

    /// See [`SessionManager::resolve_endpoint`].
    pub async fn resolve_endpoint(&mut self, address: &str) -> AdapterResult<Url> {
        self.session.resolve_endpoint(address).await
    }

    /// See [`SessionManager::set_endpoint`].
    pub fn set_endpoint(&mut self, uri: &str) -> AdapterResult<()> {
        self.session.set_endpoint(uri)
    }

    /// Lists the events of the default calendar overlapping
    /// `[range_start, range_end)`, at most `max_count` of them.
    ///
    /// Each item is loaded in full before translation.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::SessionNotInitialized`] unless the session is ready
    /// - [`ErrorKind::InvalidDateFormat`] for a malformed bound
    /// - [`ErrorKind::QueryFailed`] for any remote failure
    pub async fn list_events(
        &self,
        range_start: &str,
        range_end: &str,
        max_count: NonZeroUsize,
    ) -> AdapterResult<Vec<EventRecord>> {
        let service = self.session.service()?;
        let window = parse_range(range_start, range_end)?;
        let query_failed = |e| AdapterError::remote(ErrorKind::QueryFailed, e);

        debug!(start = %range_start, end = %range_end, max = max_count.get(), "Listing events");

        let view = CalendarView::new(window.start, window.end, max_count.get());
        let ids = service
            .find_appointments(WellKnownFolder::Calendar, &view)
            .await
            .map_err(query_failed)?;

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let appointment = service
                .bind_appointment(id, PropertySet::FirstClassProperties)
                .await
                .map_err(query_failed)?;
            records.push(appointment_to_record(&appointment).map_err(query_failed)?);
        }

        info!(count = records.len(), "Listed events");
        Ok(records)
    }

    /// Applies a patch and returns the event as stored afterwards.
    ///
    /// Subject, location and body are reset to empty and re-populated only
    /// from the patch; start, end and attendees change only when present.
    /// Hosts relying on partial text updates must resend the current values.
    /// The update resolves conflicts automatically and notifies nobody.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::SessionNotInitialized`] unless the session is ready
    /// - [`ErrorKind::InvalidDateFormat`] for a malformed `start` or `end`
    /// - [`ErrorKind::EventNotFound`] if the id does not resolve
    /// - [`ErrorKind::UpdateFailed`] for any other remote failure
    pub async fn update_event(&self, patch: &EventPatch) -> AdapterResult<EventRecord> {
        let service = self.session.service()?;
        let parsed = parse_patch(patch)?;
        let update_failed = |e| AdapterError::remote(ErrorKind::UpdateFailed, e);

        debug!(id = %parsed.id, "Updating event");

        let bound = service
            .bind_appointment(&ItemId::new(parsed.id.clone()), PropertySet::IdOnly)
            .await
            .map_err(update_failed)?;
        let bound_id = bound.id.unwrap_or_else(|| ItemId::new(parsed.id.clone()));

        let update = build_update(&bound_id, &parsed);
        service
            .update_appointment(
                &update,
                ConflictResolution::AutoResolve,
                SendInvitations::SendToNone,
            )
            .await
            .map_err(update_failed)?;

        let reloaded = service
            .bind_appointment(&ItemId::new(parsed.id.clone()), PropertySet::FirstClassProperties)
            .await
            .map_err(update_failed)?;
        let record = appointment_to_record(&reloaded).map_err(update_failed)?;

        info!(id = %record.id, "Updated event");
        Ok(record)
    }

    /// Moves an event to the deleted-items folder.
    ///
    /// `target` is an id, or any record carrying one such as an
    /// [`EventPatch`]. Returns [`DELETE_CONFIRMATION`].
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::SessionNotInitialized`] unless the session is ready
    /// - [`ErrorKind::EventNotFound`] if the id does not resolve
    /// - [`ErrorKind::DeleteFailed`] for any other remote failure
    pub async fn delete_event(
        &self,
        target: impl Into<EventRef>,
    ) -> AdapterResult<&'static str> {
        let target = target.into();
        let id = target.id.as_str();
        let service = self.session.service()?;
        if id.trim().is_empty() {
            return Err(AdapterError::local(
                ErrorKind::EventNotFound,
                "ItemId",
                "event id is empty",
            ));
        }
        let delete_failed = |e| AdapterError::remote(ErrorKind::DeleteFailed, e);

        debug!(id = %id, "Deleting event");

        let bound = service
            .bind_appointment(&ItemId::new(id), PropertySet::IdOnly)
            .await
            .map_err(delete_failed)?;
        let bound_id = bound.id.unwrap_or_else(|| ItemId::new(id));

        service
            .delete_appointment(
                &bound_id,
                DeleteMode::MoveToDeletedItems,
                SendCancellations::SendToAllAndSaveCopy,
            )
            .await
            .map_err(delete_failed)?;

        info!(id = %id, "Deleted event");
        Ok(DELETE_CONFIRMATION)
    }
}
