//! An in-process mailbox.
//!
//! [`InMemoryMailbox`] implements [`Backend`] and [`ExchangeService`] over a
//! shared store and behaves like a small scheduling server: overlapping
//! calendar views sorted by start, change keys bumped on every write,
//! attendee de-duplication, and a deleted-items folder that re-keys items
//! moved into it. Every remote call is counted so tests can assert that
//! nothing was sent.
//!
//! Clones share the same store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use calbridge_core::TimeWindow;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::trace;
use url::Url;

use crate::remote::{
    Appointment, AppointmentUpdate, Attendee, Backend, BoxFuture, CalendarView,
    ConflictResolution, Credentials, DeleteMode, ExchangeService, FieldChange, ItemId,
    PropertySet, SendCancellations, SendInvitations, TransportError, TransportResult,
    WellKnownFolder,
};

const LOCAL_ENDPOINT: &str = "https://localhost/EWS/Exchange.asmx";

/// Snapshot of the calls a mailbox received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub discover: usize,
    pub connect: usize,
    pub find: usize,
    pub bind: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    /// Calls that would have reached the network. Connecting is local.
    pub fn remote(&self) -> usize {
        self.discover + self.find + self.bind + self.update + self.delete
    }
}

#[derive(Default)]
struct Counters {
    discover: AtomicUsize,
    connect: AtomicUsize,
    find: AtomicUsize,
    bind: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

impl Counters {
    fn hit(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            discover: self.discover.load(Ordering::SeqCst),
            connect: self.connect.load(Ordering::SeqCst),
            find: self.find.load(Ordering::SeqCst),
            bind: self.bind.load(Ordering::SeqCst),
            update: self.update.load(Ordering::SeqCst),
            delete: self.delete.load(Ordering::SeqCst),
        }
    }
}

#[derive(Default)]
struct Store {
    calendar: Vec<Appointment>,
    deleted_items: Vec<Appointment>,
    next_id: u64,
    next_revision: u64,
    injected_failure: Option<TransportError>,
}

impl Store {
    fn folder(&self, folder: WellKnownFolder) -> &[Appointment] {
        match folder {
            WellKnownFolder::Calendar => &self.calendar,
            WellKnownFolder::DeletedItems => &self.deleted_items,
        }
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("AAMkMem{:06}", self.next_id)
    }

    fn new_change_key(&mut self) -> String {
        self.next_revision += 1;
        format!("DwAAMem{:06}", self.next_revision)
    }

    fn position(&self, unique_id: &str) -> Option<usize> {
        self.calendar
            .iter()
            .position(|item| item.id.as_ref().is_some_and(|id| id.unique_id == unique_id))
    }

    fn find_anywhere(&self, unique_id: &str) -> Option<&Appointment> {
        self.calendar
            .iter()
            .chain(self.deleted_items.iter())
            .find(|item| item.id.as_ref().is_some_and(|id| id.unique_id == unique_id))
    }

    fn take_failure(&mut self) -> TransportResult<()> {
        match self.injected_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A mailbox held in memory.
#[derive(Clone)]
pub struct InMemoryMailbox {
    owner: String,
    secret: Option<String>,
    endpoint: Url,
    store: Arc<Mutex<Store>>,
    counters: Arc<Counters>,
}

impl InMemoryMailbox {
    /// Creates an empty mailbox owned by `owner`.
    ///
    /// Discovery succeeds for any address in the owner's domain and yields
    /// `https://mail.<domain>/EWS/Exchange.asmx`.
    pub fn new(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        let endpoint = Url::parse(&format!("https://mail.{}/EWS/Exchange.asmx", domain_of(&owner)))
            .or_else(|_| Url::parse(LOCAL_ENDPOINT))
            .expect("LOCAL_ENDPOINT is a valid URL");

        Self {
            owner,
            secret: None,
            endpoint,
            store: Arc::new(Mutex::new(Store::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Requires this secret on every remote call.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The endpoint published by discovery.
    pub fn endpoint(&self) -> Url {
        self.endpoint.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.counters.snapshot()
    }

    /// Stores an appointment in the calendar folder.
    ///
    /// Missing id, UID, organizer and stamp are filled in the way the server
    /// would on creation. Returns the id with its change key.
    pub async fn insert(&self, mut appointment: Appointment) -> ItemId {
        let mut store = self.store.lock().await;

        let unique_id = match appointment.id.take() {
            Some(id) => id.unique_id,
            None => store.new_id(),
        };
        let id = ItemId::new(unique_id).with_change_key(store.new_change_key());

        appointment.id = Some(id.clone());
        if appointment.ical_uid.is_none() {
            appointment.ical_uid = Some(format!("{}@{}", id.unique_id, domain_of(&self.owner)));
        }
        if appointment.organizer.is_none() {
            appointment.organizer = Some(self.owner.clone());
        }
        if appointment.date_time_stamp.is_none() {
            appointment.date_time_stamp = Some(Utc::now());
        }
        appointment.required_attendees = dedup_attendees(appointment.required_attendees);

        store.calendar.push(appointment);
        id
    }

    /// Returns the stored appointment with this id, in any folder.
    pub async fn get(&self, unique_id: &str) -> Option<Appointment> {
        self.store.lock().await.find_anywhere(unique_id).cloned()
    }

    /// Number of items in a folder.
    pub async fn count(&self, folder: WellKnownFolder) -> usize {
        self.store.lock().await.folder(folder).len()
    }

    /// Makes the next remote call fail with `err`.
    pub async fn fail_next(&self, err: TransportError) {
        self.store.lock().await.injected_failure = Some(err);
    }

    fn authenticate(&self, credentials: &Credentials) -> TransportResult<()> {
        match &self.secret {
            Some(secret) if secret != credentials.secret() => Err(
                TransportError::authentication("the request failed with HTTP status 401"),
            ),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for InMemoryMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMailbox")
            .field("owner", &self.owner)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl Backend for InMemoryMailbox {
    fn name(&self) -> &str {
        "memory"
    }

    fn discover<'a>(
        &'a self,
        address: &'a str,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, TransportResult<Url>> {
        Box::pin(async move {
            Counters::hit(&self.counters.discover);
            self.store.lock().await.take_failure()?;
            self.authenticate(credentials)?;

            if !domain_of(address).eq_ignore_ascii_case(domain_of(&self.owner)) {
                return Err(TransportError::not_found(format!(
                    "no endpoint is published for `{}`",
                    address
                )));
            }
            trace!(address = %address, endpoint = %self.endpoint, "Discovered");
            Ok(self.endpoint.clone())
        })
    }

    fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> TransportResult<Box<dyn ExchangeService>> {
        Counters::hit(&self.counters.connect);
        Ok(Box::new(MailboxSession {
            mailbox: self.clone(),
            endpoint: endpoint.clone(),
            credentials: credentials.clone(),
        }))
    }
}

/// A session bound to an [`InMemoryMailbox`].
struct MailboxSession {
    mailbox: InMemoryMailbox,
    endpoint: Url,
    credentials: Credentials,
}

impl MailboxSession {
    async fn begin(&self, counter: &AtomicUsize) -> TransportResult<tokio::sync::MutexGuard<'_, Store>> {
        Counters::hit(counter);
        let mut store = self.mailbox.store.lock().await;
        store.take_failure()?;
        self.mailbox.authenticate(&self.credentials)?;
        Ok(store)
    }
}

impl ExchangeService for MailboxSession {
    fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn find_appointments<'a>(
        &'a self,
        folder: WellKnownFolder,
        view: &'a CalendarView,
    ) -> BoxFuture<'a, TransportResult<Vec<ItemId>>> {
        Box::pin(async move {
            let store = self.begin(&self.mailbox.counters.find).await?;

            if view.end < view.start {
                return Err(TransportError::service(
                    "ErrorCalendarEndDateIsEarlierThanStartDate",
                    "the end date of the view is earlier than its start date",
                ));
            }

            let window = TimeWindow::new(view.start, view.end);
            let mut hits: Vec<&Appointment> = store
                .folder(folder)
                .iter()
                .filter(|item| match (item.start, item.end) {
                    (Some(start), Some(end)) => window.overlaps(start, end),
                    _ => false,
                })
                .collect();
            hits.sort_by_key(|item| item.start);

            let ids: Vec<ItemId> = hits
                .into_iter()
                .take(view.max_entries)
                .filter_map(|item| item.id.clone())
                .collect();
            trace!(folder = folder.as_str(), found = ids.len(), "FindItem");
            Ok(ids)
        })
    }

    fn bind_appointment<'a>(
        &'a self,
        id: &'a ItemId,
        properties: PropertySet,
    ) -> BoxFuture<'a, TransportResult<Appointment>> {
        Box::pin(async move {
            let store = self.begin(&self.mailbox.counters.bind).await?;
            let item = store
                .find_anywhere(&id.unique_id)
                .ok_or_else(|| item_not_found(&id.unique_id))?;

            Ok(match properties {
                PropertySet::IdOnly => Appointment {
                    id: item.id.clone(),
                    ..Appointment::default()
                },
                PropertySet::FirstClassProperties => item.clone(),
            })
        })
    }

    fn update_appointment<'a>(
        &'a self,
        update: &'a AppointmentUpdate,
        conflict: ConflictResolution,
        _invitations: SendInvitations,
    ) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            let mut store = self.begin(&self.mailbox.counters.update).await?;
            let index = store
                .position(&update.id.unique_id)
                .ok_or_else(|| item_not_found(&update.id.unique_id))?;

            let current_key = store.calendar[index]
                .id
                .as_ref()
                .and_then(|id| id.change_key.clone());
            let stale = update.id.change_key.is_some() && update.id.change_key != current_key;
            if stale && conflict == ConflictResolution::NeverOverwrite {
                return Err(TransportError::service(
                    "ErrorIrresolvableConflict",
                    "the item was changed since it was bound",
                ));
            }

            let mut item = store.calendar[index].clone();
            apply_text(&mut item.subject, update.subject.as_ref());
            apply_text(&mut item.location, update.location.as_ref());
            apply_text(&mut item.body, update.body.as_ref());
            if let Some(start) = update.start {
                item.start = Some(start);
            }
            if let Some(end) = update.end {
                item.end = Some(end);
            }
            if let (Some(start), Some(end)) = (item.start, item.end) {
                if end < start {
                    return Err(TransportError::service(
                        "ErrorCalendarEndDateIsEarlierThanStartDate",
                        "the end date is earlier than the start date",
                    ));
                }
            }
            match &update.required_attendees {
                Some(FieldChange::Set(addresses)) => {
                    item.required_attendees =
                        dedup_attendees(addresses.iter().map(Attendee::new).collect());
                }
                Some(FieldChange::Clear) => item.required_attendees.clear(),
                None => {}
            }

            let change_key = store.new_change_key();
            item.id = Some(ItemId::new(update.id.unique_id.clone()).with_change_key(change_key));
            item.date_time_stamp = Some(Utc::now());
            store.calendar[index] = item;

            trace!(id = %update.id.unique_id, conflict = conflict.as_str(), "UpdateItem");
            Ok(())
        })
    }

    fn delete_appointment<'a>(
        &'a self,
        id: &'a ItemId,
        mode: DeleteMode,
        _cancellations: SendCancellations,
    ) -> BoxFuture<'a, TransportResult<()>> {
        Box::pin(async move {
            let mut store = self.begin(&self.mailbox.counters.delete).await?;
            let index = store
                .position(&id.unique_id)
                .ok_or_else(|| item_not_found(&id.unique_id))?;

            let mut item = store.calendar.remove(index);
            if mode == DeleteMode::MoveToDeletedItems {
                let new_id = store.new_id();
                let change_key = store.new_change_key();
                item.id = Some(ItemId::new(new_id).with_change_key(change_key));
                store.deleted_items.push(item);
            }

            trace!(id = %id.unique_id, mode = mode.as_str(), "DeleteItem");
            Ok(())
        })
    }
}

fn item_not_found(unique_id: &str) -> TransportError {
    TransportError::not_found(format!("the item `{}` was not found in the store", unique_id))
        .with_response_code("ErrorItemNotFound")
}

fn apply_text(field: &mut Option<String>, change: Option<&FieldChange<String>>) {
    match change {
        Some(FieldChange::Set(value)) => *field = Some(value.clone()),
        Some(FieldChange::Clear) => *field = None,
        None => {}
    }
}

/// Drops repeated addresses, keeping the first occurrence.
fn dedup_attendees(attendees: Vec<Attendee>) -> Vec<Attendee> {
    let mut seen: Vec<String> = Vec::with_capacity(attendees.len());
    attendees
        .into_iter()
        .filter(|attendee| {
            let key = attendee.address.to_ascii_lowercase();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}

fn domain_of(address: &str) -> &str {
    address.rsplit_once('@').map_or(address, |(_, domain)| domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, d, h, 0, 0).unwrap()
    }

    fn meeting(subject: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Appointment {
        Appointment {
            subject: Some(subject.to_string()),
            start: Some(start),
            end: Some(end),
            ..Appointment::default()
        }
    }

    fn session(mailbox: &InMemoryMailbox) -> Box<dyn ExchangeService> {
        mailbox
            .connect(&mailbox.endpoint(), &Credentials::new(mailbox.owner(), "secret"))
            .unwrap()
    }

    #[tokio::test]
    async fn discovery_is_limited_to_the_owner_domain() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let credentials = Credentials::new("owner@example.com", "secret");

        let endpoint = mailbox.discover("Other@Example.com", &credentials).await.unwrap();
        assert_eq!(endpoint.as_str(), "https://mail.example.com/EWS/Exchange.asmx");

        let err = mailbox
            .discover("someone@elsewhere.org", &credentials)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mailbox.calls().discover, 2);
    }

    #[tokio::test]
    async fn wrong_secret_fails_authentication() {
        let mailbox = InMemoryMailbox::new("owner@example.com").with_secret("right");
        let service = mailbox
            .connect(&mailbox.endpoint(), &Credentials::new("owner@example.com", "wrong"))
            .unwrap();

        let view = CalendarView::new(utc(1, 0), utc(30, 0), 10);
        let err = service
            .find_appointments(WellKnownFolder::Calendar, &view)
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "authentication_failed");
    }

    #[tokio::test]
    async fn calendar_view_overlaps_sorts_and_caps() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        mailbox.insert(meeting("late", utc(5, 9), utc(5, 10))).await;
        mailbox.insert(meeting("early", utc(2, 9), utc(2, 10))).await;
        mailbox.insert(meeting("straddles", utc(1, 23), utc(2, 1))).await;
        mailbox.insert(meeting("outside", utc(20, 9), utc(20, 10))).await;
        let service = session(&mailbox);

        let view = CalendarView::new(utc(2, 0), utc(10, 0), 10);
        let ids = service
            .find_appointments(WellKnownFolder::Calendar, &view)
            .await
            .unwrap();
        let mut subjects = Vec::new();
        for id in &ids {
            subjects.push(mailbox.get(&id.unique_id).await.unwrap().subject.unwrap());
        }
        assert_eq!(subjects, ["straddles", "early", "late"]);

        let capped = CalendarView::new(utc(2, 0), utc(10, 0), 2);
        let ids = service
            .find_appointments(WellKnownFolder::Calendar, &capped)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn inverted_view_is_a_service_error() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let service = session(&mailbox);
        let view = CalendarView::new(utc(10, 0), utc(2, 0), 10);
        let err = service
            .find_appointments(WellKnownFolder::Calendar, &view)
            .await
            .unwrap_err();
        assert_eq!(
            err.classification(),
            "ErrorCalendarEndDateIsEarlierThanStartDate"
        );
    }

    #[tokio::test]
    async fn insert_fills_server_side_properties() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let id = mailbox.insert(meeting("m", utc(2, 9), utc(2, 10))).await;
        let stored = mailbox.get(&id.unique_id).await.unwrap();

        assert!(id.change_key.is_some());
        assert_eq!(stored.organizer.as_deref(), Some("owner@example.com"));
        assert!(stored.ical_uid.unwrap().ends_with("@example.com"));
        assert!(stored.date_time_stamp.is_some());
    }

    #[tokio::test]
    async fn update_bumps_change_key_and_dedups_attendees() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let id = mailbox.insert(meeting("m", utc(2, 9), utc(2, 10))).await;
        let service = session(&mailbox);

        let mut update = AppointmentUpdate::new(id.clone());
        update.subject = Some(FieldChange::Set("renamed".to_string()));
        update.required_attendees = Some(FieldChange::Set(vec![
            "a@example.com".to_string(),
            "A@example.com".to_string(),
            "b@example.com".to_string(),
        ]));
        service
            .update_appointment(&update, ConflictResolution::AutoResolve, SendInvitations::SendToNone)
            .await
            .unwrap();

        let stored = mailbox.get(&id.unique_id).await.unwrap();
        assert_eq!(stored.subject.as_deref(), Some("renamed"));
        let addresses: Vec<_> = stored
            .required_attendees
            .iter()
            .map(|a| a.address.as_str())
            .collect();
        assert_eq!(addresses, ["a@example.com", "b@example.com"]);
        assert_ne!(stored.id.unwrap().change_key, id.change_key);
    }

    #[tokio::test]
    async fn stale_change_key_only_fails_without_auto_resolve() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let id = mailbox.insert(meeting("m", utc(2, 9), utc(2, 10))).await;
        let service = session(&mailbox);

        let mut first = AppointmentUpdate::new(id.clone());
        first.location = Some(FieldChange::Set("Lab".to_string()));
        service
            .update_appointment(&first, ConflictResolution::AutoResolve, SendInvitations::SendToNone)
            .await
            .unwrap();

        let mut stale = AppointmentUpdate::new(id.clone());
        stale.location = Some(FieldChange::Clear);
        let err = service
            .update_appointment(&stale, ConflictResolution::NeverOverwrite, SendInvitations::SendToNone)
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "ErrorIrresolvableConflict");

        service
            .update_appointment(&stale, ConflictResolution::AutoResolve, SendInvitations::SendToNone)
            .await
            .unwrap();
        assert!(mailbox.get(&id.unique_id).await.unwrap().location.is_none());
    }

    #[tokio::test]
    async fn move_to_deleted_items_rekeys_the_item() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let id = mailbox.insert(meeting("m", utc(2, 9), utc(2, 10))).await;
        let service = session(&mailbox);

        service
            .delete_appointment(&id, DeleteMode::MoveToDeletedItems, SendCancellations::SendToAllAndSaveCopy)
            .await
            .unwrap();

        assert_eq!(mailbox.count(WellKnownFolder::Calendar).await, 0);
        assert_eq!(mailbox.count(WellKnownFolder::DeletedItems).await, 1);
        assert!(mailbox.get(&id.unique_id).await.is_none());

        let err = service
            .bind_appointment(&id, PropertySet::IdOnly)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.classification(), "ErrorItemNotFound");
    }

    #[tokio::test]
    async fn injected_failure_hits_the_next_call_only() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let service = session(&mailbox);
        mailbox.fail_next(TransportError::network("connection reset")).await;

        let view = CalendarView::new(utc(1, 0), utc(30, 0), 10);
        let err = service
            .find_appointments(WellKnownFolder::Calendar, &view)
            .await
            .unwrap_err();
        assert_eq!(err.classification(), "network_error");
        assert!(
            service
                .find_appointments(WellKnownFolder::Calendar, &view)
                .await
                .is_ok()
        );
        assert_eq!(mailbox.calls().find, 2);
    }

    #[test]
    fn connecting_is_not_a_remote_call() {
        let mailbox = InMemoryMailbox::new("owner@example.com");
        let _service = session(&mailbox);
        let calls = mailbox.calls();
        assert_eq!(calls.connect, 1);
        assert_eq!(calls.remote(), 0);
    }
}
