//! The remote appointment model.
//!
//! These types mirror what the scheduling service stores and accepts. Every
//! property of [`Appointment`] is optional because a partial property load,
//! or a service that omits an empty field, is indistinguishable from a
//! missing value at this level. Completeness is enforced by the translator.

use chrono::{DateTime, Utc};

/// A remote item identifier.
///
/// The change key identifies one revision of the item. Binds return it;
/// updates send it back so that the service can detect concurrent edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemId {
    pub unique_id: String,
    pub change_key: Option<String>,
}

impl ItemId {
    /// Creates an id without a change key.
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            change_key: None,
        }
    }

    pub fn with_change_key(mut self, change_key: impl Into<String>) -> Self {
        self.change_key = Some(change_key.into());
        self
    }
}

/// Folders addressed by well-known name rather than id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownFolder {
    /// The mailbox's default calendar.
    Calendar,
    /// The recoverable deleted-items area.
    DeletedItems,
}

impl WellKnownFolder {
    /// Returns the distinguished folder id used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::DeletedItems => "deleteditems",
        }
    }
}

/// How much of an item a bind loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySet {
    /// Only the id and change key.
    IdOnly,
    /// Every first-class property, including body and attendee lists.
    FirstClassProperties,
}

/// A calendar query: items overlapping `[start, end)`, at most
/// `max_entries` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarView {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_entries: usize,
}

impl CalendarView {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, max_entries: usize) -> Self {
        Self {
            start,
            end,
            max_entries,
        }
    }
}

/// Rule applied when the item changed remotely since it was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Fail when the change key is stale.
    NeverOverwrite,
    /// Merge automatically; the submitted fields win.
    AutoResolve,
    /// Overwrite unconditionally.
    AlwaysOverwrite,
}

impl ConflictResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeverOverwrite => "NeverOverwrite",
            Self::AutoResolve => "AutoResolve",
            Self::AlwaysOverwrite => "AlwaysOverwrite",
        }
    }
}

/// Whether attendees are notified of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendInvitations {
    SendToNone,
    SendOnlyToAll,
    SendToAllAndSaveCopy,
}

impl SendInvitations {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendToNone => "SendToNone",
            Self::SendOnlyToAll => "SendOnlyToAll",
            Self::SendToAllAndSaveCopy => "SendToAllAndSaveCopy",
        }
    }
}

/// Whether attendees are notified of a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendCancellations {
    SendToNone,
    SendOnlyToAll,
    SendToAllAndSaveCopy,
}

impl SendCancellations {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendToNone => "SendToNone",
            Self::SendOnlyToAll => "SendOnlyToAll",
            Self::SendToAllAndSaveCopy => "SendToAllAndSaveCopy",
        }
    }
}

/// How an item is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Purge immediately.
    HardDelete,
    /// Move to the dumpster, recoverable by the service.
    SoftDelete,
    /// Move to the deleted-items folder, recoverable by the user.
    MoveToDeletedItems,
}

impl DeleteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HardDelete => "HardDelete",
            Self::SoftDelete => "SoftDelete",
            Self::MoveToDeletedItems => "MoveToDeletedItems",
        }
    }
}

/// A meeting participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub address: String,
    pub name: Option<String>,
}

impl Attendee {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }
}

/// A calendar item as loaded from the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Appointment {
    pub id: Option<ItemId>,
    pub ical_uid: Option<String>,
    pub subject: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Body text, as requested in plain-text form.
    pub body: Option<String>,
    pub location: Option<String>,
    /// Organizer address.
    pub organizer: Option<String>,
    pub required_attendees: Vec<Attendee>,
    pub optional_attendees: Vec<Attendee>,
    pub resources: Vec<Attendee>,
    /// Calendar-stamp of the last modification.
    pub date_time_stamp: Option<DateTime<Utc>>,
}

/// One field-level change of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange<T> {
    /// Replace the stored value.
    Set(T),
    /// Remove the stored value.
    Clear,
}

impl FieldChange<String> {
    /// Sets non-empty text, clears the field for empty text.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Clear
        } else {
            Self::Set(value)
        }
    }
}

impl<T> FieldChange<T> {
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Clear => None,
        }
    }
}

/// The changes submitted for one appointment.
///
/// `None` means "leave the stored value untouched".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentUpdate {
    /// Target item, with the change key of the bound revision.
    pub id: ItemId,
    pub subject: Option<FieldChange<String>>,
    pub location: Option<FieldChange<String>>,
    pub body: Option<FieldChange<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Replacement required-attendee list, in order.
    pub required_attendees: Option<FieldChange<Vec<String>>>,
}

impl AppointmentUpdate {
    /// Creates an update that changes nothing.
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            subject: None,
            location: None,
            body: None,
            start: None,
            end: None,
            required_attendees: None,
        }
    }

    /// Returns true if no field is touched.
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.location.is_none()
            && self.body.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.required_attendees.is_none()
    }
}
