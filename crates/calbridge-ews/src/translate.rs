//! Translation between [`EventRecord`]/[`EventPatch`] and the remote model.
//!
//! Reading: [`appointment_to_record`] turns a fully loaded [`Appointment`]
//! into an [`EventRecord`], refusing items that lack a mandatory property.
//!
//! Writing: [`parse_patch`] validates a patch without touching the network,
//! then [`build_update`] turns it into field-level changes against the bound
//! revision of the item. Subject, location and body are always part of the
//! update: blanked, then re-populated from the patch.

use calbridge_core::{AttendeeList, EventPatch, EventRecord, TimeWindow, parse_canonical};
use chrono::{DateTime, Utc};

use crate::error::{AdapterError, AdapterResult, ErrorKind};
use crate::remote::{
    Appointment, AppointmentUpdate, FieldChange, ItemId, TransportError, TransportResult,
};

/// A patch whose textual fields have been validated and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPatch {
    pub id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub subject: Option<String>,
    pub location: Option<String>,
    pub body: Option<String>,
    pub attendees: Option<AttendeeList>,
}

/// Parses a query range given as canonical timestamps.
pub fn parse_range(range_start: &str, range_end: &str) -> AdapterResult<TimeWindow> {
    TimeWindow::parse(range_start, range_end)
        .map_err(|e| AdapterError::local_from(ErrorKind::InvalidDateFormat, e))
}

/// Validates a patch before anything is sent.
///
/// # Errors
///
/// [`ErrorKind::EventNotFound`] for an empty id, [`ErrorKind::InvalidDateFormat`]
/// for a malformed `start` or `end`.
pub fn parse_patch(patch: &EventPatch) -> AdapterResult<ParsedPatch> {
    if patch.id.trim().is_empty() {
        return Err(AdapterError::local(
            ErrorKind::EventNotFound,
            "EventPatch",
            "patch has an empty id",
        ));
    }

    let parse_time = |value: &Option<String>| -> AdapterResult<Option<DateTime<Utc>>> {
        value
            .as_deref()
            .map(parse_canonical)
            .transpose()
            .map_err(|e| AdapterError::local_from(ErrorKind::InvalidDateFormat, e))
    };

    Ok(ParsedPatch {
        id: patch.id.clone(),
        start: parse_time(&patch.start)?,
        end: parse_time(&patch.end)?,
        subject: patch.subject.clone(),
        location: patch.location.clone(),
        body: patch.body.clone(),
        attendees: patch.attendees.as_deref().map(AttendeeList::parse),
    })
}

/// Builds the update for a bound item.
///
/// `bound` carries the change key of the revision that was loaded, so the
/// service can resolve concurrent edits.
pub fn build_update(bound: &ItemId, patch: &ParsedPatch) -> AppointmentUpdate {
    let mut update = AppointmentUpdate::new(bound.clone());

    update.subject = Some(FieldChange::text(patch.subject.clone().unwrap_or_default()));
    update.location = Some(FieldChange::text(patch.location.clone().unwrap_or_default()));
    update.body = Some(FieldChange::text(patch.body.clone().unwrap_or_default()));

    update.start = patch.start;
    update.end = patch.end;

    update.required_attendees = patch.attendees.as_ref().map(|list| {
        if list.is_empty() {
            FieldChange::Clear
        } else {
            FieldChange::Set(list.addresses().to_vec())
        }
    });

    update
}

/// Translates a fully loaded appointment.
///
/// Text fields the service omits are empty strings; id, UID, times,
/// organizer and calendar-stamp are mandatory.
///
/// # Errors
///
/// An invalid-response error naming the first missing mandatory property.
pub fn appointment_to_record(appointment: &Appointment) -> TransportResult<EventRecord> {
    let id = required(appointment.id.as_ref(), "id")?;

    Ok(EventRecord {
        id: id.unique_id.clone(),
        ical_uid: required(appointment.ical_uid.as_ref(), "iCalUid")?.clone(),
        subject: appointment.subject.clone().unwrap_or_default(),
        start: *required(appointment.start.as_ref(), "start")?,
        end: *required(appointment.end.as_ref(), "end")?,
        body: appointment.body.clone().unwrap_or_default(),
        location: appointment.location.clone().unwrap_or_default(),
        organizer: required(appointment.organizer.as_ref(), "organizer")?.clone(),
        attendees: AttendeeList::new(
            appointment
                .required_attendees
                .iter()
                .map(|attendee| attendee.address.clone())
                .collect(),
        ),
        last_modified: *required(appointment.date_time_stamp.as_ref(), "lastModified")?,
    })
}

fn required<'a, T>(value: Option<&'a T>, property: &str) -> TransportResult<&'a T> {
    value.ok_or_else(|| {
        TransportError::invalid_response(format!("appointment is missing `{}`", property))
    })
}
