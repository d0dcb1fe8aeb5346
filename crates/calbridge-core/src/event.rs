//! Event records exchanged with callers.
//!
//! - [`EventRecord`]: the fully populated view of one remote appointment
//! - [`EventPatch`]: a sparse update request keyed by the remote item id
//! - [`EventRef`]: the id-only record a delete request carries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attendees::AttendeeList;
use crate::time::canonical;

/// The generic representation of a calendar event.
///
/// Every field is populated. Records are rebuilt from the remote appointment
/// after each successful call; nothing here is cached or tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Remote item id.
    pub id: String,
    /// Calendar-interoperability UID.
    #[serde(rename = "iCalUid")]
    pub ical_uid: String,
    pub subject: String,
    #[serde(with = "canonical")]
    pub start: DateTime<Utc>,
    #[serde(with = "canonical")]
    pub end: DateTime<Utc>,
    /// Plain-text body.
    pub body: String,
    pub location: String,
    /// Organizer address.
    pub organizer: String,
    /// Required attendees, in remote order.
    pub attendees: AttendeeList,
    /// Remote calendar-stamp of the last modification.
    #[serde(with = "canonical")]
    pub last_modified: DateTime<Utc>,
}

/// A sparse update for one event.
///
/// `id` is required. Each other field is applied only when present, with one
/// exception handled by the adapter: `subject`, `location` and `body` are
/// blanked first and then re-populated from the patch.
///
/// Timestamps and the attendee list stay in their textual boundary form so
/// that validation happens in one place, right before the remote call.
/// Deserialisation also accepts the legacy key names `srcId`, `dtstart`,
/// `dtend`, `summary` and `description`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(alias = "srcId")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "dtstart")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "dtend")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "summary")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "description")]
    pub body: Option<String>,
    /// Bracket-comma encoded list, see [`AttendeeList::parse`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<String>,
}

impl EventPatch {
    /// Creates an empty patch for the given item id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the canonical start timestamp.
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    /// Builder method to set the canonical end timestamp.
    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builder method to set the encoded attendee list.
    pub fn with_attendees(mut self, encoded: impl Into<String>) -> Self {
        self.attendees = Some(encoded.into());
        self
    }

    /// Builder method to set attendees from addresses.
    pub fn with_attendee_list(mut self, attendees: &AttendeeList) -> Self {
        self.attendees = Some(attendees.to_string());
        self
    }
}

/// A record naming one event by id.
///
/// Hosts send the same sparse record to delete as to update; every key but
/// the id is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    #[serde(alias = "srcId")]
    pub id: String,
}

impl EventRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl From<&str> for EventRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<&String> for EventRef {
    fn from(id: &String) -> Self {
        Self::new(id.as_str())
    }
}

impl From<String> for EventRef {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&EventPatch> for EventRef {
    fn from(patch: &EventPatch) -> Self {
        Self::new(patch.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> EventRecord {
        EventRecord {
            id: "AAMkAGI2TG93AAA=".to_string(),
            ical_uid: "040000008200E00074C5B7101A82E008".to_string(),
            subject: "Planning".to_string(),
            start: Utc.with_ymd_and_hms(2020, 10, 12, 9, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 10, 12, 10, 0, 0).unwrap(),
            body: "Agenda attached".to_string(),
            location: "Room 4".to_string(),
            organizer: "owner@example.com".to_string(),
            attendees: AttendeeList::new(vec![
                "a@example.com".to_string(),
                "b@example.com".to_string(),
            ]),
            last_modified: Utc.with_ymd_and_hms(2020, 10, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn record_output_shape() {
        insta::assert_json_snapshot!(sample_record(), @r###"
        {
          "id": "AAMkAGI2TG93AAA=",
          "iCalUid": "040000008200E00074C5B7101A82E008",
          "subject": "Planning",
          "start": "2020-10-12T09:00:00.000Z",
          "end": "2020-10-12T10:00:00.000Z",
          "body": "Agenda attached",
          "location": "Room 4",
          "organizer": "owner@example.com",
          "attendees": [
            "a@example.com",
            "b@example.com"
          ],
          "lastModified": "2020-10-01T08:00:00.000Z"
        }
        "###);
    }

    #[test]
    fn record_serde_roundtrip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn patch_builder() {
        let patch = EventPatch::new("item-1")
            .with_subject("New Title")
            .with_start("2020-10-12T09:00:00.000Z")
            .with_attendee_list(&AttendeeList::new(vec!["a@example.com".into()]));

        assert_eq!(patch.id, "item-1");
        assert_eq!(patch.subject.as_deref(), Some("New Title"));
        assert_eq!(patch.attendees.as_deref(), Some("[a@example.com]"));
        assert!(patch.location.is_none());
        assert!(patch.body.is_none());
        assert!(patch.end.is_none());
    }

    #[test]
    fn patch_from_host_json() {
        let patch: EventPatch =
            serde_json::from_str(r#"{"id":"item-1","subject":"New Title","attendees":"[]"}"#)
                .unwrap();
        assert_eq!(patch.id, "item-1");
        assert_eq!(patch.subject.as_deref(), Some("New Title"));
        assert_eq!(patch.attendees.as_deref(), Some("[]"));
        assert!(patch.start.is_none());
    }

    #[test]
    fn patch_accepts_legacy_keys() {
        let patch: EventPatch = serde_json::from_str(
            r#"{
                "srcId": "item-2",
                "dtstart": "2020-10-12T09:00:00.000Z",
                "dtend": "2020-10-12T10:00:00.000Z",
                "summary": "Review",
                "description": "Notes"
            }"#,
        )
        .unwrap();

        assert_eq!(patch.id, "item-2");
        assert_eq!(patch.start.as_deref(), Some("2020-10-12T09:00:00.000Z"));
        assert_eq!(patch.end.as_deref(), Some("2020-10-12T10:00:00.000Z"));
        assert_eq!(patch.subject.as_deref(), Some("Review"));
        assert_eq!(patch.body.as_deref(), Some("Notes"));
    }

    #[test]
    fn patch_without_id_is_rejected() {
        let result = serde_json::from_str::<EventPatch>(r#"{"subject":"orphan"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn patch_serialization_skips_absent_fields() {
        let json = serde_json::to_string(&EventPatch::new("x").with_location("Lab")).unwrap();
        assert_eq!(json, r#"{"id":"x","location":"Lab"}"#);
    }

    #[test]
    fn ref_from_update_shaped_record() {
        let target: EventRef =
            serde_json::from_str(r#"{"srcId":"item-3","summary":"ignored","location":"Lab"}"#)
                .unwrap();
        assert_eq!(target, EventRef::new("item-3"));

        let target: EventRef = serde_json::from_str(r#"{"id":"item-4"}"#).unwrap();
        assert_eq!(target.id, "item-4");

        assert!(serde_json::from_str::<EventRef>(r#"{"subject":"orphan"}"#).is_err());
    }

    #[test]
    fn ref_from_patch_keeps_id() {
        let patch = EventPatch::new("item-5").with_subject("x");
        assert_eq!(EventRef::from(&patch).id, "item-5");
    }
}
