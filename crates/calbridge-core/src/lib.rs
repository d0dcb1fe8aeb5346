//! Core types: event records, patches, canonical timestamps, attendee lists

pub mod attendees;
pub mod event;
pub mod time;
pub mod tracing;

pub use attendees::AttendeeList;
pub use event::{EventPatch, EventRecord, EventRef};
pub use time::{CANONICAL_FORMAT, TimeWindow, TimestampError, format_canonical, parse_canonical};
pub use self::tracing::{LogError, LogFormat, LogSettings};
