//! Attendee list text encoding.
//!
//! Hosts exchange attendee lists as a single string in a bracket-comma form,
//! e.g. `[alice@example.com, bob@example.com]`. Internally the list is an
//! ordered `Vec<String>`; [`AttendeeList`] converts between the two.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An ordered list of attendee addresses.
///
/// Order is significant and duplicates are kept: this type neither sorts nor
/// de-duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeList(Vec<String>);

impl AttendeeList {
    /// Creates a list from already split addresses.
    pub fn new(addresses: Vec<String>) -> Self {
        Self(addresses)
    }

    /// Parses the bracket-comma text form.
    ///
    /// All whitespace is removed, leading `[` and trailing `]` are stripped,
    /// and the remainder is split on commas. Empty tokens are dropped, so
    /// `""`, `"[]"` and `"[ , ]"` all yield an empty list.
    pub fn parse(encoded: &str) -> Self {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = compact.trim_start_matches('[').trim_end_matches(']');

        Self(
            inner
                .split(',')
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Returns the addresses in order.
    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    /// Consumes the list and returns the addresses.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for AttendeeList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Renders the bracket-comma text form, `[a, b]`.
impl fmt::Display for AttendeeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl From<Vec<String>> for AttendeeList {
    fn from(addresses: Vec<String>) -> Self {
        Self(addresses)
    }
}

impl<'a> IntoIterator for &'a AttendeeList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
