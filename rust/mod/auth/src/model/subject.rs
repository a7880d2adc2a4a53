use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque user identifier issued by the identity provider.
///
/// Google subjects are decimal strings of up to 21 digits, which overflow
/// `i64`; `u128` holds every value. Stored and serialized as canonical
/// decimal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(pub u128);

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for subject strings that are not plain decimal integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSubject(pub String);

impl fmt::Display for InvalidSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid subject '{}'", self.0)
    }
}

impl std::error::Error for InvalidSubject {}

impl FromStr for Subject {
    type Err = InvalidSubject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // u128::from_str accepts a leading '+', which would break the
        // one-text-per-value mapping.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidSubject(s.to_string()));
        }
        s.parse::<u128>()
            .map(Subject)
            .map_err(|_| InvalidSubject(s.to_string()))
    }
}

impl TryFrom<String> for Subject {
    type Error = InvalidSubject;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Subject> for String {
    fn from(s: Subject) -> Self {
        s.to_string()
    }
}
