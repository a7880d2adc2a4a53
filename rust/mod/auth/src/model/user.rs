use serde::{Deserialize, Serialize};

use super::{Audit, Subject};

/// A user known to the system, mirrored from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// External identity id. Immutable once created.
    pub subject: Subject,

    /// Display name. Must be non-empty.
    pub fullname: String,

    /// Email address. Must be a syntactically valid address.
    pub email: String,

    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(flatten)]
    pub audit: Audit,
}

impl User {
    /// A new, not yet persisted user.
    pub fn new(subject: Subject, fullname: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject,
            fullname: fullname.into(),
            email: email.into(),
            picture: None,
            audit: Audit::default(),
        }
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }
}
