use serde::{Deserialize, Serialize};

use super::{Audit, Subject};

/// Composite key of a [`Permission`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionId {
    pub subject: Subject,
    pub group_name: String,
    pub level_name: String,
}

impl PermissionId {
    pub fn new(
        subject: Subject,
        group_name: impl Into<String>,
        level_name: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            group_name: group_name.into(),
            level_name: level_name.into(),
        }
    }
}

/// Grant of a group level to a user.
///
/// Deleted automatically when either the user or the group level goes away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub subject: Subject,
    pub group_name: String,
    pub level_name: String,

    #[serde(flatten)]
    pub audit: Audit,
}

impl Permission {
    pub fn new(
        subject: Subject,
        group_name: impl Into<String>,
        level_name: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            group_name: group_name.into(),
            level_name: level_name.into(),
            audit: Audit::default(),
        }
    }

    pub fn id(&self) -> PermissionId {
        PermissionId::new(self.subject, &self.group_name, &self.level_name)
    }
}
