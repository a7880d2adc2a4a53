use serde::{Deserialize, Serialize};

use super::Audit;

/// Composite key of a [`GroupLevel`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupLevelId {
    pub group_name: String,
    pub level_name: String,
}

impl GroupLevelId {
    pub fn new(group_name: impl Into<String>, level_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            level_name: level_name.into(),
        }
    }
}

/// A named level within a group (e.g. "admin" / "superadmin").
///
/// `group_name` must reference an existing group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLevel {
    pub group_name: String,
    pub level_name: String,

    #[serde(flatten)]
    pub audit: Audit,
}

impl GroupLevel {
    pub fn new(group_name: impl Into<String>, level_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            level_name: level_name.into(),
            audit: Audit::default(),
        }
    }

    pub fn id(&self) -> GroupLevelId {
        GroupLevelId::new(&self.group_name, &self.level_name)
    }
}
