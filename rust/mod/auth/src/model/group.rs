use serde::{Deserialize, Serialize};

use super::Audit;

/// A permission group. Owns its levels: deleting a group deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_name: String,

    #[serde(flatten)]
    pub audit: Audit,
}

impl Group {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            audit: Audit::default(),
        }
    }
}
