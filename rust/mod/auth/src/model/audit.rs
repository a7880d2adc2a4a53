use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optimistic-lock version and timestamps carried by every persisted entity.
///
/// `version == 0` marks an entity that has never been saved. The repository
/// sets `version = 1` on insert and increments it on every successful
/// update; a save carrying any other version than the stored one fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// True until the first successful save.
    pub fn is_new(&self) -> bool {
        self.version == 0
    }
}
