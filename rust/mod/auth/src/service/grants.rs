use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tricore_sql::Value;

use crate::model::Subject;
use crate::service::{AuthError, AuthService};

/// A (group, level) pair held by a user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub group_name: String,
    pub level_name: String,
}

impl Grant {
    pub fn new(group_name: impl Into<String>, level_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            level_name: level_name.into(),
        }
    }
}

impl AuthService {
    /// Every (group, level) granted to `subject`. Unknown subjects have none.
    pub fn grants_for_user(&self, subject: Subject) -> Result<BTreeSet<Grant>, AuthError> {
        let rows = self.sql.query(
            "SELECT group_name, level_name FROM permissions WHERE subject = ?1",
            &[Value::Text(subject.to_string())],
        )?;

        let mut grants = BTreeSet::new();
        for row in &rows {
            if let (Some(g), Some(l)) = (row.get_str("group_name"), row.get_str("level_name")) {
                grants.insert(Grant::new(g, l));
            }
        }
        Ok(grants)
    }

    /// Whether `subject` holds exactly this group level.
    pub fn has_grant(
        &self,
        subject: Subject,
        group_name: &str,
        level_name: &str,
    ) -> Result<bool, AuthError> {
        let rows = self.sql.query(
            "SELECT 1 AS hit FROM permissions
             WHERE subject = ?1 AND group_name = ?2 AND level_name = ?3
             LIMIT 1",
            &[
                Value::Text(subject.to_string()),
                Value::Text(group_name.to_string()),
                Value::Text(level_name.to_string()),
            ],
        )?;
        Ok(!rows.is_empty())
    }

    /// Like [`Self::has_grant`], but a missing grant is `PermissionDenied`.
    pub fn require_grant(
        &self,
        subject: Subject,
        group_name: &str,
        level_name: &str,
    ) -> Result<(), AuthError> {
        if self.has_grant(subject, group_name, level_name)? {
            return Ok(());
        }
        Err(AuthError::PermissionDenied(format!(
            "{} lacks {}/{}",
            subject, group_name, level_name
        )))
    }
}
