//! Entity implementations for the auth models.

use std::sync::OnceLock;

use regex::Regex;
use tricore_sql::{Row, Value};

use crate::model::*;
use crate::service::AuthError;
use crate::store::{audit, opt_text, subject, text, Entity};

/// Practical address syntax: local part, `@`, dotted domain.
const EMAIL_PATTERN: &str =
    r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex"))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Numeric order for canonical decimal subjects held in TEXT columns.
const SUBJECT_ORDER: &str = "LENGTH(subject), subject";

fn require_non_empty(field: &str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

// ── User ──

impl Entity for User {
    type Key = Subject;

    const TABLE: &'static str = "users";
    const KEY_COLUMNS: &'static [&'static str] = &["subject"];
    const DATA_COLUMNS: &'static [&'static str] = &["fullname", "email", "picture"];

    fn order_by() -> String {
        SUBJECT_ORDER.to_string()
    }

    fn key(&self) -> Subject {
        self.subject
    }

    fn key_params(key: &Subject) -> Vec<Value> {
        vec![Value::Text(key.to_string())]
    }

    fn data_params(&self) -> Vec<Value> {
        vec![
            Value::Text(self.fullname.clone()),
            Value::Text(self.email.clone()),
            self.picture.clone().map(Value::Text).unwrap_or(Value::Null),
        ]
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn from_row(row: &Row) -> Result<Self, AuthError> {
        Ok(User {
            subject: subject(row, "subject")?,
            fullname: text(row, "fullname")?,
            email: text(row, "email")?,
            picture: opt_text(row, "picture"),
            audit: audit(row)?,
        })
    }

    fn validate(&self) -> Result<(), AuthError> {
        require_non_empty("fullname", &self.fullname)?;
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

// ── Group ──

impl Entity for Group {
    type Key = String;

    const TABLE: &'static str = "groups";
    const KEY_COLUMNS: &'static [&'static str] = &["group_name"];
    const DATA_COLUMNS: &'static [&'static str] = &[];

    fn key(&self) -> String {
        self.group_name.clone()
    }

    fn key_params(key: &String) -> Vec<Value> {
        vec![Value::Text(key.clone())]
    }

    fn data_params(&self) -> Vec<Value> {
        Vec::new()
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn from_row(row: &Row) -> Result<Self, AuthError> {
        Ok(Group {
            group_name: text(row, "group_name")?,
            audit: audit(row)?,
        })
    }

    fn validate(&self) -> Result<(), AuthError> {
        require_non_empty("group_name", &self.group_name)
    }
}

// ── GroupLevel ──

impl Entity for GroupLevel {
    type Key = GroupLevelId;

    const TABLE: &'static str = "group_levels";
    const KEY_COLUMNS: &'static [&'static str] = &["group_name", "level_name"];
    const DATA_COLUMNS: &'static [&'static str] = &[];

    fn key(&self) -> GroupLevelId {
        self.id()
    }

    fn key_params(key: &GroupLevelId) -> Vec<Value> {
        vec![
            Value::Text(key.group_name.clone()),
            Value::Text(key.level_name.clone()),
        ]
    }

    fn data_params(&self) -> Vec<Value> {
        Vec::new()
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn from_row(row: &Row) -> Result<Self, AuthError> {
        Ok(GroupLevel {
            group_name: text(row, "group_name")?,
            level_name: text(row, "level_name")?,
            audit: audit(row)?,
        })
    }

    fn validate(&self) -> Result<(), AuthError> {
        require_non_empty("group_name", &self.group_name)?;
        require_non_empty("level_name", &self.level_name)
    }
}

// ── Permission ──

impl Entity for Permission {
    type Key = PermissionId;

    const TABLE: &'static str = "permissions";
    const KEY_COLUMNS: &'static [&'static str] = &["subject", "group_name", "level_name"];
    const DATA_COLUMNS: &'static [&'static str] = &[];

    fn order_by() -> String {
        format!("{}, group_name, level_name", SUBJECT_ORDER)
    }

    fn key(&self) -> PermissionId {
        self.id()
    }

    fn key_params(key: &PermissionId) -> Vec<Value> {
        vec![
            Value::Text(key.subject.to_string()),
            Value::Text(key.group_name.clone()),
            Value::Text(key.level_name.clone()),
        ]
    }

    fn data_params(&self) -> Vec<Value> {
        Vec::new()
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn from_row(row: &Row) -> Result<Self, AuthError> {
        Ok(Permission {
            subject: subject(row, "subject")?,
            group_name: text(row, "group_name")?,
            level_name: text(row, "level_name")?,
            audit: audit(row)?,
        })
    }

    fn validate(&self) -> Result<(), AuthError> {
        require_non_empty("group_name", &self.group_name)?;
        require_non_empty("level_name", &self.level_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@"));
        assert!(!is_valid_email("ada @example.com"));
    }

    #[test]
    fn user_validation() {
        let ok = User::new(Subject(1), "Ada", "ada@example.com");
        assert!(ok.validate().is_ok());

        let bad_email = User::new(Subject(1), "Ada", "ada");
        assert!(matches!(bad_email.validate(), Err(AuthError::Validation(_))));

        let no_name = User::new(Subject(1), "  ", "ada@example.com");
        assert!(matches!(no_name.validate(), Err(AuthError::Validation(_))));
    }

    #[test]
    fn level_validation() {
        assert!(GroupLevel::new("admin", "").validate().is_err());
        assert!(GroupLevel::new("", "superadmin").validate().is_err());
        assert!(GroupLevel::new("admin", "superadmin").validate().is_ok());
        assert!(Group::new("").validate().is_err());
    }
}
