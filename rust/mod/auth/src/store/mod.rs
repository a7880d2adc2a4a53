//! Entity trait + generic Repository with optimistic locking.
//!
//! Entities declare their table, key columns and data columns; the
//! repository builds every statement from those. Each row carries
//! `version`, `created_at` and `updated_at` in addition to its own columns.
//!
//! Writes are single statements. An update is one conditional
//! `UPDATE ... WHERE <key> AND version = ?`, so two writers holding the
//! same version cannot both succeed.

mod entities;

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use tricore_core::{now_utc, parse_rfc3339, to_rfc3339};
use tricore_sql::{Row, SQLError, SQLExecutor, SQLStore, Value};

use crate::model::{Audit, GroupLevel, Permission, Subject};
use crate::service::AuthError;

/// Columns every entity table carries after its own.
const AUDIT_COLUMNS: &[&str] = &["version", "created_at", "updated_at"];

/// Trait implemented by models stored through [`Repository`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// Primary key; composite keys are structs.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync;

    /// Table name in SQL.
    const TABLE: &'static str;

    /// Primary key columns, in `key_params` order.
    const KEY_COLUMNS: &'static [&'static str];

    /// Mutable non-key columns, in `data_params` order.
    const DATA_COLUMNS: &'static [&'static str];

    /// `ORDER BY` clause for listings. Key columns unless the key needs a
    /// non-lexical order.
    fn order_by() -> String {
        Self::KEY_COLUMNS.join(", ")
    }

    fn key(&self) -> Self::Key;

    /// Bind values for the key columns.
    fn key_params(key: &Self::Key) -> Vec<Value>;

    /// Bind values for the data columns.
    fn data_params(&self) -> Vec<Value>;

    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;

    /// Decode a row selected with [`Repository::select_columns`].
    fn from_row(row: &Row) -> Result<Self, AuthError>;

    /// Checked before every write.
    fn validate(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// CRUD operations for an [`Entity`].
pub struct Repository<E: Entity> {
    sql: Arc<dyn SQLStore>,
    _phantom: PhantomData<E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new(self.sql.clone())
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(sql: Arc<dyn SQLStore>) -> Self {
        Self {
            sql,
            _phantom: PhantomData,
        }
    }

    /// Insert a new entity (`version == 0`) or update an existing one.
    ///
    /// Returns the stored state: version bumped, timestamps refreshed.
    /// The argument is left untouched, so a caller holding a stale copy
    /// keeps failing until it re-reads.
    pub fn save(&self, entity: &E) -> Result<E, AuthError> {
        entity.validate()?;
        if entity.audit().is_new() {
            self.insert(entity)
        } else {
            self.update(entity)
        }
    }

    fn insert(&self, entity: &E) -> Result<E, AuthError> {
        let now = now_utc();
        let key = entity.key();

        let mut params = E::key_params(&key);
        params.extend(entity.data_params());
        params.push(Value::Integer(1));
        params.push(Value::Text(to_rfc3339(&now)));
        params.push(Value::Text(to_rfc3339(&now)));

        let columns = Self::all_columns();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            E::TABLE,
            columns.join(", "),
            placeholders.join(", "),
        );

        self.sql.exec(&sql, &params).map_err(|e| match e {
            SQLError::Constraint(m) => {
                AuthError::ConstraintViolation(format!("{} {:?}: {}", E::TABLE, key, m))
            }
            other => other.into(),
        })?;

        debug!(table = E::TABLE, key = ?key, "inserted");

        let mut saved = entity.clone();
        *saved.audit_mut() = Audit {
            version: 1,
            created_at: Some(now),
            updated_at: Some(now),
        };
        Ok(saved)
    }

    fn update(&self, entity: &E) -> Result<E, AuthError> {
        let now = now_utc();
        let key = entity.key();
        let expected = entity.audit().version;

        let mut sets: Vec<String> = Vec::new();
        let mut params = entity.data_params();
        for (i, col) in E::DATA_COLUMNS.iter().enumerate() {
            sets.push(format!("{} = ?{}", col, i + 1));
        }
        params.push(Value::Text(to_rfc3339(&now)));
        sets.push(format!("updated_at = ?{}", params.len()));
        sets.push("version = version + 1".to_string());

        let where_clause = Self::key_where(params.len());
        params.extend(E::key_params(&key));
        params.push(Value::Integer(expected));

        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE {} AND version = ?{}",
            E::TABLE,
            sets.join(", "),
            where_clause,
            params.len(),
        );

        let affected = self.sql.exec(&sql, &params).map_err(|e| match e {
            SQLError::Constraint(m) => {
                AuthError::ConstraintViolation(format!("{} {:?}: {}", E::TABLE, key, m))
            }
            other => other.into(),
        })?;

        if affected == 0 {
            return Err(AuthError::ConcurrencyConflict(format!(
                "{} {:?}: version {} is stale or the row is gone",
                E::TABLE,
                key,
                expected
            )));
        }

        debug!(table = E::TABLE, key = ?key, version = expected + 1, "updated");

        let mut saved = entity.clone();
        let audit = saved.audit_mut();
        audit.version = expected + 1;
        audit.updated_at = Some(now);
        Ok(saved)
    }

    /// Look up one entity by key. A miss is `Ok(None)`.
    pub fn find_by_id(&self, key: &E::Key) -> Result<Option<E>, AuthError> {
        let sql = format!(
            "SELECT {} FROM \"{}\" WHERE {}",
            Self::select_columns(),
            E::TABLE,
            Self::key_where(0),
        );
        let rows = self.sql.query(&sql, &E::key_params(key))?;
        rows.first().map(E::from_row).transpose()
    }

    /// All entities, ordered by key.
    pub fn find_all(&self) -> Result<Vec<E>, AuthError> {
        let sql = format!(
            "SELECT {} FROM \"{}\" ORDER BY {}",
            Self::select_columns(),
            E::TABLE,
            E::order_by(),
        );
        self.find_where_sql(&sql, &[])
    }

    pub fn exists_by_id(&self, key: &E::Key) -> Result<bool, AuthError> {
        exists_on(self.sql.as_ref(), E::TABLE, &Self::key_where(0), &E::key_params(key))
    }

    pub fn count(&self) -> Result<u64, AuthError> {
        let sql = format!("SELECT COUNT(*) AS cnt FROM \"{}\"", E::TABLE);
        let rows = self.sql.query(&sql, &[])?;
        let count = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0);
        Ok(count as u64)
    }

    /// Delete the entity at the version the caller holds.
    ///
    /// A stale version on an existing row is a conflict; an absent row is
    /// a no-op. Dependent rows go with it.
    pub fn delete(&self, entity: &E) -> Result<(), AuthError> {
        delete_checked(self.sql.as_ref(), entity)
    }

    /// Delete by key regardless of version. Returns whether a row existed.
    pub fn delete_by_id(&self, key: &E::Key) -> Result<bool, AuthError> {
        let sql = format!("DELETE FROM \"{}\" WHERE {}", E::TABLE, Self::key_where(0));
        let affected = self.sql.exec(&sql, &E::key_params(key))?;
        if affected > 0 {
            debug!(table = E::TABLE, key = ?key, "deleted");
        }
        Ok(affected > 0)
    }

    /// Delete a batch atomically: one conflict rolls back the whole batch.
    pub fn delete_all(&self, entities: &[E]) -> Result<(), AuthError> {
        let mut failure: Option<AuthError> = None;

        let result = self.sql.transaction(&mut |tx| {
            for entity in entities {
                if let Err(e) = delete_checked(tx, entity) {
                    let msg = e.to_string();
                    failure = Some(e);
                    return Err(SQLError::Rollback(msg));
                }
            }
            Ok(())
        });

        match (result, failure) {
            (_, Some(e)) => Err(e),
            (Err(e), None) => Err(e.into()),
            (Ok(()), None) => Ok(()),
        }
    }

    /// Run a full SELECT built from [`Self::select_columns`] and decode rows.
    pub(crate) fn find_where_sql(&self, sql: &str, params: &[Value]) -> Result<Vec<E>, AuthError> {
        let rows = self.sql.query(sql, params)?;
        rows.iter().map(E::from_row).collect()
    }

    fn all_columns() -> Vec<&'static str> {
        let mut cols = Vec::with_capacity(
            E::KEY_COLUMNS.len() + E::DATA_COLUMNS.len() + AUDIT_COLUMNS.len(),
        );
        cols.extend_from_slice(E::KEY_COLUMNS);
        cols.extend_from_slice(E::DATA_COLUMNS);
        cols.extend_from_slice(AUDIT_COLUMNS);
        cols
    }

    /// Comma-separated column list for SELECTs.
    pub(crate) fn select_columns() -> String {
        Self::all_columns().join(", ")
    }

    /// `k1 = ?{offset+1} AND k2 = ?{offset+2} ...`
    fn key_where(offset: usize) -> String {
        E::KEY_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", col, offset + i + 1))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl Repository<GroupLevel> {
    /// All levels of one group, ordered by level name.
    pub fn find_by_group_name(&self, group_name: &str) -> Result<Vec<GroupLevel>, AuthError> {
        let sql = format!(
            "SELECT {} FROM group_levels WHERE group_name = ?1 ORDER BY level_name",
            Self::select_columns(),
        );
        self.find_where_sql(&sql, &[Value::Text(group_name.to_string())])
    }
}

impl Repository<Permission> {
    /// All grants held by one user.
    pub fn find_by_subject(&self, subject: Subject) -> Result<Vec<Permission>, AuthError> {
        let sql = format!(
            "SELECT {} FROM permissions WHERE subject = ?1 ORDER BY group_name, level_name",
            Self::select_columns(),
        );
        self.find_where_sql(&sql, &[Value::Text(subject.to_string())])
    }
}

/// Version-checked delete, usable on the store or inside a transaction.
fn delete_checked<E: Entity, X: SQLExecutor + ?Sized>(exec: &X, entity: &E) -> Result<(), AuthError> {
    let key = entity.key();
    let where_clause = Repository::<E>::key_where(0);
    let mut params = E::key_params(&key);
    params.push(Value::Integer(entity.audit().version));

    let sql = format!(
        "DELETE FROM \"{}\" WHERE {} AND version = ?{}",
        E::TABLE,
        where_clause,
        params.len(),
    );
    let affected = exec.exec(&sql, &params)?;
    if affected > 0 {
        debug!(table = E::TABLE, key = ?key, "deleted");
        return Ok(());
    }

    if exists_on(exec, E::TABLE, &where_clause, &E::key_params(&key))? {
        return Err(AuthError::ConcurrencyConflict(format!(
            "{} {:?}: version {} is stale",
            E::TABLE,
            key,
            entity.audit().version
        )));
    }
    Ok(())
}

fn exists_on<X: SQLExecutor + ?Sized>(
    exec: &X,
    table: &str,
    where_clause: &str,
    params: &[Value],
) -> Result<bool, AuthError> {
    let sql = format!("SELECT 1 AS hit FROM \"{}\" WHERE {} LIMIT 1", table, where_clause);
    Ok(!exec.query(&sql, params)?.is_empty())
}

// ── Row decoding helpers ──

pub(crate) fn text(row: &Row, col: &str) -> Result<String, AuthError> {
    row.get_str(col)
        .map(str::to_string)
        .ok_or_else(|| AuthError::Internal(format!("missing text column '{}'", col)))
}

pub(crate) fn opt_text(row: &Row, col: &str) -> Option<String> {
    row.get_str(col).map(str::to_string)
}

pub(crate) fn subject(row: &Row, col: &str) -> Result<Subject, AuthError> {
    text(row, col)?
        .parse()
        .map_err(|e| AuthError::Internal(format!("column '{}': {}", col, e)))
}

fn timestamp(row: &Row, col: &str) -> Result<DateTime<Utc>, AuthError> {
    let raw = text(row, col)?;
    parse_rfc3339(&raw)
        .ok_or_else(|| AuthError::Internal(format!("column '{}': bad timestamp '{}'", col, raw)))
}

pub(crate) fn audit(row: &Row) -> Result<Audit, AuthError> {
    Ok(Audit {
        version: row
            .get_i64("version")
            .ok_or_else(|| AuthError::Internal("missing version column".into()))?,
        created_at: Some(timestamp(row, "created_at")?),
        updated_at: Some(timestamp(row, "updated_at")?),
    })
}
