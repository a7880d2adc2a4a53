use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};

use crate::error::SQLError;
use crate::traits::{Row, SQLExecutor, SQLStore, Value};

/// How long a statement waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
///
/// Foreign keys are enforced on every connection, so `ON DELETE CASCADE`
/// clauses run inside the deleting statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Self::configure(conn)
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, SQLError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SQLExecutor for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;
        query_on(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        exec_on(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn transaction(
        &self,
        body: &mut dyn FnMut(&dyn SQLExecutor) -> Result<(), SQLError>,
    ) -> Result<(), SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        body(&TxExecutor { conn: &tx })?;

        tx.commit().map_err(classify)
    }
}

/// Executor bound to an open transaction. Dropping the transaction
/// without commit rolls it back.
struct TxExecutor<'a> {
    conn: &'a Connection,
}

impl SQLExecutor for TxExecutor<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        query_on(self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        exec_on(self.conn, sql, params)
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), row_value_at(row, i)?));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn exec_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(classify)?;

    Ok(affected as u64)
}

/// Split constraint failures out of generic execution errors.
fn classify(e: rusqlite::Error) -> SQLError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            SQLError::Constraint(e.to_string())
        }
        _ => SQLError::Execution(e.to_string()),
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_tables() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec("CREATE TABLE parents (id TEXT PRIMARY KEY)", &[])
            .unwrap();
        store
            .exec(
                "CREATE TABLE children (
                    id TEXT PRIMARY KEY,
                    parent_id TEXT NOT NULL REFERENCES parents(id) ON DELETE CASCADE
                )",
                &[],
            )
            .unwrap();
        store
    }

    fn count(store: &SqliteStore, table: &str) -> i64 {
        let rows = store
            .query(&format!("SELECT COUNT(*) AS cnt FROM {}", table), &[])
            .unwrap();
        rows[0].get_i64("cnt").unwrap()
    }

    #[test]
    fn query_returns_typed_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = store
            .query(
                "SELECT 1 AS i, 2.5 AS r, 'x' AS t, NULL AS n",
                &[],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("i"), Some(1));
        assert_eq!(rows[0].get("r"), Some(&Value::Real(2.5)));
        assert_eq!(rows[0].get_str("t"), Some("x"));
        assert_eq!(rows[0].get("n"), Some(&Value::Null));
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let store = store_with_tables();
        let err = store
            .exec(
                "INSERT INTO children (id, parent_id) VALUES (?1, ?2)",
                &[Value::Text("c1".into()), Value::Text("missing".into())],
            )
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)), "got {err:?}");
        assert_eq!(count(&store, "children"), 0);
    }

    #[test]
    fn primary_key_collision_is_constraint() {
        let store = store_with_tables();
        store
            .exec("INSERT INTO parents (id) VALUES ('p')", &[])
            .unwrap();
        let err = store
            .exec("INSERT INTO parents (id) VALUES ('p')", &[])
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)));
    }

    #[test]
    fn delete_cascades() {
        let store = store_with_tables();
        store.exec("INSERT INTO parents (id) VALUES ('p')", &[]).unwrap();
        store
            .exec("INSERT INTO children (id, parent_id) VALUES ('a', 'p'), ('b', 'p')", &[])
            .unwrap();
        assert_eq!(count(&store, "children"), 2);

        store.exec("DELETE FROM parents WHERE id = 'p'", &[]).unwrap();
        assert_eq!(count(&store, "children"), 0);
    }

    #[test]
    fn transaction_commits_on_ok() {
        let store = store_with_tables();
        store
            .transaction(&mut |tx| {
                tx.exec("INSERT INTO parents (id) VALUES ('a')", &[])?;
                tx.exec("INSERT INTO parents (id) VALUES ('b')", &[])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count(&store, "parents"), 2);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = store_with_tables();
        let err = store
            .transaction(&mut |tx| {
                tx.exec("INSERT INTO parents (id) VALUES ('a')", &[])?;
                let seen = tx.query("SELECT id FROM parents", &[])?;
                assert_eq!(seen.len(), 1);
                Err(SQLError::Rollback("changed my mind".into()))
            })
            .unwrap_err();
        assert!(matches!(err, SQLError::Rollback(_)));
        assert_eq!(count(&store, "parents"), 0);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.exec("CREATE TABLE t (v INTEGER)", &[]).unwrap();
            store.exec("INSERT INTO t (v) VALUES (?1)", &[Value::Integer(7)]).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let rows = store.query("SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_i64("v"), Some(7));
    }
}
