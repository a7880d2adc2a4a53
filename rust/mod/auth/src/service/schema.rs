use tricore_sql::SQLStore;

use crate::service::AuthError;

/// Initialize the SQLite schema for all auth resources.
///
/// Referential integrity lives in the schema: the store enables foreign
/// keys on every connection, so the `ON DELETE CASCADE` clauses below
/// remove dependent rows inside the deleting statement.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), AuthError> {
    let statements = [
        // Users mirrored from the identity provider.
        "CREATE TABLE IF NOT EXISTS users (
            subject TEXT PRIMARY KEY,
            fullname TEXT NOT NULL,
            email TEXT NOT NULL,
            picture TEXT,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS \"groups\" (
            group_name TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // Levels within a group; owned by the group.
        "CREATE TABLE IF NOT EXISTS group_levels (
            group_name TEXT NOT NULL,
            level_name TEXT NOT NULL,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (group_name, level_name),
            FOREIGN KEY (group_name) REFERENCES \"groups\"(group_name) ON DELETE CASCADE
        )",

        // Grants: user x group level.
        "CREATE TABLE IF NOT EXISTS permissions (
            subject TEXT NOT NULL,
            group_name TEXT NOT NULL,
            level_name TEXT NOT NULL,
            version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (subject, group_name, level_name),
            FOREIGN KEY (subject) REFERENCES users(subject) ON DELETE CASCADE,
            FOREIGN KEY (group_name, level_name)
                REFERENCES group_levels(group_name, level_name) ON DELETE CASCADE
        )",
        "CREATE INDEX IF NOT EXISTS idx_permissions_subject ON permissions(subject)",
        "CREATE INDEX IF NOT EXISTS idx_permissions_level ON permissions(group_name, level_name)",

        // Login sessions: cookie validation and logout.
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            revoked INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            issued_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
