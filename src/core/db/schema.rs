/// Schema Module
///
/// Owns the persistent schema: the two record tables, the derived
/// user-orders view, and PRAGMA-based introspection used to verify and
/// log what actually exists in the store.

use crate::core::{DalError, Result};
use rusqlite::{Connection, Row};
use tracing::debug;

const USERS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER NOT NULL,
    email TEXT NOT NULL UNIQUE,
    city TEXT
)"#;

const ORDERS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    product_name TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id)
)"#;

const USER_ORDERS_VIEW_SQL: &str = r#"
CREATE VIEW IF NOT EXISTS user_orders_view AS
SELECT users.name, orders.product_name, orders.quantity
FROM users
INNER JOIN orders ON users.id = orders.user_id"#;

/// Idempotently ensures the tables and the derived view exist.
///
/// Safe to call on every open: existing objects are left untouched, so
/// re-initialization against a populated store is a no-op.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "{USERS_TABLE_SQL};\n{ORDERS_TABLE_SQL};\n{USER_ORDERS_VIEW_SQL};"
    ))
    .map_err(DalError::from_engine)?;
    debug!("schema initialized (users, orders, user_orders_view)");
    Ok(())
}

/// Column metadata as reported by `PRAGMA table_info`.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    /// Declared SQLite type (e.g. "INTEGER", "TEXT")
    pub type_name: String,
    pub notnull: bool,
    pub pk: bool,
}

impl Column {
    fn from_pragma_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Column {
            name: row.get(1)?,
            type_name: row.get(2)?,
            notnull: row.get(3)?,
            pk: row.get(5)?,
        })
    }
}

/// A table and its columns, read back from the live store.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<Column>,
}

/// Lists user-defined tables (engine-internal tables excluded).
pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Reads column metadata for one table.
pub fn describe_table(conn: &Connection, table: &str) -> Result<TableInfo> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{table}')"))?;
    let columns = stmt
        .query_map([], |row| Column::from_pragma_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(TableInfo {
        name: table.to_string(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_creation_and_idempotency() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        // Second run must be a no-op, not an error.
        initialize_schema(&conn).unwrap();

        let names = table_names(&conn).unwrap();
        assert!(names.contains(&"users".to_string()));
        assert!(names.contains(&"orders".to_string()));

        let views: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'view' AND name = 'user_orders_view'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(views, 1);
    }

    #[test]
    fn test_users_column_metadata() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let info = describe_table(&conn, "users").unwrap();
        assert_eq!(info.columns.len(), 5);

        let id = &info.columns[0];
        assert_eq!(id.name, "id");
        assert_eq!(id.type_name, "INTEGER");
        assert!(id.pk);

        let email = &info.columns[3];
        assert_eq!(email.name, "email");
        assert!(email.notnull);

        // city is the one nullable attribute
        let city = &info.columns[4];
        assert_eq!(city.name, "city");
        assert!(!city.notnull);
    }

    #[test]
    fn test_orders_reference_users() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let referenced: String = conn
            .query_row("PRAGMA foreign_key_list('orders')", [], |row| row.get(2))
            .unwrap();
        assert_eq!(referenced, "users");
    }

    #[test]
    fn test_initialization_preserves_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (name, age, email) VALUES ('Alice', 30, 'alice@example.com')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
