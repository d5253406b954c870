/// Query Layer Module
///
/// This module provides the parameterized read layer: composable filter
/// specifications that render to SQL with bound parameters (values are
/// never spliced into the statement text), untyped row sets for display
/// reads, and scalar aggregate functions.

use crate::core::{DalError, Result};
use rusqlite::types::{Value, ValueRef};
use rusqlite::Connection;

/// Sort direction for an ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    fn sql(self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASC",
            OrderDirection::Descending => "DESC",
        }
    }
}

/// A single predicate over a named field.
///
/// Predicates combine with AND. Field names must be bare identifiers;
/// values always travel as bound parameters.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// field = value
    Eq(String, Value),
    /// field > value
    Gt(String, Value),
    /// field < value
    Lt(String, Value),
    /// field LIKE pattern
    Like(String, String),
    /// field IN (values...)
    In(String, Vec<Value>),
}

impl Predicate {
    fn field(&self) -> &str {
        match self {
            Predicate::Eq(f, _)
            | Predicate::Gt(f, _)
            | Predicate::Lt(f, _)
            | Predicate::Like(f, _)
            | Predicate::In(f, _) => f,
        }
    }
}

/// Declarative filter, ordering, and truncation for a read.
///
/// Renders to a SQL tail (`WHERE ... ORDER BY ... LIMIT ...`) plus the
/// parameter values to bind, in placeholder order.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
    order: Option<(String, OrderDirection)>,
    limit: Option<u32>,
}

impl FilterSpec {
    pub fn new() -> Self {
        FilterSpec::default()
    }

    /// Adds a predicate; multiple predicates combine with AND.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Orders results by a single field.
    pub fn order_by(mut self, field: &str, direction: OrderDirection) -> Self {
        self.order = Some((field.to_string(), direction));
        self
    }

    /// Truncates results to the first `n` rows.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Renders the SQL tail and its bound parameters.
    ///
    /// Fails with `DalError::Query` if any field name is not a bare
    /// identifier; values themselves are returned as parameters, never
    /// interpolated.
    pub fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = String::new();
        let mut params = Vec::new();

        if !self.predicates.is_empty() {
            let mut clauses = Vec::new();
            for predicate in &self.predicates {
                check_identifier(predicate.field())?;
                match predicate {
                    Predicate::Eq(field, value) => {
                        clauses.push(format!("{field} = ?"));
                        params.push(value.clone());
                    }
                    Predicate::Gt(field, value) => {
                        clauses.push(format!("{field} > ?"));
                        params.push(value.clone());
                    }
                    Predicate::Lt(field, value) => {
                        clauses.push(format!("{field} < ?"));
                        params.push(value.clone());
                    }
                    Predicate::Like(field, pattern) => {
                        clauses.push(format!("{field} LIKE ?"));
                        params.push(Value::Text(pattern.clone()));
                    }
                    Predicate::In(field, values) => {
                        let placeholders = vec!["?"; values.len()].join(", ");
                        clauses.push(format!("{field} IN ({placeholders})"));
                        params.extend(values.iter().cloned());
                    }
                }
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some((field, direction)) = &self.order {
            check_identifier(field)?;
            sql.push_str(&format!(" ORDER BY {field} {}", direction.sql()));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        Ok((sql, params))
    }
}

/// Scalar aggregate functions supported by the layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Count,
    Avg,
    Max,
    Sum,
}

impl Aggregate {
    fn sql_name(self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Avg => "AVG",
            Aggregate::Max => "MAX",
            Aggregate::Sum => "SUM",
        }
    }
}

/// Computes `fn(column)` over every row of `table`.
///
/// Returns `None` when the engine yields SQL NULL, which is the standard
/// aggregate behavior for AVG/MAX/SUM over an empty set; COUNT over an
/// empty set is `Some(0.0)`. `column` may be `*` for COUNT only.
pub fn scalar_aggregate(
    conn: &Connection,
    function: Aggregate,
    table: &str,
    column: &str,
) -> Result<Option<f64>> {
    check_identifier(table)?;
    if !(column == "*" && function == Aggregate::Count) {
        check_identifier(column)?;
    }

    let sql = format!("SELECT {}({column}) FROM {table}", function.sql_name());
    let value: Option<f64> = conn
        .query_row(&sql, [], |row| row.get(0))
        .map_err(DalError::from_engine)?;
    Ok(value)
}

/// An untyped, display-formatted result set.
///
/// Used for reads where the caller wants to show whatever came back (the
/// derived view, ad-hoc dumps) rather than bind to a record type.
#[derive(Debug)]
pub struct RowSet {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as display strings
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    /// Executes `sql` and collects every row, formatting values for
    /// display (`NULL` for SQL NULL, blobs summarized by size).
    pub fn fetch(conn: &Connection, sql: &str) -> Result<RowSet> {
        let mut stmt = conn.prepare(sql).map_err(DalError::from_engine)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(format_value(row.get_ref(i)?));
                }
                Ok(values)
            })
            .map_err(DalError::from_engine)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DalError::from_engine)?;

        Ok(RowSet { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Formats an engine value for display.
fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}

/// Rejects field names that are not bare identifiers. Values are always
/// parameter-bound; this guards the one place names reach statement text.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DalError::Query(format!("invalid identifier: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_empty_filter_renders_nothing() {
        let (sql, params) = FilterSpec::new().to_sql().unwrap();
        assert_eq!(sql, "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_rendering() {
        let spec = FilterSpec::new()
            .filter(Predicate::Gt("age".to_string(), Value::Integer(30)))
            .filter(Predicate::Like(
                "email".to_string(),
                "%@example.com".to_string(),
            ))
            .order_by("age", OrderDirection::Ascending)
            .limit(2);

        let (sql, params) = spec.to_sql().unwrap();
        assert_eq!(
            sql,
            " WHERE age > ? AND email LIKE ? ORDER BY age ASC LIMIT 2"
        );
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], Value::Integer(30));
    }

    #[test]
    fn test_in_predicate_placeholders() {
        let spec = FilterSpec::new().filter(Predicate::In(
            "city".to_string(),
            vec![
                Value::Text("New York".to_string()),
                Value::Text("Chicago".to_string()),
            ],
        ));

        let (sql, params) = spec.to_sql().unwrap();
        assert_eq!(sql, " WHERE city IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let spec = FilterSpec::new().filter(Predicate::Eq(
            "age; DROP TABLE users".to_string(),
            Value::Integer(1),
        ));
        match spec.to_sql() {
            Err(DalError::Query(msg)) => assert!(msg.contains("invalid identifier")),
            other => panic!("Expected Query error, got {other:?}"),
        }
    }

    #[test]
    fn test_rowset_fetch_and_null_display() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO t (name) VALUES ('Alice');
             INSERT INTO t (name) VALUES (NULL);",
        )
        .unwrap();

        let rows = RowSet::fetch(&conn, "SELECT * FROM t ORDER BY id").unwrap();
        assert_eq!(rows.columns, vec!["id", "name"]);
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.rows[0], vec!["1", "Alice"]);
        assert_eq!(rows.rows[1], vec!["2", "NULL"]);
    }

    #[test]
    fn test_aggregates_over_empty_set() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (n INTEGER)", []).unwrap();

        assert_eq!(
            scalar_aggregate(&conn, Aggregate::Avg, "t", "n").unwrap(),
            None
        );
        assert_eq!(
            scalar_aggregate(&conn, Aggregate::Max, "t", "n").unwrap(),
            None
        );
        assert_eq!(
            scalar_aggregate(&conn, Aggregate::Count, "t", "*").unwrap(),
            Some(0.0)
        );
    }

    #[test]
    fn test_aggregates_over_values() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (n INTEGER);
             INSERT INTO t (n) VALUES (10), (20), (30);",
        )
        .unwrap();

        assert_eq!(
            scalar_aggregate(&conn, Aggregate::Avg, "t", "n").unwrap(),
            Some(20.0)
        );
        assert_eq!(
            scalar_aggregate(&conn, Aggregate::Sum, "t", "n").unwrap(),
            Some(60.0)
        );
        assert_eq!(
            scalar_aggregate(&conn, Aggregate::Max, "t", "n").unwrap(),
            Some(30.0)
        );
    }
}
