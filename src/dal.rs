/// Data-Access Layer Module
///
/// The single public surface over the store: schema setup, transactional
/// bulk seeding, filtered reads, single-row mutation, join and grouped
/// reads, scalar aggregates, units of work, and trigger registration.
/// Every statement issued here is parameter-bound; the only text spliced
/// into SQL is identifier names, which are validated first.

use crate::core::db::query::{self, Aggregate, FilterSpec, RowSet};
use crate::core::db::{schema, SessionOptions, Store};
use crate::core::{DalError, Result};
use crate::models::{NewOrder, NewUser, OrderCount, User, UserOrderRow, UserPatch};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Transaction};
use tracing::{debug, info};

/// A mutation event a row trigger can fire after.
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    AfterInsert { table: String },
    AfterDelete { table: String },
    AfterUpdateOf { table: String, column: String },
}

impl TriggerEvent {
    fn check(&self) -> Result<()> {
        match self {
            TriggerEvent::AfterInsert { table } | TriggerEvent::AfterDelete { table } => {
                query::check_identifier(table)
            }
            TriggerEvent::AfterUpdateOf { table, column } => {
                query::check_identifier(table)?;
                query::check_identifier(column)
            }
        }
    }

    fn sql(&self) -> String {
        match self {
            TriggerEvent::AfterInsert { table } => format!("AFTER INSERT ON {table}"),
            TriggerEvent::AfterDelete { table } => format!("AFTER DELETE ON {table}"),
            TriggerEvent::AfterUpdateOf { table, column } => {
                format!("AFTER UPDATE OF {column} ON {table}")
            }
        }
    }
}

/// The data-access layer over one owned store handle.
///
/// The handle is threaded through every call; there is no ambient
/// connection state. Reads never cache: each call re-queries the store
/// and returns rows by value.
#[derive(Debug)]
pub struct Dal {
    store: Store,
}

impl Dal {
    /// Opens the DAL over the database file at `db_path`.
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Dal {
            store: Store::open(db_path)?,
        })
    }

    /// Opens the DAL with explicit session options (journal mode,
    /// foreign-key enforcement).
    pub fn open_with(db_path: &str, options: &SessionOptions) -> Result<Self> {
        Ok(Dal {
            store: Store::open_with(db_path, options)?,
        })
    }

    /// Opens the DAL over an in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Dal {
            store: Store::open_in_memory()?,
        })
    }

    /// Idempotently ensures the users/orders tables and the derived view
    /// exist. No-op when they are already present.
    pub fn initialize_schema(&self) -> Result<()> {
        schema::initialize_schema(self.store.conn()?)
    }

    /// Bulk-inserts users inside one explicit transaction.
    ///
    /// All-or-nothing: a uniqueness breach on any record rolls the whole
    /// batch back and surfaces as `ConstraintViolation`; no rows from
    /// the batch are committed.
    pub fn seed_users(&mut self, users: &[NewUser]) -> Result<usize> {
        let inserted = self.store.run_transaction(|tx| {
            let mut stmt = tx
                .prepare("INSERT INTO users (name, age, email, city) VALUES (?1, ?2, ?3, ?4)")
                .map_err(DalError::from_engine)?;
            for user in users {
                stmt.execute(params![user.name, user.age, user.email, user.city])
                    .map_err(DalError::from_engine)?;
            }
            Ok(users.len())
        })?;
        info!(count = inserted, "seeded users");
        Ok(inserted)
    }

    /// Bulk-inserts orders inside one explicit transaction; same
    /// all-or-nothing contract as `seed_users`, with referential breaches
    /// surfacing as `ConstraintViolation`.
    pub fn seed_orders(&mut self, orders: &[NewOrder]) -> Result<usize> {
        let inserted = self.store.run_transaction(|tx| {
            let mut stmt = tx
                .prepare("INSERT INTO orders (user_id, product_name, quantity) VALUES (?1, ?2, ?3)")
                .map_err(DalError::from_engine)?;
            for order in orders {
                stmt.execute(params![order.user_id, order.product_name, order.quantity])
                    .map_err(DalError::from_engine)?;
            }
            Ok(orders.len())
        })?;
        info!(count = inserted, "seeded orders");
        Ok(inserted)
    }

    /// Inserts one user inside an already-running unit of work.
    pub fn insert_user_tx(tx: &Transaction<'_>, user: &NewUser) -> Result<i64> {
        tx.execute(
            "INSERT INTO users (name, age, email, city) VALUES (?1, ?2, ?3, ?4)",
            params![user.name, user.age, user.email, user.city],
        )
        .map_err(DalError::from_engine)?;
        Ok(tx.last_insert_rowid())
    }

    /// Inserts one order inside an already-running unit of work.
    pub fn insert_order_tx(tx: &Transaction<'_>, order: &NewOrder) -> Result<i64> {
        tx.execute(
            "INSERT INTO orders (user_id, product_name, quantity) VALUES (?1, ?2, ?3)",
            params![order.user_id, order.product_name, order.quantity],
        )
        .map_err(DalError::from_engine)?;
        Ok(tx.last_insert_rowid())
    }

    /// Reads users matching the filter, in its requested order, truncated
    /// to its limit. Each call re-queries the store.
    pub fn query_users(&self, spec: &FilterSpec) -> Result<Vec<User>> {
        let (tail, values) = spec.to_sql()?;
        let sql = format!("SELECT id, name, age, email, city FROM users{tail}");
        debug!(sql = %sql, "querying users");

        let conn = self.store.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(DalError::from_engine)?;
        let users = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    age: row.get(2)?,
                    email: row.get(3)?,
                    city: row.get(4)?,
                })
            })
            .map_err(DalError::from_engine)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DalError::from_engine)?;
        Ok(users)
    }

    /// Applies a partial update to the user with the given key.
    ///
    /// Returns the number of rows affected; 0 means no match and is not
    /// an error. Setting `email` to a value another user holds fails
    /// with `ConstraintViolation`.
    pub fn update_user(&self, id: i64, patch: &UserPatch) -> Result<usize> {
        if patch.is_empty() {
            return Err(DalError::Query("empty user patch".to_string()));
        }

        let mut assignments = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(name) = &patch.name {
            assignments.push("name = ?");
            values.push(Value::Text(name.clone()));
        }
        if let Some(age) = patch.age {
            assignments.push("age = ?");
            values.push(Value::Integer(age));
        }
        if let Some(email) = &patch.email {
            assignments.push("email = ?");
            values.push(Value::Text(email.clone()));
        }
        if let Some(city) = &patch.city {
            assignments.push("city = ?");
            values.push(Value::Text(city.clone()));
        }
        values.push(Value::Integer(id));

        let sql = format!("UPDATE users SET {} WHERE id = ?", assignments.join(", "));
        let affected = self
            .store
            .conn()?
            .execute(&sql, params_from_iter(values))
            .map_err(DalError::from_engine)?;
        debug!(id, affected, "updated user");
        Ok(affected)
    }

    /// Deletes the user with the given key. Returns the affected-row
    /// count; 0 means no match and is not an error.
    pub fn delete_user(&self, id: i64) -> Result<usize> {
        let affected = self
            .store
            .conn()?
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(DalError::from_engine)?;
        debug!(id, affected, "deleted user");
        Ok(affected)
    }

    /// Inner-join read of (name, product, quantity); users with no
    /// orders are excluded.
    pub fn join_user_orders(&self) -> Result<Vec<UserOrderRow>> {
        self.user_order_rows(
            "SELECT users.name, orders.product_name, orders.quantity
             FROM users
             INNER JOIN orders ON users.id = orders.user_id",
        )
    }

    /// The same projection read through the derived view. The view holds
    /// no state of its own; it is recomputed on every read.
    pub fn user_orders_from_view(&self) -> Result<Vec<UserOrderRow>> {
        self.user_order_rows("SELECT name, product_name, quantity FROM user_orders_view")
    }

    fn user_order_rows(&self, sql: &str) -> Result<Vec<UserOrderRow>> {
        let conn = self.store.conn()?;
        let mut stmt = conn.prepare(sql).map_err(DalError::from_engine)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UserOrderRow {
                    name: row.get(0)?,
                    product_name: row.get(1)?,
                    quantity: row.get(2)?,
                })
            })
            .map_err(DalError::from_engine)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DalError::from_engine)?;
        Ok(rows)
    }

    /// Per-user order counts via LEFT JOIN + GROUP BY.
    ///
    /// With no threshold every user appears, zero-order users counted as
    /// 0. With `Some(n)` only groups whose count exceeds `n` survive the
    /// HAVING filter, which drops zero-order users for any `n >= 0`.
    pub fn group_order_counts(&self, having_min: Option<i64>) -> Result<Vec<OrderCount>> {
        let base = "SELECT u.name, COUNT(o.order_id) AS order_count
             FROM users u
             LEFT JOIN orders o ON u.id = o.user_id
             GROUP BY u.name";
        let (sql, values) = match having_min {
            Some(min) => (
                format!("{base} HAVING COUNT(o.order_id) > ? ORDER BY u.name"),
                vec![Value::Integer(min)],
            ),
            None => (format!("{base} ORDER BY u.name"), Vec::new()),
        };

        let conn = self.store.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(DalError::from_engine)?;
        let counts = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(OrderCount {
                    name: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(DalError::from_engine)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DalError::from_engine)?;
        Ok(counts)
    }

    /// Computes a scalar aggregate over a column. `None` means the
    /// engine returned SQL NULL (AVG/MAX/SUM over an empty set).
    pub fn aggregate(
        &self,
        function: Aggregate,
        table: &str,
        column: &str,
    ) -> Result<Option<f64>> {
        query::scalar_aggregate(self.store.conn()?, function, table, column)
    }

    /// Runs `work` as one atomic unit of work; commits on `Ok`, rolls
    /// everything back on `Err`. Constraint failures inside the unit
    /// surface as `ConstraintViolation` with the engine cause attached.
    pub fn run_transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        self.store.run_transaction(work)
    }

    /// Registers a row-level trigger that fires after the given mutation
    /// event and executes `action` (one statement, NEW/OLD available).
    /// Declarative: registering an already-existing trigger is a no-op.
    pub fn define_row_trigger(
        &self,
        name: &str,
        event: &TriggerEvent,
        action: &str,
    ) -> Result<()> {
        query::check_identifier(name)?;
        event.check()?;
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS {name}\n{}\nFOR EACH ROW\nBEGIN\n    {action};\nEND",
            event.sql()
        );
        self.store
            .conn()?
            .execute_batch(&sql)
            .map_err(DalError::from_engine)?;
        debug!(trigger = name, "registered row trigger");
        Ok(())
    }

    /// Untyped display read, for dumping ad-hoc selections.
    pub fn fetch(&self, sql: &str) -> Result<RowSet> {
        RowSet::fetch(self.store.conn()?, sql)
    }

    /// Reads back the live schema (table and column metadata).
    pub fn describe(&self) -> Result<Vec<schema::TableInfo>> {
        let conn = self.store.conn()?;
        schema::table_names(conn)?
            .iter()
            .map(|table| schema::describe_table(conn, table))
            .collect()
    }

    /// Whether the underlying store handle is still open.
    pub fn is_open(&self) -> bool {
        self.store.is_open()
    }

    /// Releases the store handle; see `Store::close` for the lifecycle
    /// contract.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::query::{OrderDirection, Predicate};

    fn seeded_dal() -> Dal {
        let mut dal = Dal::open_in_memory().unwrap();
        dal.initialize_schema().unwrap();
        dal.seed_users(&[
            NewUser::new("Alice", 30, "alice@example.com", Some("New York")),
            NewUser::new("Bob", 25, "bob@example.com", Some("Los Angeles")),
            NewUser::new("Charlie", 35, "charlie@example.com", Some("Chicago")),
            NewUser::new("David", 40, "david@example.com", Some("Houston")),
        ])
        .unwrap();
        dal
    }

    #[test]
    fn test_seed_and_query_all() {
        let dal = seeded_dal();
        let users = dal.query_users(&FilterSpec::new()).unwrap();
        assert_eq!(users.len(), 4);
        assert_eq!(users[0].name, "Alice");
        assert_eq!(users[0].id, 1);
    }

    #[test]
    fn test_query_with_order_and_limit() {
        let dal = seeded_dal();
        let spec = FilterSpec::new()
            .order_by("age", OrderDirection::Descending)
            .limit(2);
        let users = dal.query_users(&spec).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "David");
        assert_eq!(users[1].name, "Charlie");
    }

    #[test]
    fn test_query_with_like_and_in() {
        let dal = seeded_dal();

        let by_email = dal
            .query_users(&FilterSpec::new().filter(Predicate::Like(
                "email".to_string(),
                "%@example.com".to_string(),
            )))
            .unwrap();
        assert_eq!(by_email.len(), 4);

        let by_city = dal
            .query_users(&FilterSpec::new().filter(Predicate::In(
                "city".to_string(),
                vec![
                    Value::Text("New York".to_string()),
                    Value::Text("Chicago".to_string()),
                ],
            )))
            .unwrap();
        let names: Vec<&str> = by_city.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Charlie"]);
    }

    #[test]
    fn test_update_patch_and_constraint() {
        let dal = seeded_dal();

        let affected = dal.update_user(1, &UserPatch::age(31)).unwrap();
        assert_eq!(affected, 1);
        let alice = dal
            .query_users(
                &FilterSpec::new()
                    .filter(Predicate::Eq("id".to_string(), Value::Integer(1))),
            )
            .unwrap();
        assert_eq!(alice[0].age, 31);

        // Taking Bob's email must breach the uniqueness invariant.
        let patch = UserPatch {
            email: Some("bob@example.com".to_string()),
            ..UserPatch::default()
        };
        assert!(dal.update_user(1, &patch).unwrap_err().is_constraint_violation());
    }

    #[test]
    fn test_empty_patch_rejected() {
        let dal = seeded_dal();
        match dal.update_user(1, &UserPatch::default()) {
            Err(DalError::Query(_)) => {}
            other => panic!("Expected Query error, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_user() {
        let dal = seeded_dal();
        assert_eq!(dal.delete_user(2).unwrap(), 1);
        assert_eq!(dal.delete_user(2).unwrap(), 0);
        assert_eq!(dal.query_users(&FilterSpec::new()).unwrap().len(), 3);
    }

    #[test]
    fn test_join_and_view_agree() {
        let mut dal = seeded_dal();
        dal.seed_orders(&[
            NewOrder::new(1, "Laptop", 1),
            NewOrder::new(1, "Mouse", 2),
            NewOrder::new(3, "Keyboard", 1),
        ])
        .unwrap();

        let joined = dal.join_user_orders().unwrap();
        let viewed = dal.user_orders_from_view().unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined, viewed);
        // Bob and David placed no orders and must be absent.
        assert!(joined.iter().all(|row| row.name != "Bob" && row.name != "David"));
    }

    #[test]
    fn test_trigger_definition_and_firing() {
        let dal = seeded_dal();
        let event = TriggerEvent::AfterUpdateOf {
            table: "users".to_string(),
            column: "age".to_string(),
        };
        dal.define_row_trigger(
            "update_user_age",
            &event,
            "UPDATE users SET age = NEW.age WHERE id = OLD.id",
        )
        .unwrap();
        // Redefinition is a no-op.
        dal.define_row_trigger(
            "update_user_age",
            &event,
            "UPDATE users SET age = NEW.age WHERE id = OLD.id",
        )
        .unwrap();

        // The trigger re-applies the same value; the update must still land.
        dal.update_user(1, &UserPatch::age(33)).unwrap();
        let alice = dal
            .query_users(
                &FilterSpec::new()
                    .filter(Predicate::Eq("id".to_string(), Value::Integer(1))),
            )
            .unwrap();
        assert_eq!(alice[0].age, 33);
    }

    #[test]
    fn test_describe_lists_both_tables() {
        let dal = seeded_dal();
        let tables = dal.describe().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"users"));
        assert!(names.contains(&"orders"));
    }
}
