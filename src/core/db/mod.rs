/// Database Module
///
/// The engine-facing half of the data-access layer, organized into
/// focused submodules:
///
/// - `connection`: the store handle and its open/closed lifecycle
/// - `query`: parameterized filter specs, untyped row sets, aggregates
/// - `schema`: idempotent DDL and PRAGMA-based introspection

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{SessionOptions, Store};
pub use query::{Aggregate, FilterSpec, OrderDirection, Predicate, RowSet};
pub use schema::{Column, TableInfo};
