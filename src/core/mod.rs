/// Core Module for Dalite
///
/// This module contains the fundamental components of the data-access
/// layer: the store handle and its lifecycle, the parameterized query
/// layer, schema management, and error handling.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DalError, Result};
