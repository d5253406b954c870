// Core infrastructure modules
pub mod core;

// Data-access layer modules
pub mod config;
pub mod dal;
pub mod models;

pub use crate::core::{DalError, Result};
pub use crate::dal::{Dal, TriggerEvent};
