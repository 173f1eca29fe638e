pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod schedule;

pub use db::Database;
pub use error::{ConstraintViolation, StoreError, StoreResult};
