//! `PostgreSQL` adapters for scheduler state persistence.

mod conversion;
mod models;
mod schema;
mod session;
mod store;

pub use store::{PostgresRecordStore, StatePgPool};
