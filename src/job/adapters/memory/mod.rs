//! In-memory adapter implementations.

mod store;

pub use store::InMemoryRecordStore;
