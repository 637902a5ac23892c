//! Durable scheduler state: jobs, tasks, results and crash recovery.
//!
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Stored record shapes in [`records`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod records;
pub mod services;

#[cfg(test)]
mod tests;
