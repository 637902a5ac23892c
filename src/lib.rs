//! Jobvault: durable state and crash recovery for a distributed job scheduler.
//!
//! This crate persists submitted jobs, their task graphs and task results,
//! applies every scheduler state transition transactionally, and rebuilds
//! the scheduler's in-memory state after a restart.
//!
//! # Architecture
//!
//! Jobvault follows hexagonal architecture principles:
//!
//! - **Domain**: jobs, tasks and their execution graph, free of storage concerns
//! - **Records**: the stored shape of every entity and the conversions to it
//! - **Ports**: the record store and remote launcher contracts
//! - **Adapters**: in-memory and `PostgreSQL` record stores
//! - **Services**: transactions with retry, the state manager and recovery
//!
//! # Modules
//!
//! - [`job`]: scheduler state persistence and recovery
//! - [`topology`]: dependency-respecting ordering of task graphs
//! - [`config`]: layered configuration

pub mod config;
pub mod job;
pub mod topology;
