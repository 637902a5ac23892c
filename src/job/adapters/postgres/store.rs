//! `PostgreSQL` record store over an r2d2 connection pool.

use super::session::PgSession;
use crate::job::ports::{RecordStore, SessionMode, StoreError, StoreSession};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use tracing::{debug, info};

/// `PostgreSQL` connection pool type used by the record store.
pub type StatePgPool = Pool<ConnectionManager<PgConnection>>;

const DROP_SCHEMA: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_scheduler_state/down.sql");
const CREATE_SCHEMA: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_scheduler_state/up.sql");

/// `PostgreSQL`-backed record store.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: StatePgPool,
}

impl PostgresRecordStore {
    /// Creates a store from a connection pool.
    #[must_use]
    pub const fn new(pool: StatePgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool of at most `pool_size` connections to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] when the pool cannot be created.
    pub fn connect(database_url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(StoreError::persistence)?;
        Ok(Self::new(pool))
    }

    /// Drops every scheduler table and creates the schema again.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a connection cannot be obtained or a
    /// statement fails.
    pub fn drop_and_create_schema(&self) -> Result<(), StoreError> {
        let mut connection = self.pool.get().map_err(StoreError::persistence)?;
        connection
            .batch_execute(DROP_SCHEMA)
            .and_then(|()| connection.batch_execute(CREATE_SCHEMA))
            .map_err(store_error)?;
        info!("scheduler schema recreated");
        Ok(())
    }
}

/// Transaction outcome keeping the caller's error apart from Diesel's.
enum SessionFailure<E> {
    Work(E),
    Database(DieselError),
}

impl<E> From<DieselError> for SessionFailure<E> {
    fn from(err: DieselError) -> Self {
        Self::Database(err)
    }
}

impl RecordStore for PostgresRecordStore {
    fn with_session<T, E, F>(&self, mode: SessionMode, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreSession) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut pooled = self
            .pool
            .get()
            .map_err(|err| E::from(StoreError::persistence(err)))?;
        let connection: &mut PgConnection = &mut pooled;
        let writable = mode == SessionMode::ReadWrite;
        let run = |tx: &mut PgConnection| {
            let mut session = PgSession::new(tx, writable);
            work(&mut session).map_err(SessionFailure::Work)
        };
        let outcome = if writable {
            connection.transaction::<T, SessionFailure<E>, _>(run)
        } else {
            connection
                .build_transaction()
                .read_only()
                .run::<T, SessionFailure<E>, _>(run)
        };
        outcome.map_err(|failure| match failure {
            SessionFailure::Work(err) => err,
            SessionFailure::Database(err) => {
                debug!(error = %err, "transaction failed");
                E::from(store_error(err))
            }
        })
    }
}

/// Maps Diesel errors onto the store's error classes.
///
/// Serialization failures and deadlocks are reported as lock contention so
/// the transaction helper retries them.
pub(super) fn store_error(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, ref info) => {
            StoreError::LockContention(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
            StoreError::Conflict(describe(info.as_ref()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, ref info) => {
            StoreError::MissingRow(describe(info.as_ref()))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ReadOnlyTransaction, _) => {
            StoreError::ReadOnlySession
        }
        DieselError::DatabaseError(_, ref info) if is_lock_failure(info.message()) => {
            StoreError::LockContention(info.message().to_owned())
        }
        _ => StoreError::persistence(err),
    }
}

fn describe(info: &dyn DatabaseErrorInformation) -> String {
    info.constraint_name().map_or_else(
        || info.message().to_owned(),
        |constraint| format!("constraint {constraint}"),
    )
}

fn is_lock_failure(message: &str) -> bool {
    message.contains("deadlock detected") || message.contains("could not obtain lock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("deadlock detected", true)]
    #[case("could not obtain lock on row in relation \"job_data\"", true)]
    #[case("syntax error at or near \"SELEC\"", false)]
    fn lock_failures_are_recognised(#[case] message: &str, #[case] expected: bool) {
        assert_eq!(is_lock_failure(message), expected);
    }

    #[rstest]
    fn non_database_errors_are_persistence_failures() {
        let mapped = store_error(DieselError::NotFound);
        assert!(matches!(mapped, StoreError::Persistence(_)));
    }

    #[rstest]
    fn schema_scripts_cover_every_table() {
        for table in [
            "job_data",
            "job_data_variable",
            "job_content",
            "task_data",
            "task_data_edge",
            "task_data_variable",
            "task_payload",
            "environment_modifier",
            "script_data",
            "selector_data",
            "task_result_data",
            "third_party_credential",
        ] {
            assert!(CREATE_SCHEMA.contains(&format!("CREATE TABLE {table} (")));
            assert!(DROP_SCHEMA.contains(&format!("DROP TABLE IF EXISTS {table};")));
        }
    }
}
