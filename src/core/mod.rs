//! Core business logic - framework-agnostic scheduling and session-ledger operations.
//!
//! Functions here take an explicit customer id and an explicit `now` instead of
//! reading ambient state. Multi-step mutations run inside one database
//! transaction and are committed only when every step succeeds.

/// Slot availability for a branch and date
pub mod availability;
/// Appointment lifecycle: create, reschedule, cancel, redeem
pub mod appointment;
/// Treatments, toppings and branches
pub mod catalog;
/// Customer records
pub mod customer;
/// Purchase and usage history, course summaries
pub mod history;
/// Remaining-session ledger
pub mod ledger;
/// Token-driven redemption
pub mod redemption;
/// Daily slot grid
pub mod slot_grid;
/// Redemption token codec
pub mod token;

use crate::errors::{Error, Result};
use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr, SqlErr,
    TransactionTrait,
};
use tracing::warn;

/// No-op write that takes the `SQLite` write lock.
const SQLITE_TAKE_WRITE_LOCK: &str = "UPDATE customers SET id = id WHERE 0";

/// Opens a transaction for a read-then-write operation.
///
/// `SQLite` starts transactions deferred, and a deferred transaction that has
/// read cannot be upgraded to a writer once another writer committed in the
/// meantime. The first statement here is a write, so concurrent callers queue
/// on the lock (up to the busy timeout) and then read committed state.
pub(crate) async fn begin_write(db: &DatabaseConnection) -> Result<DatabaseTransaction> {
    let txn = db.begin().await?;
    if txn.get_database_backend() == DatabaseBackend::Sqlite {
        txn.execute_unprepared(SQLITE_TAKE_WRITE_LOCK).await?;
    }
    Ok(txn)
}

/// Commits `txn` if `result` is `Ok`, otherwise rolls it back and returns the error.
pub(crate) async fn finish<T>(txn: DatabaseTransaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Rollback failed after error '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

/// Whether a storage error reports a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Whether a storage error reports that the queried table does not exist.
pub(crate) fn is_missing_table(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("no such table")
        || message.contains("42P01")
        || (message.contains("relation") && message.contains("does not exist"))
}

/// Maps a unique violation on insert/update of an appointment slot to `SlotTaken`.
pub(crate) fn slot_conflict(err: DbErr, at: chrono::DateTime<chrono::Utc>) -> Error {
    if is_unique_violation(&err) {
        Error::SlotTaken { at }
    } else {
        Error::Database(err)
    }
}
