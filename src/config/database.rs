//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Two composite unique indexes that the entity macros cannot express
//! are created with plain SQL afterwards.

use crate::entities::{
    Appointment, AppointmentEvent, BlockedSlot, Branch, Customer, SessionBundle, SessionLedger,
    Topping, Treatment, UsageEvent,
};
use crate::errors::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use tracing::{debug, info};

/// Database used when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/glam_booking.sqlite?mode=rwc";

/// One ledger row per customer and treatment.
const LEDGER_UNIQUE_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_session_ledger_customer_treatment \
     ON session_ledger (customer_id, treatment_id)";

/// At most one non-cancelled appointment per branch and instant.
const ACTIVE_SLOT_UNIQUE_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_active_slot \
     ON appointments (branch_id, scheduled_at) WHERE status <> 'cancelled'";

/// Establishes a connection to the database at `database_url`.
///
/// `SQLite` in-memory databases are limited to a single pooled connection,
/// since every extra connection would open a separate empty database. File
/// databases keep the driver's busy timeout, so pooled writers wait for the
/// lock rather than fail.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_string());
    if database_url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    options.sqlx_logging(false);

    debug!("Connecting to database at {}", database_url);
    Database::connect(options).await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Reference tables are created before the tables holding foreign keys to them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_table(db, Customer).await?;
    create_table(db, Treatment).await?;
    create_table(db, Topping).await?;
    create_table(db, Branch).await?;
    create_table(db, BlockedSlot).await?;
    create_table(db, SessionBundle).await?;
    create_table(db, SessionLedger).await?;
    create_table(db, UsageEvent).await?;
    create_table(db, Appointment).await?;
    create_table(db, AppointmentEvent).await?;

    db.execute_unprepared(LEDGER_UNIQUE_INDEX).await?;
    db.execute_unprepared(ACTIVE_SLOT_UNIQUE_INDEX).await?;

    info!("Database tables ensured.");
    Ok(())
}
