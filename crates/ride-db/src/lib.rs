//! # ride-db
//!
//! Relational storage for ridehail-rs using SQLx over SQLite.
//!
//! Provides:
//! - `Database` with a connection pool and embedded migrations
//! - Repositories for users, drivers, rides, payments, sessions and stats
//!
//! Multi-step writes (registration, ride booking, cancellation, payment
//! confirmation) run in a single transaction that rolls back on drop.

mod drivers;
mod password;
mod payments;
mod rides;
mod sessions;
mod stats;
mod users;

pub use drivers::DriverRepository;
pub use payments::{PaymentConfirmation, PaymentRepository, PaymentReceipt};
pub use rides::RideRepository;
pub use sessions::{Session, SessionRepository};
pub use stats::StatsRepository;
pub use users::UserRepository;

use chrono::{DateTime, Utc};
use ride_core::RideError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::sqlite::Sqlite;
use sqlx::{SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// A domain rule rejected the write
    #[error(transparent)]
    Rule(#[from] RideError),
}

impl From<DbError> for RideError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rule(rule) => rule,
            DbError::Corrupt(msg) => RideError::Serialization(msg),
            other => RideError::Database(other.to_string()),
        }
    }
}

/// Result alias for storage operations
pub type DbResult<T> = Result<T, DbError>;

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connect and run migrations.
    ///
    /// Accepts `:memory:`, a `sqlite:` URL, or a plain file path.
    pub async fn new(url: &str) -> DbResult<Self> {
        let pool = if url == ":memory:" || url == "sqlite::memory:" {
            // Each call gets its own shared-cache database so parallel tests
            // never see each other's rows.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:ridehail-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true)
                .foreign_keys(true);

            // The database lives only as long as a connection to it does
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            let options = if url.starts_with("sqlite:") {
                SqliteConnectOptions::from_str(url)?
            } else {
                SqliteConnectOptions::new().filename(url)
            }
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .connect_with(options)
                .await?
        };

        info!(url = %url, "Database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations checked/applied");

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    pub fn drivers(&self) -> DriverRepository<'_> {
        DriverRepository::new(&self.pool)
    }

    pub fn rides(&self) -> RideRepository<'_> {
        RideRepository::new(&self.pool)
    }

    pub fn payments(&self) -> PaymentRepository<'_> {
        PaymentRepository::new(&self.pool)
    }

    pub fn sessions(&self) -> SessionRepository<'_> {
        SessionRepository::new(&self.pool)
    }

    pub fn stats(&self) -> StatsRepository<'_> {
        StatsRepository::new(&self.pool)
    }
}

/// Start a transaction that takes the write lock up front, so a
/// read-then-write sequence cannot fail on a stale snapshot.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

pub(crate) fn now_ts() -> i64 {
    Utc::now().timestamp()
}

pub(crate) fn ts_to_datetime(ts: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| DbError::Corrupt(format!("bad timestamp {}", ts)))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use ride_core::{RegisterRequest, Role, User, VehicleDetails};

    pub async fn memory_db() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    pub async fn rider(db: &Database, email: &str) -> User {
        let (user, _) = db
            .users()
            .register(&RegisterRequest {
                name: "Rider".to_string(),
                email: email.to_string(),
                password: "rider-password".to_string(),
                phone: None,
                role: Role::Rider,
                location: Some("Downtown".to_string()),
                vehicle: None,
            })
            .await
            .unwrap();
        user
    }

    /// Registers a driver, verifies them and marks them available
    pub async fn bookable_driver(db: &Database, email: &str, location: &str) -> ride_core::Driver {
        let (_, driver) = db
            .users()
            .register(&RegisterRequest {
                name: "Driver".to_string(),
                email: email.to_string(),
                password: "driver-password".to_string(),
                phone: None,
                role: Role::Driver,
                location: Some(location.to_string()),
                vehicle: Some(VehicleDetails {
                    make: "Toyota".to_string(),
                    model: "Corolla".to_string(),
                    plate: "TEST-1".to_string(),
                    color: Some("blue".to_string()),
                    license_number: None,
                }),
            })
            .await
            .unwrap();
        let driver = driver.unwrap();
        db.drivers().set_verified(driver.id, true).await.unwrap();
        db.drivers().set_availability(driver.id, true).await.unwrap()
    }
}
