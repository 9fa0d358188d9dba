//! Ride repository: booking, lifecycle updates and cancellation.

use crate::{begin_write, now_ts, ts_to_datetime, DbError, DbResult};
use ride_core::{Currency, PaymentStatus, Price, Ride, RideError, RideRequest, RideStatus};
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, FromRow, SqlitePool};
use tracing::info;

const RIDE_COLUMNS: &str = "id, rider_id, driver_id, pickup, dropoff, fare, currency, status, \
                            payment_status, payment_intent_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct RideRow {
    id: i64,
    rider_id: i64,
    driver_id: i64,
    pickup: String,
    dropoff: String,
    fare: i64,
    currency: String,
    status: String,
    payment_status: String,
    payment_intent_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<RideRow> for Ride {
    type Error = DbError;

    fn try_from(row: RideRow) -> DbResult<Self> {
        let corrupt = |e: RideError| DbError::Corrupt(e.to_string());
        let currency: Currency = row.currency.parse().map_err(corrupt)?;
        Ok(Ride {
            id: row.id,
            rider_id: row.rider_id,
            driver_id: row.driver_id,
            pickup: row.pickup,
            dropoff: row.dropoff,
            fare: Price::from_cents(row.fare, currency),
            status: row.status.parse::<RideStatus>().map_err(corrupt)?,
            payment_status: row.payment_status.parse::<PaymentStatus>().map_err(corrupt)?,
            payment_intent_id: row.payment_intent_id,
            created_at: ts_to_datetime(row.created_at)?,
            updated_at: ts_to_datetime(row.updated_at)?,
        })
    }
}

pub(crate) async fn fetch_ride<'e, E>(executor: E, id: i64) -> DbResult<Option<Ride>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM rides WHERE id = ?", RIDE_COLUMNS);
    sqlx::query_as::<_, RideRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Ride::try_from)
        .transpose()
}

/// Move a ride from `from` to `to`, failing if someone else moved it first
pub(crate) async fn update_status<'e, E>(
    executor: E,
    ride: &Ride,
    to: RideStatus,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE rides SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(now_ts())
        .bind(ride.id)
        .bind(ride.status.as_str())
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::Rule(RideError::InvalidTransition {
            ride_id: ride.id,
            from: ride.status.to_string(),
            to: to.to_string(),
        }));
    }
    Ok(())
}

/// Repository for ride operations.
pub struct RideRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RideRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Book a driver.
    ///
    /// The driver flips to unavailable in the same transaction as the
    /// insert; the conditional update makes two concurrent bookings of the
    /// same driver fail on the second.
    pub async fn request(&self, rider_id: i64, request: &RideRequest, fare: Price) -> DbResult<Ride> {
        if fare.amount <= 0 {
            return Err(DbError::Rule(RideError::InvalidRequest(
                "Fare must be positive".to_string(),
            )));
        }

        let mut tx = begin_write(self.pool).await?;

        let driver_user: Option<i64> = sqlx::query_scalar("SELECT user_id FROM drivers WHERE id = ?")
            .bind(request.driver_id)
            .fetch_optional(&mut *tx)
            .await?;

        match driver_user {
            None => return Err(DbError::Rule(RideError::not_found("driver", request.driver_id))),
            Some(user_id) if user_id == rider_id => {
                return Err(DbError::Rule(RideError::InvalidRequest(
                    "Drivers cannot book themselves".to_string(),
                )))
            }
            Some(_) => {}
        }

        let claimed = sqlx::query(
            "UPDATE drivers SET available = 0 WHERE id = ? AND verified = 1 AND available = 1",
        )
        .bind(request.driver_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Err(DbError::Rule(RideError::DriverUnavailable {
                driver_id: request.driver_id,
            }));
        }

        let now = now_ts();
        let ride_id = sqlx::query(
            r#"
            INSERT INTO rides (rider_id, driver_id, pickup, dropoff, fare, currency,
                               status, payment_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'requested', 'pending', ?, ?)
            "#,
        )
        .bind(rider_id)
        .bind(request.driver_id)
        .bind(&request.pickup)
        .bind(&request.dropoff)
        .bind(fare.amount)
        .bind(fare.currency.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Corrupt(format!("ride {} vanished mid-insert", ride_id)))?;

        tx.commit().await?;

        info!(
            ride_id = ride.id,
            rider_id,
            driver_id = request.driver_id,
            fare = %fare.display(),
            "Ride requested"
        );
        Ok(ride)
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<Ride>> {
        fetch_ride(self.pool, id).await
    }

    pub async fn list_for_rider(&self, rider_id: i64) -> DbResult<Vec<Ride>> {
        self.list_where("WHERE rider_id = ?", Some(rider_id)).await
    }

    pub async fn list_for_driver(&self, driver_id: i64) -> DbResult<Vec<Ride>> {
        self.list_where("WHERE driver_id = ?", Some(driver_id)).await
    }

    pub async fn list_all(&self) -> DbResult<Vec<Ride>> {
        self.list_where("", None).await
    }

    async fn list_where(&self, filter: &str, id: Option<i64>) -> DbResult<Vec<Ride>> {
        let sql = format!(
            "SELECT {} FROM rides {} ORDER BY created_at DESC, id DESC",
            RIDE_COLUMNS, filter
        );
        let mut query = sqlx::query_as::<_, RideRow>(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        query
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(Ride::try_from)
            .collect()
    }

    /// Driver-driven progress: requested → accepted → in_progress.
    pub async fn advance(&self, ride_id: i64, driver_id: i64, next: RideStatus) -> DbResult<Ride> {
        if !matches!(next, RideStatus::Accepted | RideStatus::InProgress) {
            return Err(DbError::Rule(RideError::InvalidRequest(format!(
                "Rides cannot be moved to {} directly",
                next
            ))));
        }

        let mut tx = begin_write(self.pool).await?;

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("ride", ride_id)))?;

        if ride.driver_id != driver_id {
            return Err(DbError::Rule(RideError::Forbidden(
                "Ride is assigned to another driver".to_string(),
            )));
        }

        ride.ensure_transition(next)?;
        update_status(&mut *tx, &ride, next).await?;

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("ride", ride_id)))?;

        tx.commit().await?;
        info!(ride_id, status = %next, "Ride advanced");
        Ok(ride)
    }

    /// Cancel an outstanding, unpaid ride and free its driver.
    ///
    /// `checked_intent` is the payment intent the caller already made sure
    /// cannot be charged; if the ride carries a different one the cancel
    /// is refused.
    pub async fn cancel(&self, ride_id: i64, checked_intent: Option<&str>) -> DbResult<Ride> {
        let mut tx = begin_write(self.pool).await?;

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("ride", ride_id)))?;

        ride.ensure_transition(RideStatus::Cancelled)?;
        if ride.payment_intent_id.as_deref() != checked_intent {
            return Err(DbError::Rule(RideError::PaymentInProgress { ride_id }));
        }
        update_status(&mut *tx, &ride, RideStatus::Cancelled).await?;

        sqlx::query("UPDATE drivers SET available = 1 WHERE id = ?")
            .bind(ride.driver_id)
            .execute(&mut *tx)
            .await?;

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("ride", ride_id)))?;

        tx.commit().await?;
        info!(ride_id, driver_id = ride.driver_id, "Ride cancelled");
        Ok(ride)
    }

    /// Remember the payment intent created for a ride
    pub async fn attach_payment_intent(&self, ride_id: i64, intent_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE rides SET payment_intent_id = ?, updated_at = ? WHERE id = ? AND payment_status = 'pending'",
        )
        .bind(intent_id)
        .bind(now_ts())
        .bind(ride_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Rule(RideError::AlreadyPaid { ride_id }));
        }
        Ok(())
    }
}
