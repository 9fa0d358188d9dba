//! Driver repository: profiles, verification, availability and the
//! substring "nearby" search.

use crate::{begin_write, ts_to_datetime, DbError, DbResult};
use ride_core::{fold_location, normalize_location_query, Driver, RideError, RideStatus, VehicleDetails};
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, FromRow, SqlitePool};

const DRIVER_SELECT: &str = r#"
    SELECT d.id, d.user_id, u.name, d.vehicle_make, d.vehicle_model, d.vehicle_plate,
           d.vehicle_color, d.license_number, d.verified, d.available, d.location, d.created_at
    FROM drivers d
    JOIN users u ON u.id = d.user_id
"#;

/// SQL list of the statuses that keep a driver busy
fn outstanding_statuses() -> String {
    let quoted: Vec<String> = RideStatus::ALL
        .into_iter()
        .filter(RideStatus::is_outstanding)
        .map(|status| format!("'{}'", status.as_str()))
        .collect();
    format!("({})", quoted.join(", "))
}

#[derive(Debug, FromRow)]
struct DriverRow {
    id: i64,
    user_id: i64,
    name: String,
    vehicle_make: String,
    vehicle_model: String,
    vehicle_plate: String,
    vehicle_color: Option<String>,
    license_number: Option<String>,
    verified: bool,
    available: bool,
    location: Option<String>,
    created_at: i64,
}

impl TryFrom<DriverRow> for Driver {
    type Error = DbError;

    fn try_from(row: DriverRow) -> DbResult<Self> {
        Ok(Driver {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            vehicle: VehicleDetails {
                make: row.vehicle_make,
                model: row.vehicle_model,
                plate: row.vehicle_plate,
                color: row.vehicle_color,
                license_number: row.license_number,
            },
            verified: row.verified,
            available: row.available,
            location: row.location,
            created_at: ts_to_datetime(row.created_at)?,
        })
    }
}

fn into_drivers(rows: Vec<DriverRow>) -> DbResult<Vec<Driver>> {
    rows.into_iter().map(Driver::try_from).collect()
}

pub(crate) async fn fetch_driver<'e, E>(executor: E, id: i64) -> DbResult<Option<Driver>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{} WHERE d.id = ?", DRIVER_SELECT);
    sqlx::query_as::<_, DriverRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Driver::try_from)
        .transpose()
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for driver operations.
pub struct DriverRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DriverRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<Driver>> {
        fetch_driver(self.pool, id).await
    }

    pub async fn find_by_user(&self, user_id: i64) -> DbResult<Option<Driver>> {
        let sql = format!("{} WHERE d.user_id = ?", DRIVER_SELECT);
        sqlx::query_as::<_, DriverRow>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?
            .map(Driver::try_from)
            .transpose()
    }

    pub async fn list(&self) -> DbResult<Vec<Driver>> {
        let sql = format!("{} ORDER BY d.id", DRIVER_SELECT);
        into_drivers(sqlx::query_as::<_, DriverRow>(&sql).fetch_all(self.pool).await?)
    }

    /// Verified, available drivers whose location contains `query`
    /// (case-insensitive). An empty query matches nothing.
    pub async fn nearby(&self, query: &str) -> DbResult<Vec<Driver>> {
        let Some(needle) = normalize_location_query(query) else {
            return Ok(Vec::new());
        };

        let sql = format!(
            r#"{} WHERE d.verified = 1 AND d.available = 1
                 AND COALESCE(d.location_search, '') LIKE '%' || ? || '%' ESCAPE '\'
               ORDER BY d.id"#,
            DRIVER_SELECT
        );
        into_drivers(
            sqlx::query_as::<_, DriverRow>(&sql)
                .bind(escape_like(&needle))
                .fetch_all(self.pool)
                .await?,
        )
    }

    /// Toggle availability. Going online is refused while the driver has
    /// an outstanding ride.
    pub async fn set_availability(&self, driver_id: i64, available: bool) -> DbResult<Driver> {
        let mut tx = begin_write(self.pool).await?;

        if available {
            let outstanding: Option<i64> = sqlx::query_scalar(&format!(
                "SELECT id FROM rides WHERE driver_id = ? AND status IN {} LIMIT 1",
                outstanding_statuses()
            ))
            .bind(driver_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(ride_id) = outstanding {
                return Err(DbError::Rule(RideError::OutstandingRide { driver_id, ride_id }));
            }
        }

        let result = sqlx::query("UPDATE drivers SET available = ? WHERE id = ?")
            .bind(available)
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Rule(RideError::not_found("driver", driver_id)));
        }

        let driver = fetch_driver(&mut *tx, driver_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("driver", driver_id)))?;

        tx.commit().await?;
        Ok(driver)
    }

    /// Admin verification flag
    pub async fn set_verified(&self, driver_id: i64, verified: bool) -> DbResult<Driver> {
        let result = sqlx::query("UPDATE drivers SET verified = ? WHERE id = ?")
            .bind(verified)
            .bind(driver_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Rule(RideError::not_found("driver", driver_id)));
        }

        self.find(driver_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("driver", driver_id)))
    }

    pub async fn update_location(&self, driver_id: i64, location: &str) -> DbResult<Driver> {
        let result = sqlx::query("UPDATE drivers SET location = ?, location_search = ? WHERE id = ?")
            .bind(location.trim())
            .bind(fold_location(location))
            .bind(driver_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Rule(RideError::not_found("driver", driver_id)));
        }

        self.find(driver_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("driver", driver_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bookable_driver, memory_db, rider};
    use ride_core::{Currency, Price, RideRequest};

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_nearby_substring_match() {
        let db = memory_db().await;
        let near = bookable_driver(&db, "near@example.com", "North Beach, SF").await;
        bookable_driver(&db, "far@example.com", "Oakland").await;

        let found = db.drivers().nearby("beach").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, near.id);

        assert!(db.drivers().nearby("   ").await.unwrap().is_empty());
        assert!(db.drivers().nearby("%").await.unwrap().is_empty());
    }

    #[test]
    fn test_outstanding_statuses() {
        assert_eq!(outstanding_statuses(), "('requested', 'accepted', 'in_progress')");
    }

    #[tokio::test]
    async fn test_nearby_folds_non_ascii_case() {
        let db = memory_db().await;
        let registered = bookable_driver(&db, "zh@example.com", "ZÜRICH Hauptbahnhof").await;
        assert_eq!(db.drivers().nearby("zürich").await.unwrap().len(), 1);

        let moved = bookable_driver(&db, "mu@example.com", "Oslo").await;
        db.drivers().update_location(moved.id, "MÜNCHEN Ost").await.unwrap();
        let found = db.drivers().nearby("münchen").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, moved.id);
        assert_eq!(found[0].location.as_deref(), Some("MÜNCHEN Ost"));
        assert_ne!(found[0].id, registered.id);
    }

    #[tokio::test]
    async fn test_nearby_skips_unverified_and_offline() {
        let db = memory_db().await;
        let driver = bookable_driver(&db, "d@example.com", "Mission").await;
        assert_eq!(db.drivers().nearby("mission").await.unwrap().len(), 1);

        db.drivers().set_availability(driver.id, false).await.unwrap();
        assert!(db.drivers().nearby("mission").await.unwrap().is_empty());

        db.drivers().set_availability(driver.id, true).await.unwrap();
        db.drivers().set_verified(driver.id, false).await.unwrap();
        assert!(db.drivers().nearby("mission").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cannot_go_online_with_outstanding_ride() {
        let db = memory_db().await;
        let driver = bookable_driver(&db, "busy@example.com", "Downtown").await;
        let user = rider(&db, "r@example.com").await;

        let ride = db
            .rides()
            .request(
                user.id,
                &RideRequest {
                    driver_id: driver.id,
                    pickup: "A".to_string(),
                    dropoff: "B".to_string(),
                },
                Price::from_cents(1200, Currency::USD),
            )
            .await
            .unwrap();

        let err = db.drivers().set_availability(driver.id, true).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(RideError::OutstandingRide { ride_id, .. }) if ride_id == ride.id
        ));

        // Going offline is always allowed
        assert!(!db.drivers().set_availability(driver.id, false).await.unwrap().available);
    }

    #[tokio::test]
    async fn test_missing_driver() {
        let db = memory_db().await;
        assert!(db.drivers().find(42).await.unwrap().is_none());
        assert!(matches!(
            db.drivers().set_verified(42, true).await,
            Err(DbError::Rule(RideError::NotFound { .. }))
        ));
    }
}
