//! Aggregate counters for the admin dashboard.

use crate::DbResult;
use ride_core::{AdminStats, Currency, Price, RideStatus};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

pub struct StatsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Platform-wide counters. Money totals only include `currency`.
    pub async fn admin_stats(&self, currency: Currency) -> DbResult<AdminStats> {
        let (total_users, total_riders): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(role = 'rider'), 0) FROM users",
        )
        .fetch_one(self.pool)
        .await?;

        let (total_drivers, verified_drivers, available_drivers): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(verified), 0), COALESCE(SUM(available), 0) FROM drivers",
        )
        .fetch_one(self.pool)
        .await?;

        let status_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM rides GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut rides_by_status: BTreeMap<String, i64> = RideStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        let mut total_rides = 0;
        for (status, count) in status_counts {
            total_rides += count;
            rides_by_status.insert(status, count);
        }

        let total_revenue: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM payments WHERE currency = ?")
                .bind(currency.as_str())
                .fetch_one(self.pool)
                .await?;

        let driver_payouts: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM driver_earnings WHERE currency = ?",
        )
        .bind(currency.as_str())
        .fetch_one(self.pool)
        .await?;

        Ok(AdminStats {
            total_users,
            total_riders,
            total_drivers,
            verified_drivers,
            available_drivers,
            total_rides,
            rides_by_status,
            total_revenue: Price::from_cents(total_revenue, currency),
            driver_payouts: Price::from_cents(driver_payouts, currency),
            platform_earnings: Price::from_cents(total_revenue - driver_payouts, currency),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bookable_driver, memory_db, rider};
    use crate::PaymentReceipt;
    use ride_core::{RideRequest, DEFAULT_COMMISSION_BPS};

    #[tokio::test]
    async fn test_empty_stats() {
        let db = memory_db().await;
        let stats = db.stats().admin_stats(Currency::USD).await.unwrap();
        assert_eq!(stats.total_users, 0);
        assert_eq!(stats.total_rides, 0);
        assert_eq!(stats.rides_by_status.get("requested"), Some(&0));
        assert_eq!(stats.total_revenue.amount, 0);
    }

    #[tokio::test]
    async fn test_stats_after_paid_ride() {
        let db = memory_db().await;
        let driver = bookable_driver(&db, "d@example.com", "Airport").await;
        let user = rider(&db, "r@example.com").await;
        let ride = db
            .rides()
            .request(
                user.id,
                &RideRequest {
                    driver_id: driver.id,
                    pickup: "Airport".to_string(),
                    dropoff: "Harbor".to_string(),
                },
                Price::from_cents(3000, Currency::USD),
            )
            .await
            .unwrap();
        db.payments()
            .confirm_ride_payment(
                &PaymentReceipt {
                    ride_id: ride.id,
                    user_id: user.id,
                    provider_payment_id: "pi_stats".to_string(),
                    amount: ride.fare,
                },
                DEFAULT_COMMISSION_BPS,
            )
            .await
            .unwrap();

        let stats = db.stats().admin_stats(Currency::USD).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_riders, 1);
        assert_eq!(stats.total_drivers, 1);
        assert_eq!(stats.verified_drivers, 1);
        assert_eq!(stats.available_drivers, 1);
        assert_eq!(stats.total_rides, 1);
        assert_eq!(stats.rides_by_status.get("completed"), Some(&1));
        assert_eq!(stats.total_revenue.amount, 3000);
        assert_eq!(stats.driver_payouts.amount, 2400);
        assert_eq!(stats.platform_earnings.amount, 600);
    }
}
