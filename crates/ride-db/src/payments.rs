//! Payment ledger: confirmation of ride payments and driver earnings.

use crate::rides::{fetch_ride, update_status};
use crate::{begin_write, is_unique_violation, now_ts, ts_to_datetime, DbError, DbResult};
use ride_core::{
    Currency, DriverEarning, EarningsSplit, EarningsSummary, Payment, PaymentStatus, Price, Ride,
    RideError, RideStatus,
};
use sqlx::{FromRow, SqlitePool};
use tracing::{info, warn};

/// Status recorded on confirmed payments
const PAYMENT_SUCCEEDED: &str = "succeeded";

/// A provider-confirmed charge for a ride.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub ride_id: i64,
    /// User who paid
    pub user_id: i64,
    /// Provider reference (PaymentIntent ID)
    pub provider_payment_id: String,
    /// Amount the provider actually charged
    pub amount: Price,
}

/// Everything written by a successful confirmation
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub payment: Payment,
    pub earning: DriverEarning,
    pub ride: Ride,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: i64,
    ride_id: i64,
    user_id: i64,
    amount: i64,
    currency: String,
    provider_payment_id: String,
    status: String,
    created_at: i64,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DbError;

    fn try_from(row: PaymentRow) -> DbResult<Self> {
        Ok(Payment {
            id: row.id,
            ride_id: row.ride_id,
            user_id: row.user_id,
            amount: Price::from_cents(row.amount, parse_currency(&row.currency)?),
            provider_payment_id: row.provider_payment_id,
            status: row.status,
            created_at: ts_to_datetime(row.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct EarningRow {
    id: i64,
    driver_id: i64,
    ride_id: i64,
    gross: i64,
    commission: i64,
    amount: i64,
    currency: String,
    created_at: i64,
}

impl TryFrom<EarningRow> for DriverEarning {
    type Error = DbError;

    fn try_from(row: EarningRow) -> DbResult<Self> {
        let currency = parse_currency(&row.currency)?;
        Ok(DriverEarning {
            id: row.id,
            driver_id: row.driver_id,
            ride_id: row.ride_id,
            gross: Price::from_cents(row.gross, currency),
            commission: Price::from_cents(row.commission, currency),
            amount: Price::from_cents(row.amount, currency),
            created_at: ts_to_datetime(row.created_at)?,
        })
    }
}

fn parse_currency(raw: &str) -> DbResult<Currency> {
    raw.parse().map_err(|e: RideError| DbError::Corrupt(e.to_string()))
}

const PAYMENT_COLUMNS: &str =
    "id, ride_id, user_id, amount, currency, provider_payment_id, status, created_at";
const EARNING_COLUMNS: &str =
    "id, driver_id, ride_id, gross, commission, amount, currency, created_at";

/// Repository for the payment ledger.
pub struct PaymentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PaymentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a confirmed payment.
    ///
    /// In one transaction: insert the payment, mark the ride completed and
    /// paid, credit the driver's earnings and free the driver. Any failure
    /// rolls all of it back. A second confirmation of the same ride fails
    /// with `AlreadyPaid` and changes nothing.
    pub async fn confirm_ride_payment(
        &self,
        receipt: &PaymentReceipt,
        commission_bps: u32,
    ) -> DbResult<PaymentConfirmation> {
        let ride_id = receipt.ride_id;
        let mut tx = begin_write(self.pool).await?;

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("ride", ride_id)))?;

        ride.ensure_payable()?;

        if receipt.amount != ride.fare {
            warn!(
                ride_id,
                expected = %ride.fare.display(),
                charged = %receipt.amount.display(),
                "Payment amount does not match fare"
            );
            return Err(DbError::Rule(RideError::InvalidRequest(format!(
                "Charged {} but the fare is {}",
                receipt.amount.display(),
                ride.fare.display()
            ))));
        }

        let now = now_ts();
        let payment_id = sqlx::query(
            r#"
            INSERT INTO payments (ride_id, user_id, amount, currency, provider_payment_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ride_id)
        .bind(receipt.user_id)
        .bind(receipt.amount.amount)
        .bind(receipt.amount.currency.as_str())
        .bind(&receipt.provider_payment_id)
        .bind(PAYMENT_SUCCEEDED)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return DbError::Rule(RideError::AlreadyPaid { ride_id });
            }
            DbError::from(e)
        })?
        .last_insert_rowid();

        update_status(&mut *tx, &ride, RideStatus::Completed).await?;

        sqlx::query("UPDATE rides SET payment_status = ?, payment_intent_id = ? WHERE id = ?")
            .bind(PaymentStatus::Paid.as_str())
            .bind(&receipt.provider_payment_id)
            .bind(ride_id)
            .execute(&mut *tx)
            .await?;

        let split = EarningsSplit::compute(ride.fare.amount, commission_bps);
        let earning_id = sqlx::query(
            r#"
            INSERT INTO driver_earnings (driver_id, ride_id, gross, commission, amount, currency, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ride.driver_id)
        .bind(ride_id)
        .bind(split.gross)
        .bind(split.commission)
        .bind(split.driver_amount)
        .bind(ride.fare.currency.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE drivers SET available = 1 WHERE id = ?")
            .bind(ride.driver_id)
            .execute(&mut *tx)
            .await?;

        let payment: Payment = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        let earning: DriverEarning = sqlx::query_as::<_, EarningRow>(&format!(
            "SELECT {} FROM driver_earnings WHERE id = ?",
            EARNING_COLUMNS
        ))
        .bind(earning_id)
        .fetch_one(&mut *tx)
        .await?
        .try_into()?;

        let ride = fetch_ride(&mut *tx, ride_id)
            .await?
            .ok_or_else(|| DbError::Corrupt(format!("ride {} vanished mid-payment", ride_id)))?;

        tx.commit().await?;

        info!(
            ride_id,
            driver_id = ride.driver_id,
            payment_id = %receipt.provider_payment_id,
            gross = split.gross,
            commission = split.commission,
            driver_amount = split.driver_amount,
            "Ride payment confirmed"
        );

        Ok(PaymentConfirmation {
            payment,
            earning,
            ride,
        })
    }

    /// Earnings credited to a driver, newest first
    pub async fn earnings_for_driver(
        &self,
        driver_id: i64,
        currency: Currency,
    ) -> DbResult<EarningsSummary> {
        let earnings = sqlx::query_as::<_, EarningRow>(&format!(
            "SELECT {} FROM driver_earnings WHERE driver_id = ? ORDER BY created_at DESC, id DESC",
            EARNING_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(DriverEarning::try_from)
        .collect::<DbResult<Vec<_>>>()?;

        let total = earnings
            .iter()
            .filter(|e| e.amount.currency == currency)
            .map(|e| e.amount.amount)
            .sum();

        Ok(EarningsSummary {
            total: Price::from_cents(total, currency),
            rides: earnings.len(),
            earnings,
        })
    }

    pub async fn find_by_ride(&self, ride_id: i64) -> DbResult<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE ride_id = ?",
            PAYMENT_COLUMNS
        ))
        .bind(ride_id)
        .fetch_optional(self.pool)
        .await?
        .map(Payment::try_from)
        .transpose()
    }

    /// All payments, newest first
    pub async fn list_payments(&self) -> DbResult<Vec<Payment>> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments ORDER BY created_at DESC, id DESC",
            PAYMENT_COLUMNS
        ))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Payment::try_from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bookable_driver, memory_db, rider};
    use crate::Database;
    use ride_core::{RideRequest, DEFAULT_COMMISSION_BPS};

    async fn booked(db: &Database) -> (Ride, i64) {
        let driver = bookable_driver(db, "d@example.com", "Airport").await;
        let user = rider(db, "r@example.com").await;
        let ride = db
            .rides()
            .request(
                user.id,
                &RideRequest {
                    driver_id: driver.id,
                    pickup: "Airport".to_string(),
                    dropoff: "Harbor".to_string(),
                },
                Price::from_cents(2500, Currency::USD),
            )
            .await
            .unwrap();
        (ride, user.id)
    }

    fn receipt(ride: &Ride, user_id: i64, intent: &str) -> PaymentReceipt {
        PaymentReceipt {
            ride_id: ride.id,
            user_id,
            provider_payment_id: intent.to_string(),
            amount: ride.fare,
        }
    }

    #[tokio::test]
    async fn test_confirm_writes_everything() {
        let db = memory_db().await;
        let (ride, user_id) = booked(&db).await;

        let confirmed = db
            .payments()
            .confirm_ride_payment(&receipt(&ride, user_id, "pi_1"), DEFAULT_COMMISSION_BPS)
            .await
            .unwrap();

        assert_eq!(confirmed.ride.status, RideStatus::Completed);
        assert_eq!(confirmed.ride.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmed.ride.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(confirmed.payment.amount.amount, 2500);
        assert_eq!(confirmed.earning.commission.amount, 500);
        assert_eq!(confirmed.earning.amount.amount, 2000);

        let driver = db.drivers().find(ride.driver_id).await.unwrap().unwrap();
        assert!(driver.available);

        let summary = db
            .payments()
            .earnings_for_driver(ride.driver_id, Currency::USD)
            .await
            .unwrap();
        assert_eq!(summary.total.amount, 2000);
        assert_eq!(summary.rides, 1);
    }

    #[tokio::test]
    async fn test_second_confirmation_is_rejected() {
        let db = memory_db().await;
        let (ride, user_id) = booked(&db).await;
        let payments = db.payments();

        payments
            .confirm_ride_payment(&receipt(&ride, user_id, "pi_1"), DEFAULT_COMMISSION_BPS)
            .await
            .unwrap();
        let err = payments
            .confirm_ride_payment(&receipt(&ride, user_id, "pi_1"), DEFAULT_COMMISSION_BPS)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Rule(RideError::AlreadyPaid { .. })));
        assert_eq!(payments.list_payments().await.unwrap().len(), 1);
        assert_eq!(
            payments
                .earnings_for_driver(ride.driver_id, Currency::USD)
                .await
                .unwrap()
                .rides,
            1
        );
    }

    #[tokio::test]
    async fn test_amount_mismatch_rejected() {
        let db = memory_db().await;
        let (ride, user_id) = booked(&db).await;
        let mut short = receipt(&ride, user_id, "pi_short");
        short.amount = Price::from_cents(100, Currency::USD);

        let err = db
            .payments()
            .confirm_ride_payment(&short, DEFAULT_COMMISSION_BPS)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(RideError::InvalidRequest(_))));
        assert!(db.payments().find_by_ride(ride.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_ride_cannot_be_paid() {
        let db = memory_db().await;
        let (ride, user_id) = booked(&db).await;
        db.rides().cancel(ride.id, None).await.unwrap();

        let err = db
            .payments()
            .confirm_ride_payment(&receipt(&ride, user_id, "pi_late"), DEFAULT_COMMISSION_BPS)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(RideError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_failed_confirmation_rolls_back() {
        let db = memory_db().await;
        let (ride, user_id) = booked(&db).await;

        // A stray earnings row makes the earnings insert fail mid-transaction
        sqlx::query(
            "INSERT INTO driver_earnings (driver_id, ride_id, gross, commission, amount, currency, created_at)
             VALUES (?, ?, 1, 0, 1, 'usd', 0)",
        )
        .bind(ride.driver_id)
        .bind(ride.id)
        .execute(db.pool())
        .await
        .unwrap();

        let result = db
            .payments()
            .confirm_ride_payment(&receipt(&ride, user_id, "pi_boom"), DEFAULT_COMMISSION_BPS)
            .await;
        assert!(result.is_err());

        assert!(db.payments().list_payments().await.unwrap().is_empty());
        let ride = db.rides().find(ride.id).await.unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Requested);
        assert_eq!(ride.payment_status, PaymentStatus::Pending);
        let driver = db.drivers().find(ride.driver_id).await.unwrap().unwrap();
        assert!(!driver.available);
    }
}
