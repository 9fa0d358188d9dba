//! User repository: registration, authentication and profile updates.

use crate::drivers::fetch_driver;
use crate::password::{dummy_verify, hash_password, verify_password};
use crate::{begin_write, is_unique_violation, now_ts, ts_to_datetime, DbError, DbResult};
use ride_core::{fold_location, Driver, ProfileUpdate, RegisterRequest, RideError, Role, User};
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, FromRow, SqlitePool};

const USER_COLUMNS: &str = "id, name, email, phone, role, location, created_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    phone: Option<String>,
    role: String,
    location: Option<String>,
    created_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> DbResult<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row
                .role
                .parse::<Role>()
                .map_err(|e| DbError::Corrupt(e.to_string()))?,
            location: row.location,
            created_at: ts_to_datetime(row.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

pub(crate) async fn fetch_user<'e, E>(executor: E, id: i64) -> DbResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    sqlx::query_as::<_, UserRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(User::try_from)
        .transpose()
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user from an already-validated request.
    ///
    /// Driver accounts get their driver profile in the same transaction.
    /// New drivers start unverified and unavailable.
    pub async fn register(&self, request: &RegisterRequest) -> DbResult<(User, Option<Driver>)> {
        self.insert(request, request.role).await
    }

    /// Create an admin account (bootstrap and tooling only).
    pub async fn create_admin(&self, name: &str, email: &str, password: &str) -> DbResult<User> {
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            password: password.to_string(),
            phone: None,
            role: Role::Admin,
            location: None,
            vehicle: None,
        };
        let (user, _) = self.insert(&request, Role::Admin).await?;
        Ok(user)
    }

    async fn insert(&self, request: &RegisterRequest, role: Role) -> DbResult<(User, Option<Driver>)> {
        let password_hash = hash_password(&request.password)?;
        let now = now_ts();

        let mut tx = begin_write(self.pool).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, phone, role, location, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(&request.phone)
        .bind(role.as_str())
        .bind(&request.location)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return DbError::Rule(RideError::EmailTaken {
                    email: request.email.clone(),
                });
            }
            DbError::from(e)
        })?;

        let user_id = result.last_insert_rowid();

        let driver = match (role, &request.vehicle) {
            (Role::Driver, Some(vehicle)) => {
                let driver_id = sqlx::query(
                    r#"
                    INSERT INTO drivers (user_id, vehicle_make, vehicle_model, vehicle_plate,
                                         vehicle_color, license_number, location,
                                         location_search, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(user_id)
                .bind(vehicle.make.trim())
                .bind(vehicle.model.trim())
                .bind(vehicle.plate.trim())
                .bind(&vehicle.color)
                .bind(&vehicle.license_number)
                .bind(&request.location)
                .bind(request.location.as_deref().map(fold_location))
                .bind(now)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

                fetch_driver(&mut *tx, driver_id).await?
            }
            (Role::Driver, None) => {
                return Err(DbError::Rule(RideError::InvalidRequest(
                    "Vehicle details are required for drivers".to_string(),
                )))
            }
            _ => None,
        };

        let user = fetch_user(&mut *tx, user_id)
            .await?
            .ok_or_else(|| DbError::Corrupt(format!("user {} vanished mid-insert", user_id)))?;

        tx.commit().await?;

        Ok((user, driver))
    }

    /// Verify credentials and return the user.
    ///
    /// Unknown emails still pay for an Argon2 verification.
    pub async fn authenticate(&self, email: &str, password: &str) -> DbResult<User> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE email = ? COLLATE NOCASE",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(email.trim())
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            dummy_verify(password);
            return Err(invalid_credentials());
        };

        if !verify_password(password, &row.password_hash) {
            return Err(invalid_credentials());
        }

        User::try_from(row.user)
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<User>> {
        fetch_user(self.pool, id).await
    }

    /// All users, oldest first
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    /// Apply a validated profile update
    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> DbResult<User> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                phone = COALESCE(?, phone)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(&update.phone)
        .bind(id)
        .execute(self.pool)
        .await?;

        self.find(id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("user", id)))
    }

    pub async fn update_location(&self, id: i64, location: &str) -> DbResult<User> {
        let result = sqlx::query("UPDATE users SET location = ? WHERE id = ?")
            .bind(location.trim())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Rule(RideError::not_found("user", id)));
        }

        self.find(id)
            .await?
            .ok_or_else(|| DbError::Rule(RideError::not_found("user", id)))
    }
}

fn invalid_credentials() -> DbError {
    DbError::Rule(RideError::Unauthorized(
        "Invalid email or password".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, rider};
    use ride_core::VehicleDetails;

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let db = memory_db().await;
        let user = rider(&db, "ada@example.com").await;
        assert_eq!(user.role, Role::Rider);

        let authed = db
            .users()
            .authenticate("ADA@example.com", "rider-password")
            .await
            .unwrap();
        assert_eq!(authed.id, user.id);

        let err = db
            .users()
            .authenticate("ada@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(RideError::Unauthorized(_))));

        let err = db
            .users()
            .authenticate("nobody@example.com", "rider-password")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(RideError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = memory_db().await;
        rider(&db, "dup@example.com").await;

        let err = db
            .users()
            .register(&RegisterRequest {
                name: "Other".to_string(),
                email: "dup@example.com".to_string(),
                password: "another-password".to_string(),
                phone: None,
                role: Role::Rider,
                location: None,
                vehicle: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(RideError::EmailTaken { .. })));
    }

    #[tokio::test]
    async fn test_driver_registration_creates_profile() {
        let db = memory_db().await;
        let (user, driver) = db
            .users()
            .register(&RegisterRequest {
                name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
                password: "driver-password".to_string(),
                phone: Some("555-0100".to_string()),
                role: Role::Driver,
                location: Some("Airport".to_string()),
                vehicle: Some(VehicleDetails {
                    make: "Honda".to_string(),
                    model: "Civic".to_string(),
                    plate: "XYZ 789".to_string(),
                    color: None,
                    license_number: Some("D1234".to_string()),
                }),
            })
            .await
            .unwrap();

        let driver = driver.unwrap();
        assert_eq!(driver.user_id, user.id);
        assert_eq!(driver.name, "Dana");
        assert!(!driver.verified);
        assert!(!driver.available);
        assert_eq!(driver.location.as_deref(), Some("Airport"));
    }

    #[tokio::test]
    async fn test_update_profile_and_location() {
        let db = memory_db().await;
        let user = rider(&db, "pat@example.com").await;

        let updated = db
            .users()
            .update_profile(
                user.id,
                &ProfileUpdate {
                    name: Some("Pat".to_string()),
                    phone: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Pat");

        let moved = db.users().update_location(user.id, " Harbor ").await.unwrap();
        assert_eq!(moved.location.as_deref(), Some("Harbor"));

        assert!(db.users().update_location(9999, "Nowhere").await.is_err());
    }

    #[tokio::test]
    async fn test_create_admin() {
        let db = memory_db().await;
        let admin = db
            .users()
            .create_admin("Root", "Root@Example.com", "admin-password")
            .await
            .unwrap();
        assert!(admin.is_admin());
        assert_eq!(admin.email, "root@example.com");
    }
}
