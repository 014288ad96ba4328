use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::models::{NewPlayedSubUnit, PlayedSubUnit, PremiumGrant, ProfileUpdate, User};
use crate::db::UserStore;
use crate::error::AppError;

const USER_COLUMNS: &str = "id, name, email, password_hash, image, o_auth, is_premium, \
     package_name, package_price, purchase_at, expires_at, free_chance, created_at, updated_at";

const PLAYED_COLUMNS: &str =
    "id, user_id, grade_name, subject_name, subject_id, unit_id, unit_name, played_time, created_at";

/// Postgres-backed [`UserStore`].
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    async fn record_played_unit_with_transaction(
        &self,
        user_id: Uuid,
        unit: NewPlayedSubUnit,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<PlayedSubUnit, AppError> {
        let existing = sqlx::query_as::<_, PlayedSubUnit>(&format!(
            "SELECT {PLAYED_COLUMNS} FROM played_sub_units WHERE user_id = $1 AND unit_id = $2"
        ))
        .bind(user_id)
        .bind(&unit.unit_id)
        .fetch_optional(&mut **transaction)
        .await?;

        if let Some(existing) = existing {
            return Ok(existing);
        }

        let record = PlayedSubUnit::new(user_id, unit);
        // A concurrent insert for the same unit loses to the unique index and
        // falls through to the re-read below.
        sqlx::query(
            r#"
            INSERT INTO played_sub_units
                (id, user_id, grade_name, subject_name, subject_id, unit_id, unit_name, played_time, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, unit_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.grade_name)
        .bind(&record.subject_name)
        .bind(&record.subject_id)
        .bind(&record.unit_id)
        .bind(&record.unit_name)
        .bind(record.played_time)
        .bind(record.created_at)
        .execute(&mut **transaction)
        .await?;

        let stored = sqlx::query_as::<_, PlayedSubUnit>(&format!(
            "SELECT {PLAYED_COLUMNS} FROM played_sub_units WHERE user_id = $1 AND unit_id = $2"
        ))
        .bind(user_id)
        .bind(&record.unit_id)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(stored)
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users
                (id, name, email, password_hash, image, o_auth, is_premium, free_chance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.image)
        .bind(user.o_auth)
        .bind(user.is_premium)
        .bind(user.free_chance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(created)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                image = $4,
                password_hash = COALESCE($5, password_hash),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.image)
        .bind(&update.password_hash)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn expire_premium(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_premium = FALSE, updated_at = NOW()
            WHERE id = $1
              AND is_premium
              AND (expires_at IS NULL OR expires_at <= $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_free_chance(&self, id: Uuid) -> Result<Option<i32>, AppError> {
        let remaining: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE users
            SET free_chance = free_chance - 1, updated_at = NOW()
            WHERE id = $1 AND NOT is_premium AND free_chance > 0
            RETURNING free_chance
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(remaining.map(|(left,)| left))
    }

    async fn grant_premium(&self, id: Uuid, grant: &PremiumGrant) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_premium = TRUE,
                package_name = $2,
                package_price = $3,
                purchase_at = $4,
                expires_at = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&grant.package_name)
        .bind(grant.package_price)
        .bind(grant.purchase_at)
        .bind(grant.expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn played_sub_units(&self, user_id: Uuid) -> Result<Vec<PlayedSubUnit>, AppError> {
        let units = sqlx::query_as::<_, PlayedSubUnit>(&format!(
            "SELECT {PLAYED_COLUMNS} FROM played_sub_units WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(units)
    }

    async fn record_played_unit(&self, user_id: Uuid, unit: NewPlayedSubUnit) -> Result<PlayedSubUnit, AppError> {
        let mut transaction = self.begin_transaction().await?;

        match self.record_played_unit_with_transaction(user_id, unit, &mut transaction).await {
            Ok(record) => {
                transaction.commit().await?;
                Ok(record)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn update_play_time(&self, user_id: Uuid, played_id: Uuid, played_time: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE played_sub_units SET played_time = $3 WHERE id = $2 AND user_id = $1",
        )
        .bind(user_id)
        .bind(played_id)
        .bind(played_time)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
