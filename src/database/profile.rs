use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::profile::Profile;
use sqlx::PgConnection;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = r#"
    id,
    current_level,
    current_xp,
    current_streak,
    longest_streak,
    last_login_date,
    total_xp_earned,
    transactions_today_count,
    last_transaction_date,
    timezone,
    created_at,
    updated_at
"#;

#[async_trait::async_trait]
pub trait ProfileRepository {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>, AppError>;
    async fn create_profile(&self, user_id: &Uuid) -> Result<Profile, AppError>;
    async fn update_timezone(&self, user_id: &Uuid, timezone: &str) -> Result<Profile, AppError>;
}

#[async_trait::async_trait]
impl ProfileRepository for PostgresRepository {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<Profile>, AppError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let profile = sqlx::query_as::<_, Profile>(&query).bind(user_id).fetch_optional(&self.pool).await?;

        Ok(profile)
    }

    async fn create_profile(&self, user_id: &Uuid) -> Result<Profile, AppError> {
        // Sign-up retries land on the existing row.
        let query = format!(
            r#"
            INSERT INTO profiles (id)
            VALUES ($1)
            ON CONFLICT (id) DO UPDATE SET updated_at = now()
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let profile = sqlx::query_as::<_, Profile>(&query).bind(user_id).fetch_one(&self.pool).await?;

        Ok(profile)
    }

    async fn update_timezone(&self, user_id: &Uuid, timezone: &str) -> Result<Profile, AppError> {
        let query = format!(
            r#"
            UPDATE profiles
            SET timezone = $1, updated_at = now()
            WHERE id = $2
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(timezone)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        Ok(profile)
    }
}

/// Row-locked profile read. Concurrent check-ins and XP awards for the same
/// user serialize on this lock until the surrounding transaction commits.
pub async fn profile_for_update(conn: &mut PgConnection, user_id: &Uuid) -> Result<Option<Profile>, AppError> {
    let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1 FOR UPDATE");
    let profile = sqlx::query_as::<_, Profile>(&query).bind(user_id).fetch_optional(conn).await?;

    Ok(profile)
}

/// Persist the gamification counters mutated by the experience engine.
pub async fn store_gamification_counters(conn: &mut PgConnection, profile: &Profile) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE profiles
        SET current_level = $1,
            current_xp = $2,
            current_streak = $3,
            longest_streak = $4,
            last_login_date = $5,
            total_xp_earned = $6,
            transactions_today_count = $7,
            last_transaction_date = $8,
            updated_at = now()
        WHERE id = $9
        "#,
    )
    .bind(profile.current_level)
    .bind(profile.current_xp)
    .bind(profile.current_streak)
    .bind(profile.longest_streak)
    .bind(profile.last_login_date)
    .bind(profile.total_xp_earned)
    .bind(profile.transactions_today_count)
    .bind(profile.last_transaction_date)
    .bind(profile.id)
    .execute(conn)
    .await?;

    Ok(())
}
