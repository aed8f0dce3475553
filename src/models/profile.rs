use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user profile row. Created on sign-up; the gamification counters are
/// advanced exclusively by the experience engine.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub current_level: i32,
    pub current_xp: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_login_date: Option<NaiveDate>,
    pub total_xp_earned: i32,
    pub transactions_today_count: i32,
    pub last_transaction_date: Option<NaiveDate>,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TimezoneRequest {
    pub timezone: String,
}

#[derive(Debug, Serialize)]
pub struct TimezoneResponse {
    pub timezone: String,
}
