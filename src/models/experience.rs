use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpEventType {
    DailyLogin,
    Transaction,
    StreakMilestone,
    InactivityPenalty,
    FinancialGoal,
}

impl XpEventType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            XpEventType::DailyLogin => "daily_login",
            XpEventType::Transaction => "transaction",
            XpEventType::StreakMilestone => "streak_milestone",
            XpEventType::InactivityPenalty => "inactivity_penalty",
            XpEventType::FinancialGoal => "financial_goal",
        }
    }
}

/// Append-only XP ledger entry. Never mutated after insert.
#[derive(Debug, Clone)]
pub struct XpEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub xp_amount: i32,
    pub event_type: XpEventType,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An XP delta the experience engine has decided to award but not yet
/// persisted. Negative amounts are penalties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpDelta {
    pub xp_amount: i32,
    pub event_type: XpEventType,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct XpEventResponse {
    pub id: Uuid,
    pub xp_amount: i32,
    pub event_type: XpEventType,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&XpEvent> for XpEventResponse {
    fn from(event: &XpEvent) -> Self {
        Self {
            id: event.id,
            xp_amount: event.xp_amount,
            event_type: event.event_type,
            description: event.description.clone(),
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExperienceStatusResponse {
    pub user_id: Uuid,
    pub current_level: i32,
    pub current_xp: i32,
    pub xp_for_next_level: i32,
    pub total_xp_for_current_level: i32,
    pub evolution_stage: &'static str,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_login_date: Option<NaiveDate>,
    pub transactions_today_count: i32,
    pub transactions_daily_limit: i32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MilestoneReached {
    pub days: i32,
    pub xp_reward: i32,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub xp_awarded: i32,
    pub new_total_xp: i32,
    pub new_level: i32,
    pub level_up: bool,
    pub previous_level: Option<i32>,
    pub streak_incremented: bool,
    pub new_streak: i32,
    pub streak_broken: bool,
    pub inactivity_penalties: Vec<XpEventResponse>,
    pub milestone_reached: Option<MilestoneReached>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ExperienceHistoryResponse {
    pub events: Vec<XpEventResponse>,
    pub total_count: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct StreakMilestone {
    pub days: i32,
    pub xp_reward: i32,
    pub achieved: bool,
    pub achieved_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StreakMilestonesResponse {
    pub current_streak: i32,
    pub milestones: Vec<StreakMilestone>,
}
