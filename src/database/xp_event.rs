use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::experience::{XpDelta, XpEvent, XpEventType};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct XpEventRow {
    id: Uuid,
    user_id: Uuid,
    xp_amount: i32,
    event_type: String,
    description: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

fn event_type_from_db<T: AsRef<str>>(value: T) -> XpEventType {
    match value.as_ref() {
        "daily_login" => XpEventType::DailyLogin,
        "transaction" => XpEventType::Transaction,
        "streak_milestone" => XpEventType::StreakMilestone,
        "inactivity_penalty" => XpEventType::InactivityPenalty,
        "financial_goal" => XpEventType::FinancialGoal,
        other => panic!("Unknown XP event type: {}", other),
    }
}

impl From<XpEventRow> for XpEvent {
    fn from(row: XpEventRow) -> Self {
        XpEvent {
            id: row.id,
            user_id: row.user_id,
            xp_amount: row.xp_amount,
            event_type: event_type_from_db(&row.event_type),
            description: row.description,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

const XP_EVENT_COLUMNS: &str = r#"
    id,
    user_id,
    xp_amount,
    event_type,
    description,
    metadata,
    created_at
"#;

#[async_trait::async_trait]
pub trait XpEventRepository {
    async fn list_events(&self, user_id: &Uuid, limit: i64, offset: i64) -> Result<Vec<XpEvent>, AppError>;
    async fn count_events(&self, user_id: &Uuid) -> Result<i64, AppError>;

    /// The one `streak_milestone` event for a given streak length, if it was
    /// ever awarded. Keyed by the "<N>-day" fragment of the description.
    async fn find_milestone_event(&self, user_id: &Uuid, days: i32) -> Result<Option<XpEvent>, AppError>;

    /// `financial_goal` events for a month, keyed by the "<M>/<Y>" fragment.
    async fn find_financial_goal_events(&self, user_id: &Uuid, month: u32, year: i32) -> Result<Vec<XpEvent>, AppError>;
}

#[async_trait::async_trait]
impl XpEventRepository for PostgresRepository {
    async fn list_events(&self, user_id: &Uuid, limit: i64, offset: i64) -> Result<Vec<XpEvent>, AppError> {
        let query = format!(
            r#"
            SELECT {XP_EVENT_COLUMNS}
            FROM xp_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let rows = sqlx::query_as::<_, XpEventRow>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(XpEvent::from).collect())
    }

    async fn count_events(&self, user_id: &Uuid) -> Result<i64, AppError> {
        #[derive(sqlx::FromRow)]
        struct CountRow {
            total: i64,
        }

        let row = sqlx::query_as::<_, CountRow>("SELECT COUNT(*) AS total FROM xp_events WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.total)
    }

    async fn find_milestone_event(&self, user_id: &Uuid, days: i32) -> Result<Option<XpEvent>, AppError> {
        let query = format!(
            r#"
            SELECT {XP_EVENT_COLUMNS}
            FROM xp_events
            WHERE user_id = $1
              AND event_type = 'streak_milestone'
              AND description LIKE $2
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, XpEventRow>(&query)
            .bind(user_id)
            .bind(format!("%{days}-day%"))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(XpEvent::from))
    }

    async fn find_financial_goal_events(&self, user_id: &Uuid, month: u32, year: i32) -> Result<Vec<XpEvent>, AppError> {
        let query = format!(
            r#"
            SELECT {XP_EVENT_COLUMNS}
            FROM xp_events
            WHERE user_id = $1
              AND event_type = 'financial_goal'
              AND description LIKE $2
            "#
        );

        let rows = sqlx::query_as::<_, XpEventRow>(&query)
            .bind(user_id)
            .bind(format!("%{month}/{year}%"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(XpEvent::from).collect())
    }
}

/// Append an event inside the caller's transaction. The ledger is insert-only;
/// nothing in the codebase updates or deletes these rows.
pub async fn append_event(conn: &mut PgConnection, user_id: &Uuid, delta: &XpDelta) -> Result<XpEvent, AppError> {
    let query = format!(
        r#"
        INSERT INTO xp_events (id, user_id, xp_amount, event_type, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {XP_EVENT_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, XpEventRow>(&query)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(delta.xp_amount)
        .bind(delta.event_type.as_db_str())
        .bind(&delta.description)
        .fetch_one(conn)
        .await?;

    Ok(XpEvent::from(row))
}

/// Milestone lookup usable inside a transaction, mirroring
/// [`XpEventRepository::find_milestone_event`].
pub async fn milestone_event_exists(conn: &mut PgConnection, user_id: &Uuid, days: i32) -> Result<bool, AppError> {
    #[derive(sqlx::FromRow)]
    struct ExistsRow {
        found: bool,
    }

    let row = sqlx::query_as::<_, ExistsRow>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM xp_events
            WHERE user_id = $1
              AND event_type = 'streak_milestone'
              AND description LIKE $2
        ) AS found
        "#,
    )
    .bind(user_id)
    .bind(format!("%{days}-day%"))
    .fetch_one(conn)
    .await?;

    Ok(row.found)
}
