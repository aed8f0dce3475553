use crate::database::postgres_repository::PostgresRepository;
use crate::database::transaction::kind_from_db;
use crate::error::app_error::AppError;
use crate::models::recurring::{Frequency, RecurringTemplate};
use crate::models::transaction::{TransactionDetails, TransactionKind};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    kind: String,
    expense_category_id: Option<String>,
    expense_subcategory_id: Option<String>,
    income_category_id: Option<String>,
    notes: Option<String>,
    transaction_tag: Option<String>,
    frequency: String,
    day_of_week: Option<i32>,
    day_of_month: Option<i32>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    total_occurrences: Option<i32>,
    is_paused: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn frequency_from_db<T: AsRef<str>>(value: T) -> Frequency {
    match value.as_ref() {
        "weekly" => Frequency::Weekly,
        "biweekly" => Frequency::Biweekly,
        "monthly" => Frequency::Monthly,
        other => panic!("Unknown recurrence frequency: {}", other),
    }
}

impl From<TemplateRow> for RecurringTemplate {
    fn from(row: TemplateRow) -> Self {
        let details = match kind_from_db(&row.kind) {
            TransactionKind::Expense => TransactionDetails::Expense {
                category_id: row.expense_category_id.unwrap_or_default(),
                subcategory_id: row.expense_subcategory_id,
                tag: row.transaction_tag.unwrap_or_default(),
            },
            TransactionKind::Income => TransactionDetails::Income {
                category_id: row.income_category_id.unwrap_or_default(),
            },
        };

        RecurringTemplate {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            notes: row.notes,
            details,
            frequency: frequency_from_db(&row.frequency),
            day_of_week: row.day_of_week,
            day_of_month: row.day_of_month,
            start_date: row.start_date,
            end_date: row.end_date,
            total_occurrences: row.total_occurrences,
            is_paused: row.is_paused,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A template about to be created; `id` and timestamps are assigned by the
/// insert.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub details: TransactionDetails,
    pub frequency: Frequency,
    pub day_of_week: Option<i32>,
    pub day_of_month: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub total_occurrences: Option<i32>,
}

fn category_columns(details: &TransactionDetails) -> (Option<&str>, Option<&str>, Option<&str>, Option<&str>) {
    match details {
        TransactionDetails::Expense {
            category_id,
            subcategory_id,
            tag,
        } => (Some(category_id.as_str()), subcategory_id.as_deref(), None, Some(tag.as_str())),
        TransactionDetails::Income { category_id } => (None, None, Some(category_id.as_str()), None),
    }
}

const TEMPLATE_COLUMNS: &str = r#"
    id,
    user_id,
    amount,
    kind,
    expense_category_id,
    expense_subcategory_id,
    income_category_id,
    notes,
    transaction_tag,
    frequency,
    day_of_week,
    day_of_month,
    start_date,
    end_date,
    total_occurrences,
    is_paused,
    created_at,
    updated_at
"#;

#[async_trait::async_trait]
pub trait RecurringTemplateRepository {
    async fn create_template(&self, new: &NewTemplate) -> Result<RecurringTemplate, AppError>;
    async fn get_template(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<RecurringTemplate>, AppError>;
    async fn list_templates(&self, user_id: &Uuid, include_paused: bool) -> Result<Vec<RecurringTemplate>, AppError>;
    async fn update_template(&self, template: &RecurringTemplate) -> Result<RecurringTemplate, AppError>;
    async fn delete_template(&self, id: &Uuid, user_id: &Uuid) -> Result<bool, AppError>;

    /// Active (non-paused) templates whose effective interval overlaps the
    /// window.
    async fn active_templates_in_range(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<RecurringTemplate>, AppError>;
}

#[async_trait::async_trait]
impl RecurringTemplateRepository for PostgresRepository {
    async fn create_template(&self, new: &NewTemplate) -> Result<RecurringTemplate, AppError> {
        let (expense_category_id, expense_subcategory_id, income_category_id, transaction_tag) = category_columns(&new.details);

        let query = format!(
            r#"
            INSERT INTO recurring_templates (
                id, user_id, amount, kind,
                expense_category_id, expense_subcategory_id, income_category_id,
                notes, transaction_tag,
                frequency, day_of_week, day_of_month,
                start_date, end_date, total_occurrences
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TemplateRow>(&query)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(new.amount)
            .bind(new.details.kind().as_db_str())
            .bind(expense_category_id)
            .bind(expense_subcategory_id)
            .bind(income_category_id)
            .bind(&new.notes)
            .bind(transaction_tag)
            .bind(new.frequency.as_db_str())
            .bind(new.day_of_week)
            .bind(new.day_of_month)
            .bind(new.start_date)
            .bind(new.end_date)
            .bind(new.total_occurrences)
            .fetch_one(&self.pool)
            .await?;

        Ok(RecurringTemplate::from(row))
    }

    async fn get_template(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<RecurringTemplate>, AppError> {
        let query = format!("SELECT {TEMPLATE_COLUMNS} FROM recurring_templates WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, TemplateRow>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RecurringTemplate::from))
    }

    async fn list_templates(&self, user_id: &Uuid, include_paused: bool) -> Result<Vec<RecurringTemplate>, AppError> {
        let query = if include_paused {
            format!(
                r#"
                SELECT {TEMPLATE_COLUMNS}
                FROM recurring_templates
                WHERE user_id = $1
                ORDER BY created_at DESC
                "#
            )
        } else {
            format!(
                r#"
                SELECT {TEMPLATE_COLUMNS}
                FROM recurring_templates
                WHERE user_id = $1 AND is_paused = FALSE
                ORDER BY created_at DESC
                "#
            )
        };

        let rows = sqlx::query_as::<_, TemplateRow>(&query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(RecurringTemplate::from).collect())
    }

    async fn update_template(&self, template: &RecurringTemplate) -> Result<RecurringTemplate, AppError> {
        let (expense_category_id, expense_subcategory_id, income_category_id, transaction_tag) = category_columns(&template.details);

        let query = format!(
            r#"
            UPDATE recurring_templates
            SET amount = $1,
                expense_category_id = $2,
                expense_subcategory_id = $3,
                income_category_id = $4,
                notes = $5,
                transaction_tag = $6,
                frequency = $7,
                day_of_week = $8,
                day_of_month = $9,
                start_date = $10,
                end_date = $11,
                total_occurrences = $12,
                is_paused = $13,
                updated_at = now()
            WHERE id = $14 AND user_id = $15
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TemplateRow>(&query)
            .bind(template.amount)
            .bind(expense_category_id)
            .bind(expense_subcategory_id)
            .bind(income_category_id)
            .bind(&template.notes)
            .bind(transaction_tag)
            .bind(template.frequency.as_db_str())
            .bind(template.day_of_week)
            .bind(template.day_of_month)
            .bind(template.start_date)
            .bind(template.end_date)
            .bind(template.total_occurrences)
            .bind(template.is_paused)
            .bind(template.id)
            .bind(template.user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(RecurringTemplate::from(row))
    }

    async fn delete_template(&self, id: &Uuid, user_id: &Uuid) -> Result<bool, AppError> {
        // Past materialized rows keep their data; the FK nulls their
        // recurring_template_id.
        let result = sqlx::query("DELETE FROM recurring_templates WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn active_templates_in_range(
        &self,
        user_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RecurringTemplate>, AppError> {
        let query = format!(
            r#"
            SELECT {TEMPLATE_COLUMNS}
            FROM recurring_templates
            WHERE user_id = $1
              AND is_paused = FALSE
              AND start_date <= $3
              AND (end_date IS NULL OR end_date >= $2)
            "#
        );

        let rows = sqlx::query_as::<_, TemplateRow>(&query)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(RecurringTemplate::from).collect())
    }
}
