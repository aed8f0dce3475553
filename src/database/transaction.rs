use crate::database::postgres_repository::{PostgresRepository, is_unique_violation};
use crate::error::app_error::AppError;
use crate::models::transaction::{Transaction, TransactionDetails, TransactionKind, TodaySummaryResponse};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

// Intermediate struct for sqlx query results; the nullable category columns
// collapse into the kind-tagged variant below.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    occurred_at: NaiveDate,
    created_at: DateTime<Utc>,
    amount: Decimal,
    kind: String,
    expense_category_id: Option<String>,
    expense_subcategory_id: Option<String>,
    income_category_id: Option<String>,
    transaction_tag: Option<String>,
    notes: Option<String>,
    recurring_template_id: Option<Uuid>,
}

pub(crate) fn kind_from_db<T: AsRef<str>>(value: T) -> TransactionKind {
    match value.as_ref() {
        "expense" => TransactionKind::Expense,
        "income" => TransactionKind::Income,
        other => panic!("Unknown transaction kind: {}", other),
    }
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
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

        Transaction {
            id: row.id,
            user_id: row.user_id,
            occurred_at: row.occurred_at,
            created_at: row.created_at,
            amount: row.amount,
            notes: row.notes,
            recurring_template_id: row.recurring_template_id,
            details,
        }
    }
}

/// A transaction about to be written; ids and `created_at` are assigned by
/// the insert.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub occurred_at: NaiveDate,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub recurring_template_id: Option<Uuid>,
    pub details: TransactionDetails,
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

const TRANSACTION_COLUMNS: &str = r#"
    id,
    user_id,
    occurred_at,
    created_at,
    amount,
    kind,
    expense_category_id,
    expense_subcategory_id,
    income_category_id,
    transaction_tag,
    notes,
    recurring_template_id
"#;

#[async_trait::async_trait]
pub trait TransactionRepository {
    async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction, AppError>;
    async fn get_transaction(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<Transaction>, AppError>;
    async fn update_transaction(&self, transaction: &Transaction) -> Result<Transaction, AppError>;
    async fn delete_transaction(&self, id: &Uuid, user_id: &Uuid) -> Result<bool, AppError>;
    async fn list_by_date_range(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>, AppError>;
    async fn today_summary(&self, user_id: &Uuid, today: NaiveDate) -> Result<TodaySummaryResponse, AppError>;

    /// Insert a materialized occurrence unless `(template, date)` already
    /// exists. Returns true when a row was created. Racing materializations
    /// are resolved by the partial unique index, not by locking.
    async fn insert_occurrence(&self, new: &NewTransaction) -> Result<bool, AppError>;
}

#[async_trait::async_trait]
impl TransactionRepository for PostgresRepository {
    async fn create_transaction(&self, new: &NewTransaction) -> Result<Transaction, AppError> {
        let (expense_category_id, expense_subcategory_id, income_category_id, transaction_tag) = category_columns(&new.details);

        let query = format!(
            r#"
            INSERT INTO transactions (
                id, user_id, occurred_at, amount, kind,
                expense_category_id, expense_subcategory_id, income_category_id,
                transaction_tag, notes, recurring_template_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(new.occurred_at)
            .bind(new.amount)
            .bind(new.details.kind().as_db_str())
            .bind(expense_category_id)
            .bind(expense_subcategory_id)
            .bind(income_category_id)
            .bind(transaction_tag)
            .bind(&new.notes)
            .bind(new.recurring_template_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Transaction::from(row))
    }

    async fn get_transaction(&self, id: &Uuid, user_id: &Uuid) -> Result<Option<Transaction>, AppError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Transaction::from))
    }

    async fn update_transaction(&self, transaction: &Transaction) -> Result<Transaction, AppError> {
        let (expense_category_id, expense_subcategory_id, income_category_id, transaction_tag) = category_columns(&transaction.details);

        let query = format!(
            r#"
            UPDATE transactions
            SET occurred_at = $1,
                amount = $2,
                expense_category_id = $3,
                expense_subcategory_id = $4,
                income_category_id = $5,
                transaction_tag = $6,
                notes = $7
            WHERE id = $8 AND user_id = $9
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(transaction.occurred_at)
            .bind(transaction.amount)
            .bind(expense_category_id)
            .bind(expense_subcategory_id)
            .bind(income_category_id)
            .bind(transaction_tag)
            .bind(&transaction.notes)
            .bind(transaction.id)
            .bind(transaction.user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Transaction::from(row))
    }

    async fn delete_transaction(&self, id: &Uuid, user_id: &Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_date_range(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<Vec<Transaction>, AppError> {
        let query = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE user_id = $1 AND occurred_at >= $2 AND occurred_at <= $3
            ORDER BY occurred_at DESC, created_at DESC
            "#
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn today_summary(&self, user_id: &Uuid, today: NaiveDate) -> Result<TodaySummaryResponse, AppError> {
        #[derive(sqlx::FromRow)]
        struct SummaryRow {
            expense_total: Decimal,
            expense_count: i64,
            income_total: Decimal,
            income_count: i64,
        }

        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE kind = 'expense'), 0) AS expense_total,
                COUNT(*) FILTER (WHERE kind = 'expense')                 AS expense_count,
                COALESCE(SUM(amount) FILTER (WHERE kind = 'income'), 0)  AS income_total,
                COUNT(*) FILTER (WHERE kind = 'income')                  AS income_count
            FROM transactions
            WHERE user_id = $1 AND occurred_at = $2
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(TodaySummaryResponse {
            has_logged_today: row.expense_count + row.income_count > 0,
            expense_total: row.expense_total,
            expense_count: row.expense_count,
            income_total: row.income_total,
            income_count: row.income_count,
        })
    }

    async fn insert_occurrence(&self, new: &NewTransaction) -> Result<bool, AppError> {
        let (expense_category_id, expense_subcategory_id, income_category_id, transaction_tag) = category_columns(&new.details);

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, occurred_at, amount, kind,
                expense_category_id, expense_subcategory_id, income_category_id,
                transaction_tag, notes, recurring_template_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (recurring_template_id, occurred_at)
                WHERE recurring_template_id IS NOT NULL
                DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.occurred_at)
        .bind(new.amount)
        .bind(new.details.kind().as_db_str())
        .bind(expense_category_id)
        .bind(expense_subcategory_id)
        .bind(income_category_id)
        .bind(transaction_tag)
        .bind(&new.notes)
        .bind(new.recurring_template_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            // A concurrent materialization won the insert; that is success.
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
