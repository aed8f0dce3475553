use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::insights::RecentTransactionSummary;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

/// One expense aggregation bucket: a (category, subcategory) pair. Rows come
/// back in catalog order so the fold downstream can rely on it for
/// tie-breaking.
#[derive(Debug, sqlx::FromRow)]
pub struct CategoryAggregate {
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub total: Decimal,
    pub count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct WeekAggregate {
    pub week: i32,
    pub total: Decimal,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MonthRef {
    pub year: i32,
    pub month: i32,
}

impl PostgresRepository {
    pub async fn aggregate_expenses_by_category(
        &self,
        user_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CategoryAggregate>, AppError> {
        let rows = sqlx::query_as::<_, CategoryAggregate>(
            r#"
            SELECT
                t.expense_category_id       AS category_id,
                t.expense_subcategory_id    AS subcategory_id,
                SUM(t.amount)               AS total,
                COUNT(*)                    AS count
            FROM transactions t
            JOIN expense_categories ec ON ec.id = t.expense_category_id
            LEFT JOIN expense_subcategories es ON es.id = t.expense_subcategory_id
            WHERE t.user_id = $1
              AND t.kind = 'expense'
              AND t.occurred_at >= $2
              AND t.occurred_at <= $3
            GROUP BY t.expense_category_id, t.expense_subcategory_id, ec.sort_order, es.sort_order
            ORDER BY ec.sort_order, es.sort_order NULLS FIRST
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Week-of-month buckets: ((day - 1) / 7) + 1, matching the UI's bands.
    pub async fn aggregate_expenses_by_week(
        &self,
        user_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<WeekAggregate>, AppError> {
        let rows = sqlx::query_as::<_, WeekAggregate>(
            r#"
            SELECT
                ((EXTRACT(DAY FROM occurred_at)::int - 1) / 7) + 1 AS week,
                SUM(amount)                                        AS total
            FROM transactions
            WHERE user_id = $1
              AND kind = 'expense'
              AND occurred_at >= $2
              AND occurred_at <= $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_logged_days(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<i64, AppError> {
        #[derive(sqlx::FromRow)]
        struct CountRow {
            days: i64,
        }

        let row = sqlx::query_as::<_, CountRow>(
            r#"
            SELECT COUNT(DISTINCT occurred_at) AS days
            FROM transactions
            WHERE user_id = $1
              AND kind = 'expense'
              AND occurred_at >= $2
              AND occurred_at <= $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.days)
    }

    pub async fn total_expenses(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<Decimal, AppError> {
        self.sum_amounts(user_id, "expense", None, start, end).await
    }

    pub async fn total_income(&self, user_id: &Uuid, start: NaiveDate, end: NaiveDate) -> Result<Decimal, AppError> {
        self.sum_amounts(user_id, "income", None, start, end).await
    }

    pub async fn total_by_category(
        &self,
        user_id: &Uuid,
        category_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Decimal, AppError> {
        self.sum_amounts(user_id, "expense", Some(category_id), start, end).await
    }

    async fn sum_amounts(
        &self,
        user_id: &Uuid,
        kind: &str,
        category_id: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Decimal, AppError> {
        #[derive(sqlx::FromRow)]
        struct TotalRow {
            total: Decimal,
        }

        let row = sqlx::query_as::<_, TotalRow>(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total
            FROM transactions
            WHERE user_id = $1
              AND kind = $2
              AND ($3::text IS NULL OR expense_category_id = $3)
              AND occurred_at >= $4
              AND occurred_at <= $5
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(category_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.total)
    }

    pub async fn recent_expenses(
        &self,
        user_id: &Uuid,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
    ) -> Result<Vec<RecentTransactionSummary>, AppError> {
        #[derive(sqlx::FromRow)]
        struct RecentRow {
            amount: Decimal,
            category_id: String,
            subcategory_id: Option<String>,
            date: NaiveDate,
        }

        let rows = sqlx::query_as::<_, RecentRow>(
            r#"
            SELECT
                amount,
                expense_category_id    AS category_id,
                expense_subcategory_id AS subcategory_id,
                occurred_at            AS date
            FROM transactions
            WHERE user_id = $1
              AND kind = 'expense'
              AND occurred_at >= $2
              AND occurred_at <= $3
            ORDER BY occurred_at DESC, created_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| RecentTransactionSummary {
                amount: row.amount,
                category_id: row.category_id,
                subcategory_id: row.subcategory_id,
                date: row.date,
            })
            .collect())
    }

    pub async fn available_months(&self, user_id: &Uuid) -> Result<Vec<MonthRef>, AppError> {
        let rows = sqlx::query_as::<_, MonthRef>(
            r#"
            SELECT DISTINCT
                EXTRACT(YEAR FROM occurred_at)::int  AS year,
                EXTRACT(MONTH FROM occurred_at)::int AS month
            FROM transactions
            WHERE user_id = $1
            ORDER BY year DESC, month DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
