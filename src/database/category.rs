use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::category::{ExpenseCategory, ExpenseSubcategory, IncomeCategory};

impl PostgresRepository {
    pub async fn list_expense_categories(&self) -> Result<Vec<ExpenseCategory>, AppError> {
        let categories = sqlx::query_as::<_, ExpenseCategory>(
            r#"
            SELECT id, label, color, sort_order
            FROM expense_categories
            ORDER BY sort_order
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn list_expense_subcategories(&self) -> Result<Vec<ExpenseSubcategory>, AppError> {
        let subcategories = sqlx::query_as::<_, ExpenseSubcategory>(
            r#"
            SELECT id, category_id, label, sub_color, sort_order
            FROM expense_subcategories
            ORDER BY category_id, sort_order
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subcategories)
    }

    pub async fn list_income_categories(&self) -> Result<Vec<IncomeCategory>, AppError> {
        let categories = sqlx::query_as::<_, IncomeCategory>(
            r#"
            SELECT id, label, color, sort_order
            FROM income_categories
            ORDER BY sort_order
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }
}
