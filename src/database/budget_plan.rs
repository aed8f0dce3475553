use crate::database::postgres_repository::{PostgresRepository, is_unique_violation};
use crate::error::app_error::AppError;
use crate::models::budget_plan::BudgetPlan;
use rust_decimal::Decimal;
use uuid::Uuid;

const PLAN_COLUMNS: &str = r#"
    id,
    user_id,
    savings_goal,
    investment_goal,
    created_at,
    updated_at
"#;

#[async_trait::async_trait]
pub trait BudgetPlanRepository {
    /// One plan per user; a second create trips the UNIQUE constraint and
    /// surfaces as `AlreadyExists`.
    async fn create_budget_plan(
        &self,
        user_id: &Uuid,
        savings_goal: Option<Decimal>,
        investment_goal: Option<Decimal>,
    ) -> Result<BudgetPlan, AppError>;
    async fn get_budget_plan(&self, user_id: &Uuid) -> Result<Option<BudgetPlan>, AppError>;
    async fn update_budget_plan(
        &self,
        user_id: &Uuid,
        savings_goal: Option<Decimal>,
        investment_goal: Option<Decimal>,
    ) -> Result<BudgetPlan, AppError>;
}

#[async_trait::async_trait]
impl BudgetPlanRepository for PostgresRepository {
    async fn create_budget_plan(
        &self,
        user_id: &Uuid,
        savings_goal: Option<Decimal>,
        investment_goal: Option<Decimal>,
    ) -> Result<BudgetPlan, AppError> {
        let query = format!(
            r#"
            INSERT INTO budget_plans (id, user_id, savings_goal, investment_goal)
            VALUES ($1, $2, $3, $4)
            RETURNING {PLAN_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, BudgetPlan>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(savings_goal)
            .bind(investment_goal)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(plan) => Ok(plan),
            Err(err) if is_unique_violation(&err) => {
                Err(AppError::AlreadyExists("Budget plan already exists for this user".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_budget_plan(&self, user_id: &Uuid) -> Result<Option<BudgetPlan>, AppError> {
        let query = format!("SELECT {PLAN_COLUMNS} FROM budget_plans WHERE user_id = $1");
        let plan = sqlx::query_as::<_, BudgetPlan>(&query).bind(user_id).fetch_optional(&self.pool).await?;

        Ok(plan)
    }

    async fn update_budget_plan(
        &self,
        user_id: &Uuid,
        savings_goal: Option<Decimal>,
        investment_goal: Option<Decimal>,
    ) -> Result<BudgetPlan, AppError> {
        let query = format!(
            r#"
            UPDATE budget_plans
            SET savings_goal = $1, investment_goal = $2, updated_at = now()
            WHERE user_id = $3
            RETURNING {PLAN_COLUMNS}
            "#
        );

        let plan = sqlx::query_as::<_, BudgetPlan>(&query)
            .bind(savings_goal)
            .bind(investment_goal)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Budget plan not found".to_string()))?;

        Ok(plan)
    }
}
