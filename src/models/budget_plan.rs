use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// At most one plan per user; `expected_income` is derived from income
/// transactions of the queried month rather than stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BudgetPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub savings_goal: Option<Decimal>,
    pub investment_goal: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn validate_goal(goal: &Decimal) -> Result<(), ValidationError> {
    if *goal < Decimal::ZERO {
        let mut error = ValidationError::new("goal_negative");
        error.message = Some("Goals must be zero or positive".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBudgetPlanPayload {
    #[validate(custom(function = "validate_goal"))]
    pub savings_goal: Option<Decimal>,
    #[validate(custom(function = "validate_goal"))]
    pub investment_goal: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBudgetPlanPayload {
    #[validate(custom(function = "validate_goal"))]
    pub savings_goal: Option<Decimal>,
    #[validate(custom(function = "validate_goal"))]
    pub investment_goal: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct BudgetPlanResponse {
    pub id: Uuid,
    pub savings_goal: Option<Decimal>,
    pub investment_goal: Option<Decimal>,
    pub expected_income: Decimal,
}

impl BudgetPlanResponse {
    pub fn from_plan(plan: &BudgetPlan, expected_income: Decimal) -> Self {
        Self {
            id: plan.id,
            savings_goal: plan.savings_goal,
            investment_goal: plan.investment_goal,
            expected_income,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goals_must_not_be_negative() {
        assert!(validate_goal(&Decimal::ZERO).is_ok());
        assert!(validate_goal(&"100.50".parse().unwrap()).is_ok());
        assert!(validate_goal(&"-0.01".parse().unwrap()).is_err());
    }
}
