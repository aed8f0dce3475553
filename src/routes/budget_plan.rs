use crate::auth::CurrentUser;
use crate::database::budget_plan::BudgetPlanRepository;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::profile::ProfileRepository;
use crate::dates;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::models::budget_plan::{BudgetPlanResponse, CreateBudgetPlanPayload, UpdateBudgetPlanPayload};
use chrono::Datelike;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, routes};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// The month `expected_income` is derived over: explicit query params, or the
/// current month in the profile's timezone.
async fn resolve_month(repo: &PostgresRepository, user_id: &Uuid, year: Option<i32>, month: Option<u32>) -> Result<(i32, u32), AppError> {
    if let (Some(year), Some(month)) = (year, month) {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(format!("Invalid month: {month}. Must be between 1 and 12.")));
        }
        return Ok((year, month));
    }

    let profile = repo
        .get_profile(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    let today = dates::today_in(&profile.timezone);
    Ok((today.year(), today.month()))
}

async fn expected_income(repo: &PostgresRepository, user_id: &Uuid, year: i32, month: u32) -> Result<Decimal, AppError> {
    let (start, end) = dates::month_bounds(year, month);
    repo.total_income(user_id, start, end).await
}

#[rocket::post("/create", data = "<payload>")]
pub async fn create_budget_plan(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    payload: JsonBody<CreateBudgetPlanPayload>,
) -> Result<(Status, Json<BudgetPlanResponse>), AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let plan = repo
        .create_budget_plan(&current_user.id, payload.savings_goal, payload.investment_goal)
        .await?;

    let (year, month) = resolve_month(&repo, &current_user.id, None, None).await?;
    let income = expected_income(&repo, &current_user.id, year, month).await?;

    Ok((Status::Created, Json(BudgetPlanResponse::from_plan(&plan, income))))
}

#[rocket::get("/get?<year>&<month>")]
pub async fn get_budget_plan(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<Json<BudgetPlanResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let plan = repo
        .get_budget_plan(&current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Budget plan not found".to_string()))?;

    let (year, month) = resolve_month(&repo, &current_user.id, year, month).await?;
    let income = expected_income(&repo, &current_user.id, year, month).await?;

    Ok(Json(BudgetPlanResponse::from_plan(&plan, income)))
}

/// Partial update: omitted goals keep their stored value.
#[rocket::patch("/update?<year>&<month>", data = "<payload>")]
pub async fn update_budget_plan(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    year: Option<i32>,
    month: Option<u32>,
    payload: JsonBody<UpdateBudgetPlanPayload>,
) -> Result<Json<BudgetPlanResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let existing = repo
        .get_budget_plan(&current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Budget plan not found".to_string()))?;

    let plan = repo
        .update_budget_plan(
            &current_user.id,
            payload.savings_goal.or(existing.savings_goal),
            payload.investment_goal.or(existing.investment_goal),
        )
        .await?;

    let (year, month) = resolve_month(&repo, &current_user.id, year, month).await?;
    let income = expected_income(&repo, &current_user.id, year, month).await?;

    Ok(Json(BudgetPlanResponse::from_plan(&plan, income)))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![create_budget_plan, get_budget_plan, update_budget_plan]
}

#[cfg(test)]
mod tests {
    use crate::{Config, build_rocket};
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn budget_plan_endpoints_require_auth() {
        let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

        let response = client.get("/api/v1/budget-plans/get").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
