use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::experience::{CheckInResponse, ExperienceHistoryResponse, ExperienceStatusResponse, StreakMilestonesResponse};
use crate::service::experience;
use rocket::serde::json::Json;
use rocket::{State, routes};
use sqlx::PgPool;

const HISTORY_DEFAULT_LIMIT: i64 = 50;
const HISTORY_MAX_LIMIT: i64 = 100;

#[rocket::get("/status")]
pub async fn status(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<ExperienceStatusResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(experience::status(&repo, &current_user.id).await?))
}

#[rocket::post("/check-in")]
pub async fn check_in(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<CheckInResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(experience::check_in(&repo, &current_user.id).await?))
}

#[rocket::get("/history?<limit>&<offset>")]
pub async fn history(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Json<ExperienceHistoryResponse>, AppError> {
    let limit = limit.unwrap_or(HISTORY_DEFAULT_LIMIT);
    let offset = offset.unwrap_or(0);
    if !(1..=HISTORY_MAX_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!("limit must be between 1 and {HISTORY_MAX_LIMIT}")));
    }
    if offset < 0 {
        return Err(AppError::Validation("offset must not be negative".to_string()));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(experience::history(&repo, &current_user.id, limit, offset).await?))
}

#[rocket::get("/streak-milestones")]
pub async fn streak_milestones(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<StreakMilestonesResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    Ok(Json(experience::milestones(&repo, &current_user.id).await?))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![status, check_in, history, streak_milestones]
}

#[cfg(test)]
mod tests {
    use crate::{Config, build_rocket};
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn experience_endpoints_require_auth() {
        let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

        let response = client.get("/api/v1/experience/status").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client.post("/api/v1/experience/check-in").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client.get("/api/v1/experience/history?limit=10").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
