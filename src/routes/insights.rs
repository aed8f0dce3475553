use crate::auth::CurrentUser;
use crate::catalog::CatalogCache;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::insights::{AvailableMonth, MonthSnapshot};
use crate::service::{experience, insights};
use rocket::serde::json::Json;
use rocket::{State, routes};
use sqlx::PgPool;
use tracing::warn;

#[rocket::get("/month-snapshot?<year>&<month>")]
pub async fn month_snapshot(
    pool: &State<PgPool>,
    catalog_cache: &State<CatalogCache>,
    current_user: CurrentUser,
    year: i32,
    month: u32,
) -> Result<Json<MonthSnapshot>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let catalog = catalog_cache.get(pool).await?;

    // Dormant goal-bonus hook; awards nothing today and must never fail the
    // snapshot.
    if let Err(err) = experience::award_financial_goal_xp(&repo, &current_user.id, year, month).await {
        warn!(user_id = %current_user.id, error = ?err, "Financial goal XP hook failed");
    }

    let snapshot = insights::month_snapshot(&repo, catalog, &current_user.id, year, month).await?;
    Ok(Json(snapshot))
}

#[rocket::get("/available-months")]
pub async fn available_months(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<Vec<AvailableMonth>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let months = insights::available_months(&repo, &current_user.id).await?;
    Ok(Json(months))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![month_snapshot, available_months]
}

#[cfg(test)]
mod tests {
    use crate::{Config, build_rocket};
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn insights_endpoints_require_auth() {
        let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

        let response = client.get("/api/v1/insights/month-snapshot?year=2024&month=6").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client.get("/api/v1/insights/available-months").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
