use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::profile::ProfileRepository;
use crate::dates;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::models::profile::{TimezoneRequest, TimezoneResponse};
use rocket::serde::json::Json;
use rocket::{State, routes};
use sqlx::PgPool;

#[rocket::patch("/timezone", data = "<payload>")]
pub async fn update_timezone(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    payload: JsonBody<TimezoneRequest>,
) -> Result<Json<TimezoneResponse>, AppError> {
    if !dates::is_valid_zone(&payload.timezone) {
        return Err(AppError::Validation(format!("Invalid timezone: {}", payload.timezone)));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let profile = repo.update_timezone(&current_user.id, &payload.timezone).await?;

    Ok(Json(TimezoneResponse {
        timezone: profile.timezone,
    }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![update_timezone]
}

#[cfg(test)]
mod tests {
    use crate::{Config, build_rocket};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;

    #[rocket::async_test]
    async fn timezone_update_requires_auth() {
        let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");
        let response = client
            .patch("/api/v1/profile/timezone")
            .header(ContentType::JSON)
            .body(r#"{"timezone":"Europe/Amsterdam"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
