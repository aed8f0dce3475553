use crate::database::postgres_repository::PostgresRepository;
use crate::database::profile::ProfileRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::service::identity::IdentityClient;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, routes};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpPayload {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub id: Uuid,
    pub email: String,
}

/// Provision an identity with the external service, then create the local
/// profile row. If the profile insert fails the identity is rolled back
/// best-effort so the email can be retried.
#[rocket::post("/sign-up", data = "<payload>")]
pub async fn sign_up(
    pool: &State<PgPool>,
    identity: &State<IdentityClient>,
    payload: JsonBody<SignUpPayload>,
) -> Result<(Status, Json<SignUpResponse>), AppError> {
    payload.validate()?;

    let user = identity.sign_up(&payload.email, &payload.password).await?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    if let Err(err) = repo.create_profile(&user.id).await {
        identity.delete_user(&user.id).await;
        return Err(err);
    }

    Ok((
        Status::Created,
        Json(SignUpResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![sign_up]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_payload_validation() {
        let valid = SignUpPayload {
            email: "user@example.com".to_string(),
            password: "long-enough".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = SignUpPayload {
            email: "not-an-email".to_string(),
            password: "long-enough".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = SignUpPayload {
            email: "user@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(short_password.validate().is_err());
    }
}
