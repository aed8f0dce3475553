use crate::config::Config;
use crate::error::app_error::AppError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user, resolved from the `Authorization: Bearer` token issued
/// by the identity service. Validation is offline: the token is HS256-signed
/// with the shared secret and carries the user id in `sub`.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ").or_else(|| header.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

pub(crate) fn verify_token(token: &str, secret: &str, audience: &str) -> Option<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation).ok()?;
    Uuid::parse_str(&data.claims.sub).ok()
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            return Outcome::Error((Status::InternalServerError, AppError::Unauthorized));
        };

        let user_id = req
            .headers()
            .get_one("Authorization")
            .and_then(bearer_token)
            .and_then(|token| verify_token(token, &config.identity.jwt_secret, &config.identity.jwt_audience));

        match user_id {
            Some(id) => {
                let current_user = CurrentUser { id };
                req.local_cache(|| Some(current_user.clone()));
                Outcome::Success(current_user)
            }
            None => Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        aud: String,
        exp: i64,
    }

    fn make_token(sub: &str, secret: &str) -> String {
        let claims = TestClaims {
            sub: sub.to_string(),
            aud: "authenticated".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn bearer_token_strips_scheme() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }

    #[test]
    fn verify_token_accepts_valid_signature() {
        let user_id = Uuid::new_v4();
        let token = make_token(&user_id.to_string(), "top-secret");
        assert_eq!(verify_token(&token, "top-secret", "authenticated"), Some(user_id));
    }

    #[test]
    fn verify_token_rejects_wrong_secret() {
        let token = make_token(&Uuid::new_v4().to_string(), "top-secret");
        assert_eq!(verify_token(&token, "other-secret", "authenticated"), None);
    }

    #[test]
    fn verify_token_rejects_non_uuid_subject() {
        let token = make_token("not-a-uuid", "top-secret");
        assert_eq!(verify_token(&token, "top-secret", "authenticated"), None);
    }
}
