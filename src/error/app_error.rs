use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::serde_json;
use rocket::{Request, Response};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
struct ErrorResponse {
    message: String,
    request_id: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid request")]
    PayloadValidation(#[from] ValidationErrors),
    #[error("{0}")]
    CategoryNotFound(String),
    #[error("{0}")]
    InvalidDateFormat(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InsightsValidation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Sign-up failed: {0}")]
    Identity(String),
    #[error("Internal server error")]
    UuidError {
        message: String,
        #[source]
        source: uuid::Error,
    },
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: Box<figment::Error>,
    },
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }

    pub fn uuid(message: impl Into<String>, source: uuid::Error) -> Self {
        Self::UuidError {
            message: message.into(),
            source,
        }
    }
}

impl From<uuid::Error> for AppError {
    fn from(e: uuid::Error) -> Self {
        AppError::uuid("Invalid UUID", e)
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: Box::new(e),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::db("Database error", e),
        }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Db { .. } => Status::InternalServerError,
            AppError::Validation(_) => Status::BadRequest,
            AppError::PayloadValidation(_) => Status::BadRequest,
            AppError::CategoryNotFound(_) => Status::BadRequest,
            AppError::InvalidDateFormat(_) => Status::BadRequest,
            AppError::AlreadyExists(_) => Status::Conflict,
            AppError::NotFound(_) => Status::NotFound,
            AppError::InsightsValidation(_) => Status::BadRequest,
            AppError::Unauthorized => Status::Unauthorized,
            AppError::Identity(_) => Status::BadRequest,
            AppError::UuidError { .. } => Status::BadRequest,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let user_id = req
            .local_cache(|| None::<crate::auth::CurrentUser>)
            .as_ref()
            .map(|u| u.id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        error!(
            error = ?self,
            request_id = %request_id,
            user_id = %user_id,
            method = %method,
            uri = %uri,
            "request failed"
        );

        let status = Status::from(&self);
        let error_response = ErrorResponse {
            message: self.to_string(),
            request_id: request_id.clone(),
        };
        let body = serde_json::to_string(&error_response).unwrap_or_else(|e| {
            error!(
                request_id = %request_id,
                error = %e,
                "Failed to serialize error response"
            );
            format!(r#"{{"message":"Error serialization failed","request_id":"{}"}}"#, request_id)
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;
    use rocket::local::blocking::Client;
    use rocket::{get, routes};

    #[test]
    fn statuses_match_error_kinds() {
        assert_eq!(Status::from(&AppError::Validation("bad".into())), Status::BadRequest);
        assert_eq!(Status::from(&AppError::CategoryNotFound("x".into())), Status::BadRequest);
        assert_eq!(Status::from(&AppError::InvalidDateFormat("x".into())), Status::BadRequest);
        assert_eq!(Status::from(&AppError::AlreadyExists("x".into())), Status::Conflict);
        assert_eq!(Status::from(&AppError::NotFound("x".into())), Status::NotFound);
        assert_eq!(Status::from(&AppError::InsightsValidation("x".into())), Status::BadRequest);
        assert_eq!(Status::from(&AppError::Unauthorized), Status::Unauthorized);
    }

    #[get("/test-error")]
    #[allow(clippy::result_large_err)]
    fn test_error_route() -> Result<(), AppError> {
        Err(AppError::NotFound("Test resource".to_string()))
    }

    #[test]
    fn error_response_includes_request_id() {
        let rocket = rocket::build()
            .attach(crate::middleware::RequestLogger)
            .mount("/", routes![test_error_route]);

        let client = Client::tracked(rocket).expect("valid rocket instance");
        let response = client.get("/test-error").dispatch();

        assert_eq!(response.status(), Status::NotFound);
        assert!(response.headers().get_one("X-Request-Id").is_some());

        let body = response.into_string().expect("response body");
        let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
        assert_eq!(json["message"], "Test resource");
        assert!(json.get("request_id").is_some());
    }
}
