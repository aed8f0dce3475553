use crate::config::IdentityConfig;
use crate::error::app_error::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// HTTP client for the external identity service. The service owns
/// credentials and sessions; this backend only provisions users and keeps a
/// profile row per identity.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct IdentityError {
    #[serde(alias = "msg", alias = "message", alias = "error_description")]
    detail: Option<String>,
}

impl IdentityClient {
    pub fn new(config: &IdentityConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        }
    }

    /// Create an identity. The returned id is the stable user id everything
    /// else hangs off of.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityUser, AppError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .json(&SignUpBody { email, password })
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("identity service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<IdentityError>()
                .await
                .ok()
                .and_then(|e| e.detail)
                .unwrap_or_else(|| format!("identity service returned {status}"));
            return Err(AppError::Identity(detail));
        }

        response
            .json::<IdentityUser>()
            .await
            .map_err(|e| AppError::Identity(format!("unexpected identity response: {e}")))
    }

    /// Best-effort rollback of a provisioned identity when local profile
    /// creation fails. Errors are logged, not surfaced.
    pub async fn delete_user(&self, id: &Uuid) {
        let url = format!("{}/auth/v1/admin/users/{id}", self.base_url);
        let result = self
            .http
            .delete(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await;

        match result {
            Ok(response) if !response.status().is_success() => {
                warn!(user_id = %id, status = %response.status(), "Failed to roll back identity");
            }
            Err(err) => warn!(user_id = %id, error = %err, "Failed to roll back identity"),
            Ok(_) => {}
        }
    }
}
