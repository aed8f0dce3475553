use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{Data, Response};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Request ID that is attached to every request for tracking
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if let Some(request_id) = request.local_cache(|| None::<RequestId>).as_ref() {
            return Outcome::Success(request_id.clone());
        }

        // Fallback: create a new one if the fairing hasn't run
        Outcome::Success(RequestId::new())
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestStartTime(Instant);

/// Fairing that assigns request ids and logs request/response pairs.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let request_id = RequestId::new();

        request.local_cache(|| RequestStartTime(Instant::now()));
        request.local_cache(|| Some(request_id.clone()));

        info!(
            request_id = %request_id.0,
            method = %request.method(),
            uri = %request.uri(),
            "incoming request"
        );
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let request_id = request
            .local_cache(|| None::<RequestId>)
            .as_ref()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let duration_ms = request.local_cache(|| RequestStartTime(Instant::now())).0.elapsed().as_millis() as u64;

        let status = response.status();
        let method = request.method();
        let uri = request.uri();

        // Resolved by the auth guard when the route required one
        let user_id = request.local_cache(|| None::<crate::auth::CurrentUser>).as_ref().map(|u| u.id.to_string());

        response.set_header(Header::new("X-Request-Id", request_id.clone()));
        response.set_header(Header::new("X-Content-Type-Options", "nosniff"));
        response.set_header(Header::new("Cache-Control", "no-store"));

        let slow_request_ms = request
            .rocket()
            .state::<crate::config::Config>()
            .map(|c| c.logging.slow_request_ms)
            .unwrap_or(500);

        // 4xx responses are routine for a REST API; only 5xx and slow
        // requests escalate to WARN.
        let is_error = status.class().is_server_error();
        let is_slow = duration_ms > slow_request_ms;

        if is_error || is_slow {
            warn!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = status.code,
                duration_ms = duration_ms,
                user_id = user_id.as_deref().unwrap_or("-"),
                slow = is_slow,
                "request completed"
            );
        } else {
            info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = status.code,
                duration_ms = duration_ms,
                user_id = user_id.as_deref().unwrap_or("-"),
                "request completed"
            );
        }
    }
}
