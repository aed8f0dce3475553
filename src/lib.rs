mod auth;
mod catalog;
mod config;
mod database;
mod dates;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use crate::catalog::stage_catalog;
use crate::db::stage_db;
use crate::middleware::RequestLogger;
use crate::routes as app_routes;
use crate::service::identity::IdentityClient;
use rocket::http::Method;
use rocket::{Build, Rocket, catchers};
use rocket_cors::{AllowedOrigins, CorsOptions};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG takes precedence for per-module control, e.g.
    //   RUST_LOG=info,penny_pet::routes=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // try_init: tests build multiple rockets in one process.
    if json_format {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        // Secure default: nothing is allowed until origins are configured.
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Patch, Method::Delete, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Authorization", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    dotenvy::dotenv().ok();
    init_tracing(&config.logging.level, config.logging.json_format);

    let cors = build_cors(&config.cors).to_cors().expect("Failed to create CORS fairing");
    let identity = IdentityClient::new(&config.identity);
    let base_path = normalize_base_path(&config.api.base_path);

    rocket::build()
        .manage(config.clone())
        .manage(identity)
        .attach(cors)
        .attach(RequestLogger)
        .attach(stage_db(config.database))
        .attach(stage_catalog())
        .mount(base_path.clone(), app_routes::health::routes())
        .mount(base_path.clone(), app_routes::category::routes())
        .mount(join_base_path(&base_path, "auth"), app_routes::auth::routes())
        .mount(join_base_path(&base_path, "profile"), app_routes::profile::routes())
        .mount(join_base_path(&base_path, "transactions"), app_routes::transaction::routes())
        .mount(join_base_path(&base_path, "transactions/recurring"), app_routes::recurring::routes())
        .mount(join_base_path(&base_path, "budget-plans"), app_routes::budget_plan::routes())
        .mount(join_base_path(&base_path, "insights"), app_routes::insights::routes())
        .mount(join_base_path(&base_path, "experience"), app_routes::experience::routes())
        .register(
            base_path,
            catchers![
                app_routes::error::unauthorized,
                app_routes::error::not_found,
                app_routes::error::conflict,
                app_routes::error::unprocessable_entity
            ],
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_normalization() {
        assert_eq!(normalize_base_path("/api/v1"), "/api/v1");
        assert_eq!(normalize_base_path("api/v1"), "/api/v1");
        assert_eq!(normalize_base_path("/api/v1/"), "/api/v1");
        assert_eq!(normalize_base_path(""), "/api/v1");
    }

    #[test]
    fn base_path_joining() {
        assert_eq!(join_base_path("/api/v1", "transactions"), "/api/v1/transactions");
        assert_eq!(join_base_path("/api/v1/", "/auth"), "/api/v1/auth");
        assert_eq!(join_base_path("", "health"), "/health");
    }
}
