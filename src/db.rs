use crate::config::DatabaseConfig;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{error, info};

pub fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    // connect_lazy so the server can come up (and tests can run) before the
    // database is reachable; the first query pays for the connection.
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .connect_lazy(&db_config.url)
}

pub fn stage_db(db_config: DatabaseConfig) -> AdHoc {
    AdHoc::try_on_ignite("Postgres", |rocket| async move {
        let pool = match init_pool(&db_config) {
            Ok(pool) => pool,
            Err(err) => {
                error!("Failed to configure Postgres pool: {err}");
                return Err(rocket);
            }
        };

        if db_config.run_migrations {
            match sqlx::migrate!("./migrations").run(&pool).await {
                Ok(()) => info!("Database migrations are up to date"),
                Err(err) => error!("Failed to run database migrations: {err}"),
            }
        }

        Ok(rocket.manage(pool))
    })
}
