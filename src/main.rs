use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use anyhow::Context;

mod api;
mod auth;
mod calc;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::error::ApiError;
use crate::routes::Limiters;
use crate::utils::usernames;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("failed to connect to the database or run migrations")?;

    let limiters = Limiters::from_config(&config)?;

    let pool_for_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = usernames::warmup(&pool_for_warmup, 500).await {
            warn!(error = ?e, "Failed to warm up username lookups");
        }
    });

    let server_addr = config.server_addr.clone();
    info!(addr = %server_addr, prefix = %config.api_prefix, "Listening");

    HttpServer::new(move || {
        let json_config = web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into());
        let query_config = web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into());

        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(json_config)
            .app_data(query_config)
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
