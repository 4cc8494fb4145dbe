use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::RateLimits;
use crate::service::attendance::AttendanceService;
use crate::store::mysql::MySqlStore;
use crate::utils::email_cache;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    let config = Config::from_env()?;
    info!(
        addr = %config.server_addr,
        office_start = %config.office_start_time,
        "Server starting..."
    );

    let pool = init_db(&config.database_url).await?;
    let limits = RateLimits::from_config(&config)?;

    let service = Data::new(AttendanceService::new(
        MySqlStore::new(pool.clone()),
        config.office_start_time,
    ));

    let pool_for_cache_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        // Registrations of the last 30 days, in batches of 250
        match email_cache::warmup_email_cache(&pool_for_cache_warmup, 30, 250).await {
            Ok(loaded) => info!(loaded, "Email cache warmed up"),
            Err(e) => warn!(error = %e, "Failed to warm up email cache"),
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(service.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config, limits.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
