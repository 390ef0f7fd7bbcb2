#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for wildfire risk predictions.
//!
//! Loads the reference bundle once at startup and serves single-location
//! burning-potential predictions and per-county community maps under
//! `/api/v1/predictor`. Requests are validated at the boundary; anything
//! malformed is rejected with `422 Unprocessable Entity` before it reaches
//! the predictor.

mod handlers;
pub mod interactive;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use thiserror::Error;
use wildfire_risk_predictor::Predictor;
use wildfire_risk_reference::{ReferenceBundle, ReferenceError, Settings};
use wildfire_risk_server_models::ApiErrorDetail;

/// Prefix of the versioned API.
pub const API_PREFIX: &str = "/api/v1";

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Reference data failed to load.
    #[error("Failed to load reference data: {0}")]
    Reference(#[from] ReferenceError),

    /// Binding or running the HTTP server failed.
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Predictor over the startup reference bundle.
    pub predictor: Predictor,
}

/// Registers every route along with the body and query extractors'
/// error handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/", web::get().to(handlers::root))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .service(
                    web::scope("/v1/predictor")
                        .route(
                            "/predict-bp-risk",
                            web::post().to(handlers::predict_bp_risk),
                        )
                        .route(
                            "/county-map-communities",
                            web::get().to(handlers::county_map_communities),
                        ),
                ),
        );
}

/// Malformed or incomplete JSON bodies are a 422, not a 400.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        log::debug!("Rejected request body: {detail}");
        error::InternalError::from_response(
            err,
            HttpResponse::UnprocessableEntity().json(ApiErrorDetail { detail }),
        )
        .into()
    })
}

/// Missing or malformed query parameters are a 422, not a 400.
fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let detail = err.to_string();
        log::debug!("Rejected query string: {detail}");
        error::InternalError::from_response(
            err,
            HttpResponse::UnprocessableEntity().json(ApiErrorDetail { detail }),
        )
        .into()
    })
}

/// Permissive when no origins are configured, otherwise restricted to them.
fn cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::permissive();
    }
    origins.iter().fold(
        Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials(),
        |cors, origin| cors.allowed_origin(origin),
    )
}

/// Starts the wildfire risk API server.
///
/// Loads the reference bundle named by `settings` and starts the Actix-Web
/// HTTP server. The caller is responsible for providing the async runtime
/// (e.g. via `#[actix_web::main]`) and for initializing logging.
///
/// # Errors
///
/// Returns [`ServerError::Reference`] if any reference file is missing or
/// invalid, and [`ServerError::Io`] if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(settings: Settings) -> Result<(), ServerError> {
    let bundle = ReferenceBundle::load(&settings)?;
    let state = web::Data::new(AppState {
        predictor: Predictor::new(Arc::new(bundle)),
    });

    let server = settings.server;
    if server.cors_origins.is_empty() {
        log::warn!("No CORS origins configured, allowing all origins");
    }
    let cors_origins = server.cors_origins;

    log::info!("Starting server on {}:{}", server.bind_addr, server.port);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(&cors_origins))
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((server.bind_addr, server.port))?
    .run()
    .await?;

    Ok(())
}
