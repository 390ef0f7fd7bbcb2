//! HTTP handler functions for the wildfire risk API.

use actix_web::{HttpResponse, web};
use wildfire_risk_server_models::{
    ApiErrorDetail, ApiHealth, ApiWelcome, CountyMapParams, CountyMapResponse, PredictRequest,
    PredictResponse, ValidationError,
};

use crate::{API_PREFIX, AppState};

/// `GET /`
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(ApiWelcome {
        message: format!("Welcome to the Wildfire Risk API! Endpoints are under {API_PREFIX}"),
    })
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/v1/predictor/predict-bp-risk`
///
/// Predicts the burning potential of one location. A location with no data
/// at any level is still a `200` with `error` set.
pub async fn predict_bp_risk(
    state: web::Data<AppState>,
    body: web::Json<PredictRequest>,
) -> HttpResponse {
    let query = match body.to_query() {
        Ok(query) => query,
        Err(e) => return unprocessable(&e),
    };

    match state.predictor.predict(&query) {
        Ok(result) => HttpResponse::Ok().json(PredictResponse::from(result)),
        Err(e) => {
            log::warn!("Prediction failed: {e}");
            HttpResponse::Ok().json(PredictResponse::failed(e.to_string()))
        }
    }
}

/// `GET /api/v1/predictor/county-map-communities`
///
/// Scores every community of a county for map display. An unknown county is
/// a `404` with the same body shape and no points.
pub async fn county_map_communities(
    state: web::Data<AppState>,
    params: web::Query<CountyMapParams>,
) -> HttpResponse {
    if let Err(e) = params.validate() {
        return unprocessable(&e);
    }

    let mut rng = rand::thread_rng();
    match state
        .predictor
        .county_map(&params.county_name, &params.state_abbr, &mut rng)
    {
        Ok(map) => HttpResponse::Ok().json(CountyMapResponse::from(map)),
        Err(e) => {
            log::warn!("County map failed: {e}");
            HttpResponse::NotFound().json(CountyMapResponse::failed(
                &params.county_name,
                &params.state_abbr,
                e.to_string(),
            ))
        }
    }
}

fn unprocessable(e: &ValidationError) -> HttpResponse {
    log::debug!("Rejected request: {e}");
    HttpResponse::UnprocessableEntity().json(ApiErrorDetail {
        detail: e.to_string(),
    })
}
