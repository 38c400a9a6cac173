use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use fixos::adapters::ShopQuery;
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct FindShopsRequest {
    lat: Option<f64>,
    lon: Option<f64>,
    location: Option<String>,
    #[serde(default)]
    query: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/find-shops", post(find_shops))
        .with_state(state)
}

// Always 200. A lookup failure means no shops to show, not a client
// error; the card falls back to its defaults.
async fn find_shops(
    State(state): State<AppState>,
    Json(request): Json<FindShopsRequest>,
) -> Response {
    let query = ShopQuery {
        lat: request.lat,
        lon: request.lon,
        location: request.location,
        query: request.query,
    };

    let shops = match state.shops.find_shops(&query).await {
        Ok(shops) => shops,
        Err(err) => {
            tracing::warn!("shop search failed: {err}");
            Vec::new()
        }
    };

    (StatusCode::OK, Json(json!({ "shops": shops }))).into_response()
}
