use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use fixos::adapters::GuideLookup;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct RepairGuideRequest {
    #[serde(default)]
    device: String,
    #[serde(default)]
    issue: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repair-guide", post(repair_guide))
        .with_state(state)
}

async fn repair_guide(
    State(state): State<AppState>,
    Json(request): Json<RepairGuideRequest>,
) -> Response {
    let device = request.device.trim();
    let issue = request.issue.trim();
    if device.is_empty() || issue.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Device and issue are required" })),
        )
            .into_response();
    }

    match state.guide.find_guide(device, issue).await {
        Ok(GuideLookup::Found(guide)) => match serde_json::to_value(guide) {
            Ok(Value::Object(mut body)) => {
                body.insert("found".to_string(), json!(true));
                (StatusCode::OK, Json(Value::Object(body))).into_response()
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "found": false,
                    "error": "Failed to fetch repair guide",
                    "message": "guide could not be serialized"
                })),
            )
                .into_response(),
        },
        Ok(GuideLookup::NoGuides) => (
            StatusCode::OK,
            Json(json!({
                "found": false,
                "message": format!("No repair guides found for {device} {issue}")
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("guide lookup failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "found": false,
                    "error": "Failed to fetch repair guide",
                    "message": err.to_string()
                })),
            )
                .into_response()
        }
    }
}
