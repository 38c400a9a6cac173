use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::state::AppState;

/// Recordings at or below this size are rejected before any upstream
/// call; they are too short to carry a diagnosable sound.
const MIN_AUDIO_BYTES: usize = 1000;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/analyze-audio", post(analyze_audio))
        .with_state(state)
}

async fn analyze_audio(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut audio: Option<(Vec<u8>, String)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("audio") {
            let mime_type = field
                .content_type()
                .unwrap_or("audio/webm")
                .to_string();
            if let Ok(bytes) = field.bytes().await {
                audio = Some((bytes.to_vec(), mime_type));
            }
        }
    }

    let Some((bytes, mime_type)) = audio else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No audio file provided" })),
        )
            .into_response();
    };

    if bytes.len() <= MIN_AUDIO_BYTES {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Recording too short. Please record for at least 3 seconds."
            })),
        )
            .into_response();
    }

    let Some(analyzer) = &state.analyzer else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Audio analysis is not configured" })),
        )
            .into_response();
    };

    match analyzer.analyze(&bytes, &mime_type).await {
        Ok(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        Err(err) => {
            tracing::error!("audio analysis failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to analyze audio",
                    "details": err.to_string()
                })),
            )
                .into_response()
        }
    }
}
