use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct DisplayQuery {
    /// Decimate both histories to at most this many points
    pub max_points: Option<usize>,
}

/// Snapshot of the rolling raw-delayed and filtered histories, oldest first.
/// Both arrays always have the same length.
pub async fn get_display(
    state: web::Data<AppState>,
    query: web::Query<DisplayQuery>,
) -> Result<HttpResponse, AppError> {
    if query.max_points == Some(0) {
        return Err(AppError::BadRequest("max_points must be greater than 0".to_string()));
    }

    let mut snapshot = state.history.snapshot();
    let full_len = snapshot.len();
    if let Some(max_points) = query.max_points {
        snapshot = snapshot.decimate(max_points);
    }

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "sample_rate": state.config.audio.sample_rate,
        "history_len": full_len,
        "points": snapshot.len(),
        "raw": snapshot.raw,
        "filtered": snapshot.filtered
    })))
}
