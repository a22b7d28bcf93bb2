use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Read-only view of the startup configuration plus the derived values the
/// pipeline actually runs with.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = &state.config;
    let coeffs = config.coefficients()?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": serde_json::to_value(&**config)?,
        "derived": {
            "delay_samples": config.delay_samples(),
            "history_capacity": config.history_capacity(),
            "block_period_us": config.block_period().as_micros() as u64,
            "normalized_coefficients": {
                "b0": coeffs.b0,
                "b1": coeffs.b1,
                "b2": coeffs.b2,
                "a1": coeffs.a1,
                "a2": coeffs.a2
            }
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::DisplayHistory;
    use crate::config::AppConfig;
    use crate::state::PipelineStats;
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_get_config() {
        let config = AppConfig::default();
        let display = DisplayHistory::new(config.history_capacity());
        let state = AppState::new(config, Arc::new(PipelineStats::default()), display.reader());

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["config"]["audio"]["sample_rate"], 44100);
        assert_eq!(body["config"]["notifier"]["marker"], 65);
        assert_eq!(body["derived"]["delay_samples"], 8820);
        assert_eq!(body["derived"]["block_period_us"], 362);
    }
}
