use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let stats = state.stats.snapshot();
    let config = &state.config;

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": "bass-indicator",
            "version": env!("CARGO_PKG_VERSION"),
            "instance_id": state.instance_id.to_string()
        },
        "pipeline": {
            "state": stats.state.as_str(),
            "sample_rate": config.audio.sample_rate,
            "block_size": config.audio.block_size,
            "channel": config.audio.channel,
            "delay_samples": config.delay_samples(),
            "threshold": config.pipeline.threshold
        }
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let stats = state.stats.snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "state": stats.state,
        "blocks": {
            "received": stats.blocks_received,
            "priming": stats.blocks_priming,
            "per_second": if uptime_seconds > 0 {
                stats.blocks_received as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "samples_delayed": stats.samples_delayed,
        "events": {
            "detected": stats.events_detected,
            "rate_per_block": stats.event_rate()
        },
        "notifications": {
            "sent": stats.notifications_sent,
            "failed": stats.notifications_failed
        },
        "status_faults": stats.status_faults,
        "display": {
            "capacity": state.history.capacity()
        }
    }))
}
