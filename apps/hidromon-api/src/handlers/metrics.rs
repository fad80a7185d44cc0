//! 健康检查与指标 handlers。

use crate::AppState;
use api_contract::{ApiResponse, HealthDto, MetricsDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hidromon_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> Response {
    let data = HealthDto {
        status: "ok".to_string(),
        device_count: state.registry.list(None).len(),
        active_alerts: state.alerts.active_count(),
    };
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    let data = MetricsDto {
        updates_received: snapshot.updates_received,
        updates_accepted: snapshot.updates_accepted,
        updates_rejected_invalid: snapshot.updates_rejected_invalid,
        updates_unknown_device: snapshot.updates_unknown_device,
        polls_failed: snapshot.polls_failed,
        frames_rejected: snapshot.frames_rejected,
        messages_rejected: snapshot.messages_rejected,
        devices_marked_offline: snapshot.devices_marked_offline,
        alerts_raised: snapshot.alerts_raised,
        alerts_resolved: snapshot.alerts_resolved,
        commands_issued: snapshot.commands_issued,
        command_dispatch_success: snapshot.command_dispatch_success,
        command_dispatch_failure: snapshot.command_dispatch_failure,
    };
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}
