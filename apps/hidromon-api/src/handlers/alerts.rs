//! 告警 handlers。
//!
//! - GET /alerts - 按登记顺序列出全部告警
//! - DELETE /alerts - 清空登记表（管理入口）
//! - POST /alerts/{id}/resolve - 显式解除（幂等）

use crate::AppState;
use crate::utils::response::not_found_error;
use api_contract::{AlertDto, ApiResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn list_alerts(State(state): State<AppState>) -> Response {
    let data: Vec<AlertDto> = state
        .alerts
        .list()
        .into_iter()
        .map(AlertDto::from)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub async fn clear_alerts(State(state): State<AppState>) -> Response {
    state.alerts.clear();
    (StatusCode::OK, Json(ApiResponse::success(()))).into_response()
}

pub async fn resolve_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    // resolve 返回 false 的两种情况分开报告：未知 id 是 404，已解除是幂等成功
    if state.alerts.resolve(&id) {
        return (StatusCode::OK, Json(ApiResponse::success(()))).into_response();
    }
    let already_resolved = state
        .alerts
        .list()
        .iter()
        .any(|record| record.id == id);
    if already_resolved {
        (StatusCode::OK, Json(ApiResponse::success(()))).into_response()
    } else {
        not_found_error(format!("alert not found: {}", id))
    }
}
