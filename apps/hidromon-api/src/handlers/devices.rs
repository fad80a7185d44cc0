//! 设备 handlers。
//!
//! - GET /devices - 列出设备（可按 organization 过滤）
//! - POST /devices - 创建设备并挂接采集任务
//! - GET /devices/{id} - 设备详情
//! - DELETE /devices/{id} - 删除设备（幂等）
//! - POST /devices/{id}/power - 直接设置电源状态（不经下发）

use crate::AppState;
use crate::utils::response::{bad_request_error, not_found_error, registry_error};
use api_contract::{
    ApiResponse, CreateDeviceRequest, DeviceDto, SetPowerRequest, parse_kind, parse_transport,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DeviceSpec, Thresholds};

#[derive(serde::Deserialize)]
pub struct ListDevicesQuery {
    pub organization: Option<String>,
}

pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<ListDevicesQuery>,
) -> Response {
    let data: Vec<DeviceDto> = state
        .registry
        .list(query.organization.as_deref())
        .into_iter()
        .map(DeviceDto::from)
        .collect();
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

pub async fn create_device(
    State(state): State<AppState>,
    Json(req): Json<CreateDeviceRequest>,
) -> Response {
    let Some(kind) = parse_kind(&req.kind) else {
        return bad_request_error(format!("unknown device kind: {}", req.kind));
    };
    let Some(transport) = parse_transport(&req.transport) else {
        return bad_request_error(format!("unknown transport: {}", req.transport));
    };
    let spec = DeviceSpec {
        id: req.id,
        name: req.name,
        kind: Some(kind),
        organization: req.organization,
        transport: Some(transport),
        endpoint: req.endpoint,
        channel: req.channel,
        topic: req.topic,
        power: req.power,
        tags: req.tags,
        thresholds: req.thresholds.map(Thresholds::from),
    };
    match state.registry.create(spec).await {
        Ok(device) => {
            state.engine.attach(&device);
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(DeviceDto::from(device))),
            )
                .into_response()
        }
        Err(err) => registry_error(err),
    }
}

pub async fn get_device(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id) {
        Some(device) => (
            StatusCode::OK,
            Json(ApiResponse::success(DeviceDto::from(device))),
        )
            .into_response(),
        None => not_found_error(format!("device not found: {}", id)),
    }
}

pub async fn delete_device(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state.registry.remove(&id);
    (StatusCode::OK, Json(ApiResponse::success(()))).into_response()
}

pub async fn set_power(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetPowerRequest>,
) -> Response {
    match state.registry.set_power(&id, req.value) {
        Ok(device) => (
            StatusCode::OK,
            Json(ApiResponse::success(DeviceDto::from(device))),
        )
            .into_response(),
        Err(err) => registry_error(err),
    }
}
