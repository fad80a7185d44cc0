//! HTTP 错误响应构造与领域错误到状态码的映射。
//!
//! - 校验失败 -> 400
//! - 未知资源 -> 404
//! - 能力不支持 -> 409
//! - 下发传输失败 / 超时 -> 502

use api_contract::ApiResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hidromon_control::ControlError;
use hidromon_registry::RegistryError;

pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            "RESOURCE.NOT_FOUND",
            message.into(),
        )),
    )
        .into_response()
}

pub fn conflict_error(message: impl Into<String>) -> Response {
    (
        StatusCode::CONFLICT,
        Json(ApiResponse::<()>::error(
            "CAPABILITY.NOT_SUPPORTED",
            message.into(),
        )),
    )
        .into_response()
}

pub fn bad_gateway_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(ApiResponse::<()>::error(
            "DISPATCH.FAILED",
            message.into(),
        )),
    )
        .into_response()
}

pub fn registry_error(err: RegistryError) -> Response {
    match err {
        RegistryError::Validation(message) => bad_request_error(message),
        RegistryError::NotFound(id) => not_found_error(format!("device not found: {}", id)),
        RegistryError::NotSupported(message) => conflict_error(message),
    }
}

pub fn control_error(err: ControlError) -> Response {
    match err {
        ControlError::NotFound(id) => not_found_error(format!("device not found: {}", id)),
        ControlError::NotSupported(message) => conflict_error(message),
        ControlError::Transport(_) | ControlError::Timeout(_) => bad_gateway_error(err.to_string()),
    }
}
