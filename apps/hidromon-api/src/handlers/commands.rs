//! 命令 handlers。
//!
//! POST /devices/{id}/command - 按设备绑定的传输下发命令。

use crate::AppState;
use crate::utils::response::{bad_request_error, control_error};
use api_contract::{ApiResponse, CommandRequest, DeviceDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::Command;

pub async fn send_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Response {
    let Some(command) = Command::parse(&req.command) else {
        return bad_request_error(format!("unknown command: {}", req.command));
    };
    match state.commands.send_command(&id, command).await {
        Ok(device) => (
            StatusCode::OK,
            Json(ApiResponse::success(DeviceDto::from(device))),
        )
            .into_response(),
        Err(err) => control_error(err),
    }
}
