//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查：/health
//! - 设备管理：/devices/*
//! - 电源与命令：/devices/{id}/power, /devices/{id}/command
//! - 告警：/alerts/*（列出 / 清空 / 解除）
//! - 指标：/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/devices", get(list_devices).post(create_device))
        .route("/devices/:id", get(get_device).delete(delete_device))
        .route("/devices/:id/power", post(set_power))
        .route("/devices/:id/command", post(send_command))
        .route("/alerts", get(list_alerts).delete(clear_alerts))
        .route("/alerts/:id/resolve", post(resolve_alert))
        .route("/metrics", get(get_metrics))
}
