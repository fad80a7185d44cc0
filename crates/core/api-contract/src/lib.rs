//! 稳定的 DTO 与 API 响应契约。

use domain::{AlertRecord, Device, DeviceKind, Thresholds, Transport};
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 创建设备请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest {
    pub id: Option<String>,
    pub name: String,
    /// tank / valve / sensor
    #[serde(alias = "type")]
    pub kind: String,
    pub organization: Option<String>,
    /// http / socket / topic
    pub transport: String,
    pub endpoint: Option<String>,
    pub channel: Option<String>,
    pub topic: Option<String>,
    pub power: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thresholds: Option<ThresholdsDto>,
}

/// 阈值 DTO。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdsDto {
    #[serde(alias = "low_level")]
    pub low_level: Option<f64>,
    #[serde(alias = "high_level")]
    pub high_level: Option<f64>,
}

impl From<ThresholdsDto> for Thresholds {
    fn from(dto: ThresholdsDto) -> Self {
        Self {
            low_level: dto.low_level,
            high_level: dto.high_level,
        }
    }
}

impl From<Thresholds> for ThresholdsDto {
    fn from(value: Thresholds) -> Self {
        Self {
            low_level: value.low_level,
            high_level: value.high_level,
        }
    }
}

/// 设备 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub transport: String,
    /// 传输对应的地址（endpoint / channel / topic）。
    pub address: String,
    pub level: Option<f64>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdsDto>,
    pub created_at_ms: i64,
    pub updated_at_ms: Option<i64>,
}

impl From<Device> for DeviceDto {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            name: device.name,
            kind: device.kind.as_str().to_string(),
            organization: device.organization,
            transport: device.binding.transport().as_str().to_string(),
            address: device.binding.address().to_string(),
            level: device.level,
            status: device.status.as_str().to_string(),
            power: device.power,
            tags: device.tags,
            thresholds: device.thresholds.map(ThresholdsDto::from),
            created_at_ms: device.created_at_ms,
            updated_at_ms: device.updated_at_ms,
        }
    }
}

/// 电源设置请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPowerRequest {
    #[serde(alias = "power")]
    pub value: bool,
}

/// 命令下发请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// power_on / power_off
    pub command: String,
}

/// 告警 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDto {
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub condition: String,
    pub message: String,
    pub status: String,
    pub ts_ms: i64,
}

impl From<AlertRecord> for AlertDto {
    fn from(record: AlertRecord) -> Self {
        Self {
            id: record.id,
            device_id: record.device_id,
            device_name: record.device_name,
            condition: record.condition.as_str().to_string(),
            message: record.message,
            status: record.status.as_str().to_string(),
            ts_ms: record.ts_ms,
        }
    }
}

/// 指标 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
    pub updates_received: u64,
    pub updates_accepted: u64,
    pub updates_rejected_invalid: u64,
    pub updates_unknown_device: u64,
    pub polls_failed: u64,
    pub frames_rejected: u64,
    pub messages_rejected: u64,
    pub devices_marked_offline: u64,
    pub alerts_raised: u64,
    pub alerts_resolved: u64,
    pub commands_issued: u64,
    pub command_dispatch_success: u64,
    pub command_dispatch_failure: u64,
}

/// 健康检查响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub device_count: usize,
    pub active_alerts: usize,
}

/// 解析请求里的设备类型字符串。
pub fn parse_kind(value: &str) -> Option<DeviceKind> {
    DeviceKind::parse(value)
}

/// 解析请求里的传输字符串。
pub fn parse_transport(value: &str) -> Option<Transport> {
    Transport::parse(value)
}
