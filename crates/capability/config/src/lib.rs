//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// HTTP 轮询间隔（毫秒）。
    pub poll_interval_ms: u64,
    /// 单次 HTTP 轮询请求超时（毫秒）。
    pub http_timeout_ms: u64,
    /// Socket 建连超时（毫秒）。
    pub socket_connect_timeout_ms: u64,
    /// 无更新判定离线的静默窗口（毫秒）。
    pub staleness_window_ms: u64,
    /// 离线巡检周期（毫秒）。
    pub sweep_interval_ms: u64,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// Topic 订阅模式：{facility}/{zone}/{deviceId} 的中段通配。
    pub mqtt_topic_pattern: String,
    pub mqtt_command_qos: u8,
    pub ingest_enabled: bool,
    /// 启动时注入演示设备。
    pub demo_enabled: bool,
    /// 每组织设备配额（未设置 = 不限额）。
    pub max_devices_per_org: Option<u32>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("HIDRO_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let poll_interval_ms = read_u64_with_default("HIDRO_POLL_INTERVAL_MS", 5000)?;
        let http_timeout_ms = read_u64_with_default("HIDRO_HTTP_TIMEOUT_MS", 3000)?;
        let socket_connect_timeout_ms =
            read_u64_with_default("HIDRO_SOCKET_CONNECT_TIMEOUT_MS", 5000)?;
        let staleness_window_ms = read_u64_with_default("HIDRO_STALENESS_WINDOW_MS", 15_000)?;
        let sweep_interval_ms = read_u64_with_default("HIDRO_SWEEP_INTERVAL_MS", 1000)?;
        let mqtt_host = env::var("HIDRO_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("HIDRO_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("HIDRO_MQTT_USERNAME");
        let mqtt_password = read_optional("HIDRO_MQTT_PASSWORD");
        let mqtt_topic_pattern = env::var("HIDRO_MQTT_TOPIC_PATTERN")
            .unwrap_or_else(|_| "predio/+/+/telemetry".to_string());
        let mqtt_command_qos = read_u8_with_default("HIDRO_MQTT_COMMAND_QOS", 1)?;
        let ingest_enabled = read_bool_with_default("HIDRO_INGEST", true);
        let demo_enabled = read_bool_with_default("HIDRO_DEMO", false);
        let max_devices_per_org = read_optional_u32("HIDRO_MAX_DEVICES_PER_ORG")?;

        Ok(Self {
            http_addr,
            poll_interval_ms,
            http_timeout_ms,
            socket_connect_timeout_ms,
            staleness_window_ms,
            sweep_interval_ms,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_pattern,
            mqtt_command_qos,
            ingest_enabled,
            demo_enabled,
            max_devices_per_org,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u32(key: &str) -> Result<Option<u32>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
