use crate::device::Transport;

/// 适配器产出的规范化遥测更新。只存在于适配器与注册表之间，不落地。
#[derive(Debug, Clone)]
pub struct TelemetryUpdate {
    pub device_id: String,
    /// 观测液位（百分比）。
    pub observed_level: f64,
    /// 适配器收到该观测的时间（epoch ms）。
    pub source_ts_ms: i64,
    pub transport: Transport,
}

/// 告警条件种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCondition {
    LowLevel,
    HighLevel,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::LowLevel => "low_level",
            AlertCondition::HighLevel => "high_level",
        }
    }
}

/// 告警生命周期：active -> resolved，仅经显式解除流转。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Resolved => "resolved",
        }
    }
}

/// 告警记录。deviceName 为创建时刻的反规范化快照。
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub id: String,
    pub device_id: String,
    pub device_name: String,
    pub condition: AlertCondition,
    pub message: String,
    pub status: AlertStatus,
    pub ts_ms: i64,
}

/// 用户下发的设备命令。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PowerOn,
    PowerOff,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::PowerOn => "power_on",
            Command::PowerOff => "power_off",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "power_on" => Some(Command::PowerOn),
            "power_off" => Some(Command::PowerOff),
            _ => None,
        }
    }

    /// 命令对应的目标电源状态。
    pub fn power_value(&self) -> bool {
        matches!(self, Command::PowerOn)
    }
}
