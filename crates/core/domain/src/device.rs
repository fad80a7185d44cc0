//! 设备领域模型。

/// 设备类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Tank,
    Valve,
    Sensor,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Tank => "tank",
            DeviceKind::Valve => "valve",
            DeviceKind::Sensor => "sensor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tank" => Some(DeviceKind::Tank),
            "valve" => Some(DeviceKind::Valve),
            "sensor" => Some(DeviceKind::Sensor),
            _ => None,
        }
    }
}

/// 连接状态：online/offline。仅由调和与离线巡检流转。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
        }
    }
}

/// 传输类型：设备终身绑定其中一种。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Socket,
    Topic,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Socket => "socket",
            Transport::Topic => "topic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Transport::Http),
            "socket" => Some(Transport::Socket),
            "topic" => Some(Transport::Topic),
            _ => None,
        }
    }
}

/// 传输绑定：地址字段与传输类型一一对应（构造即满足不变量）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportBinding {
    /// HTTP 轮询端点（完整 URL）。
    Http { endpoint: String },
    /// Socket 推送地址（host:port）。
    Socket { channel: String },
    /// Topic 订阅主题（不含 telemetry 后缀的设备主题）。
    Topic { topic: String },
}

impl TransportBinding {
    pub fn transport(&self) -> Transport {
        match self {
            TransportBinding::Http { .. } => Transport::Http,
            TransportBinding::Socket { .. } => Transport::Socket,
            TransportBinding::Topic { .. } => Transport::Topic,
        }
    }

    /// 传输专属地址（endpoint / channel / topic）。
    pub fn address(&self) -> &str {
        match self {
            TransportBinding::Http { endpoint } => endpoint,
            TransportBinding::Socket { channel } => channel,
            TransportBinding::Topic { topic } => topic,
        }
    }
}

/// 逐设备告警阈值（液位百分比）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    pub low_level: Option<f64>,
    pub high_level: Option<f64>,
}

/// 设备：身份 + 当前观测状态。注册表独占所有权。
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    /// 所属组织；None 表示全局可见。
    pub organization: Option<String>,
    pub binding: TransportBinding,
    /// 最近接受的液位百分比；None 表示从未观测。
    pub level: Option<f64>,
    pub status: DeviceStatus,
    /// 电源状态。字段存在（而非取值）决定是否提供电源控制。
    pub power: Option<bool>,
    pub tags: Vec<String>,
    pub thresholds: Option<Thresholds>,
    pub created_at_ms: i64,
    /// 最近接受更新的时间；None 表示从未更新。
    pub updated_at_ms: Option<i64>,
}

/// 设备创建输入。地址字段需与 transport 匹配，由注册表校验。
#[derive(Debug, Clone, Default)]
pub struct DeviceSpec {
    /// 显式 id；None 时由注册表生成。
    pub id: Option<String>,
    pub name: String,
    pub kind: Option<DeviceKind>,
    pub organization: Option<String>,
    pub transport: Option<Transport>,
    pub endpoint: Option<String>,
    pub channel: Option<String>,
    pub topic: Option<String>,
    pub power: Option<bool>,
    pub tags: Vec<String>,
    pub thresholds: Option<Thresholds>,
}
