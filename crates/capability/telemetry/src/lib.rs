//! 追踪与请求 ID 生成。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
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

/// 采集与控制链路基础指标。
pub struct TelemetryMetrics {
    updates_received: AtomicU64,
    updates_accepted: AtomicU64,
    updates_rejected_invalid: AtomicU64,
    updates_unknown_device: AtomicU64,
    polls_failed: AtomicU64,
    frames_rejected: AtomicU64,
    messages_rejected: AtomicU64,
    devices_marked_offline: AtomicU64,
    alerts_raised: AtomicU64,
    alerts_resolved: AtomicU64,
    commands_issued: AtomicU64,
    command_dispatch_success: AtomicU64,
    command_dispatch_failure: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            updates_received: AtomicU64::new(0),
            updates_accepted: AtomicU64::new(0),
            updates_rejected_invalid: AtomicU64::new(0),
            updates_unknown_device: AtomicU64::new(0),
            polls_failed: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            messages_rejected: AtomicU64::new(0),
            devices_marked_offline: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            alerts_resolved: AtomicU64::new(0),
            commands_issued: AtomicU64::new(0),
            command_dispatch_success: AtomicU64::new(0),
            command_dispatch_failure: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_received: self.updates_received.load(Ordering::Relaxed),
            updates_accepted: self.updates_accepted.load(Ordering::Relaxed),
            updates_rejected_invalid: self.updates_rejected_invalid.load(Ordering::Relaxed),
            updates_unknown_device: self.updates_unknown_device.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            devices_marked_offline: self.devices_marked_offline.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            alerts_resolved: self.alerts_resolved.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            command_dispatch_success: self.command_dispatch_success.load(Ordering::Relaxed),
            command_dispatch_failure: self.command_dispatch_failure.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到遥测更新次数（进入调和前）。
pub fn record_update_received() {
    metrics().updates_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录接受并写入注册表的更新次数。
pub fn record_update_accepted() {
    metrics().updates_accepted.fetch_add(1, Ordering::Relaxed);
}

/// 记录因液位非法被拒绝的更新次数。
pub fn record_update_rejected_invalid() {
    metrics()
        .updates_rejected_invalid
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录目标设备未知被静默丢弃的更新次数。
pub fn record_update_unknown_device() {
    metrics()
        .updates_unknown_device
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录失败的 HTTP 轮询次数（传输失败或负载非法）。
pub fn record_poll_failed() {
    metrics().polls_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录被丢弃的 Socket 帧次数。
pub fn record_frame_rejected() {
    metrics().frames_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录被丢弃的 Topic 消息次数。
pub fn record_message_rejected() {
    metrics().messages_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录离线巡检标记为 offline 的设备次数。
pub fn record_device_marked_offline() {
    metrics()
        .devices_marked_offline
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录新建告警次数。
pub fn record_alert_raised() {
    metrics().alerts_raised.fetch_add(1, Ordering::Relaxed);
}

/// 记录告警解除次数（仅实际发生流转时）。
pub fn record_alert_resolved() {
    metrics().alerts_resolved.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令下发请求次数。
pub fn record_command_issued() {
    metrics().commands_issued.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令下发成功次数。
pub fn record_command_dispatch_success() {
    metrics()
        .command_dispatch_success
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录命令下发失败次数。
pub fn record_command_dispatch_failure() {
    metrics()
        .command_dispatch_failure
        .fetch_add(1, Ordering::Relaxed);
}
