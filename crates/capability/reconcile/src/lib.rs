//! 调和层：遥测更新的统一闸口 + 离线巡检。
//!
//! 三个传输适配器全部汇入同一个 [`Reconciler`]：范围校验、注册表
//! 写入、阈值评估在这里按同一顺序发生，任何传输到达的读数行为
//! 完全一致。

use async_trait::async_trait;
use domain::TelemetryUpdate;
use hidromon_alerts::AlertService;
use hidromon_ingest::{IngestError, TelemetrySink};
use hidromon_registry::DeviceRegistry;
use hidromon_telemetry::{
    record_device_marked_offline, record_update_accepted, record_update_received,
    record_update_rejected_invalid, record_update_unknown_device,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// 遥测调和器。每条更新：校验 → 注册表 upsert → 阈值评估。
pub struct Reconciler {
    registry: Arc<DeviceRegistry>,
    alerts: Arc<AlertService>,
}

impl Reconciler {
    pub fn new(registry: Arc<DeviceRegistry>, alerts: Arc<AlertService>) -> Self {
        Self { registry, alerts }
    }
}

#[async_trait]
impl TelemetrySink for Reconciler {
    async fn handle(&self, update: TelemetryUpdate) -> Result<(), IngestError> {
        record_update_received();

        if !update.observed_level.is_finite()
            || !(0.0..=100.0).contains(&update.observed_level)
        {
            record_update_rejected_invalid();
            warn!(
                target: "hidromon.reconcile",
                device_id = %update.device_id,
                observed_level = update.observed_level,
                transport = update.transport.as_str(),
                "update rejected: level out of range"
            );
            return Ok(());
        }

        let Some(device) = self.registry.upsert(&update) else {
            // 未注册设备的读数静默丢弃，不算错误
            record_update_unknown_device();
            debug!(
                target: "hidromon.reconcile",
                device_id = %update.device_id,
                transport = update.transport.as_str(),
                "update dropped: unknown device"
            );
            return Ok(());
        };
        record_update_accepted();
        debug!(
            target: "hidromon.reconcile",
            device_id = %device.id,
            level = update.observed_level,
            transport = update.transport.as_str(),
            "update accepted"
        );

        self.alerts.evaluate(&device);
        Ok(())
    }
}

/// 离线巡检配置。
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// 静默窗口（毫秒）：超过即视为失联。
    pub staleness_window_ms: i64,
    /// 扫描间隔（毫秒）。
    pub sweep_interval_ms: u64,
}

/// 周期性把静默超窗的在线设备流转为 offline。
pub struct StalenessSweeper {
    registry: Arc<DeviceRegistry>,
    config: SweeperConfig,
}

impl StalenessSweeper {
    pub fn new(registry: Arc<DeviceRegistry>, config: SweeperConfig) -> Self {
        Self { registry, config }
    }

    /// 单次扫描，返回本轮流转的设备数。
    pub fn sweep_once(&self, now_ms: i64) -> usize {
        let flipped = self
            .registry
            .mark_stale(self.config.staleness_window_ms, now_ms);
        for device in &flipped {
            record_device_marked_offline();
            info!(
                target: "hidromon.reconcile",
                device_id = %device.id,
                "device marked offline"
            );
        }
        flipped.len()
    }

    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(self.config.sweep_interval_ms.max(1)));
        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once(now_epoch_ms());
                }
            }
        }
    }
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
