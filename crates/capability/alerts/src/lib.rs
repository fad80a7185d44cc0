//! 告警能力：阈值评估 + 告警登记。
//!
//! 评估是设备当前字段对阈值的无状态检查；登记保证同一
//! `(device_id, condition)` 最多一条 active 记录。告警从不自动解除，
//! 即使触发条件已消失 —— 解除只经显式 `resolve`（刻意策略）。

use domain::{AlertCondition, AlertRecord, AlertStatus, Device};
use hidromon_telemetry::{record_alert_raised, record_alert_resolved};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

struct AlertState {
    alerts: Vec<AlertRecord>,
    /// (device_id, condition) -> active 告警 id。
    active: HashMap<(String, AlertCondition), String>,
}

/// 告警登记表。告警评估器独占所有权；展示层只读 + resolve。
pub struct AlertService {
    inner: RwLock<AlertState>,
}

impl AlertService {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AlertState {
                alerts: Vec::new(),
                active: HashMap::new(),
            }),
        }
    }

    /// 按设备当前快照评估阈值条件。
    ///
    /// 条件成立且该 (设备, 条件) 无 active 告警时新建记录并返回；
    /// 已有 active 告警则不重复登记，返回 None。
    pub fn evaluate(&self, device: &Device) -> Option<AlertRecord> {
        let level = device.level?;
        let thresholds = device.thresholds?;

        let violation = if thresholds.low_level.map(|low| level < low).unwrap_or(false) {
            Some((
                AlertCondition::LowLevel,
                format!(
                    "level {:.1}% below low threshold {:.1}%",
                    level,
                    thresholds.low_level.unwrap_or_default()
                ),
            ))
        } else if thresholds
            .high_level
            .map(|high| level > high)
            .unwrap_or(false)
        {
            Some((
                AlertCondition::HighLevel,
                format!(
                    "level {:.1}% above high threshold {:.1}%",
                    level,
                    thresholds.high_level.unwrap_or_default()
                ),
            ))
        } else {
            None
        };
        let (condition, message) = violation?;

        let mut state = write_state(&self.inner);
        let key = (device.id.clone(), condition);
        if state.active.contains_key(&key) {
            return None;
        }
        let record = AlertRecord {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            condition,
            message,
            status: AlertStatus::Active,
            ts_ms: now_epoch_ms(),
        };
        state.active.insert(key, record.id.clone());
        state.alerts.push(record.clone());
        record_alert_raised();
        info!(
            target: "hidromon.alerts",
            device_id = %record.device_id,
            condition = record.condition.as_str(),
            alert_id = %record.id,
            "alert_raised"
        );
        Some(record)
    }

    /// 显式解除告警。幂等：重复解除或未知 id 均为空操作。
    pub fn resolve(&self, id: &str) -> bool {
        let mut state = write_state(&self.inner);
        let Some(record) = state.alerts.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        if record.status == AlertStatus::Resolved {
            return false;
        }
        record.status = AlertStatus::Resolved;
        let key = (record.device_id.clone(), record.condition);
        let alert_id = record.id.clone();
        let device_id = record.device_id.clone();
        state.active.remove(&key);
        record_alert_resolved();
        info!(
            target: "hidromon.alerts",
            device_id = %device_id,
            alert_id = %alert_id,
            "alert_resolved"
        );
        true
    }

    /// 按登记顺序列出全部告警。
    pub fn list(&self) -> Vec<AlertRecord> {
        read_state(&self.inner).alerts.clone()
    }

    /// 指定设备当前 active 告警数。
    pub fn active_count_for(&self, device_id: &str) -> usize {
        read_state(&self.inner)
            .active
            .keys()
            .filter(|(id, _)| id == device_id)
            .count()
    }

    /// 全局 active 告警数。
    pub fn active_count(&self) -> usize {
        read_state(&self.inner).active.len()
    }

    /// 清空登记表（测试与管理入口）。
    pub fn clear(&self) {
        let mut state = write_state(&self.inner);
        state.alerts.clear();
        state.active.clear();
    }
}

impl Default for AlertService {
    fn default() -> Self {
        Self::new()
    }
}

// 锁中毒恢复：持锁代码只做容器操作。
fn read_state(lock: &RwLock<AlertState>) -> std::sync::RwLockReadGuard<'_, AlertState> {
    lock.read().unwrap_or_else(|err| err.into_inner())
}

fn write_state(lock: &RwLock<AlertState>) -> std::sync::RwLockWriteGuard<'_, AlertState> {
    lock.write().unwrap_or_else(|err| err.into_inner())
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{DeviceKind, DeviceStatus, Thresholds, TransportBinding};

    fn device(level: Option<f64>, thresholds: Option<Thresholds>) -> Device {
        Device {
            id: "d1".to_string(),
            name: "Sensor Demo".to_string(),
            kind: DeviceKind::Sensor,
            organization: None,
            binding: TransportBinding::Topic {
                topic: "predio/torreA/d1".to_string(),
            },
            level,
            status: DeviceStatus::Online,
            power: None,
            tags: Vec::new(),
            thresholds,
            created_at_ms: 0,
            updated_at_ms: None,
        }
    }

    fn low_20() -> Option<Thresholds> {
        Some(Thresholds {
            low_level: Some(20.0),
            high_level: None,
        })
    }

    #[test]
    fn evaluate_creates_once_per_condition() {
        let alerts = AlertService::new();
        assert!(alerts.evaluate(&device(Some(70.0), low_20())).is_none());
        let record = alerts
            .evaluate(&device(Some(15.0), low_20()))
            .expect("raised");
        assert_eq!(record.condition, AlertCondition::LowLevel);
        assert_eq!(record.status, AlertStatus::Active);
        assert_eq!(record.device_name, "Sensor Demo");

        // 条件仍成立：不重复登记
        assert!(alerts.evaluate(&device(Some(10.0), low_20())).is_none());
        assert_eq!(alerts.active_count_for("d1"), 1);
    }

    #[test]
    fn condition_clearing_does_not_resolve() {
        let alerts = AlertService::new();
        alerts
            .evaluate(&device(Some(15.0), low_20()))
            .expect("raised");
        // 液位恢复，告警保持 active
        assert!(alerts.evaluate(&device(Some(80.0), low_20())).is_none());
        assert_eq!(alerts.active_count(), 1);
    }

    #[test]
    fn resolve_is_idempotent() {
        let alerts = AlertService::new();
        let record = alerts
            .evaluate(&device(Some(15.0), low_20()))
            .expect("raised");
        assert!(alerts.resolve(&record.id));
        assert!(!alerts.resolve(&record.id));
        assert!(!alerts.resolve("never-existed"));
        assert_eq!(alerts.active_count(), 0);
        assert_eq!(alerts.list().len(), 1);
        assert_eq!(alerts.list()[0].status, AlertStatus::Resolved);
    }

    #[test]
    fn resolved_condition_can_raise_again() {
        let alerts = AlertService::new();
        let record = alerts
            .evaluate(&device(Some(15.0), low_20()))
            .expect("raised");
        alerts.resolve(&record.id);
        let second = alerts
            .evaluate(&device(Some(12.0), low_20()))
            .expect("raised again");
        assert_ne!(second.id, record.id);
        assert_eq!(alerts.active_count(), 1);
    }

    #[test]
    fn high_threshold_is_evaluated() {
        let alerts = AlertService::new();
        let thresholds = Some(Thresholds {
            low_level: Some(20.0),
            high_level: Some(90.0),
        });
        let record = alerts
            .evaluate(&device(Some(95.5), thresholds))
            .expect("raised");
        assert_eq!(record.condition, AlertCondition::HighLevel);
    }

    #[test]
    fn clear_empties_registry_and_allows_re_raise() {
        let alerts = AlertService::new();
        alerts
            .evaluate(&device(Some(15.0), low_20()))
            .expect("raised");
        alerts.clear();
        assert_eq!(alerts.active_count(), 0);
        assert!(alerts.list().is_empty());
        // 清空后同一条件可重新触发
        assert!(alerts.evaluate(&device(Some(15.0), low_20())).is_some());
    }

    #[test]
    fn no_thresholds_no_alert() {
        let alerts = AlertService::new();
        assert!(alerts.evaluate(&device(Some(1.0), None)).is_none());
        assert!(alerts.evaluate(&device(None, low_20())).is_none());
    }
}
