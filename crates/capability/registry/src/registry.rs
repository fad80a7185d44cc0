//! 内存设备注册表实现。
//!
//! 结构：`RwLock<HashMap<id, Arc<Mutex<Device>>>>` + 插入序 id 列表。
//! 结构锁只保护映射与列表；字段变更在逐设备互斥下进行，持锁期间
//! 不做任何 await 或 I/O，因而不同 id 的并发变更互不阻塞。

use crate::error::RegistryError;
use crate::quota::QuotaProvider;
use domain::{
    Device, DeviceSpec, DeviceStatus, TelemetryUpdate, Thresholds, Transport, TransportBinding,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

struct RegistryMap {
    devices: HashMap<String, Arc<Mutex<Device>>>,
    /// 插入顺序，list 的稳定遍历序。
    order: Vec<String>,
}

/// 设备注册表。
pub struct DeviceRegistry {
    inner: RwLock<RegistryMap>,
    quota: Arc<dyn QuotaProvider>,
}

impl DeviceRegistry {
    pub fn new(quota: Arc<dyn QuotaProvider>) -> Self {
        Self {
            inner: RwLock::new(RegistryMap {
                devices: HashMap::new(),
                order: Vec::new(),
            }),
            quota,
        }
    }

    /// 查询单个设备快照。
    pub fn get(&self, id: &str) -> Option<Device> {
        let entry = {
            let map = read_map(&self.inner);
            map.devices.get(id).cloned()
        };
        entry.map(|entry| lock_entry(&entry).clone())
    }

    /// 按插入序列出设备快照；organization 过滤时无组织设备全局可见。
    pub fn list(&self, organization: Option<&str>) -> Vec<Device> {
        let entries: Vec<Arc<Mutex<Device>>> = {
            let map = read_map(&self.inner);
            map.order
                .iter()
                .filter_map(|id| map.devices.get(id).cloned())
                .collect()
        };
        entries
            .iter()
            .map(|entry| lock_entry(entry).clone())
            .filter(|device| match organization {
                Some(org) => device
                    .organization
                    .as_deref()
                    .map(|item| item == org)
                    .unwrap_or(true),
                None => true,
            })
            .collect()
    }

    /// 创建设备。校验名称、传输地址匹配与组织配额。
    pub async fn create(&self, spec: DeviceSpec) -> Result<Device, RegistryError> {
        let device = build_device(spec)?;

        if let Some(max_devices) = self
            .quota
            .max_devices(device.organization.as_deref())
            .await
        {
            let existing = self.count_in_organization(device.organization.as_deref());
            if existing >= max_devices as usize {
                return Err(RegistryError::Validation(format!(
                    "organization device quota reached: {}/{}",
                    existing, max_devices
                )));
            }
        }

        let mut map = write_map(&self.inner);
        if map.devices.contains_key(&device.id) {
            return Err(RegistryError::Validation(format!(
                "device id already exists: {}",
                device.id
            )));
        }
        map.order.push(device.id.clone());
        map.devices
            .insert(device.id.clone(), Arc::new(Mutex::new(device.clone())));
        Ok(device)
    }

    /// 删除设备。未知 id 为幂等空操作。
    pub fn remove(&self, id: &str) {
        let mut map = write_map(&self.inner);
        if map.devices.remove(id).is_some() {
            map.order.retain(|item| item != id);
        }
    }

    /// 采集路径唯一变更入口：接受一条遥测更新。
    ///
    /// 未知设备返回 None（正常静默丢弃，非错误）；接受时设置
    /// level/online/updated_at 并返回更新后的快照。
    pub fn upsert(&self, update: &TelemetryUpdate) -> Option<Device> {
        let entry = {
            let map = read_map(&self.inner);
            map.devices.get(&update.device_id).cloned()
        }?;
        let mut device = lock_entry(&entry);
        device.level = Some(update.observed_level);
        device.status = DeviceStatus::Online;
        device.updated_at_ms = Some(now_epoch_ms());
        Some(device.clone())
    }

    /// 设置电源状态（命令/UI 路径）。无电源能力的设备报 NotSupported。
    pub fn set_power(&self, id: &str, value: bool) -> Result<Device, RegistryError> {
        let entry = {
            let map = read_map(&self.inner);
            map.devices.get(id).cloned()
        }
        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut device = lock_entry(&entry);
        if device.power.is_none() {
            return Err(RegistryError::NotSupported(format!(
                "device has no power capability: {}",
                id
            )));
        }
        device.power = Some(value);
        Ok(device.clone())
    }

    /// 离线巡检：静默超过窗口的在线设备流转为 offline。
    ///
    /// 只有当前在线的设备会被翻转，因此每次静默违规恰好流转一次。
    pub fn mark_stale(&self, window_ms: i64, now_ms: i64) -> Vec<Device> {
        let entries: Vec<Arc<Mutex<Device>>> = {
            let map = read_map(&self.inner);
            map.order
                .iter()
                .filter_map(|id| map.devices.get(id).cloned())
                .collect()
        };
        let mut flipped = Vec::new();
        for entry in entries {
            let mut device = lock_entry(&entry);
            if device.status != DeviceStatus::Online {
                continue;
            }
            let last_seen = device.updated_at_ms.unwrap_or(device.created_at_ms);
            if now_ms.saturating_sub(last_seen) > window_ms {
                device.status = DeviceStatus::Offline;
                flipped.push(device.clone());
            }
        }
        flipped
    }

    fn count_in_organization(&self, organization: Option<&str>) -> usize {
        let entries: Vec<Arc<Mutex<Device>>> = {
            let map = read_map(&self.inner);
            map.devices.values().cloned().collect()
        };
        entries
            .iter()
            .filter(|entry| lock_entry(entry).organization.as_deref() == organization)
            .count()
    }
}

/// 校验 DeviceSpec 并构造初始设备（offline、未观测）。
fn build_device(spec: DeviceSpec) -> Result<Device, RegistryError> {
    let name = spec.name.trim().to_string();
    if name.is_empty() {
        return Err(RegistryError::Validation("name is required".to_string()));
    }
    let kind = spec
        .kind
        .ok_or_else(|| RegistryError::Validation("device kind is required".to_string()))?;
    let transport = spec
        .transport
        .ok_or_else(|| RegistryError::Validation("transport is required".to_string()))?;
    let binding = build_binding(transport, &spec)?;

    let id = match spec.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => uuid::Uuid::new_v4().to_string(),
    };

    Ok(Device {
        id,
        name,
        kind,
        organization: spec.organization,
        binding,
        level: None,
        status: DeviceStatus::Offline,
        power: spec.power,
        tags: spec.tags,
        thresholds: spec.thresholds.map(normalize_thresholds).transpose()?,
        created_at_ms: now_epoch_ms(),
        updated_at_ms: None,
    })
}

/// 地址字段与 transport 必须一一对应：缺失或多余都拒绝。
fn build_binding(
    transport: Transport,
    spec: &DeviceSpec,
) -> Result<TransportBinding, RegistryError> {
    let endpoint = non_empty(spec.endpoint.as_deref());
    let channel = non_empty(spec.channel.as_deref());
    let topic = non_empty(spec.topic.as_deref());

    match transport {
        Transport::Http => match (endpoint, channel, topic) {
            (Some(endpoint), None, None) => Ok(TransportBinding::Http {
                endpoint: endpoint.to_string(),
            }),
            (None, _, _) => Err(RegistryError::Validation(
                "endpoint is required for http transport".to_string(),
            )),
            _ => Err(RegistryError::Validation(
                "only endpoint may be set for http transport".to_string(),
            )),
        },
        Transport::Socket => match (endpoint, channel, topic) {
            (None, Some(channel), None) => Ok(TransportBinding::Socket {
                channel: channel.to_string(),
            }),
            (_, None, _) => Err(RegistryError::Validation(
                "channel is required for socket transport".to_string(),
            )),
            _ => Err(RegistryError::Validation(
                "only channel may be set for socket transport".to_string(),
            )),
        },
        Transport::Topic => match (endpoint, channel, topic) {
            (None, None, Some(topic)) => Ok(TransportBinding::Topic {
                topic: topic.to_string(),
            }),
            (_, _, None) => Err(RegistryError::Validation(
                "topic is required for topic transport".to_string(),
            )),
            _ => Err(RegistryError::Validation(
                "only topic may be set for topic transport".to_string(),
            )),
        },
    }
}

fn normalize_thresholds(thresholds: Thresholds) -> Result<Thresholds, RegistryError> {
    for (key, value) in [
        ("low_level", thresholds.low_level),
        ("high_level", thresholds.high_level),
    ] {
        if let Some(value) = value {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(RegistryError::Validation(format!(
                    "threshold {} out of range: {}",
                    key, value
                )));
            }
        }
    }
    Ok(thresholds)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|item| !item.is_empty())
}

// 锁中毒恢复：持锁代码只做字段赋值，不会留下半完成状态。
fn read_map(lock: &RwLock<RegistryMap>) -> std::sync::RwLockReadGuard<'_, RegistryMap> {
    lock.read().unwrap_or_else(|err| err.into_inner())
}

fn write_map(lock: &RwLock<RegistryMap>) -> std::sync::RwLockWriteGuard<'_, RegistryMap> {
    lock.write().unwrap_or_else(|err| err.into_inner())
}

fn lock_entry(entry: &Arc<Mutex<Device>>) -> MutexGuard<'_, Device> {
    entry.lock().unwrap_or_else(|err| err.into_inner())
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
    use crate::quota::UnlimitedQuota;
    use domain::DeviceKind;

    fn http_spec(id: &str) -> DeviceSpec {
        DeviceSpec {
            id: Some(id.to_string()),
            name: format!("device {}", id),
            kind: Some(DeviceKind::Tank),
            transport: Some(Transport::Http),
            endpoint: Some(format!("http://localhost:3001/devices/{}", id)),
            ..DeviceSpec::default()
        }
    }

    #[tokio::test]
    async fn create_rejects_mismatched_address() {
        let registry = DeviceRegistry::new(Arc::new(UnlimitedQuota));
        let mut spec = http_spec("d1");
        spec.topic = Some("predio/a/d1".to_string());
        let err = registry.create(spec).await.expect_err("mismatch");
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let registry = DeviceRegistry::new(Arc::new(UnlimitedQuota));
        registry.create(http_spec("d1")).await.expect("first");
        let err = registry
            .create(http_spec("d1"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let registry = DeviceRegistry::new(Arc::new(UnlimitedQuota));
        for id in ["d3", "d1", "d2"] {
            registry.create(http_spec(id)).await.expect("create");
        }
        let ids: Vec<String> = registry
            .list(None)
            .into_iter()
            .map(|device| device.id)
            .collect();
        assert_eq!(ids, vec!["d3", "d1", "d2"]);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = DeviceRegistry::new(Arc::new(UnlimitedQuota));
        registry.create(http_spec("d1")).await.expect("create");
        registry.remove("d1");
        registry.remove("d1");
        registry.remove("never-existed");
        assert!(registry.get("d1").is_none());
    }
}
