//! 组织级设备配额协作接口。
//!
//! 配额由外部授权服务提供；这里只定义查询 seam 与本地实现。

use async_trait::async_trait;
use std::collections::HashMap;

/// 配额提供者抽象。返回 None 表示该组织不限额。
#[async_trait]
pub trait QuotaProvider: Send + Sync {
    async fn max_devices(&self, organization: Option<&str>) -> Option<u32>;
}

/// 不限额实现（默认接线与测试用）。
#[derive(Debug, Default)]
pub struct UnlimitedQuota;

#[async_trait]
impl QuotaProvider for UnlimitedQuota {
    async fn max_devices(&self, _organization: Option<&str>) -> Option<u32> {
        None
    }
}

/// 静态配额：逐组织覆盖 + 可选全局默认。
#[derive(Debug, Default)]
pub struct StaticQuotaProvider {
    per_org: HashMap<String, u32>,
    default: Option<u32>,
}

impl StaticQuotaProvider {
    pub fn with_default(default: Option<u32>) -> Self {
        Self {
            per_org: HashMap::new(),
            default,
        }
    }

    pub fn set_org_limit(&mut self, organization: impl Into<String>, max_devices: u32) {
        self.per_org.insert(organization.into(), max_devices);
    }
}

#[async_trait]
impl QuotaProvider for StaticQuotaProvider {
    async fn max_devices(&self, organization: Option<&str>) -> Option<u32> {
        match organization {
            Some(org) => self.per_org.get(org).copied().or(self.default),
            None => self.default,
        }
    }
}
