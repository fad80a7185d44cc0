//! # 设备注册表模块
//!
//! 设备身份到规范状态的权威映射，所有其它组件经由它读写。
//!
//! ## 架构设计
//!
//! 1. **错误处理层** (`error.rs`)：统一的注册表错误类型
//! 2. **配额协作层** (`quota.rs`)：组织级设备配额的外部协作接口
//! 3. **实现层** (`registry.rs`)：内存注册表（逐设备互斥 + 插入序列表）
//!
//! ## 变更纪律
//!
//! - 同一设备 id 的所有变更（`upsert`、`set_power`、`create`、`remove`、
//!   离线巡检）逐设备互斥，不会交错出撕裂状态
//! - 不同设备之间互不阻塞（结构锁只保护映射本身，持有期内不做 I/O）
//! - `upsert` 是采集路径可达的唯一变更入口；其余入口都在命令/查询路径

pub mod error;
pub mod quota;
pub mod registry;

pub use error::RegistryError;
pub use quota::{QuotaProvider, StaticQuotaProvider, UnlimitedQuota};
pub use registry::DeviceRegistry;
