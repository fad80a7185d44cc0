//! 注册表错误类型。

/// 命令/查询路径向调用方上报的错误分类。
///
/// 采集路径的未知设备不走错误通道（属正常静默丢弃）。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 输入非法或配额耗尽，未发生任何变更。
    #[error("validation error: {0}")]
    Validation(String),
    /// 显式查询/命令指向未知设备。
    #[error("device not found: {0}")]
    NotFound(String),
    /// 设备缺少所需能力（例如无电源字段的电源命令）。
    #[error("not supported: {0}")]
    NotSupported(String),
}
