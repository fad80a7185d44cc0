//! 数据接入能力：三个相互独立的传输适配器。
//!
//! 每个适配器把各自的线格式规范化为 [`domain::TelemetryUpdate`]，
//! 经 [`TelemetrySink`] 进入调和层；适配器之间互不感知，也不读
//! 注册表状态。停止信号经 `tokio::sync::watch` 传播，每个循环在
//! 一次在途操作的超时内退出。

use async_trait::async_trait;
use domain::TelemetryUpdate;
use std::sync::Arc;
use tokio::sync::watch;

pub mod http_poller;
pub mod socket;
pub mod topic;
pub mod wire;

pub use http_poller::{HttpPollerConfig, HttpPollerSource};
pub use socket::{SocketListenerConfig, SocketListenerSource};
pub use topic::{TopicSubscriberConfig, TopicSubscriberSource};

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("source error: {0}")]
    Source(String),
    #[error("handler error: {0}")]
    Handler(String),
}

/// 遥测更新处理器：适配器与核心之间唯一的 seam。
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn handle(&self, update: TelemetryUpdate) -> Result<(), IngestError>;
}

/// 采集源抽象：运行直到停止信号或传输不可恢复。
#[async_trait]
pub trait Source: Send + Sync {
    async fn run(
        &self,
        sink: Arc<dyn TelemetrySink>,
        stop: watch::Receiver<bool>,
    ) -> Result<(), IngestError>;
}

/// 停止信号已触发（发送端关闭同样视为停止）。
fn stop_requested(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow()
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
