//! HTTP 轮询采集源。
//!
//! 按固定间隔向端点发起读取请求；单次失败（传输错误、超时、负载
//! 非法）只记录并继续，循环只因停止信号退出。

use crate::wire::parse_level_payload;
use crate::{IngestError, Source, TelemetrySink, now_epoch_ms, stop_requested};
use async_trait::async_trait;
use domain::{TelemetryUpdate, Transport};
use hidromon_telemetry::record_poll_failed;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, warn};

/// HTTP 轮询配置。
#[derive(Debug, Clone)]
pub struct HttpPollerConfig {
    /// 轮询端点（完整 URL）。
    pub endpoint: String,
    /// 轮询间隔（毫秒）。
    pub poll_interval_ms: u64,
    /// 单次请求超时（毫秒）。超时按失败轮询处理。
    pub timeout_ms: u64,
}

/// HTTP 轮询采集源（每个 http 设备一个实例）。
pub struct HttpPollerSource {
    config: HttpPollerConfig,
    client: reqwest::Client,
}

impl HttpPollerSource {
    pub fn new(config: HttpPollerConfig) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| IngestError::Source(err.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn poll_once(&self, sink: &Arc<dyn TelemetrySink>) {
        let response = match self.client.get(&self.config.endpoint).send().await {
            Ok(response) => response,
            Err(err) => {
                record_poll_failed();
                warn!(
                    target: "hidromon.ingest",
                    endpoint = %self.config.endpoint,
                    error = %err,
                    "http poll failed"
                );
                return;
            }
        };
        if !response.status().is_success() {
            record_poll_failed();
            warn!(
                target: "hidromon.ingest",
                endpoint = %self.config.endpoint,
                status = response.status().as_u16(),
                "http poll returned non-success status"
            );
            return;
        }
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                record_poll_failed();
                warn!(
                    target: "hidromon.ingest",
                    endpoint = %self.config.endpoint,
                    error = %err,
                    "http poll body read failed"
                );
                return;
            }
        };
        let reading = match parse_level_payload(&body) {
            Ok(reading) => reading,
            Err(reason) => {
                record_poll_failed();
                warn!(
                    target: "hidromon.ingest",
                    endpoint = %self.config.endpoint,
                    reason = %reason,
                    "http poll payload malformed"
                );
                return;
            }
        };
        debug!(
            target: "hidromon.ingest",
            endpoint = %self.config.endpoint,
            device_id = %reading.device_id,
            level_pct = reading.level_pct,
            "http poll reading"
        );
        let update = TelemetryUpdate {
            device_id: reading.device_id,
            observed_level: reading.level_pct,
            source_ts_ms: now_epoch_ms(),
            transport: Transport::Http,
        };
        if let Err(err) = sink.handle(update).await {
            warn!(target: "hidromon.ingest", error = %err, "telemetry sink failed");
        }
    }
}

#[async_trait]
impl Source for HttpPollerSource {
    async fn run(
        &self,
        sink: Arc<dyn TelemetrySink>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || stop_requested(&stop) {
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    self.poll_once(&sink).await;
                }
            }
        }
    }
}
