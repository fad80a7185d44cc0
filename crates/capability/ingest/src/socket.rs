//! 套接字推送采集源。
//!
//! 主动连接设备推送端（`host:port`），按行分帧读取 JSON 负载。
//! 坏帧丢弃并继续读；对端关闭即结束，不自动重连 —— 设备随后因
//! 陈旧扫描转为离线。

use crate::wire::parse_level_payload;
use crate::{IngestError, Source, TelemetrySink, now_epoch_ms, stop_requested};
use async_trait::async_trait;
use domain::{TelemetryUpdate, Transport};
use hidromon_telemetry::record_frame_rejected;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 套接字监听配置。
#[derive(Debug, Clone)]
pub struct SocketListenerConfig {
    /// 推送通道地址，`host:port`。
    pub channel: String,
    /// 连接建立超时（毫秒）。
    pub connect_timeout_ms: u64,
}

/// 套接字推送采集源（每个 socket 设备一个实例）。
pub struct SocketListenerSource {
    config: SocketListenerConfig,
    connected: Arc<AtomicBool>,
}

impl SocketListenerSource {
    pub fn new(config: SocketListenerConfig) -> Self {
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    /// 连接状态标志，供监控读取。
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.connected)
    }

    async fn handle_frame(&self, line: &str, sink: &Arc<dyn TelemetrySink>) {
        let frame = line.trim();
        if frame.is_empty() {
            return;
        }
        let reading = match parse_level_payload(frame.as_bytes()) {
            Ok(reading) => reading,
            Err(reason) => {
                record_frame_rejected();
                warn!(
                    target: "hidromon.ingest",
                    channel = %self.config.channel,
                    reason = %reason,
                    "socket frame rejected"
                );
                return;
            }
        };
        debug!(
            target: "hidromon.ingest",
            channel = %self.config.channel,
            device_id = %reading.device_id,
            level_pct = reading.level_pct,
            "socket frame"
        );
        let update = TelemetryUpdate {
            device_id: reading.device_id,
            observed_level: reading.level_pct,
            source_ts_ms: now_epoch_ms(),
            transport: Transport::Socket,
        };
        if let Err(err) = sink.handle(update).await {
            warn!(target: "hidromon.ingest", error = %err, "telemetry sink failed");
        }
    }
}

#[async_trait]
impl Source for SocketListenerSource {
    async fn run(
        &self,
        sink: Arc<dyn TelemetrySink>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let stream = match tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect(&self.config.channel),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(IngestError::Source(format!(
                    "connect {} failed: {}",
                    self.config.channel, err
                )));
            }
            Err(_) => {
                return Err(IngestError::Source(format!(
                    "connect {} timed out",
                    self.config.channel
                )));
            }
        };
        self.connected.store(true, Ordering::SeqCst);
        info!(
            target: "hidromon.ingest",
            channel = %self.config.channel,
            "socket connected"
        );

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || stop_requested(&stop) {
                        self.connected.store(false, Ordering::SeqCst);
                        return Ok(());
                    }
                }
                read = reader.read_line(&mut line) => {
                    match read {
                        Ok(0) => {
                            // 对端关闭：静默结束，由陈旧扫描接管
                            self.connected.store(false, Ordering::SeqCst);
                            info!(
                                target: "hidromon.ingest",
                                channel = %self.config.channel,
                                "socket closed by peer"
                            );
                            return Ok(());
                        }
                        Ok(_) => {
                            self.handle_frame(&line, &sink).await;
                        }
                        Err(err) => {
                            self.connected.store(false, Ordering::SeqCst);
                            return Err(IngestError::Source(err.to_string()));
                        }
                    }
                }
            }
        }
    }
}
