//! 主题订阅采集源。
//!
//! 单个 MQTT 连接订阅通配模式，按设备绑定的主题过滤无需本地
//! 维护：负载自带 `device_id`，未知设备由调和层丢弃。

use crate::wire::parse_level_payload;
use crate::{IngestError, Source, TelemetrySink, now_epoch_ms, stop_requested};
use async_trait::async_trait;
use domain::{TelemetryUpdate, Transport};
use hidromon_telemetry::record_message_rejected;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// 主题订阅配置。
#[derive(Debug, Clone)]
pub struct TopicSubscriberConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 订阅模式，如 `predio/+/+/telemetry`。
    pub pattern: String,
}

/// 主题订阅采集源（进程内共享一个实例）。
#[derive(Debug, Clone)]
pub struct TopicSubscriberSource {
    config: TopicSubscriberConfig,
}

impl TopicSubscriberSource {
    pub fn new(config: TopicSubscriberConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TopicSubscriberConfig {
        &self.config
    }

    async fn handle_publish(
        &self,
        topic: &str,
        payload: &[u8],
        sink: &Arc<dyn TelemetrySink>,
    ) {
        let reading = match parse_level_payload(payload) {
            Ok(reading) => reading,
            Err(reason) => {
                record_message_rejected();
                warn!(
                    target: "hidromon.ingest",
                    topic = %topic,
                    reason = %reason,
                    "topic message rejected"
                );
                return;
            }
        };
        debug!(
            target: "hidromon.ingest",
            topic = %topic,
            device_id = %reading.device_id,
            level_pct = reading.level_pct,
            "topic message"
        );
        let update = TelemetryUpdate {
            device_id: reading.device_id,
            observed_level: reading.level_pct,
            source_ts_ms: now_epoch_ms(),
            transport: Transport::Topic,
        };
        if let Err(err) = sink.handle(update).await {
            warn!(target: "hidromon.ingest", error = %err, "telemetry sink failed");
        }
    }
}

#[async_trait]
impl Source for TopicSubscriberSource {
    async fn run(
        &self,
        sink: Arc<dyn TelemetrySink>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), IngestError> {
        let client_id = format!("hidromon-ingest-{}", now_epoch_ms());
        let mut options =
            MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        client
            .subscribe(self.config.pattern.clone(), QoS::AtMostOnce)
            .await
            .map_err(|err| IngestError::Source(err.to_string()))?;

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || stop_requested(&stop) {
                        let _ = client.disconnect().await;
                        return Ok(());
                    }
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            self.handle_publish(&publish.topic, &publish.payload, &sink)
                                .await;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            // 断连/不可达按失败消息处理，退避后重试，不终止订阅
                            warn!(
                                target: "hidromon.ingest",
                                error = %err,
                                "mqtt eventloop error"
                            );
                            tokio::select! {
                                changed = stop.changed() => {
                                    if changed.is_err() || stop_requested(&stop) {
                                        let _ = client.disconnect().await;
                                        return Ok(());
                                    }
                                }
                                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                            }
                        }
                    }
                }
            }
        }
    }
}
