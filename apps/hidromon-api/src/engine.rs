//! 采集引擎：按设备绑定拉起各传输的采集任务。
//!
//! - http 设备各自一个轮询任务；
//! - socket 设备各自一个推送监听任务；
//! - topic 设备共享进程内唯一的订阅任务；
//! - 全局一个离线巡检任务。
//!
//! 所有任务监听同一个 watch 停止信号。设备删除后其任务不被单独
//! 终止：后续读数在调和层按未知设备丢弃，进程停止时一并退出。

use domain::{Device, TransportBinding};
use hidromon_config::AppConfig;
use hidromon_ingest::{
    HttpPollerConfig, HttpPollerSource, SocketListenerConfig, SocketListenerSource, Source,
    TelemetrySink, TopicSubscriberConfig, TopicSubscriberSource,
};
use hidromon_reconcile::{StalenessSweeper, SweeperConfig};
use hidromon_registry::DeviceRegistry;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// 引擎传输参数（从 AppConfig 摘取采集相关字段）。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 采集总开关：关闭时 start/attach 均为空操作。
    pub ingest_enabled: bool,
    pub poll_interval_ms: u64,
    pub http_timeout_ms: u64,
    pub socket_connect_timeout_ms: u64,
    pub staleness_window_ms: u64,
    pub sweep_interval_ms: u64,
    pub mqtt: TopicSubscriberConfig,
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            ingest_enabled: config.ingest_enabled,
            poll_interval_ms: config.poll_interval_ms,
            http_timeout_ms: config.http_timeout_ms,
            socket_connect_timeout_ms: config.socket_connect_timeout_ms,
            staleness_window_ms: config.staleness_window_ms,
            sweep_interval_ms: config.sweep_interval_ms,
            mqtt: TopicSubscriberConfig {
                host: config.mqtt_host.clone(),
                port: config.mqtt_port,
                username: config.mqtt_username.clone(),
                password: config.mqtt_password.clone(),
                pattern: config.mqtt_topic_pattern.clone(),
            },
        }
    }
}

/// 采集引擎。
pub struct Engine {
    registry: Arc<DeviceRegistry>,
    sink: Arc<dyn TelemetrySink>,
    config: EngineConfig,
    stop_tx: watch::Sender<bool>,
}

impl Engine {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        sink: Arc<dyn TelemetrySink>,
        config: EngineConfig,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            registry,
            sink,
            config,
            stop_tx,
        }
    }

    /// 启动共享任务（topic 订阅、离线巡检）并挂接已注册设备。
    pub fn start(&self) {
        if !self.config.ingest_enabled {
            info!(target: "hidromon.engine", "ingest disabled, engine idle");
            return;
        }
        let subscriber = TopicSubscriberSource::new(self.config.mqtt.clone());
        let sink = Arc::clone(&self.sink);
        let stop = self.stop_tx.subscribe();
        tokio::spawn(async move {
            if let Err(err) = subscriber.run(sink, stop).await {
                warn!(target: "hidromon.engine", error = %err, "topic subscriber stopped");
            }
        });

        let sweeper = StalenessSweeper::new(
            Arc::clone(&self.registry),
            SweeperConfig {
                staleness_window_ms: self.config.staleness_window_ms as i64,
                sweep_interval_ms: self.config.sweep_interval_ms,
            },
        );
        let stop = self.stop_tx.subscribe();
        tokio::spawn(async move {
            sweeper.run(stop).await;
        });

        for device in self.registry.list(None) {
            self.attach(&device);
        }
        info!(target: "hidromon.engine", "ingest engine started");
    }

    /// 为一台设备挂接采集任务。topic 设备复用共享订阅，无需单独任务。
    /// 采集关闭时不拉起任何任务（运行期创建的设备同样受总开关约束）。
    pub fn attach(&self, device: &Device) {
        if !self.config.ingest_enabled {
            return;
        }
        match &device.binding {
            TransportBinding::Http { endpoint } => {
                let source = match HttpPollerSource::new(HttpPollerConfig {
                    endpoint: endpoint.clone(),
                    poll_interval_ms: self.config.poll_interval_ms,
                    timeout_ms: self.config.http_timeout_ms,
                }) {
                    Ok(source) => source,
                    Err(err) => {
                        warn!(
                            target: "hidromon.engine",
                            device_id = %device.id,
                            error = %err,
                            "http poller setup failed"
                        );
                        return;
                    }
                };
                let sink = Arc::clone(&self.sink);
                let stop = self.stop_tx.subscribe();
                let device_id = device.id.clone();
                tokio::spawn(async move {
                    if let Err(err) = source.run(sink, stop).await {
                        warn!(
                            target: "hidromon.engine",
                            device_id = %device_id,
                            error = %err,
                            "http poller stopped"
                        );
                    }
                });
            }
            TransportBinding::Socket { channel } => {
                let source = SocketListenerSource::new(SocketListenerConfig {
                    channel: channel.clone(),
                    connect_timeout_ms: self.config.socket_connect_timeout_ms,
                });
                let sink = Arc::clone(&self.sink);
                let stop = self.stop_tx.subscribe();
                let device_id = device.id.clone();
                tokio::spawn(async move {
                    if let Err(err) = source.run(sink, stop).await {
                        warn!(
                            target: "hidromon.engine",
                            device_id = %device_id,
                            error = %err,
                            "socket listener stopped"
                        );
                    }
                });
            }
            TransportBinding::Topic { .. } => {}
        }
    }

    /// 通知全部采集任务退出。
    pub fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{DeviceKind, DeviceStatus, TelemetryUpdate};
    use hidromon_ingest::IngestError;
    use hidromon_registry::UnlimitedQuota;
    use std::time::Duration;
    use tokio::net::TcpListener;

    struct NullSink;

    #[async_trait]
    impl TelemetrySink for NullSink {
        async fn handle(&self, _update: TelemetryUpdate) -> Result<(), IngestError> {
            Ok(())
        }
    }

    fn engine(ingest_enabled: bool) -> Engine {
        Engine::new(
            Arc::new(DeviceRegistry::new(Arc::new(UnlimitedQuota))),
            Arc::new(NullSink),
            EngineConfig {
                ingest_enabled,
                poll_interval_ms: 50,
                http_timeout_ms: 500,
                socket_connect_timeout_ms: 500,
                staleness_window_ms: 15_000,
                sweep_interval_ms: 1_000,
                mqtt: TopicSubscriberConfig {
                    host: "127.0.0.1".to_string(),
                    port: 1,
                    username: None,
                    password: None,
                    pattern: "predio/+/+/telemetry".to_string(),
                },
            },
        )
    }

    fn socket_device(channel: String) -> Device {
        Device {
            id: "s1".to_string(),
            name: "Sensor".to_string(),
            kind: DeviceKind::Sensor,
            organization: None,
            binding: TransportBinding::Socket { channel },
            level: None,
            status: DeviceStatus::Offline,
            power: None,
            tags: Vec::new(),
            thresholds: None,
            created_at_ms: 0,
            updated_at_ms: None,
        }
    }

    #[tokio::test]
    async fn attach_is_inert_when_ingest_disabled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let channel = listener.local_addr().expect("addr").to_string();

        let engine = engine(false);
        engine.attach(&socket_device(channel));

        // 采集关闭：没有任务发起连接
        let accepted =
            tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
        assert!(accepted.is_err(), "no task must connect while ingest is off");
        engine.shutdown();
    }

    #[tokio::test]
    async fn attach_connects_socket_device_when_enabled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let channel = listener.local_addr().expect("addr").to_string();

        let engine = engine(true);
        engine.attach(&socket_device(channel));

        let accepted = tokio::time::timeout(Duration::from_secs(2), listener.accept()).await;
        assert!(accepted.is_ok(), "listener task must connect");
        engine.shutdown();
    }
}
