//! 控制链路：命令下发 + 乐观电源状态流转。
//!
//! 下发按设备绑定的传输走对应发送器；下发成功后才把注册表里的
//! 电源状态翻转到命令的目标值。没有设备回执通道，翻转是乐观的，
//! 真实状态由后续遥测修正。

use async_trait::async_trait;
use domain::{Command, Device, TransportBinding};
use hidromon_registry::{DeviceRegistry, RegistryError};
use hidromon_telemetry::{
    record_command_dispatch_failure, record_command_dispatch_success, record_command_issued,
};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("command not supported: {0}")]
    NotSupported(String),
    #[error("dispatch error: {0}")]
    Transport(String),
    #[error("dispatch timed out after {0}ms")]
    Timeout(u64),
}

/// 一次待下发的命令。
#[derive(Debug, Clone)]
pub struct CommandDispatch {
    pub device_id: String,
    pub command: Command,
    pub binding: TransportBinding,
}

/// 命令下发器抽象。
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, dispatch: &CommandDispatch) -> Result<(), ControlError>;
}

/// 设备侧命令线格式：`{"deviceId":"...","command":"power_on"}`。
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandEnvelope<'a> {
    device_id: &'a str,
    command: &'a str,
}

fn command_payload(dispatch: &CommandDispatch) -> Result<Vec<u8>, ControlError> {
    let envelope = CommandEnvelope {
        device_id: &dispatch.device_id,
        command: dispatch.command.as_str(),
    };
    serde_json::to_vec(&envelope).map_err(|err| ControlError::Transport(err.to_string()))
}

/// HTTP 发送器：POST 到设备端点。
pub struct HttpCommandSender {
    client: reqwest::Client,
}

impl HttpCommandSender {
    pub fn new(timeout_ms: u64) -> Result<Self, ControlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| ControlError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, endpoint: &str, dispatch: &CommandDispatch) -> Result<(), ControlError> {
        let payload = command_payload(dispatch)?;
        let response = self
            .client
            .post(endpoint)
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|err| ControlError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ControlError::Transport(format!(
                "endpoint returned status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// 套接字发送器：连接通道地址并写入一帧。
pub struct SocketCommandSender {
    connect_timeout_ms: u64,
}

impl SocketCommandSender {
    pub fn new(connect_timeout_ms: u64) -> Self {
        Self { connect_timeout_ms }
    }

    async fn send(&self, channel: &str, dispatch: &CommandDispatch) -> Result<(), ControlError> {
        let mut payload = command_payload(dispatch)?;
        payload.push(b'\n');
        let mut stream = match tokio::time::timeout(
            Duration::from_millis(self.connect_timeout_ms),
            TcpStream::connect(channel),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                return Err(ControlError::Transport(format!(
                    "connect {} failed: {}",
                    channel, err
                )));
            }
            Err(_) => return Err(ControlError::Timeout(self.connect_timeout_ms)),
        };
        stream
            .write_all(&payload)
            .await
            .map_err(|err| ControlError::Transport(err.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|err| ControlError::Transport(err.to_string()))?;
        Ok(())
    }
}

/// 主题发布器配置。
#[derive(Debug, Clone)]
pub struct TopicPublisherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
}

/// 主题发布器：发布到设备遥测主题的 `/command` 子主题。
#[derive(Clone)]
pub struct TopicCommandPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl TopicCommandPublisher {
    pub fn connect(config: TopicPublisherConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let client_id = format!("hidromon-control-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "hidromon.control", "mqtt command eventloop error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        (
            Self {
                client,
                qos: qos_from_u8(config.qos),
            },
            handle,
        )
    }

    async fn send(&self, topic: &str, dispatch: &CommandDispatch) -> Result<(), ControlError> {
        let payload = command_payload(dispatch)?;
        let command_topic = format!("{}/command", topic.trim_end_matches('/'));
        self.client
            .publish(command_topic, self.qos, false, payload)
            .await
            .map_err(|err| ControlError::Transport(err.to_string()))
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// 生产下发器：按绑定选择传输。
pub struct TransportDispatcher {
    http: HttpCommandSender,
    socket: SocketCommandSender,
    topic: Option<TopicCommandPublisher>,
}

impl TransportDispatcher {
    pub fn new(
        http: HttpCommandSender,
        socket: SocketCommandSender,
        topic: Option<TopicCommandPublisher>,
    ) -> Self {
        Self {
            http,
            socket,
            topic,
        }
    }
}

#[async_trait]
impl CommandDispatcher for TransportDispatcher {
    async fn dispatch(&self, dispatch: &CommandDispatch) -> Result<(), ControlError> {
        match &dispatch.binding {
            TransportBinding::Http { endpoint } => self.http.send(endpoint, dispatch).await,
            TransportBinding::Socket { channel } => self.socket.send(channel, dispatch).await,
            TransportBinding::Topic { topic } => match &self.topic {
                Some(publisher) => publisher.send(topic, dispatch).await,
                None => Err(ControlError::Transport(
                    "mqtt publisher not configured".to_string(),
                )),
            },
        }
    }
}

/// 命令服务配置。
#[derive(Debug, Clone)]
pub struct CommandServiceConfig {
    /// 单次下发的总超时（毫秒）。
    pub dispatch_timeout_ms: u64,
}

impl Default for CommandServiceConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: 3_000,
        }
    }
}

/// 命令服务：能力校验 → 下发 → 乐观翻转。
pub struct CommandService {
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<dyn CommandDispatcher>,
    config: CommandServiceConfig,
}

impl CommandService {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        dispatcher: Arc<dyn CommandDispatcher>,
        config: CommandServiceConfig,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            config,
        }
    }

    /// 向设备下发命令，成功后返回翻转后的设备快照。
    pub async fn send_command(
        &self,
        device_id: &str,
        command: Command,
    ) -> Result<Device, ControlError> {
        record_command_issued();
        let device = self
            .registry
            .get(device_id)
            .ok_or_else(|| ControlError::NotFound(device_id.to_string()))?;
        if device.power.is_none() {
            return Err(ControlError::NotSupported(format!(
                "device has no power capability: {}",
                device_id
            )));
        }
        let dispatch = CommandDispatch {
            device_id: device.id.clone(),
            command,
            binding: device.binding.clone(),
        };
        info!(
            target: "hidromon.control",
            device_id = %dispatch.device_id,
            command = dispatch.command.as_str(),
            transport = dispatch.binding.transport().as_str(),
            "command_dispatch"
        );

        let result = tokio::time::timeout(
            Duration::from_millis(self.config.dispatch_timeout_ms),
            self.dispatcher.dispatch(&dispatch),
        )
        .await
        .unwrap_or(Err(ControlError::Timeout(self.config.dispatch_timeout_ms)));
        if let Err(err) = result {
            record_command_dispatch_failure();
            warn!(
                target: "hidromon.control",
                device_id = %dispatch.device_id,
                command = dispatch.command.as_str(),
                error = %err,
                "command_dispatch_failed"
            );
            return Err(err);
        }
        record_command_dispatch_success();

        // 乐观翻转：真实状态由后续遥测修正
        let updated = self
            .registry
            .set_power(device_id, command.power_value())
            .map_err(|err| match err {
                RegistryError::NotFound(id) => ControlError::NotFound(id),
                RegistryError::NotSupported(reason) => ControlError::NotSupported(reason),
                RegistryError::Validation(reason) => ControlError::Transport(reason),
            })?;
        info!(
            target: "hidromon.control",
            device_id = %updated.id,
            power = ?updated.power,
            "command_applied"
        );
        Ok(updated)
    }
}
