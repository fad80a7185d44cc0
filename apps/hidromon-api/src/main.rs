//! HTTP API 服务器 + 采集引擎入口。

mod engine;
mod handlers;
mod routes;
mod utils;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use engine::{Engine, EngineConfig};
use hidromon_alerts::AlertService;
use hidromon_config::AppConfig;
use hidromon_control::{
    CommandService, CommandServiceConfig, HttpCommandSender, SocketCommandSender,
    TopicCommandPublisher, TopicPublisherConfig, TransportDispatcher,
};
use hidromon_reconcile::Reconciler;
use hidromon_registry::{DeviceRegistry, QuotaProvider, StaticQuotaProvider, UnlimitedQuota};
use hidromon_telemetry::{init_tracing, new_request_ids};
use std::sync::Arc;
use tracing::{Instrument, info};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub alerts: Arc<AlertService>,
    pub commands: Arc<CommandService>,
    pub engine: Arc<Engine>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let quota: Arc<dyn QuotaProvider> = match config.max_devices_per_org {
        Some(limit) => Arc::new(StaticQuotaProvider::with_default(Some(limit))),
        None => Arc::new(UnlimitedQuota),
    };
    let registry = Arc::new(DeviceRegistry::new(quota));
    let alerts = Arc::new(AlertService::new());
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&registry),
        Arc::clone(&alerts),
    ));

    // 命令下发：三传输发送器 + 共享 MQTT 发布连接
    let (topic_publisher, _mqtt_task) = TopicCommandPublisher::connect(TopicPublisherConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        qos: config.mqtt_command_qos,
    });
    let dispatcher = Arc::new(TransportDispatcher::new(
        HttpCommandSender::new(config.http_timeout_ms)?,
        SocketCommandSender::new(config.socket_connect_timeout_ms),
        Some(topic_publisher),
    ));
    let commands = Arc::new(CommandService::new(
        Arc::clone(&registry),
        dispatcher,
        CommandServiceConfig {
            dispatch_timeout_ms: config.http_timeout_ms,
        },
    ));

    let engine = Arc::new(Engine::new(
        Arc::clone(&registry),
        reconciler,
        EngineConfig::from_app_config(&config),
    ));

    // 演示设备在 start 之前注册，由 start 统一挂接采集任务
    if config.demo_enabled {
        seed_demo_devices(&registry).await;
    }
    // 引擎内部按 HIDRO_INGEST 总开关决定是否拉起任务
    engine.start();

    let state = AppState {
        registry,
        alerts,
        commands,
        engine: Arc::clone(&engine),
    };

    let app = routes::create_api_router()
        .with_state(state)
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "hidromon.api", addr = %config.http_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(engine))
        .await?;
    Ok(())
}

async fn shutdown_signal(engine: Arc<Engine>) {
    let _ = tokio::signal::ctrl_c().await;
    info!(target: "hidromon.api", "shutdown requested");
    engine.shutdown();
}

/// 演示设备：三种传输各一台。
async fn seed_demo_devices(registry: &Arc<DeviceRegistry>) {
    use domain::{DeviceKind, DeviceSpec, Thresholds, Transport};

    let specs = [
        DeviceSpec {
            id: Some("demo1".to_string()),
            name: "Tanque Torre A".to_string(),
            kind: Some(DeviceKind::Tank),
            transport: Some(Transport::Topic),
            topic: Some("predio/torreA/demo1/telemetry".to_string()),
            thresholds: Some(Thresholds {
                low_level: Some(20.0),
                high_level: Some(95.0),
            }),
            ..DeviceSpec::default()
        },
        DeviceSpec {
            id: Some("demo2".to_string()),
            name: "Valvula Principal".to_string(),
            kind: Some(DeviceKind::Valve),
            transport: Some(Transport::Http),
            endpoint: Some("http://127.0.0.1:3001/demo2/level".to_string()),
            power: Some(false),
            ..DeviceSpec::default()
        },
        DeviceSpec {
            id: Some("demo3".to_string()),
            name: "Sensor Cisterna".to_string(),
            kind: Some(DeviceKind::Sensor),
            transport: Some(Transport::Socket),
            channel: Some("127.0.0.1:9000".to_string()),
            thresholds: Some(Thresholds {
                low_level: Some(10.0),
                high_level: None,
            }),
            ..DeviceSpec::default()
        },
    ];

    for spec in specs {
        match registry.create(spec).await {
            Ok(device) => {
                info!(target: "hidromon.api", device_id = %device.id, "demo device seeded");
            }
            Err(err) => {
                tracing::warn!(target: "hidromon.api", error = %err, "demo seed failed");
            }
        }
    }
}

async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    // 生成 request_id 与 trace_id，并注入请求扩展与日志
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}
