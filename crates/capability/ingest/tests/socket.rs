//! 套接字推送源集成测试：坏帧丢弃、对端关闭后静默结束。

use async_trait::async_trait;
use domain::{TelemetryUpdate, Transport};
use hidromon_ingest::{
    IngestError, SocketListenerConfig, SocketListenerSource, Source, TelemetrySink,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};

struct CollectingSink {
    updates: Mutex<Vec<TelemetryUpdate>>,
}

impl CollectingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            updates: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TelemetrySink for CollectingSink {
    async fn handle(&self, update: TelemetryUpdate) -> Result<(), IngestError> {
        self.updates.lock().await.push(update);
        Ok(())
    }
}

#[tokio::test]
async fn frames_flow_and_close_ends_quietly() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let channel = listener.local_addr().expect("addr").to_string();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let frames = concat!(
            "{\"device_id\":\"d3\",\"nivel_pct\":42.5}\n",
            "garbage frame\n",
            "{\"nivel_pct\":10}\n",
            "{\"device_id\":\"d3\",\"levelPercent\":61}\n",
        );
        socket.write_all(frames.as_bytes()).await.expect("write");
        socket.flush().await.expect("flush");
        tokio::time::sleep(Duration::from_millis(50)).await;
        // drop: 连接关闭
    });

    let source = SocketListenerSource::new(SocketListenerConfig {
        channel,
        connect_timeout_ms: 1_000,
    });
    let connected = source.connected_flag();
    let sink = CollectingSink::new();
    let (_stop_tx, stop_rx) = watch::channel(false);

    let sink_for_run: Arc<dyn TelemetrySink> = sink.clone();
    let result = tokio::time::timeout(Duration::from_secs(2), source.run(sink_for_run, stop_rx))
        .await
        .expect("source ended after peer close");
    assert!(result.is_ok());
    assert!(!connected.load(Ordering::SeqCst));

    let updates = sink.updates.lock().await;
    assert_eq!(updates.len(), 2, "only well-formed frames pass");
    assert_eq!(updates[0].device_id, "d3");
    assert_eq!(updates[0].observed_level, 42.5);
    assert_eq!(updates[0].transport, Transport::Socket);
    assert_eq!(updates[1].observed_level, 61.0);
}

#[tokio::test]
async fn unreachable_channel_is_an_error() {
    let source = SocketListenerSource::new(SocketListenerConfig {
        // 端口 1 几乎必然拒绝连接
        channel: "127.0.0.1:1".to_string(),
        connect_timeout_ms: 500,
    });
    let sink: Arc<dyn TelemetrySink> = CollectingSink::new();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let result = source.run(sink, stop_rx).await;
    assert!(result.is_err());
    assert!(!source.connected_flag().load(Ordering::SeqCst));
}
