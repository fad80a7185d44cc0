//! HTTP 轮询源集成测试：对着一个手写 HTTP 响应端验证
//! 失败轮询不中断循环、停止信号能干净退出。

use async_trait::async_trait;
use domain::{TelemetryUpdate, Transport};
use hidromon_ingest::{HttpPollerConfig, HttpPollerSource, IngestError, Source, TelemetrySink};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
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

fn http_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

/// 每次连接按序返回一条响应，循环到最后一条后保持最后一条。
async fn spawn_responder(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let served = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&served);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let index = counter.fetch_add(1, Ordering::SeqCst);
            let response = responses[index.min(responses.len() - 1)].clone();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (format!("http://{}/level", addr), served)
}

#[tokio::test]
async fn malformed_polls_do_not_break_the_loop() {
    // 3 次失败轮询，1 次有效响应，之后持续失败：循环存活且恰好一条更新
    let responses = vec![
        http_response("not json"),
        http_response(r#"{"nivel_pct":40}"#),
        "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            .to_string(),
        http_response(r#"{"device_id":"d2","nivel_pct":55}"#),
        http_response("not json"),
    ];
    let (endpoint, served) = spawn_responder(responses).await;

    let source = HttpPollerSource::new(HttpPollerConfig {
        endpoint,
        poll_interval_ms: 20,
        timeout_ms: 500,
    })
    .expect("source");
    let sink = CollectingSink::new();
    let (stop_tx, stop_rx) = watch::channel(false);

    let sink_for_run: Arc<dyn TelemetrySink> = sink.clone();
    let handle = tokio::spawn(async move { source.run(sink_for_run, stop_rx).await });

    // 等够 6 次轮询：3 次失败后循环仍在继续
    tokio::time::sleep(Duration::from_millis(250)).await;
    stop_tx.send(true).expect("stop");
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("joined")
        .expect("task");
    assert!(result.is_ok());

    assert!(served.load(Ordering::SeqCst) >= 5, "not enough polls served");
    let updates = sink.updates.lock().await;
    assert_eq!(updates.len(), 1, "exactly the one valid poll passes");
    assert_eq!(updates[0].device_id, "d2");
    assert_eq!(updates[0].observed_level, 55.0);
    assert_eq!(updates[0].transport, Transport::Http);
}

#[tokio::test]
async fn stop_signal_exits_promptly() {
    let (endpoint, _) =
        spawn_responder(vec![http_response(r#"{"device_id":"d1","nivel_pct":10}"#)]).await;
    let source = HttpPollerSource::new(HttpPollerConfig {
        endpoint,
        poll_interval_ms: 10_000,
        timeout_ms: 500,
    })
    .expect("source");
    let sink = CollectingSink::new();
    let (stop_tx, stop_rx) = watch::channel(false);

    let sink_for_run: Arc<dyn TelemetrySink> = sink;
    let handle = tokio::spawn(async move { source.run(sink_for_run, stop_rx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(true).expect("stop");

    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("exited before the next poll tick")
        .expect("task");
    assert!(result.is_ok());
}
