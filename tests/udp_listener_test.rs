//! Integration test for the UDP listener feeding a QueueManager

use status_ingest::config::{CategoryConfig, IngestConfig};
use status_ingest::core::{handler_fn, HandlerRegistry, QueueManager};
use status_ingest::runtime::serve_datagrams;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_datagrams_flow_from_socket_to_handlers() {
    let config = IngestConfig::new()
        .with_max_concurrent(1)
        .with_category("task", CategoryConfig::new(3));
    let handlers = HandlerRegistry::new().with_handler("task", handler_fn(|_| async { Ok(()) }));
    let manager = Arc::new(QueueManager::new(config, handlers).expect("manager"));
    manager.start().expect("start");

    let listener = UdpSocket::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(serve_datagrams(listener, Arc::clone(&manager), shutdown_rx));

    let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
    sender.send_to(b"task;host-1;started", addr).await.unwrap();
    sender.send_to(b"task;host-1", addr).await.unwrap();
    sender.send_to(b"unknown;a;b", addr).await.unwrap();
    sender.send_to(b"task;host-2;finished", addr).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.get_metrics().received < 4 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    let received = server.await.unwrap().expect("listener result");
    assert_eq!(received, 4);

    let stopper = Arc::clone(&manager);
    tokio::task::spawn_blocking(move || stopper.stop()).await.unwrap();

    let snap = manager.get_metrics();
    assert_eq!(snap.received, 4);
    assert_eq!(snap.queued, 2);
    assert_eq!(snap.dropped_malformed, 2);
    assert_eq!(snap.successful, 2);
}
