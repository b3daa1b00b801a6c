//! Configuration to listener, end to end

use async_trait::async_trait;
use bytes::Bytes;
use ferry_config::{load_from_str, ConfigFormat};
use ferry_core::{Capability, Error, PluginOption};
use ferry_plugins::{PluginConfig, PluginDescriptor, PluginManager, PluginRegistry, SetupContext};
use ferry_protocols::{BindContext, BindOwner, Protocol, ReceiveHandler};
use ferry_runtime::{Lifecycle, RetryPolicy};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default)]
struct Sink {
    received: Mutex<Vec<u8>>,
}

#[async_trait]
impl ReceiveHandler for Sink {
    async fn receive(&self, _peer: SocketAddr, data: Bytes) {
        self.received.lock().extend_from_slice(&data);
    }
}

fn sink_registry(sink: Arc<Sink>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(
        PluginDescriptor::new("sink")
            .description("Collects raw bytes")
            .option(PluginOption::new("host").default_value("127.0.0.1"))
            .option(PluginOption::new("protocol").default_value("tcp"))
            .output(move |config: &PluginConfig, ctx: &SetupContext| {
                let protocol = Protocol::parse(config.str("protocol")?.unwrap_or("tcp"))?;
                let host = config.str("host")?.unwrap_or("127.0.0.1").to_string();
                let port = config.port("port")?.unwrap_or(0);
                protocol.bind(&ctx.bind, host, port, sink.clone());
                Ok(())
            }),
    );
    registry.activate("test");
    registry
}

fn free_tcp_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_yaml_entries_reach_listener() {
    let port = free_tcp_port();
    let yaml = format!(
        r#"
core:
  retry:
    initial_delay: 10ms
    max_delay: 50ms
output:
  - type: sink
    port: {port}
  - type: sink
    port: not-a-number
  - host: nowhere
input:
  - type: sink
"#
    );
    let config = load_from_str(&yaml, ConfigFormat::Yaml).unwrap();

    let sink = Arc::new(Sink::default());
    let manager = PluginManager::new(sink_registry(sink.clone()));
    let ctx = SetupContext::new(BindContext::new(
        Lifecycle::new(),
        RetryPolicy::from_config(&config.core),
    ));

    let summary = manager.setup_all(&config, &ctx);
    assert_eq!(summary.started, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 2);

    ctx.bind.lifecycle.mark_ready();

    let mut stream = None;
    for _ in 0..100 {
        match tokio::net::TcpStream::connect(("127.0.0.1", port)).await {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let mut stream = stream.expect("listener never came up");
    stream.write_all(b"put cpu 1").await.unwrap();
    stream.shutdown().await.unwrap();

    for _ in 0..100 {
        if sink.received.lock().as_slice() == b"put cpu 1" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(sink.received.lock().as_slice(), b"put cpu 1");

    ctx.bind.lifecycle.stop();
    ctx.bind.tracker.close();
    tokio::time::timeout(Duration::from_secs(5), ctx.bind.tracker.wait())
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exhausted_bind_reaches_setup_caller() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let yaml = format!(
        r#"
core:
  rebind_timeout: 50ms
  retry:
    initial_delay: 10ms
    max_delay: 20ms
output:
  - type: sink
    port: {port}
"#
    );
    let config = load_from_str(&yaml, ConfigFormat::Yaml).unwrap();

    let manager = PluginManager::new(sink_registry(Arc::new(Sink::default())));
    let ctx = SetupContext::new(BindContext::new(
        Lifecycle::new(),
        RetryPolicy::from_config(&config.core),
    ));

    let summary = manager.setup_all(&config, &ctx);
    assert_eq!(summary.started, 1);
    ctx.bind.lifecycle.mark_ready();

    let failure = tokio::time::timeout(Duration::from_secs(5), ctx.bind.failures().next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.owner, Some(BindOwner::new("sink", Capability::Output)));
    assert_eq!(failure.target, format!("tcp://127.0.0.1:{port}"));
    assert!(matches!(failure.error, Error::RetryExhausted { .. }));

    drop(taken);
}

#[test]
fn test_capabilities_listed_from_registry() {
    let registry = sink_registry(Arc::new(Sink::default()));
    let sink = registry.lookup("sink").unwrap();

    assert_eq!(sink.source(), "test");
    assert_eq!(sink.capabilities().into_iter().collect::<Vec<_>>(), vec![Capability::Output]);
    assert_eq!(sink.options().len(), 2);
}
