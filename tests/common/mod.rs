//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use request_shield::admin::serve_admin;
use request_shield::config::ShieldConfig;
use request_shield::lifecycle::Shutdown;
use request_shield::security::SecurityMiddleware;
use request_shield::ShieldServer;

pub const ADMIN_KEY: &str = "integration-admin-key";

/// Start a mock upstream that answers every request with `response`.
///
/// Returns a counter of requests received.
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) -> Arc<AtomicUsize> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        counter.fetch_add(1, Ordering::SeqCst);

                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    hits
}

/// Config bound to `shield_addr`, forwarding to `upstream` when given.
pub fn test_config(shield_addr: SocketAddr, upstream: Option<SocketAddr>) -> ShieldConfig {
    let mut config = ShieldConfig::default();
    config.listener.bind_address = shield_addr.to_string();
    config.upstream.address = upstream.map(|a| a.to_string());
    config.admin.api_key = ADMIN_KEY.to_string();
    config.sweep.enabled = false;
    config
}

/// A running shield (and optionally its admin API).
pub struct TestShield {
    pub shield: Arc<SecurityMiddleware>,
    pub shutdown: Shutdown,
}

impl Drop for TestShield {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the shield listener, plus the admin API when `admin_addr` is given.
pub async fn start_shield(config: ShieldConfig, admin_addr: Option<SocketAddr>) -> TestShield {
    let shield = Arc::new(SecurityMiddleware::new(&config).unwrap());
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let server = ShieldServer::new(config, shield.clone());

    if let Some(admin_addr) = admin_addr {
        let admin_listener = TcpListener::bind(admin_addr).await.unwrap();
        let state = server.state();
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = serve_admin(admin_listener, state, admin_shutdown).await;
        });
    }

    let (_, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    TestShield { shield, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
