//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use badgateway_proxy::config::ProxyConfig;
use badgateway_proxy::lifecycle::{self, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a mock backend that answers every request with `200 OK` and `body`.
pub async fn start_mock_backend(addr: SocketAddr, body: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Start a backend that accepts connections and closes them without answering.
#[allow(dead_code)]
pub async fn start_crashing_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            drop(socket);
        }
    });
}

/// Start a backend that accepts connections and never responds.
#[allow(dead_code)]
pub async fn start_hanging_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
}

/// Config pointing the proxy at `backend`, listening on `proxy`.
pub fn config(proxy: SocketAddr, backend: SocketAddr, development_mode: bool) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = proxy.to_string();
    config.backend.address = backend.to_string();
    config.backend_name = "Rails".into();
    config.development_mode = development_mode;
    config
}

/// Start the proxy; the returned handle stops it on `trigger()`.
pub async fn start_proxy(config: ProxyConfig) -> Shutdown {
    let shutdown = Shutdown::new();
    let (server, listener) = lifecycle::start(config).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
