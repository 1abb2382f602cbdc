//! End-to-end behavior of the proxy when the backend fails.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::StatusCode;

mod common;

fn content_type(res: &reqwest::Response) -> String {
    res.headers()["content-type"].to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_refused_connection_in_production_mode() {
    // Nothing listens on the backend port.
    let backend_addr: SocketAddr = "127.0.0.1:28481".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28482".parse().unwrap();

    let shutdown = common::start_proxy(common::config(proxy_addr, backend_addr, false)).await;

    let res = common::client()
        .get(format!("http://{}/users/sign_in", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(content_type(&res), "text/plain");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "Rails is not responding");

    shutdown.trigger();
}

#[tokio::test]
async fn test_refused_connection_in_development_mode() {
    let backend_addr: SocketAddr = "127.0.0.1:28581".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28582".parse().unwrap();

    let shutdown = common::start_proxy(common::config(proxy_addr, backend_addr, true)).await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(content_type(&res), "text/html");
    let body = res.text().await.unwrap();
    assert!(body.contains("<title>502: Rails is not responding</title>"));
    assert!(body.to_lowercase().contains("connection refused"), "body: {}", body);
    assert!(body.contains("5000"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_backend_success_passes_through() {
    let backend_addr: SocketAddr = "127.0.0.1:28681".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28682".parse().unwrap();

    common::start_mock_backend(backend_addr, "ok").await;
    let shutdown = common::start_proxy(common::config(proxy_addr, backend_addr, true)).await;

    let res = common::client()
        .get(format!("http://{}/health", proxy_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(content_type(&res), "text/plain");
    assert_eq!(res.text().await.unwrap(), "ok");

    shutdown.trigger();
}

#[tokio::test]
async fn test_backend_crash_is_bad_gateway() {
    let backend_addr: SocketAddr = "127.0.0.1:28781".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28782".parse().unwrap();

    common::start_crashing_backend(backend_addr).await;
    let shutdown = common::start_proxy(common::config(proxy_addr, backend_addr, false)).await;

    let res = common::client()
        .post(format!("http://{}/api/v4/jobs/request", proxy_addr))
        .body("{}")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await.unwrap(), "Rails is not responding");

    shutdown.trigger();
}

#[tokio::test]
async fn test_backend_timeout_is_bad_gateway() {
    let backend_addr: SocketAddr = "127.0.0.1:28881".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28882".parse().unwrap();

    common::start_hanging_backend(backend_addr).await;
    let mut config = common::config(proxy_addr, backend_addr, true);
    config.timeouts.request_secs = 1;
    let shutdown = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/", proxy_addr))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(content_type(&res), "text/html");
    assert!(res.text().await.unwrap().contains("request timed out"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_to_dead_backend() {
    let backend_addr: SocketAddr = "127.0.0.1:28981".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28982".parse().unwrap();

    let shutdown = common::start_proxy(common::config(proxy_addr, backend_addr, false)).await;
    let client = common::client();

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        let url = format!("http://{}/req/{}", proxy_addr, i);
        handles.push(tokio::spawn(async move { client.get(url).send().await }));
    }

    for handle in handles {
        let res = handle.await.unwrap().expect("Proxy unreachable");
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    shutdown.trigger();
}
