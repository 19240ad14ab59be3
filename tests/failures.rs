//! Routing and upstream failures surface as one mapped status each.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;
use common::{
    client, config_for, config_with_scheme, read_request, refused_addr, spawn_proxy,
    start_echo_backend, start_hanging_backend, start_plaintext_backend, start_silent_backend,
};

#[tokio::test]
async fn test_unknown_prefix_is_404() {
    let backend = start_echo_backend("alpha").await;
    let proxy = spawn_proxy(config_for(&[("alpha", backend.to_string())])).await;

    let res = client().get(proxy.url("/unknownthing/x")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(res.text().await.unwrap(), "No proxy configured for path: unknownthing\n");
}

#[tokio::test]
async fn test_root_path_is_400() {
    let backend = start_echo_backend("alpha").await;
    let proxy = spawn_proxy(config_for(&[("alpha", backend.to_string())])).await;

    let res = client().get(proxy.url("/")).send().await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.text().await.unwrap(), "Invalid path\n");
}

#[tokio::test]
async fn test_unresolvable_domain_is_502() {
    let proxy = spawn_proxy(config_for(&[("ghost", "does-not-exist.invalid".to_string())])).await;

    let res = client().get(proxy.url("/ghost/x")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(
        res.text().await.unwrap(),
        "Domain does-not-exist.invalid cannot be resolved\n"
    );
}

#[tokio::test]
async fn test_refused_connection_is_502() {
    let addr = refused_addr().await;
    let proxy = spawn_proxy(config_for(&[("down", addr.to_string())])).await;

    let res = client().get(proxy.url("/down/x")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(res.text().await.unwrap(), format!("Domain {} is unreachable\n", addr));
}

#[tokio::test]
async fn test_response_header_timeout_is_504() {
    let addr = start_silent_backend().await;
    let mut config = config_for(&[("slow", addr.to_string())]);
    config.transport.response_header_timeout_secs = 1;
    let proxy = spawn_proxy(config).await;

    let start = Instant::now();
    let res = client().get(proxy.url("/slow/x")).send().await.unwrap();
    assert_eq!(res.status(), 504);
    assert_eq!(res.text().await.unwrap(), format!("Request to {} timed out\n", addr));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_slow_upload_not_cut_by_header_timeout() {
    let backend = start_echo_backend("alpha").await;
    let mut config = config_for(&[("alpha", backend.to_string())]);
    config.transport.response_header_timeout_secs = 1;
    let proxy = spawn_proxy(config).await;

    let mut socket = TcpStream::connect(proxy.addr).await.unwrap();
    socket
        .write_all(b"POST /alpha/upload HTTP/1.1\r\nHost: proxy\r\nContent-Length: 6\r\n\r\n")
        .await
        .unwrap();
    for byte in b"abcdef" {
        tokio::time::sleep(Duration::from_millis(500)).await;
        socket.write_all(&[*byte]).await.unwrap();
    }

    let response = tokio::time::timeout(Duration::from_secs(10), read_request(&mut socket))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 200"), "unexpected response: {}", text);
    assert!(text.ends_with("\r\n\r\nabcdef"));
}

#[tokio::test]
async fn test_tls_handshake_timeout_is_504() {
    let addr = start_silent_backend().await;
    let mut config = config_with_scheme("https", &[("secure", addr.to_string())]);
    config.transport.tls_handshake_timeout_secs = 1;
    config.transport.response_header_timeout_secs = 60;
    let proxy = spawn_proxy(config).await;

    let start = Instant::now();
    let res = client().get(proxy.url("/secure/x")).send().await.unwrap();
    assert_eq!(res.status(), 504);
    assert_eq!(res.text().await.unwrap(), format!("Request to {} timed out\n", addr));
    assert!(start.elapsed() >= Duration::from_millis(900));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_tls_against_plaintext_backend_is_502() {
    let addr = start_plaintext_backend().await;
    let proxy = spawn_proxy(config_with_scheme("https", &[("secure", addr.to_string())])).await;

    let res = client().get(proxy.url("/secure/x")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert!(res.text().await.unwrap().starts_with("Proxy error: "));
}

#[tokio::test]
async fn test_client_disconnect_cancels_backend_request() {
    let (addr, mut seen) = start_hanging_backend().await;
    let proxy = spawn_proxy(config_for(&[("hang", addr.to_string())])).await;

    let mut socket = TcpStream::connect(proxy.addr).await.unwrap();
    socket
        .write_all(b"GET /hang/x HTTP/1.1\r\nHost: proxy\r\n\r\n")
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), seen.recv()).await;
    assert_eq!(first.unwrap(), Some("request"));

    drop(socket);
    let next = tokio::time::timeout(Duration::from_secs(5), seen.recv()).await;
    assert_eq!(next.expect("backend connection left open"), Some("eof"));
}

#[tokio::test]
async fn test_failures_do_not_affect_other_prefixes() {
    let healthy = start_echo_backend("healthy").await;
    let down = refused_addr().await;
    let proxy = spawn_proxy(config_for(&[
        ("ok", healthy.to_string()),
        ("down", down.to_string()),
    ]))
    .await;
    let client = client();

    for _ in 0..3 {
        let res = client.get(proxy.url("/down/x")).send().await.unwrap();
        assert_eq!(res.status(), 502);
        let res = client.get(proxy.url("/ok/x")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }
}

#[tokio::test]
async fn test_idle_keepalive_connection_is_closed() {
    let backend = start_echo_backend("alpha").await;
    let mut config = config_for(&[("alpha", backend.to_string())]);
    config.timeouts.idle_secs = 1;
    let proxy = spawn_proxy(config).await;

    let mut socket = TcpStream::connect(proxy.addr).await.unwrap();
    socket
        .write_all(b"GET /alpha/ HTTP/1.1\r\nHost: proxy\r\n\r\n")
        .await
        .unwrap();

    let start = Instant::now();
    let mut received = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(10), async {
        let mut buf = [0u8; 4096];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
        }
    })
    .await;

    assert!(closed.is_ok(), "idle connection was never closed");
    assert!(String::from_utf8_lossy(&received).starts_with("HTTP/1.1 200"));
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let backend = start_echo_backend("alpha").await;
    let proxy = spawn_proxy(config_for(&[("alpha", backend.to_string())])).await;

    let res = client().get(proxy.url("/alpha/x")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    proxy.shutdown.trigger();
    let finished = tokio::time::timeout(Duration::from_secs(5), proxy.handle).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
    assert!(TcpStream::connect(proxy.addr).await.is_err());
}
