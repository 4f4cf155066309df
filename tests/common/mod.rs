//! Shared utilities for integration testing.
//!
//! Mock upstreams answer every request with an echo of what they received:
//!
//! ```text
//! {name} {METHOD} {path?query}
//! {header}: {value}
//! ...
//!
//! {body}
//! ```

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use dev_proxy::{ProxyConfig, ProxyServer, Shutdown};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    lookups: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of firm GUID lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockState {
    name: &'static str,
    guid_location: Option<&'static str>,
    lookup_delay: Duration,
    lookups: Arc<AtomicUsize>,
}

/// Start an echoing upstream. The lookup endpoint answers `302` with
/// `guid_location` when set and `500` otherwise.
pub async fn start_upstream(name: &'static str, guid_location: Option<&'static str>) -> MockUpstream {
    start_upstream_with_delay(name, guid_location, Duration::ZERO).await
}

pub async fn start_upstream_with_delay(
    name: &'static str,
    guid_location: Option<&'static str>,
    lookup_delay: Duration,
) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let lookups = Arc::new(AtomicUsize::new(0));

    let state = MockState {
        name,
        guid_location,
        lookup_delay,
        lookups: lookups.clone(),
    };
    let app = Router::new().fallback(mock_handler).with_state(state);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, lookups }
}

async fn mock_handler(State(state): State<MockState>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();

    if path.ends_with("/firmLoginToFirmGuid") {
        state.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(state.lookup_delay).await;
        return match state.guid_location {
            Some(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        };
    }

    match path.as_str() {
        "/redirect" => {
            return (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")]).into_response();
        }
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
        "/cookie" => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            response.headers_mut().insert(
                header::SET_COOKIE,
                HeaderValue::from_static("sid=1; Path=/acme/e/eng; HttpOnly"),
            );
            return response;
        }
        _ => {}
    }

    let mut echo = format!("{} {} {}\n", state.name, request.method(), request.uri());
    for (name, value) in request.headers() {
        echo.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("<binary>")));
    }
    echo.push('\n');

    let body = to_bytes(request.into_body(), usize::MAX).await.unwrap();
    echo.push_str(&String::from_utf8_lossy(&body));

    let mut response = echo.into_response();
    response
        .headers_mut()
        .insert("x-upstream", HeaderValue::from_static(state.name));
    response
}

/// What a mock upstream saw.
#[derive(Debug)]
pub struct Echo {
    pub upstream: String,
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    pub fn parse(text: &str) -> Self {
        let (head, body) = text.split_once("\n\n").unwrap_or((text, ""));
        let mut lines = head.lines();

        let mut first = lines.next().unwrap().splitn(3, ' ');
        let upstream = first.next().unwrap().to_string();
        let method = first.next().unwrap().to_string();
        let target = first.next().unwrap().to_string();

        let headers = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Self {
            upstream,
            method,
            target,
            headers,
            body: body.to_string(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Proxy configuration pointing every upstream at local mocks.
pub fn config_for(frontend: &MockUpstream, backend: &MockUpstream, cloud: &MockUpstream) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstreams.local_host = "127.0.0.1".to_string();
    config.upstreams.frontend_port = frontend.port();
    config.upstreams.backend_port = backend.port();
    config.upstreams.cloud_origin = cloud.origin();
    config
}

/// A running proxy under test.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, shutdown }
}

/// Client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

pub async fn get_echo(client: &reqwest::Client, url: &str) -> Echo {
    let response = client.get(url).send().await.expect("Proxy unreachable");
    assert_eq!(response.status(), 200, "unexpected status for {url}");
    Echo::parse(&response.text().await.unwrap())
}

/// Send a GET with `target` written byte-for-byte on the request line.
///
/// HTTP client libraries normalize paths, so this talks to the socket directly.
pub async fn raw_get(addr: SocketAddr, target: &str) -> Echo {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        target, addr
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    socket.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw);

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "unexpected response for {target}: {head}");
    assert!(
        !head.to_ascii_lowercase().contains("transfer-encoding: chunked"),
        "expected a sized echo body"
    );
    Echo::parse(body)
}

/// A port nothing listens on.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
