//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use cookie::Cookie;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use split_gateway::config::unit::{ProxyConfig, ProxyMode, Target};
use split_gateway::config::TimeoutConfig;
use split_gateway::load_balancer::SeededRandom;
use split_gateway::proxy::Upstream;
use split_gateway::stats::{EventSink, LogSink};
use split_gateway::store::MemoryStore;
use split_gateway::{HttpServer, Supervisor, SupervisorSettings};

/// One request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
}

/// Mock backend that records every request head it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    hits: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<Seen> {
        self.seen.lock().unwrap().last().cloned()
    }
}

async fn read_head(socket: &mut TcpStream) -> Option<Seen> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    Some(Seen {
        method,
        target,
        headers,
    })
}

async fn respond(socket: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Recorder)
where
    F: Fn(Seen) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorder = Recorder::default();
    let f = Arc::new(f);

    let rec = recorder.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let rec = rec.clone();
            tokio::spawn(async move {
                let Some(seen) = read_head(&mut socket).await else {
                    return;
                };
                rec.hits.fetch_add(1, Ordering::SeqCst);
                rec.seen.lock().unwrap().push(seen.clone());
                let (status, body) = f(seen).await;
                respond(&mut socket, status, &body).await;
            });
        }
    });
    (addr, recorder)
}

/// Start a mock backend that answers 200 with a fixed body.
pub async fn start_mock_backend(body: &'static str) -> (SocketAddr, Recorder) {
    start_programmable_backend(move |_| async move { (200, body.to_string()) }).await
}

/// Start a backend that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration) -> (SocketAddr, Recorder) {
    start_programmable_backend(move |_| async move {
        tokio::time::sleep(delay).await;
        (200, "slow".to_string())
    })
    .await
}

/// An address nothing listens on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn target(id: &str, url: &str, weight: f64) -> Target {
    Target {
        id: id.into(),
        url: url.into(),
        weight,
        active: true,
    }
}

pub fn unit(id: &str, listen_key: &str, mode: ProxyMode, targets: Vec<Target>) -> ProxyConfig {
    ProxyConfig {
        id: id.into(),
        listen_key: listen_key.into(),
        mode,
        path_key: None,
        targets,
        rule: None,
        tags: vec![],
        active: true,
    }
}

pub fn settings() -> SupervisorSettings {
    SupervisorSettings {
        flush_interval: Duration::from_secs(3600),
        publish_timeout: Duration::from_secs(1),
    }
}

/// Supervisor with deterministic selection and a 2s upstream timeout.
pub fn supervisor_with(store: MemoryStore, sink: Arc<dyn EventSink>, upstream_timeout: Duration) -> Arc<Supervisor> {
    Arc::new(
        Supervisor::new(Arc::new(store), sink, Upstream::new(upstream_timeout), settings())
            .with_random(Arc::new(SeededRandom::new(7))),
    )
}

pub fn supervisor() -> Arc<Supervisor> {
    supervisor_with(MemoryStore::new(), Arc::new(LogSink), Duration::from_secs(2))
}

pub fn router(supervisor: &Supervisor) -> Router {
    HttpServer::new(supervisor.dispatcher(), &TimeoutConfig::default()).router()
}

pub fn request(host: &str, path: &str) -> axum::http::request::Builder {
    Request::builder().uri(path).header(header::HOST, host)
}

pub async fn send(router: &Router, req: Request<Body>) -> Response<Body> {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn get(router: &Router, host: &str, path: &str) -> Response<Body> {
    send(router, request(host, path).body(Body::empty()).unwrap()).await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `Set-Cookie` values of a response, decoded, by name.
pub fn set_cookies<B>(response: &Response<B>) -> HashMap<String, Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse_encoded(v.to_string()).ok())
        .map(|c| (c.name().to_string(), c))
        .collect()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
