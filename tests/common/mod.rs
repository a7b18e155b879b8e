//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use fx_gateway::config::{EnvVars, GatewayConfig};
use fx_gateway::lifecycle::Shutdown;
use fx_gateway::mirror::{ConnectionMetadata, HeaderBag, MirrorError, MirrorService, ServiceBinding, StructuredCall};
use fx_gateway::HttpServer;

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub mirror: MirrorService,
    pub handle: JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server, drain included.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("gateway did not stop")
            .expect("gateway task panicked");
    }
}

async fn serve(server: HttpServer) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mirror = server.mirror().clone();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    TestGateway {
        addr,
        shutdown,
        mirror,
        handle,
    }
}

/// Start a gateway mirroring into `binding`.
pub async fn start_gateway(config: GatewayConfig, binding: Option<ServiceBinding>) -> TestGateway {
    serve(HttpServer::with_binding(config, EnvVars::default(), binding)).await
}

/// Start a gateway whose binding is built from `config.mirror`.
pub async fn start_configured_gateway(config: GatewayConfig) -> TestGateway {
    serve(HttpServer::new(config, EnvVars::default()).unwrap()).await
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// One structured call as received by [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct MirroredCall {
    pub request_timestamp: u64,
    pub connection_metadata: ConnectionMetadata,
    pub method: String,
    pub url: String,
    pub request_headers: HeaderBag,
    pub request_body: Option<Bytes>,
    pub response_timestamp: u64,
    pub response_headers: HeaderBag,
    pub status: u16,
    pub response_body: Option<Bytes>,
}

/// Structured-call binding that keeps every envelope it receives.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<MirroredCall>>,
    delay: Duration,
}

impl RecordingSink {
    /// A sink that takes `delay` to accept each call.
    pub fn slow(delay: Duration) -> Self {
        Self {
            calls: Mutex::default(),
            delay,
        }
    }

    pub fn calls(&self) -> Vec<MirroredCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Poll until at least `count` calls arrived or `timeout` elapsed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<MirroredCall> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let calls = self.calls();
            if calls.len() >= count || tokio::time::Instant::now() >= deadline {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[async_trait]
impl StructuredCall for RecordingSink {
    async fn handle_worker_request(
        &self,
        request_timestamp: u64,
        connection_metadata: ConnectionMetadata,
        method: String,
        url: String,
        request_headers: HeaderBag,
        request_body: Option<Bytes>,
        response_timestamp: u64,
        response_headers: HeaderBag,
        status: u16,
        response_body: Option<Bytes>,
    ) -> Result<(), MirrorError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(MirroredCall {
            request_timestamp,
            connection_metadata,
            method,
            url,
            request_headers,
            request_body,
            response_timestamp,
            response_headers,
            status,
            response_body,
        });
        Ok(())
    }
}

pub fn recording_binding(sink: Arc<RecordingSink>) -> ServiceBinding {
    ServiceBinding::new().with_structured_call(sink)
}

/// A raw HTTP request as seen by [`start_recording_upstream`].
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl UpstreamRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Start a mock upstream that answers every request with `status` and
/// records what it received.
pub async fn start_recording_upstream(status: u16) -> (SocketAddr, Arc<Mutex<Vec<UpstreamRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let recorded = received.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else { return };
                        recorded.lock().unwrap().push(request);

                        let status_text = match status {
                            200 => "200 OK",
                            202 => "202 Accepted",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                            status_text
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, received)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<UpstreamRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut request = UpstreamRequest {
        head,
        body: buf[head_end + 4..].to_vec(),
    };
    let length: usize = request
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while request.body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        request.body.extend_from_slice(&chunk[..n]);
    }

    Some(request)
}

/// Poll `received` until it holds `count` requests or `timeout` elapsed.
pub async fn wait_for_upstream(
    received: &Mutex<Vec<UpstreamRequest>>,
    count: usize,
    timeout: Duration,
) -> Vec<UpstreamRequest> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let requests = received.lock().unwrap().clone();
        if requests.len() >= count || tokio::time::Instant::now() >= deadline {
            return requests;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
